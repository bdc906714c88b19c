//! # Promotion Campaigns
//!
//! A campaign is a percentage discount with an inclusive date window. A
//! product points at no more than one campaign; assigning a new one replaces
//! the old reference.
//!
//! ## Effective Discount at Read Time
//! ```text
//! product.campaign_code ──► campaign found? ──no──► 0%
//!                                │yes
//!                                ▼
//!                 starts_on ≤ today ≤ ends_on? ──no──► 0%  (expired / not yet)
//!                                │yes
//!                                ▼
//!                 campaign unit matches line unit? ──no──► 0%
//!                                │yes
//!                                ▼
//!                          campaign percent
//! ```
//!
//! Expiry is evaluated here, never enforced when products are assigned.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::ValidationError;
use crate::money::Percent;
use crate::types::Product;
use crate::validation::{
    validate_code, validate_date_range, validate_discount_percent, validate_name,
    ValidationResult,
};

/// A percentage discount campaign.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PromotionCampaign {
    pub code: String,
    pub name: String,
    pub percent: Percent,
    /// Selling unit the discount applies to; `None` means every unit.
    pub unit_label: Option<String>,
    #[ts(as = "String")]
    pub starts_on: NaiveDate,
    #[ts(as = "String")]
    pub ends_on: NaiveDate,
}

impl PromotionCampaign {
    /// Checks a campaign before it is stored.
    pub fn validate(&self) -> ValidationResult<()> {
        validate_code("campaign.code", &self.code)?;
        validate_name("campaign.name", &self.name)?;
        validate_discount_percent("campaign.percent", self.percent.value())?;
        validate_date_range("campaign", self.starts_on, self.ends_on)?;
        Ok(())
    }

    /// Whether `today` falls inside the inclusive window.
    pub fn is_running_on(&self, today: NaiveDate) -> bool {
        self.starts_on <= today && today <= self.ends_on
    }

    /// Discount this campaign grants to `unit_label` on `today`.
    pub fn percent_for(&self, unit_label: &str, today: NaiveDate) -> Option<Percent> {
        if !self.is_running_on(today) {
            return None;
        }
        match &self.unit_label {
            Some(only) if only != unit_label => None,
            _ => Some(self.percent),
        }
    }
}

/// Effective campaign percentage for one product line.
///
/// `campaign` is whatever the caller looked up for `product.campaign_code`;
/// a campaign with a different code is ignored.
pub fn effective_percent(
    product: &Product,
    campaign: Option<&PromotionCampaign>,
    unit_label: &str,
    today: NaiveDate,
) -> Option<Percent> {
    let assigned = product.campaign_code.as_deref()?;
    let campaign = campaign.filter(|c| c.code == assigned)?;
    campaign.percent_for(unit_label, today)
}

/// Normalizes the product ids of a bulk assignment: trimmed, non-empty,
/// duplicates dropped, first-seen order kept.
pub fn normalize_product_ids(product_ids: &[String]) -> ValidationResult<Vec<String>> {
    let mut ids: Vec<String> = Vec::with_capacity(product_ids.len());
    for id in product_ids {
        let id = id.trim();
        if id.is_empty() {
            return Err(ValidationError::required("product_id"));
        }
        if !ids.iter().any(|seen| seen == id) {
            ids.push(id.to_string());
        }
    }
    if ids.is_empty() {
        return Err(ValidationError::required("product_ids"));
    }
    Ok(ids)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::money::Money;
    use crate::types::UnitDefinition;

    fn d(month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, month, day).unwrap()
    }

    fn campaign(unit: Option<&str>) -> PromotionCampaign {
        PromotionCampaign {
            code: "TET2026".to_string(),
            name: "Tết sale".to_string(),
            percent: Percent::new(20).unwrap(),
            unit_label: unit.map(str::to_string),
            starts_on: d(1, 20),
            ends_on: d(2, 10),
        }
    }

    fn product(campaign_code: Option<&str>) -> Product {
        Product {
            id: "p-1".to_string(),
            code: "PARA-500".to_string(),
            name: "Paracetamol".to_string(),
            units: vec![UnitDefinition {
                unit_label: "Hộp".to_string(),
                quantity_per_unit: 1,
                price: Money::from_minor(100_000),
            }],
            campaign_code: campaign_code.map(str::to_string),
            is_active: true,
        }
    }

    #[test]
    fn test_window_is_inclusive() {
        let c = campaign(None);
        assert!(c.is_running_on(d(1, 20)));
        assert!(c.is_running_on(d(2, 10)));
        assert!(!c.is_running_on(d(1, 19)));
        assert!(!c.is_running_on(d(2, 11)));
    }

    #[test]
    fn test_expired_campaign_grants_nothing() {
        let c = campaign(None);
        let p = product(Some("TET2026"));
        assert_eq!(effective_percent(&p, Some(&c), "Hộp", d(2, 1)), Some(c.percent));
        assert_eq!(effective_percent(&p, Some(&c), "Hộp", d(3, 1)), None);
    }

    #[test]
    fn test_unassigned_or_mismatched_campaign_grants_nothing() {
        let c = campaign(None);
        assert_eq!(effective_percent(&product(None), Some(&c), "Hộp", d(2, 1)), None);
        assert_eq!(
            effective_percent(&product(Some("OTHER")), Some(&c), "Hộp", d(2, 1)),
            None
        );
    }

    #[test]
    fn test_unit_restricted_campaign() {
        let c = campaign(Some("Hộp"));
        assert!(c.percent_for("Hộp", d(2, 1)).is_some());
        assert!(c.percent_for("Vỉ", d(2, 1)).is_none());
    }

    #[test]
    fn test_validate_campaign() {
        assert!(campaign(None).validate().is_ok());

        let backwards = PromotionCampaign {
            starts_on: d(2, 10),
            ends_on: d(1, 20),
            ..campaign(None)
        };
        assert!(matches!(
            backwards.validate(),
            Err(ValidationError::InvalidDateRange { .. })
        ));

        let zero = PromotionCampaign {
            percent: Percent::zero(),
            ..campaign(None)
        };
        assert!(zero.validate().is_err());
    }

    #[test]
    fn test_normalize_product_ids() {
        let ids = vec!["a".to_string(), " b ".to_string(), "a".to_string()];
        assert_eq!(normalize_product_ids(&ids).unwrap(), vec!["a", "b"]);
        assert!(normalize_product_ids(&[]).is_err());
        assert!(normalize_product_ids(&["".to_string()]).is_err());
    }
}
