//! # Vouchers
//!
//! Order-level discount codes: a percentage or a fixed amount, a finite
//! number of redemptions, and an expiry date.
//!
//! ## Discount Rule
//! ```text
//! Percentage(p): min(subtotal, subtotal × p / 100)
//! Fixed(m):      min(subtotal, m)
//! ```
//!
//! The remaining count lives in the database and is decremented with a
//! single conditional UPDATE; this module only decides whether a voucher
//! looks usable and what it is worth.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::{Money, Percent};
use crate::validation::{validate_code, ValidationResult};

/// What a voucher takes off the order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "kind", content = "magnitude")]
pub enum VoucherKind {
    Percentage(Percent),
    Fixed(Money),
}

impl VoucherKind {
    /// Discount this voucher grants against `subtotal`. Never exceeds it.
    pub fn discount_for(&self, subtotal: Money) -> Money {
        let raw = match self {
            VoucherKind::Percentage(pct) => subtotal.percentage(*pct),
            VoucherKind::Fixed(amount) => *amount,
        };
        raw.min(subtotal).floor_at_zero()
    }

    /// Magnitude must be positive: 1–100 for percentages, > 0 for amounts.
    pub fn validate(&self) -> ValidationResult<()> {
        match self {
            VoucherKind::Percentage(pct) if pct.is_zero() => Err(ValidationError::OutOfRange {
                field: "voucher.magnitude".to_string(),
                min: 1,
                max: 100,
            }),
            VoucherKind::Fixed(amount) if !amount.is_positive() => {
                Err(ValidationError::MustBePositive {
                    field: "voucher.magnitude".to_string(),
                })
            }
            _ => Ok(()),
        }
    }
}

/// A voucher as stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Voucher {
    pub code: String,
    pub kind: VoucherKind,
    /// Redemptions left.
    pub remaining: i64,
    /// Last day the voucher can be used (inclusive).
    #[ts(as = "String")]
    pub expires_on: NaiveDate,
}

impl Voucher {
    /// Checks the invariants a new voucher must satisfy.
    pub fn validate(&self) -> ValidationResult<()> {
        validate_code("voucher.code", &self.code)?;
        self.kind.validate()?;
        if self.remaining < 0 {
            return Err(ValidationError::OutOfRange {
                field: "voucher.remaining".to_string(),
                min: 0,
                max: i64::MAX,
            });
        }
        Ok(())
    }

    /// Whether the voucher can be applied on `today`.
    ///
    /// Advisory only: the redemption UPDATE re-checks both conditions.
    pub fn ensure_redeemable(&self, today: NaiveDate) -> CoreResult<()> {
        if today > self.expires_on {
            return Err(CoreError::VoucherUnavailable {
                code: self.code.clone(),
                reason: format!("expired on {}", self.expires_on),
            });
        }
        if self.remaining <= 0 {
            return Err(CoreError::VoucherUnavailable {
                code: self.code.clone(),
                reason: "no redemptions left".to_string(),
            });
        }
        Ok(())
    }

    #[inline]
    pub fn discount_for(&self, subtotal: Money) -> Money {
        self.kind.discount_for(subtotal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn fixed(amount: i64) -> Voucher {
        Voucher {
            code: "GIAM50K".to_string(),
            kind: VoucherKind::Fixed(Money::from_minor(amount)),
            remaining: 3,
            expires_on: date(2026, 12, 31),
        }
    }

    #[test]
    fn test_percentage_discount_capped_at_subtotal() {
        let kind = VoucherKind::Percentage(Percent::new(15).unwrap());
        assert_eq!(kind.discount_for(Money::from_minor(200_000)).minor(), 30_000);

        let all = VoucherKind::Percentage(Percent::new(100).unwrap());
        assert_eq!(all.discount_for(Money::from_minor(80_000)).minor(), 80_000);
    }

    #[test]
    fn test_fixed_discount_capped_at_subtotal() {
        assert_eq!(fixed(50_000).discount_for(Money::from_minor(200_000)).minor(), 50_000);
        assert_eq!(fixed(50_000).discount_for(Money::from_minor(30_000)).minor(), 30_000);
        assert_eq!(fixed(50_000).discount_for(Money::zero()), Money::zero());
    }

    #[test]
    fn test_magnitude_must_be_positive() {
        assert!(fixed(0).validate().is_err());
        assert!(VoucherKind::Percentage(Percent::zero()).validate().is_err());
        assert!(fixed(1).validate().is_ok());
    }

    #[test]
    fn test_redeemable_window_and_count() {
        let voucher = fixed(50_000);
        assert!(voucher.ensure_redeemable(date(2026, 12, 31)).is_ok());
        assert!(matches!(
            voucher.ensure_redeemable(date(2027, 1, 1)),
            Err(CoreError::VoucherUnavailable { .. })
        ));

        let used_up = Voucher {
            remaining: 0,
            ..fixed(50_000)
        };
        assert!(used_up.ensure_redeemable(date(2026, 6, 1)).is_err());
    }

    #[test]
    fn test_kind_wire_shape() {
        let json = serde_json::to_value(VoucherKind::Fixed(Money::from_minor(50_000))).unwrap();
        assert_eq!(json["kind"], "Fixed");
        assert_eq!(json["magnitude"], 50_000);
    }
}
