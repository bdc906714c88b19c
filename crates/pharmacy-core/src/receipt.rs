//! # Stock Receipts
//!
//! A batch of stock shipped from head office to a branch. Nothing reaches
//! the branch's stock until someone approves the receipt.
//!
//! ## Decision
//! ```text
//!                 ┌──── Approve ───► Approved  (every line added to stock, atomically)
//!   Unapproved ───┤
//!                 └──── Reject ────► Rejected  (stock untouched, kept for audit)
//!
//!   Approved / Rejected ── any decision ──► AlreadyDecided
//! ```
//!
//! The database applies the decision with a compare-and-set on the status
//! column, so two staff deciding at once produce exactly one winner.
//!
//! ## Wire Names
//! `manhaphang`, `tinhtrang`, `ngaygui`, `nguoi_gui`, `danhsach_sanpham`.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::types::ActorRole;
use crate::validation::{validate_code, ValidationResult};

// =============================================================================
// Status and Decision
// =============================================================================

/// The three receipt states, shared by the wire, the database and filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub enum ReceiptStatus {
    Unapproved,
    Approved,
    Rejected,
}

impl ReceiptStatus {
    pub const ALL: [ReceiptStatus; 3] = [
        ReceiptStatus::Unapproved,
        ReceiptStatus::Approved,
        ReceiptStatus::Rejected,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            ReceiptStatus::Unapproved => "Unapproved",
            ReceiptStatus::Approved => "Approved",
            ReceiptStatus::Rejected => "Rejected",
        }
    }

    pub const fn is_decided(&self) -> bool {
        !matches!(self, ReceiptStatus::Unapproved)
    }
}

impl fmt::Display for ReceiptStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReceiptStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ReceiptStatus::ALL
            .into_iter()
            .find(|st| st.as_str() == s)
            .ok_or_else(|| ValidationError::NotAllowed {
                field: "status".to_string(),
                allowed: ReceiptStatus::ALL
                    .iter()
                    .map(|st| st.as_str().to_string())
                    .collect(),
            })
    }
}

/// The one-shot decision on a receipt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub enum ReceiptDecision {
    Approve,
    Reject,
}

impl ReceiptDecision {
    pub const fn target_status(&self) -> ReceiptStatus {
        match self {
            ReceiptDecision::Approve => ReceiptStatus::Approved,
            ReceiptDecision::Reject => ReceiptStatus::Rejected,
        }
    }

    /// Whether applying this decision adds the receipt lines to branch stock.
    pub const fn moves_stock(&self) -> bool {
        matches!(self, ReceiptDecision::Approve)
    }
}

/// Only back-office roles decide receipts.
pub fn authorize_decision(role: ActorRole) -> CoreResult<()> {
    if role.is_back_office() {
        Ok(())
    } else {
        Err(CoreError::forbidden("decide stock receipts", role))
    }
}

/// Resolves a decision against the receipt's current status.
///
/// Returns the status to write, or `AlreadyDecided` if the receipt left
/// `Unapproved` before.
pub fn plan_decision(
    receipt_code: &str,
    current: ReceiptStatus,
    decision: ReceiptDecision,
) -> CoreResult<ReceiptStatus> {
    if current.is_decided() {
        return Err(already_decided(receipt_code, current));
    }
    Ok(decision.target_status())
}

/// The error a decision-race loser sees.
pub fn already_decided(receipt_code: &str, status: ReceiptStatus) -> CoreError {
    CoreError::AlreadyDecided {
        receipt_code: receipt_code.to_string(),
        status: status.to_string(),
    }
}

// =============================================================================
// Receipt
// =============================================================================

/// One product on a receipt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ReceiptLine {
    pub product_code: String,
    pub quantity: i64,
}

/// A stock receipt. Immutable except for its single status decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct StockReceipt {
    #[serde(rename = "manhaphang")]
    pub code: String,

    #[serde(rename = "tinhtrang")]
    pub status: ReceiptStatus,

    #[serde(rename = "ngaygui")]
    #[ts(as = "String")]
    pub submitted_on: NaiveDate,

    #[serde(rename = "nguoi_gui")]
    pub submitted_by: String,

    /// Destination branch.
    pub branch_code: String,

    #[serde(rename = "danhsach_sanpham")]
    pub lines: Vec<ReceiptLine>,
}

/// What a submitter sends to create a receipt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ReceiptSubmission {
    pub branch_code: String,
    pub submitted_by: String,
    pub lines: Vec<ReceiptLine>,
}

impl ReceiptSubmission {
    /// Non-empty lines, positive quantities, each product at most once.
    pub fn validate(&self) -> ValidationResult<()> {
        validate_code("branch_code", &self.branch_code)?;
        if self.submitted_by.trim().is_empty() {
            return Err(ValidationError::required("submitted_by"));
        }
        if self.lines.is_empty() {
            return Err(ValidationError::required("lines"));
        }
        for (i, line) in self.lines.iter().enumerate() {
            validate_code("product_code", &line.product_code)?;
            if line.quantity <= 0 {
                return Err(ValidationError::MustBePositive {
                    field: "quantity".to_string(),
                });
            }
            if self.lines[..i]
                .iter()
                .any(|earlier| earlier.product_code == line.product_code)
            {
                return Err(ValidationError::Duplicate {
                    field: "product_code".to_string(),
                    value: line.product_code.clone(),
                });
            }
        }
        Ok(())
    }
}

/// Read-side filter for listing receipts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ReceiptFilter {
    pub status: Option<ReceiptStatus>,
    pub branch_code: Option<String>,
    #[ts(as = "Option<String>")]
    pub submitted_from: Option<NaiveDate>,
    #[ts(as = "Option<String>")]
    pub submitted_to: Option<NaiveDate>,
}

impl ReceiptFilter {
    /// Both ends inclusive; a reversed range is refused.
    pub fn validate(&self) -> ValidationResult<()> {
        if let (Some(from), Some(to)) = (self.submitted_from, self.submitted_to) {
            if to < from {
                return Err(ValidationError::InvalidDateRange {
                    field: "submitted".to_string(),
                });
            }
        }
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn line(code: &str, qty: i64) -> ReceiptLine {
        ReceiptLine {
            product_code: code.to_string(),
            quantity: qty,
        }
    }

    fn submission(lines: Vec<ReceiptLine>) -> ReceiptSubmission {
        ReceiptSubmission {
            branch_code: "CN01".to_string(),
            submitted_by: "kho-tong".to_string(),
            lines,
        }
    }

    #[test]
    fn test_first_decision_wins() {
        assert_eq!(
            plan_decision("NH1", ReceiptStatus::Unapproved, ReceiptDecision::Approve).unwrap(),
            ReceiptStatus::Approved
        );
        assert_eq!(
            plan_decision("NH1", ReceiptStatus::Unapproved, ReceiptDecision::Reject).unwrap(),
            ReceiptStatus::Rejected
        );
    }

    #[test]
    fn test_second_decision_is_already_decided() {
        for current in [ReceiptStatus::Approved, ReceiptStatus::Rejected] {
            for decision in [ReceiptDecision::Approve, ReceiptDecision::Reject] {
                let err = plan_decision("NH1", current, decision).unwrap_err();
                assert!(matches!(err, CoreError::AlreadyDecided { .. }));
            }
        }
    }

    #[test]
    fn test_only_back_office_decides() {
        assert!(authorize_decision(ActorRole::Staff).is_ok());
        assert!(authorize_decision(ActorRole::Customer).is_err());
    }

    #[test]
    fn test_submission_validation() {
        assert!(submission(vec![line("P1", 10), line("P2", 5)]).validate().is_ok());
        assert_eq!(
            submission(vec![]).validate(),
            Err(ValidationError::required("lines"))
        );
        assert!(submission(vec![line("P1", 0)]).validate().is_err());
        assert!(matches!(
            submission(vec![line("P1", 1), line("P1", 2)]).validate(),
            Err(ValidationError::Duplicate { .. })
        ));
    }

    #[test]
    fn test_filter_range() {
        let d = |day| NaiveDate::from_ymd_opt(2026, 5, day).unwrap();
        let ok = ReceiptFilter {
            submitted_from: Some(d(1)),
            submitted_to: Some(d(1)),
            ..ReceiptFilter::default()
        };
        assert!(ok.validate().is_ok());

        let reversed = ReceiptFilter {
            submitted_from: Some(d(2)),
            submitted_to: Some(d(1)),
            ..ReceiptFilter::default()
        };
        assert!(reversed.validate().is_err());
    }

    #[test]
    fn test_wire_field_names() {
        let receipt = StockReceipt {
            code: "NH1".to_string(),
            status: ReceiptStatus::Unapproved,
            submitted_on: NaiveDate::from_ymd_opt(2026, 5, 4).unwrap(),
            submitted_by: "kho-tong".to_string(),
            branch_code: "CN01".to_string(),
            lines: vec![line("P1", 8)],
        };
        let json = serde_json::to_value(&receipt).unwrap();
        assert_eq!(json["manhaphang"], "NH1");
        assert_eq!(json["tinhtrang"], "Unapproved");
        assert_eq!(json["ngaygui"], "2026-05-04");
        assert_eq!(json["nguoi_gui"], "kho-tong");
        assert_eq!(json["danhsach_sanpham"][0]["quantity"], 8);
    }
}
