//! # Inventory Rules
//!
//! Branch stock is advisory while a customer edits a cart and authoritative
//! when an order is committed or a sale is recorded. Nothing is reserved at
//! cart time, so two carts can both hold the last box; the second checkout
//! loses that line.
//!
//! ## Where Stock Is Consulted
//! ```text
//! ┌───────────────────┬─────────────────────────┬──────────────────────────┐
//! │ Context           │ Rule                    │ On shortage              │
//! ├───────────────────┼─────────────────────────┼──────────────────────────┤
//! │ cart quantity     │ clamp_quantity()        │ clamp + StockNotice      │
//! │ order commit      │ check_line()            │ reject that line only    │
//! │ point-of-sale     │ check_line()            │ whole sale refused       │
//! │ receipt approval  │ (increments only)       │ n/a                      │
//! └───────────────────┴─────────────────────────┴──────────────────────────┘
//! ```
//!
//! Stock is counted per product at a branch in base units, the unit whose
//! `quantity_per_unit` is 1. A line of 2 boxes of 10 needs 20 on hand, and
//! every line of one product draws on the same count.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};

/// Warning surfaced when a requested quantity was lowered to what the branch holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct StockNotice {
    pub product_code: String,
    pub unit_label: String,
    pub requested: i64,
    pub granted: i64,
    pub available: i64,
}

impl StockNotice {
    /// True when the branch has nothing left; checkout will reject the line.
    pub fn is_out_of_stock(&self) -> bool {
        self.available < 1
    }
}

/// Result of fitting a requested quantity to available stock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Clamp {
    /// Requested quantity fits.
    Fits(i64),
    /// Lowered to the stock on hand (never below 1).
    Clamped { requested: i64, granted: i64 },
}

impl Clamp {
    pub fn quantity(&self) -> i64 {
        match self {
            Clamp::Fits(q) => *q,
            Clamp::Clamped { granted, .. } => *granted,
        }
    }
}

/// Fits `requested` into `[1, available]`.
///
/// With nothing in stock the line keeps quantity 1 and is reported as
/// clamped; the commit-time check is what actually refuses it.
pub fn clamp_quantity(requested: i64, available: i64) -> Clamp {
    if requested <= available {
        Clamp::Fits(requested)
    } else {
        Clamp::Clamped {
            requested,
            granted: available.max(1),
        }
    }
}

/// Base units a line of `quantity` packs of `quantity_per_unit` consumes.
#[inline]
pub fn base_quantity(quantity: i64, quantity_per_unit: i64) -> i64 {
    quantity.saturating_mul(quantity_per_unit.max(1))
}

/// Whole packs of `quantity_per_unit` that `on_hand` base units can fill.
#[inline]
pub fn units_available(on_hand: i64, quantity_per_unit: i64) -> i64 {
    on_hand.max(0) / quantity_per_unit.max(1)
}

/// Authoritative check for one line against the stock on hand.
pub fn check_line(
    product_code: &str,
    branch_code: &str,
    requested: i64,
    available: i64,
) -> CoreResult<()> {
    if requested > available {
        return Err(CoreError::InsufficientStock {
            product_code: product_code.to_string(),
            branch_code: branch_code.to_string(),
            available,
            requested,
        });
    }
    Ok(())
}

/// Sums quantities per product so a receipt or sale listing the same product
/// twice touches its stock row once.
pub fn merge_quantities<'a, I>(lines: I) -> Vec<(String, i64)>
where
    I: IntoIterator<Item = (&'a str, i64)>,
{
    let mut merged: Vec<(String, i64)> = Vec::new();
    for (code, qty) in lines {
        match merged.iter_mut().find(|(c, _)| c == code) {
            Some((_, total)) => *total = total.saturating_add(qty),
            None => merged.push((code.to_string(), qty)),
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_within_stock() {
        assert_eq!(clamp_quantity(2, 5), Clamp::Fits(2));
        assert_eq!(clamp_quantity(5, 5), Clamp::Fits(5));
    }

    #[test]
    fn test_clamp_down_to_stock() {
        let clamp = clamp_quantity(3, 2);
        assert_eq!(
            clamp,
            Clamp::Clamped {
                requested: 3,
                granted: 2
            }
        );
        assert_eq!(clamp.quantity(), 2);
    }

    #[test]
    fn test_clamp_never_below_one() {
        assert_eq!(clamp_quantity(4, 0).quantity(), 1);
    }

    #[test]
    fn test_check_line() {
        assert!(check_line("PARA-500", "CN01", 2, 2).is_ok());
        let err = check_line("PARA-500", "CN01", 3, 2).unwrap_err();
        assert!(matches!(
            err,
            CoreError::InsufficientStock {
                available: 2,
                requested: 3,
                ..
            }
        ));
    }

    #[test]
    fn test_packs_convert_to_base_units() {
        assert_eq!(base_quantity(2, 10), 20);
        assert_eq!(base_quantity(3, 1), 3);
        assert_eq!(base_quantity(i64::MAX, 10), i64::MAX);

        assert_eq!(units_available(25, 10), 2);
        assert_eq!(units_available(9, 10), 0);
        assert_eq!(units_available(-4, 1), 0);
    }

    #[test]
    fn test_merge_quantities_preserves_order() {
        let merged = merge_quantities([("P1", 10), ("P2", 5), ("P1", 2)]);
        assert_eq!(merged, vec![("P1".to_string(), 12), ("P2".to_string(), 5)]);
    }
}
