//! # Pricing Engine
//!
//! Pure computation of what a selection of cart lines costs.
//!
//! ## Pipeline
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  selected lines ──► subtotal = Σ unit price × quantity                 │
//! │                        │                                                │
//! │                        ├──► direct discount   (one named strategy)     │
//! │                        │      • FlatStorefront(20%) on the cart page   │
//! │                        │      • LinePromotion: Σ line × campaign %     │
//! │                        │                                                │
//! │                        ├──► voucher discount  min(subtotal, …)         │
//! │                        │                                                │
//! │                        └──► + shipping fee    (supplied by caller)     │
//! │                                                                         │
//! │  final total = subtotal − direct − voucher + shipping, floored at 0    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The storefront discount and campaign promotions are two different
//! sources and never combine; the caller picks which one a page uses.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::{Money, Percent};
use crate::voucher::VoucherKind;

// =============================================================================
// Priced Line
// =============================================================================

/// A line as the engine sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PricedLine {
    pub unit_price: Money,
    pub quantity: i64,
    /// Effective campaign percentage on this product, if any.
    pub promotion: Option<Percent>,
}

impl PricedLine {
    pub fn new(unit_price: Money, quantity: i64) -> Self {
        PricedLine {
            unit_price,
            quantity,
            promotion: None,
        }
    }

    /// Attaches the effective campaign percentage.
    pub fn with_promotion(mut self, pct: Percent) -> Self {
        self.promotion = Some(pct);
        self
    }

    #[inline]
    pub fn line_total(&self) -> Money {
        self.unit_price.multiply_quantity(self.quantity)
    }
}

// =============================================================================
// Discount Strategy
// =============================================================================

/// Where the direct discount comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "strategy", content = "percent")]
pub enum DirectDiscount {
    /// No direct discount.
    None,
    /// A flat percentage off the whole selection (cart page).
    FlatStorefront(Percent),
    /// Each line's own campaign percentage (checkout page).
    LinePromotion,
}

// =============================================================================
// Breakdown
// =============================================================================

/// Every amount shown on the cart or checkout page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PriceBreakdown {
    pub subtotal: Money,
    pub direct_discount: Money,
    pub voucher_discount: Money,
    pub shipping_fee: Money,
    pub final_total: Money,
    /// False for an empty selection; the checkout button is disabled.
    pub checkout_enabled: bool,
}

// =============================================================================
// Engine
// =============================================================================

/// Computes a [`PriceBreakdown`] for a selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PricingEngine {
    direct: DirectDiscount,
}

impl PricingEngine {
    pub fn new(direct: DirectDiscount) -> Self {
        PricingEngine { direct }
    }

    pub fn strategy(&self) -> DirectDiscount {
        self.direct
    }

    /// Prices the selected lines.
    ///
    /// An empty selection yields all zeros, shipping included.
    pub fn price(
        &self,
        lines: &[PricedLine],
        voucher: Option<VoucherKind>,
        shipping_fee: Money,
    ) -> PriceBreakdown {
        if lines.is_empty() {
            return PriceBreakdown::default();
        }

        let subtotal: Money = lines.iter().map(PricedLine::line_total).sum();
        let direct_discount = self.direct_discount(lines, subtotal);
        let voucher_discount = voucher
            .map(|v| v.discount_for(subtotal))
            .unwrap_or_default();

        let final_total =
            (subtotal - direct_discount - voucher_discount + shipping_fee).floor_at_zero();

        PriceBreakdown {
            subtotal,
            direct_discount,
            voucher_discount,
            shipping_fee,
            final_total,
            checkout_enabled: true,
        }
    }

    fn direct_discount(&self, lines: &[PricedLine], subtotal: Money) -> Money {
        match self.direct {
            DirectDiscount::None => Money::zero(),
            DirectDiscount::FlatStorefront(pct) => subtotal.percentage(pct),
            DirectDiscount::LinePromotion => lines
                .iter()
                .filter_map(|line| line.promotion.map(|pct| line.line_total().percentage(pct)))
                .sum(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pct(v: u8) -> Percent {
        Percent::new(v).unwrap()
    }

    fn line(price: i64, qty: i64) -> PricedLine {
        PricedLine::new(Money::from_minor(price), qty)
    }

    #[test]
    fn test_empty_selection_is_all_zero() {
        let engine = PricingEngine::new(DirectDiscount::LinePromotion);
        let totals = engine.price(&[], None, Money::from_minor(30_000));
        assert_eq!(totals, PriceBreakdown::default());
        assert!(!totals.checkout_enabled);
    }

    #[test]
    fn test_plain_line_no_discounts() {
        let engine = PricingEngine::new(DirectDiscount::LinePromotion);
        let totals = engine.price(&[line(100_000, 2)], None, Money::zero());
        assert_eq!(totals.subtotal.minor(), 200_000);
        assert_eq!(totals.direct_discount, Money::zero());
        assert_eq!(totals.final_total.minor(), 200_000);
        assert!(totals.checkout_enabled);
    }

    #[test]
    fn test_line_promotion_and_fixed_voucher() {
        let engine = PricingEngine::new(DirectDiscount::LinePromotion);
        let lines = [line(100_000, 2).with_promotion(pct(20))];
        let voucher = VoucherKind::Fixed(Money::from_minor(50_000));

        let totals = engine.price(&lines, Some(voucher), Money::zero());
        assert_eq!(totals.direct_discount.minor(), 40_000);
        assert_eq!(totals.voucher_discount.minor(), 50_000);
        assert_eq!(totals.final_total.minor(), 110_000);
    }

    #[test]
    fn test_promotion_applies_per_line() {
        let engine = PricingEngine::new(DirectDiscount::LinePromotion);
        let lines = [
            line(100_000, 1).with_promotion(pct(10)),
            line(50_000, 2),
            line(12_345, 1).with_promotion(pct(50)),
        ];
        let totals = engine.price(&lines, None, Money::zero());
        // 10,000 + 0 + 6,172.5 → 6,173
        assert_eq!(totals.direct_discount.minor(), 16_173);
    }

    #[test]
    fn test_flat_storefront_ignores_line_promotions() {
        let engine = PricingEngine::new(DirectDiscount::FlatStorefront(pct(20)));
        let lines = [line(100_000, 1).with_promotion(pct(50)), line(50_000, 2)];
        let totals = engine.price(&lines, None, Money::zero());
        assert_eq!(totals.subtotal.minor(), 200_000);
        assert_eq!(totals.direct_discount.minor(), 40_000);
    }

    #[test]
    fn test_shipping_added_and_identity_holds() {
        let engine = PricingEngine::new(DirectDiscount::LinePromotion);
        let lines = [line(75_000, 3).with_promotion(pct(5))];
        let voucher = VoucherKind::Percentage(pct(10));
        let t = engine.price(&lines, Some(voucher), Money::from_minor(30_000));

        assert_eq!(
            t.final_total,
            t.subtotal - t.direct_discount - t.voucher_discount + t.shipping_fee
        );
        assert_eq!(t.voucher_discount.minor(), 22_500);
    }

    #[test]
    fn test_final_total_floors_at_zero() {
        let engine = PricingEngine::new(DirectDiscount::LinePromotion);
        let lines = [line(40_000, 1).with_promotion(pct(100))];
        let voucher = VoucherKind::Fixed(Money::from_minor(10_000));
        let totals = engine.price(&lines, Some(voucher), Money::zero());
        assert_eq!(totals.final_total, Money::zero());
    }
}
