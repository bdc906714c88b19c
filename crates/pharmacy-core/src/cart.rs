//! # Cart Aggregate
//!
//! The customer's cart: at most one line per (product, unit) pair, each line
//! carrying the unit price captured when it was first added.
//!
//! ## Operations
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Customer Action          Cart Operation             Effect             │
//! │  ───────────────          ──────────────             ──────             │
//! │                                                                         │
//! │  Add to cart ───────────► add_or_increment() ──────► push or qty += n  │
//! │  Change quantity ───────► set_quantity() ──────────► qty = n (n ≥ 1)   │
//! │  Click remove ──────────► remove() ────────────────► line dropped      │
//! │  Empty cart ────────────► clear() ─────────────────► no lines          │
//! │  Tick checkboxes ───────► select() ────────────────► (read only view)  │
//! │  Checkout ──────────────► checkout_snapshot() ─────► frozen lines      │
//! │                                                                         │
//! │  Every mutation marks the cart dirty; the owner of the cart decides    │
//! │  when to save it. Anonymous carts are never saved.                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use ts_rs::TS;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::inventory::{base_quantity, clamp_quantity, units_available, Clamp, StockNotice};
use crate::money::{Money, Percent};
use crate::pricing::{PriceBreakdown, PricedLine, PricingEngine};
use crate::types::Product;
use crate::validation::validate_quantity;
use crate::voucher::VoucherKind;
use crate::{MAX_CART_LINES, MAX_LINE_QUANTITY};

// =============================================================================
// Keys and Lines
// =============================================================================

/// Identity of a cart line.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CartKey {
    pub product_id: String,
    pub unit_label: String,
}

impl CartKey {
    pub fn new(product_id: impl Into<String>, unit_label: impl Into<String>) -> Self {
        CartKey {
            product_id: product_id.into(),
            unit_label: unit_label.into(),
        }
    }
}

/// A line in the cart.
///
/// Name, code, price and pack size are frozen at the moment the line was
/// created; a later catalog change does not move what the customer was shown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CartLine {
    pub product_id: String,
    pub product_code: String,
    pub product_name: String,
    pub unit_label: String,
    /// Base units in one `unit_label`.
    pub quantity_per_unit: i64,
    pub quantity: i64,
    pub unit_price: Money,
}

impl CartLine {
    pub fn key(&self) -> CartKey {
        CartKey::new(self.product_id.clone(), self.unit_label.clone())
    }

    fn matches(&self, key: &CartKey) -> bool {
        self.product_id == key.product_id && self.unit_label == key.unit_label
    }

    /// Stock this line draws, in base units.
    #[inline]
    pub fn base_quantity(&self) -> i64 {
        base_quantity(self.quantity, self.quantity_per_unit)
    }

    #[inline]
    pub fn line_total(&self) -> Money {
        self.unit_price.multiply_quantity(self.quantity)
    }

    /// Converts to the pricing engine's view, with the product's effective
    /// campaign percentage if one applies today.
    pub fn priced(&self, promotion: Option<Percent>) -> PricedLine {
        let line = PricedLine::new(self.unit_price, self.quantity);
        match promotion {
            Some(pct) => line.with_promotion(pct),
            None => line,
        }
    }
}

// =============================================================================
// Owner
// =============================================================================

/// Who the cart belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "kind", content = "user_id")]
pub enum CartOwner {
    /// Browsing without an account. Cart lives only in memory.
    Anonymous,
    /// Signed-in customer.
    User(String),
}

impl CartOwner {
    pub fn user_id(&self) -> Option<&str> {
        match self {
            CartOwner::Anonymous => None,
            CartOwner::User(id) => Some(id),
        }
    }
}

// =============================================================================
// Cart
// =============================================================================

/// The cart aggregate.
///
/// ## Invariants
/// - Lines are unique by (product id, unit label)
/// - Every quantity is in `1..=MAX_LINE_QUANTITY`
/// - At most `MAX_CART_LINES` lines
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Cart {
    owner: CartOwner,
    lines: Vec<CartLine>,
    #[serde(skip)]
    dirty: bool,
}

impl Default for Cart {
    fn default() -> Self {
        Cart::anonymous()
    }
}

impl Cart {
    /// An empty cart for a visitor who has not signed in.
    pub fn anonymous() -> Self {
        Cart {
            owner: CartOwner::Anonymous,
            lines: Vec::new(),
            dirty: false,
        }
    }

    /// Rebuilds a signed-in customer's cart from stored lines.
    pub fn for_user(user_id: impl Into<String>, lines: Vec<CartLine>) -> Self {
        Cart {
            owner: CartOwner::User(user_id.into()),
            lines,
            dirty: false,
        }
    }

    pub fn owner(&self) -> &CartOwner {
        &self.owner
    }

    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    pub fn line(&self, key: &CartKey) -> Option<&CartLine> {
        self.lines.iter().find(|l| l.matches(key))
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    pub fn total_quantity(&self) -> i64 {
        self.lines.iter().map(|l| l.quantity).sum()
    }

    /// True when there are unsaved changes for a signed-in owner.
    pub fn needs_save(&self) -> bool {
        self.dirty && self.owner.user_id().is_some()
    }

    pub fn mark_saved(&mut self) {
        self.dirty = false;
    }

    /// Hands an anonymous cart over to a customer who just signed in.
    pub fn assign_owner(&mut self, user_id: impl Into<String>) {
        self.owner = CartOwner::User(user_id.into());
        self.dirty = true;
    }

    // -------------------------------------------------------------------------
    // Mutations
    // -------------------------------------------------------------------------

    /// Adds `quantity` of `product` in `unit_label`, or increments the
    /// existing line for that pair.
    pub fn add_or_increment(
        &mut self,
        product: &Product,
        unit_label: &str,
        quantity: i64,
    ) -> CoreResult<()> {
        validate_quantity(quantity)?;

        let unit = product.unit(unit_label).ok_or_else(|| ValidationError::NotAllowed {
            field: "unit_label".to_string(),
            allowed: product.units.iter().map(|u| u.unit_label.clone()).collect(),
        })?;

        let key = CartKey::new(product.id.clone(), unit_label);
        if let Some(line) = self.lines.iter_mut().find(|l| l.matches(&key)) {
            let new_qty = line.quantity + quantity;
            if new_qty > MAX_LINE_QUANTITY {
                return Err(CoreError::QuantityTooLarge {
                    requested: new_qty,
                    max: MAX_LINE_QUANTITY,
                });
            }
            line.quantity = new_qty;
            self.dirty = true;
            return Ok(());
        }

        if self.lines.len() >= MAX_CART_LINES {
            return Err(CoreError::CartTooLarge {
                max: MAX_CART_LINES,
            });
        }

        self.lines.push(CartLine {
            product_id: product.id.clone(),
            product_code: product.code.clone(),
            product_name: product.name.clone(),
            unit_label: unit.unit_label.clone(),
            quantity_per_unit: unit.quantity_per_unit,
            quantity,
            unit_price: unit.price,
        });
        self.dirty = true;
        Ok(())
    }

    /// Sets a line's quantity. Below 1 is refused; use [`Cart::remove`].
    pub fn set_quantity(&mut self, key: &CartKey, quantity: i64) -> CoreResult<()> {
        if quantity < 1 {
            return Err(ValidationError::MustBePositive {
                field: "quantity".to_string(),
            }
            .into());
        }
        if quantity > MAX_LINE_QUANTITY {
            return Err(CoreError::QuantityTooLarge {
                requested: quantity,
                max: MAX_LINE_QUANTITY,
            });
        }

        let line = self
            .lines
            .iter_mut()
            .find(|l| l.matches(key))
            .ok_or_else(|| not_in_cart(key))?;
        line.quantity = quantity;
        self.dirty = true;
        Ok(())
    }

    /// Removes a line.
    pub fn remove(&mut self, key: &CartKey) -> CoreResult<CartLine> {
        let idx = self
            .lines
            .iter()
            .position(|l| l.matches(key))
            .ok_or_else(|| not_in_cart(key))?;
        self.dirty = true;
        Ok(self.lines.remove(idx))
    }

    /// Empties the cart.
    pub fn clear(&mut self) {
        if !self.lines.is_empty() {
            self.lines.clear();
            self.dirty = true;
        }
    }

    /// Lowers a line to the stock the branch holds.
    ///
    /// `on_hand` is in base units. Other lines of the same product are
    /// counted first, so the notice's `available` is what is left for this
    /// line, in this line's unit.
    ///
    /// Returns a notice when the line was clamped, `None` when it already fit
    /// or is not in the cart.
    pub fn clamp_to_stock(&mut self, key: &CartKey, on_hand: i64) -> Option<StockNotice> {
        let held_elsewhere: i64 = self
            .lines
            .iter()
            .filter(|l| l.product_id == key.product_id && !l.matches(key))
            .map(CartLine::base_quantity)
            .fold(0, i64::saturating_add);

        let line = self.lines.iter_mut().find(|l| l.matches(key))?;
        let available = units_available(on_hand.saturating_sub(held_elsewhere), line.quantity_per_unit);
        match clamp_quantity(line.quantity, available) {
            Clamp::Fits(_) => None,
            Clamp::Clamped { requested, granted } => {
                if line.quantity != granted {
                    line.quantity = granted;
                    self.dirty = true;
                }
                Some(StockNotice {
                    product_code: line.product_code.clone(),
                    unit_label: line.unit_label.clone(),
                    requested,
                    granted,
                    available,
                })
            }
        }
    }

    /// Drops lines that were committed into an order.
    pub fn remove_committed(&mut self, keys: &[CartKey]) {
        let before = self.lines.len();
        self.lines.retain(|l| !keys.iter().any(|k| l.matches(k)));
        if self.lines.len() != before {
            self.dirty = true;
        }
    }

    // -------------------------------------------------------------------------
    // Selection and checkout
    // -------------------------------------------------------------------------

    /// The lines ticked for the next checkout, in cart order.
    ///
    /// Pure view: quantities are not touched and unknown keys are ignored.
    pub fn select(&self, keys: &[CartKey]) -> Vec<&CartLine> {
        self.lines
            .iter()
            .filter(|l| keys.iter().any(|k| l.matches(k)))
            .collect()
    }

    /// Freezes the selected lines for order creation.
    pub fn checkout_snapshot(&self, keys: &[CartKey]) -> CoreResult<CheckoutSnapshot> {
        let user_id = self
            .owner
            .user_id()
            .ok_or(CoreError::CheckoutUnavailable)?
            .to_string();

        let lines: Vec<CartLine> = self.select(keys).into_iter().cloned().collect();
        if lines.is_empty() {
            return Err(ValidationError::required("selection").into());
        }

        Ok(CheckoutSnapshot { user_id, lines })
    }
}

/// Effective campaign percentage per cart line, as looked up for today.
pub type LinePromotions = HashMap<CartKey, Percent>;

/// Prices a set of cart lines with the given engine.
///
/// Lines missing from `promotions` carry no campaign discount.
pub fn price_selection<'a, I>(
    engine: &PricingEngine,
    lines: I,
    promotions: &LinePromotions,
    voucher: Option<VoucherKind>,
    shipping_fee: Money,
) -> PriceBreakdown
where
    I: IntoIterator<Item = &'a CartLine>,
{
    let priced: Vec<PricedLine> = lines
        .into_iter()
        .map(|line| line.priced(promotions.get(&line.key()).copied()))
        .collect();
    engine.price(&priced, voucher, shipping_fee)
}

fn not_in_cart(key: &CartKey) -> CoreError {
    CoreError::not_found("CartLine", format!("{}/{}", key.product_id, key.unit_label))
}

/// Selected lines frozen at checkout time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CheckoutSnapshot {
    pub user_id: String,
    pub lines: Vec<CartLine>,
}

impl CheckoutSnapshot {
    pub fn keys(&self) -> Vec<CartKey> {
        self.lines.iter().map(CartLine::key).collect()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::UnitDefinition;

    fn product(id: &str, price: i64) -> Product {
        Product {
            id: id.to_string(),
            code: format!("{}-CODE", id),
            name: format!("Product {}", id),
            units: vec![
                UnitDefinition {
                    unit_label: "Hộp".to_string(),
                    quantity_per_unit: 10,
                    price: Money::from_minor(price),
                },
                UnitDefinition {
                    unit_label: "Vỉ".to_string(),
                    quantity_per_unit: 1,
                    price: Money::from_minor(price / 10),
                },
            ],
            campaign_code: None,
            is_active: true,
        }
    }

    #[test]
    fn test_add_same_pair_twice_aggregates() {
        let p = product("p1", 100_000);
        let mut once = Cart::anonymous();
        once.add_or_increment(&p, "Hộp", 5).unwrap();

        let mut twice = Cart::anonymous();
        twice.add_or_increment(&p, "Hộp", 2).unwrap();
        twice.add_or_increment(&p, "Hộp", 3).unwrap();

        assert_eq!(once.lines(), twice.lines());
        assert_eq!(twice.line_count(), 1);
    }

    #[test]
    fn test_different_units_are_separate_lines() {
        let p = product("p1", 100_000);
        let mut cart = Cart::anonymous();
        cart.add_or_increment(&p, "Hộp", 1).unwrap();
        cart.add_or_increment(&p, "Vỉ", 2).unwrap();

        assert_eq!(cart.line_count(), 2);
        let strip = cart.line(&CartKey::new("p1", "Vỉ")).unwrap();
        assert_eq!(strip.unit_price.minor(), 10_000);
    }

    #[test]
    fn test_unknown_unit_rejected() {
        let p = product("p1", 100_000);
        let mut cart = Cart::anonymous();
        let err = cart.add_or_increment(&p, "Chai", 1).unwrap_err();
        assert!(matches!(err, CoreError::Validation(ValidationError::NotAllowed { .. })));
    }

    #[test]
    fn test_set_quantity_below_one_rejected() {
        let p = product("p1", 100_000);
        let mut cart = Cart::anonymous();
        cart.add_or_increment(&p, "Hộp", 2).unwrap();
        let key = CartKey::new("p1", "Hộp");

        assert!(cart.set_quantity(&key, 0).is_err());
        assert_eq!(cart.line(&key).unwrap().quantity, 2);

        cart.set_quantity(&key, 7).unwrap();
        assert_eq!(cart.line(&key).unwrap().quantity, 7);
    }

    #[test]
    fn test_quantity_limit() {
        let p = product("p1", 100_000);
        let mut cart = Cart::anonymous();
        cart.add_or_increment(&p, "Hộp", MAX_LINE_QUANTITY).unwrap();
        let err = cart.add_or_increment(&p, "Hộp", 1).unwrap_err();
        assert!(matches!(err, CoreError::QuantityTooLarge { .. }));
    }

    #[test]
    fn test_remove_and_clear() {
        let mut cart = Cart::anonymous();
        cart.add_or_increment(&product("p1", 1_000), "Hộp", 1).unwrap();
        cart.add_or_increment(&product("p2", 2_000), "Hộp", 1).unwrap();

        let removed = cart.remove(&CartKey::new("p1", "Hộp")).unwrap();
        assert_eq!(removed.product_id, "p1");
        assert!(cart.remove(&CartKey::new("p1", "Hộp")).is_err());

        cart.clear();
        assert!(cart.is_empty());
    }

    #[test]
    fn test_select_is_a_view() {
        let mut cart = Cart::anonymous();
        cart.add_or_increment(&product("p1", 1_000), "Hộp", 3).unwrap();
        cart.add_or_increment(&product("p2", 2_000), "Hộp", 1).unwrap();

        let picked = cart.select(&[CartKey::new("p2", "Hộp"), CartKey::new("zzz", "Hộp")]);
        assert_eq!(picked.len(), 1);
        assert_eq!(picked[0].product_id, "p2");
        assert_eq!(cart.line_count(), 2);
        assert_eq!(cart.total_quantity(), 4);
    }

    #[test]
    fn test_clamp_to_stock_emits_notice() {
        let mut cart = Cart::anonymous();
        cart.add_or_increment(&product("p1", 100_000), "Hộp", 3).unwrap();
        let key = CartKey::new("p1", "Hộp");

        // 25 strips fill two boxes of ten
        let notice = cart.clamp_to_stock(&key, 25).unwrap();
        assert_eq!(notice.requested, 3);
        assert_eq!(notice.granted, 2);
        assert_eq!(notice.available, 2);
        assert_eq!(cart.line(&key).unwrap().quantity, 2);
        assert_eq!(cart.line(&key).unwrap().base_quantity(), 20);

        assert!(cart.clamp_to_stock(&key, 100).is_none());
    }

    #[test]
    fn test_clamp_counts_other_units_of_same_product() {
        let p = product("p1", 100_000);
        let mut cart = Cart::anonymous();
        cart.add_or_increment(&p, "Hộp", 1).unwrap();
        cart.add_or_increment(&p, "Vỉ", 5).unwrap();
        cart.add_or_increment(&product("p2", 1_000), "Vỉ", 50).unwrap();
        let box_key = CartKey::new("p1", "Hộp");
        let strip_key = CartKey::new("p1", "Vỉ");

        // 12 strips on hand: the box holds 10, two strips remain
        let notice = cart.clamp_to_stock(&strip_key, 12).unwrap();
        assert_eq!(notice.requested, 5);
        assert_eq!(notice.available, 2);
        assert_eq!(cart.line(&strip_key).unwrap().quantity, 2);
        assert!(cart.clamp_to_stock(&box_key, 12).is_none());

        let total: i64 = cart
            .lines()
            .iter()
            .filter(|l| l.product_id == "p1")
            .map(CartLine::base_quantity)
            .sum();
        assert_eq!(total, 12);
    }

    #[test]
    fn test_line_keeps_pack_size_it_was_added_with() {
        let mut p = product("p1", 100_000);
        let mut cart = Cart::anonymous();
        cart.add_or_increment(&p, "Hộp", 2).unwrap();

        p.units[0].quantity_per_unit = 20;
        cart.add_or_increment(&p, "Hộp", 1).unwrap();
        let line = cart.line(&CartKey::new("p1", "Hộp")).unwrap();
        assert_eq!(line.quantity_per_unit, 10);
        assert_eq!(line.base_quantity(), 30);
    }

    #[test]
    fn test_anonymous_cannot_check_out() {
        let mut cart = Cart::anonymous();
        cart.add_or_increment(&product("p1", 1_000), "Hộp", 1).unwrap();
        let keys = [CartKey::new("p1", "Hộp")];

        assert_eq!(
            cart.checkout_snapshot(&keys).unwrap_err(),
            CoreError::CheckoutUnavailable
        );
        assert!(!cart.needs_save());

        cart.assign_owner("user-1");
        let snapshot = cart.checkout_snapshot(&keys).unwrap();
        assert_eq!(snapshot.user_id, "user-1");
        assert_eq!(snapshot.lines.len(), 1);
        assert!(cart.needs_save());
    }

    #[test]
    fn test_empty_selection_cannot_check_out() {
        let cart = Cart::for_user("user-1", Vec::new());
        let err = cart.checkout_snapshot(&[]).unwrap_err();
        assert!(matches!(err, CoreError::Validation(ValidationError::Required { .. })));
    }

    #[test]
    fn test_price_selection_uses_line_promotions() {
        use crate::pricing::DirectDiscount;

        let mut cart = Cart::for_user("user-1", Vec::new());
        cart.add_or_increment(&product("p1", 100_000), "Hộp", 2).unwrap();
        cart.add_or_increment(&product("p2", 50_000), "Hộp", 1).unwrap();

        let mut promotions = LinePromotions::new();
        promotions.insert(CartKey::new("p1", "Hộp"), Percent::new(20).unwrap());

        let engine = PricingEngine::new(DirectDiscount::LinePromotion);
        let selected = cart.select(&[CartKey::new("p1", "Hộp")]);
        let totals = price_selection(&engine, selected, &promotions, None, Money::zero());

        assert_eq!(totals.subtotal.minor(), 200_000);
        assert_eq!(totals.direct_discount.minor(), 40_000);
        assert_eq!(totals.final_total.minor(), 160_000);
    }

    #[test]
    fn test_remove_committed_keeps_rest() {
        let mut cart = Cart::for_user("user-1", Vec::new());
        cart.add_or_increment(&product("p1", 1_000), "Hộp", 1).unwrap();
        cart.add_or_increment(&product("p2", 2_000), "Hộp", 1).unwrap();
        cart.mark_saved();

        cart.remove_committed(&[CartKey::new("p1", "Hộp")]);
        assert_eq!(cart.line_count(), 1);
        assert!(cart.needs_save());
    }
}
