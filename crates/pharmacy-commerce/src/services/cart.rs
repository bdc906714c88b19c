//! # Cart Service
//!
//! Cart edits for one visitor, checked against the stock of the branch
//! they shop at.
//!
//! ## Cart Operations Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Cart Operations                                      │
//! │                                                                         │
//! │  Action              Service              Cart change                   │
//! │  ──────              ───────              ───────────                   │
//! │                                                                         │
//! │  Add product ──────► add_to_cart() ─────► add or increment, clamp      │
//! │  Change quantity ──► set_quantity() ────► quantity = n, clamp          │
//! │  Remove ───────────► remove_from_cart() ► line removed                 │
//! │  Clear ────────────► clear_cart() ──────► all lines removed            │
//! │  View ─────────────► view_cart() ───────► (read only, cart-page totals)│
//! │  Sign in ──────────► sign_in() ─────────► saved cart loaded / adopted  │
//! │                                                                         │
//! │  Signed-in carts are saved after every change, under the cart lock.    │
//! │  Anonymous carts live only in memory.                                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Stock is advisory here: a quantity above what the branch holds is
//! lowered and reported with a [`StockNotice`], never refused. Branch stock
//! is in base units and shared by every line of the product, so a box line
//! leaves less room for a strip line. Checkout re-checks it for real.

use serde::Serialize;
use tracing::{debug, info, warn};
use ts_rs::TS;

use crate::error::{ApiError, ApiResult};
use crate::state::{AppState, CartState};
use pharmacy_core::cart::{price_selection, Cart, CartKey, CartOwner, LinePromotions};
use pharmacy_core::inventory::StockNotice;
use pharmacy_core::pricing::PriceBreakdown;
use pharmacy_core::{Money, Product};

/// The cart after a change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, TS)]
#[ts(export)]
pub struct CartUpdate {
    pub cart: Cart,
    /// Present when the changed line was lowered to branch stock.
    pub notice: Option<StockNotice>,
}

/// The cart page: every line plus totals for the ticked ones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, TS)]
#[ts(export)]
pub struct CartView {
    pub cart: Cart,
    pub selected: Vec<CartKey>,
    pub totals: PriceBreakdown,
}

/// Cart contents with cart-page totals for `selection`.
///
/// The cart page applies the flat storefront discount; campaign discounts
/// only show at checkout. Unknown keys in `selection` are ignored.
pub async fn view_cart(app: &AppState, cart_state: &CartState, selection: &[CartKey]) -> CartView {
    let engine = app.config().cart_page_engine();
    cart_state
        .read(|cart| {
            let selected_lines = cart.select(selection);
            let selected = selected_lines.iter().map(|l| l.key()).collect();
            let totals = price_selection(
                &engine,
                selected_lines,
                &LinePromotions::new(),
                None,
                Money::zero(),
            );
            CartView {
                cart: cart.clone(),
                selected,
                totals,
            }
        })
        .await
}

/// Adds `quantity` of a product in `unit_label`, or increments its line.
pub async fn add_to_cart(
    app: &AppState,
    cart_state: &CartState,
    product_id: &str,
    unit_label: &str,
    quantity: i64,
) -> ApiResult<CartUpdate> {
    debug!(product_id = %product_id, unit_label = %unit_label, quantity, "add_to_cart");

    let product = active_product(app, product_id).await?;
    let on_hand = app
        .db()
        .stock()
        .quantity(cart_state.branch_code(), &product.code)
        .await?;

    let mut cart = cart_state.lock().await;
    cart.add_or_increment(&product, unit_label, quantity)?;
    let notice = clamp_line(&mut cart, &CartKey::new(product.id.clone(), unit_label), on_hand);
    persist(app, &mut cart).await?;

    Ok(CartUpdate {
        cart: cart.clone(),
        notice,
    })
}

/// Sets a line's quantity. Below 1 is refused; above branch stock is clamped.
pub async fn set_quantity(
    app: &AppState,
    cart_state: &CartState,
    key: &CartKey,
    quantity: i64,
) -> ApiResult<CartUpdate> {
    debug!(product_id = %key.product_id, unit_label = %key.unit_label, quantity, "set_quantity");

    let product_code = cart_state
        .read(|cart| cart.line(key).map(|l| l.product_code.clone()))
        .await
        .ok_or_else(|| line_not_found(key))?;
    let on_hand = app
        .db()
        .stock()
        .quantity(cart_state.branch_code(), &product_code)
        .await?;

    let mut cart = cart_state.lock().await;
    cart.set_quantity(key, quantity)?;
    let notice = clamp_line(&mut cart, key, on_hand);
    persist(app, &mut cart).await?;

    Ok(CartUpdate {
        cart: cart.clone(),
        notice,
    })
}

/// Removes a line.
pub async fn remove_from_cart(
    app: &AppState,
    cart_state: &CartState,
    key: &CartKey,
) -> ApiResult<Cart> {
    debug!(product_id = %key.product_id, unit_label = %key.unit_label, "remove_from_cart");

    let mut cart = cart_state.lock().await;
    cart.remove(key)?;
    persist(app, &mut cart).await?;
    Ok(cart.clone())
}

/// Empties the cart.
pub async fn clear_cart(app: &AppState, cart_state: &CartState) -> ApiResult<Cart> {
    debug!("clear_cart");

    let mut cart = cart_state.lock().await;
    cart.clear();
    persist(app, &mut cart).await?;
    Ok(cart.clone())
}

/// Attaches the visitor's cart to `user_id`.
///
/// An anonymous cart with lines is adopted and replaces whatever the user
/// had saved; otherwise the saved cart is loaded.
pub async fn sign_in(app: &AppState, cart_state: &CartState, user_id: &str) -> ApiResult<Cart> {
    let mut cart = cart_state.lock().await;

    if cart.owner().user_id() == Some(user_id) {
        return Ok(cart.clone());
    }

    if *cart.owner() == CartOwner::Anonymous && !cart.is_empty() {
        info!(user_id = %user_id, lines = cart.line_count(), "Adopting anonymous cart");
        cart.assign_owner(user_id);
        persist(app, &mut cart).await?;
    } else {
        *cart = app.db().carts().load(user_id).await?;
        debug!(user_id = %user_id, lines = cart.line_count(), "Loaded saved cart");
    }

    Ok(cart.clone())
}

/// Drops the cart from memory; the saved copy stays in the database.
pub async fn sign_out(cart_state: &CartState) {
    *cart_state.lock().await = Cart::anonymous();
}

// =============================================================================
// Helpers
// =============================================================================

/// Saves a signed-in cart with unsaved changes.
pub(crate) async fn persist(app: &AppState, cart: &mut Cart) -> ApiResult<()> {
    if cart.needs_save() {
        app.db().carts().save(cart).await?;
        cart.mark_saved();
    }
    Ok(())
}

async fn active_product(app: &AppState, product_id: &str) -> ApiResult<Product> {
    let product = app
        .db()
        .products()
        .get_by_id(product_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Product", product_id))?;
    if !product.is_active {
        return Err(ApiError::validation("Product is not available for sale"));
    }
    Ok(product)
}

fn clamp_line(cart: &mut Cart, key: &CartKey, on_hand: i64) -> Option<StockNotice> {
    let notice = cart.clamp_to_stock(key, on_hand)?;
    warn!(
        product_code = %notice.product_code,
        unit_label = %notice.unit_label,
        requested = notice.requested,
        granted = notice.granted,
        available = notice.available,
        "Cart line clamped to branch stock"
    );
    Some(notice)
}

fn line_not_found(key: &CartKey) -> ApiError {
    ApiError::not_found("CartLine", &format!("{}/{}", key.product_id, key.unit_label))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::services::fixtures::{self, BRANCH};

    #[tokio::test]
    async fn test_quantity_above_stock_is_clamped_with_notice() {
        let app = fixtures::app().await;
        let product = fixtures::stocked(&app, "PARA-500", 100_000, 2).await;
        let cart_state = CartState::new(BRANCH);

        let update = add_to_cart(&app, &cart_state, &product.id, "Hộp", 3).await.unwrap();

        assert_eq!(update.cart.lines()[0].quantity, 2);
        let notice = update.notice.unwrap();
        assert_eq!((notice.requested, notice.granted, notice.available), (3, 2, 2));
        assert!(!notice.is_out_of_stock());
    }

    #[tokio::test]
    async fn test_repeated_add_increments_one_line() {
        let app = fixtures::app().await;
        let product = fixtures::stocked(&app, "PARA-500", 100_000, 10).await;
        let cart_state = CartState::new(BRANCH);

        add_to_cart(&app, &cart_state, &product.id, "Hộp", 1).await.unwrap();
        let update = add_to_cart(&app, &cart_state, &product.id, "Hộp", 2).await.unwrap();

        assert_eq!(update.cart.line_count(), 1);
        assert_eq!(update.cart.lines()[0].quantity, 3);
        assert!(update.notice.is_none());
    }

    #[tokio::test]
    async fn test_set_quantity_rules() {
        let app = fixtures::app().await;
        let product = fixtures::stocked(&app, "PARA-500", 100_000, 4).await;
        let cart_state = CartState::new(BRANCH);
        add_to_cart(&app, &cart_state, &product.id, "Hộp", 1).await.unwrap();
        let key = CartKey::new(product.id.clone(), "Hộp");

        let err = set_quantity(&app, &cart_state, &key, 0).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationError);

        let update = set_quantity(&app, &cart_state, &key, 9).await.unwrap();
        assert_eq!(update.cart.lines()[0].quantity, 4);
        assert!(update.notice.is_some());

        let missing = CartKey::new(product.id.clone(), "Viên");
        let err = set_quantity(&app, &cart_state, &missing, 1).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::NotFound);
    }

    #[tokio::test]
    async fn test_out_of_stock_line_keeps_one() {
        let app = fixtures::app().await;
        let product = fixtures::stocked(&app, "PARA-500", 100_000, 0).await;
        let cart_state = CartState::new(BRANCH);

        let update = add_to_cart(&app, &cart_state, &product.id, "Lốc", 2).await.unwrap();
        assert_eq!(update.cart.lines()[0].quantity, 1);
        assert!(update.notice.unwrap().is_out_of_stock());
    }

    #[tokio::test]
    async fn test_box_and_pack_lines_share_branch_stock() {
        let app = fixtures::app().await;
        let product = fixtures::stocked(&app, "PARA-500", 100_000, 12).await;
        let cart_state = CartState::new(BRANCH);

        let update = add_to_cart(&app, &cart_state, &product.id, "Lốc", 1).await.unwrap();
        assert!(update.notice.is_none());

        // The pack holds 10 of the 12 boxes
        let update = add_to_cart(&app, &cart_state, &product.id, "Hộp", 5).await.unwrap();
        let notice = update.notice.unwrap();
        assert_eq!((notice.requested, notice.granted, notice.available), (5, 2, 2));

        let key = CartKey::new(product.id.clone(), "Hộp");
        let update = set_quantity(&app, &cart_state, &key, 3).await.unwrap();
        assert_eq!(update.notice.map(|n| n.granted), Some(2));

        let drawn: i64 = update.cart.lines().iter().map(|l| l.base_quantity()).sum();
        assert_eq!(drawn, 12);

        // A pack alone cannot be covered by 5 boxes
        let small = fixtures::stocked(&app, "ORS-245", 30_000, 5).await;
        let update = add_to_cart(&app, &cart_state, &small.id, "Lốc", 1).await.unwrap();
        assert!(update.notice.unwrap().is_out_of_stock());
    }

    #[tokio::test]
    async fn test_cart_page_uses_flat_storefront_discount() {
        let app = fixtures::app().await;
        let product = fixtures::stocked(&app, "PARA-500", 100_000, 5).await;
        let other = fixtures::stocked(&app, "ORS-245", 30_000, 5).await;
        let cart_state = CartState::new(BRANCH);
        add_to_cart(&app, &cart_state, &product.id, "Hộp", 2).await.unwrap();
        add_to_cart(&app, &cart_state, &other.id, "Hộp", 1).await.unwrap();

        let key = CartKey::new(product.id.clone(), "Hộp");
        let view = view_cart(&app, &cart_state, &[key.clone()]).await;

        assert_eq!(view.cart.line_count(), 2);
        assert_eq!(view.selected, vec![key]);
        assert_eq!(view.totals.subtotal.minor(), 200_000);
        assert_eq!(view.totals.direct_discount.minor(), 40_000);
        assert_eq!(view.totals.final_total.minor(), 160_000);
        assert!(view.totals.checkout_enabled);

        let empty = view_cart(&app, &cart_state, &[]).await;
        assert_eq!(empty.totals, PriceBreakdown::default());
        assert!(!empty.totals.checkout_enabled);
    }

    #[tokio::test]
    async fn test_anonymous_cart_is_adopted_at_sign_in() {
        let app = fixtures::app().await;
        let product = fixtures::stocked(&app, "PARA-500", 100_000, 5).await;
        let cart_state = CartState::new(BRANCH);

        add_to_cart(&app, &cart_state, &product.id, "Hộp", 1).await.unwrap();
        assert!(app.db().carts().load("u1").await.unwrap().is_empty());

        let cart = sign_in(&app, &cart_state, "u1").await.unwrap();
        assert_eq!(cart.owner().user_id(), Some("u1"));

        let saved = app.db().carts().load("u1").await.unwrap();
        assert_eq!(saved.lines(), cart.lines());
    }

    #[tokio::test]
    async fn test_signed_in_changes_are_saved() {
        let app = fixtures::app().await;
        let product = fixtures::stocked(&app, "PARA-500", 100_000, 5).await;
        let cart_state = CartState::new(BRANCH);
        sign_in(&app, &cart_state, "u1").await.unwrap();

        add_to_cart(&app, &cart_state, &product.id, "Hộp", 3).await.unwrap();
        assert_eq!(app.db().carts().load("u1").await.unwrap().total_quantity(), 3);

        remove_from_cart(&app, &cart_state, &CartKey::new(product.id.clone(), "Hộp"))
            .await
            .unwrap();
        assert!(app.db().carts().load("u1").await.unwrap().is_empty());

        add_to_cart(&app, &cart_state, &product.id, "Hộp", 1).await.unwrap();
        sign_out(&cart_state).await;
        assert!(cart_state.read(|c| c.is_empty()).await);

        let restored = sign_in(&app, &cart_state, "u1").await.unwrap();
        assert_eq!(restored.line_count(), 1);

        clear_cart(&app, &cart_state).await.unwrap();
        assert!(app.db().carts().load("u1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_or_inactive_product_is_refused() {
        let app = fixtures::app().await;
        let product = fixtures::stocked(&app, "PARA-500", 100_000, 5).await;
        app.db().products().set_active(&product.id, false).await.unwrap();
        let cart_state = CartState::new(BRANCH);

        let err = add_to_cart(&app, &cart_state, &product.id, "Hộp", 1).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationError);

        let err = add_to_cart(&app, &cart_state, "id-NOPE", "Hộp", 1).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::NotFound);
    }
}
