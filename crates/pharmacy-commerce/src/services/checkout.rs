//! # Checkout Service
//!
//! Turns the ticked cart lines into a purchase order and tells the screen
//! where to go next.
//!
//! ## Checkout Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  checkout(selection, request)                                           │
//! │         │                                                               │
//! │         ▼                                                               │
//! │  cart.checkout_snapshot(selection) ── anonymous? ──► SIGN_IN_REQUIRED   │
//! │         │                                                               │
//! │         ▼                                                               │
//! │  campaign % per line (today) + voucher lookup + shipping fee           │
//! │         │                                                               │
//! │         ▼                                                               │
//! │  orders().create_with_delivery()   ◄── ONE transaction:                │
//! │         │                              stock re-check per line,         │
//! │         │                              voucher redemption,              │
//! │         │                              order + lines + delivery,        │
//! │         │                              committed lines leave the cart   │
//! │         ▼                                                               │
//! │  CashOnDelivery ──► NextStep::Confirmation                             │
//! │  BankTransfer   ──► gateway redirect ──► NextStep::RedirectToPayment   │
//! │                          │                                              │
//! │                          └── fails ──► UPSTREAM_FAILURE naming the      │
//! │                                        order (Pending, retry payment)   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use ts_rs::TS;

use crate::error::{ApiError, ApiResult};
use crate::services::cart::persist;
use crate::services::Actor;
use crate::state::{AppState, CartState};
use pharmacy_core::cart::{price_selection, CartKey, CartLine};
use pharmacy_core::order::{OrderRequest, RejectedLine};
use pharmacy_core::pricing::PriceBreakdown;
use pharmacy_core::{
    CoreError, DeliveryRecord, OrderStatus, PurchaseOrder, ReceivingMethod, NO_VOUCHER,
};
use pharmacy_db::NewOrder;

/// Where the customer goes after a successful checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "kind")]
pub enum NextStep {
    /// Cash on delivery: show the order confirmation.
    Confirmation { order_code: String },
    /// Bank transfer: send the customer to the payment page.
    RedirectToPayment { order_code: String, url: String },
}

/// Result of a checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, TS)]
#[ts(export)]
pub struct CheckoutOutcome {
    pub order: PurchaseOrder,
    pub delivery: DeliveryRecord,
    /// Lines that became order lines and left the cart.
    pub accepted: Vec<CartKey>,
    /// Lines refused because the branch no longer holds enough; still in the cart.
    pub rejected: Vec<RejectedLine>,
    pub next_step: NextStep,
}

/// Checkout-page totals for the ticked lines: campaign discounts per line,
/// the voucher if one is entered, and the shipping fee.
///
/// Nothing is reserved or redeemed.
pub async fn checkout_preview(
    app: &AppState,
    cart_state: &CartState,
    selection: &[CartKey],
    receiving_method: ReceivingMethod,
    voucher_code: Option<&str>,
) -> ApiResult<PriceBreakdown> {
    let today = Utc::now().date_naive();
    let lines: Vec<CartLine> = cart_state
        .read(|cart| cart.select(selection).into_iter().cloned().collect())
        .await;

    let promotions = app.db().promotions().line_promotions(&lines, today).await?;

    let voucher = match voucher_code.map(str::trim).filter(|c| !c.is_empty()) {
        Some(code) => {
            let voucher = app.db().vouchers().get(code).await?.ok_or_else(|| {
                CoreError::VoucherUnavailable {
                    code: code.to_string(),
                    reason: "unknown voucher".to_string(),
                }
            })?;
            voucher.ensure_redeemable(today)?;
            Some(voucher.kind)
        }
        None => None,
    };

    let shipping_fee = receiving_method.shipping_fee(app.config().delivery_shipping_fee);
    Ok(price_selection(
        &app.config().checkout_engine(),
        &lines,
        &promotions,
        voucher,
        shipping_fee,
    ))
}

/// Places an order for the ticked lines.
///
/// Lines the branch can no longer cover are reported in `rejected` and
/// stay in the cart; the rest are committed. If none can be covered the
/// checkout fails with `INSUFFICIENT_STOCK` and nothing changes.
pub async fn checkout(
    app: &AppState,
    cart_state: &CartState,
    selection: &[CartKey],
    request: &OrderRequest,
) -> ApiResult<CheckoutOutcome> {
    let now = Utc::now();
    let today = now.date_naive();

    let mut cart = cart_state.lock().await;
    let snapshot = cart.checkout_snapshot(selection)?;
    debug!(user_id = %snapshot.user_id, lines = snapshot.lines.len(), "checkout");

    // The transaction deletes committed rows from the saved cart
    persist(app, &mut cart).await?;

    let promotions = app
        .db()
        .promotions()
        .line_promotions(&snapshot.lines, today)
        .await?;

    let voucher_code = request.stored_voucher_code();
    let voucher = if voucher_code == NO_VOUCHER {
        None
    } else {
        app.db().vouchers().get(&voucher_code).await?
    };

    let engine = app.config().checkout_engine();
    let shipping_fee = request
        .receiving_method
        .shipping_fee(app.config().delivery_shipping_fee);

    let committed = app
        .db()
        .orders()
        .create_with_delivery(NewOrder {
            snapshot: &snapshot,
            request,
            engine: &engine,
            promotions: &promotions,
            voucher: voucher.as_ref(),
            shipping_fee,
            now,
        })
        .await?;

    cart.remove_committed(&committed.accepted);
    cart.mark_saved();
    drop(cart);

    for line in &committed.rejected {
        warn!(
            order_code = %committed.order.code,
            product_code = %line.product_code,
            requested = line.requested,
            available = line.available,
            "Line left in cart: branch stock changed since it was added"
        );
    }

    let next_step = next_step_for(app, &committed.order).await?;
    info!(
        order_code = %committed.order.code,
        payment_method = %committed.order.payment_method,
        final_total = %committed.order.final_total,
        "Checkout complete"
    );

    Ok(CheckoutOutcome {
        order: committed.order,
        delivery: committed.delivery,
        accepted: committed.accepted,
        rejected: committed.rejected,
        next_step,
    })
}

/// Asks the gateway again for a payment page for a `Pending` bank-transfer order.
pub async fn retry_payment(app: &AppState, actor: &Actor, order_code: &str) -> ApiResult<NextStep> {
    let order = app
        .db()
        .orders()
        .get_by_code(order_code)
        .await?
        .ok_or_else(|| ApiError::not_found("Order", order_code))?;

    if !actor.role.is_back_office() && order.user_id != actor.user_id {
        return Err(CoreError::forbidden("pay for another customer's order", actor.role).into());
    }
    if !order.payment_method.requires_redirect() {
        return Err(ApiError::validation(format!(
            "Order {} is paid on delivery",
            order.code
        )));
    }
    if order.status != OrderStatus::Pending {
        return Err(ApiError::validation(format!(
            "Order {} is {}; payment can only start while Pending",
            order.code, order.status
        )));
    }

    next_step_for(app, &order).await
}

async fn next_step_for(app: &AppState, order: &PurchaseOrder) -> ApiResult<NextStep> {
    if !order.payment_method.requires_redirect() {
        return Ok(NextStep::Confirmation {
            order_code: order.code.clone(),
        });
    }

    match app
        .gateway()
        .create_payment_redirect(&order.code, order.final_total)
        .await
    {
        Ok(url) => Ok(NextStep::RedirectToPayment {
            order_code: order.code.clone(),
            url,
        }),
        Err(e) => {
            warn!(order_code = %order.code, error = %e, "Payment redirect failed; order stays Pending");
            Err(CoreError::upstream(
                "payment gateway",
                format!(
                    "order {} is placed and awaiting payment, retry payment from the order page ({})",
                    order.code, e
                ),
            )
            .into())
        }
    }
}
