//! # Order Service
//!
//! Reading orders and moving them through their lifecycle.
//!
//! ```text
//!   Pending ──► Confirmed ──► Delivering ──► Delivered
//!      │            │
//!      └────────────┴──► Cancelled
//! ```
//!
//! Staff and admins drive every edge. A customer may only cancel their own
//! order while it is still `Pending`. Status strings from the outside are
//! parsed against the closed set before anything is read.

use std::str::FromStr;

use chrono::Utc;
use serde::Serialize;
use tracing::{error, info};
use ts_rs::TS;

use crate::error::{ApiError, ApiResult};
use crate::services::Actor;
use crate::state::AppState;
use pharmacy_core::order::StatusUpdate;
use pharmacy_core::{CoreError, DeliveryRecord, OrderStatus, PurchaseOrder};

/// An order with its delivery record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, TS)]
#[ts(export)]
pub struct OrderDetails {
    pub order: PurchaseOrder,
    pub delivery: DeliveryRecord,
}

/// Loads an order. Customers see only their own.
pub async fn get_order(app: &AppState, actor: &Actor, order_code: &str) -> ApiResult<OrderDetails> {
    let order = app
        .db()
        .orders()
        .get_by_code(order_code)
        .await?
        .ok_or_else(|| ApiError::not_found("Order", order_code))?;

    if !actor.role.is_back_office() && order.user_id != actor.user_id {
        return Err(CoreError::forbidden("view another customer's order", actor.role).into());
    }

    // Written in the same transaction as the order
    let delivery = app
        .db()
        .orders()
        .get_delivery(&order.code)
        .await?
        .ok_or_else(|| {
            error!(order_code = %order.code, "Order has no delivery record");
            ApiError::internal(format!("Order {} has no delivery record", order.code))
        })?;

    Ok(OrderDetails { order, delivery })
}

/// The actor's own orders, newest first.
pub async fn list_my_orders(app: &AppState, actor: &Actor) -> ApiResult<Vec<PurchaseOrder>> {
    Ok(app.db().orders().list_by_user(&actor.user_id).await?)
}

/// Moves an order to `target`, given as its wire name (`"Confirmed"`, ...).
///
/// Re-submitting the current status succeeds with `changed: false`.
pub async fn update_status(
    app: &AppState,
    actor: &Actor,
    order_code: &str,
    target: &str,
) -> ApiResult<StatusUpdate> {
    let target = OrderStatus::from_str(target.trim()).map_err(CoreError::from)?;
    let update = app
        .db()
        .orders()
        .update_status(order_code, target, actor.role, Utc::now())
        .await?;

    if update.changed {
        info!(
            order_code = %update.order_code,
            from = %update.from,
            to = %update.to,
            by = %actor.user_id,
            "Order status changed"
        );
    }
    Ok(update)
}

/// Cancels an order.
///
/// No stock is returned: checkout never takes any.
pub async fn cancel_order(app: &AppState, actor: &Actor, order_code: &str) -> ApiResult<StatusUpdate> {
    let update = app
        .db()
        .orders()
        .cancel(order_code, actor.role, &actor.user_id, Utc::now())
        .await?;

    if update.changed {
        info!(order_code = %update.order_code, from = %update.from, by = %actor.user_id, "Order cancelled");
    }
    Ok(update)
}
