//! # Purchase Orders
//!
//! Order and delivery record shapes, plus the order status lifecycle.
//!
//! ## Status Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   Pending ──────► Confirmed ──────► Delivering ──────► Delivered        │
//! │      │               │                                  (terminal)      │
//! │      │               │                                                  │
//! │      └───────┬───────┘                                                  │
//! │              ▼                                                          │
//! │          Cancelled (terminal)                                           │
//! │                                                                         │
//! │  • Only staff and admins change status                                  │
//! │  • Re-submitting the current status is a no-op                          │
//! │  • Skipping ahead (Pending → Delivered) is refused                      │
//! │  • Cancelling never restocks                                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Wire Names
//! Other systems read orders by these field names, so they are fixed:
//! `madonhang`, `trangthai`, `thanhtien`, `phuongthucthanhtoan`,
//! `hinhthucnhanhang`, `machinhanh`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;

use crate::cart::{CartKey, CartLine};
use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::pricing::PriceBreakdown;
use crate::types::{ActorRole, PaymentMethod, ReceivingMethod};
use crate::validation::{validate_code, validate_name, validate_phone, ValidationResult};
use crate::NO_VOUCHER;

// =============================================================================
// Order Status
// =============================================================================

/// The five order states. The same strings are used on the wire, in the
/// database and on status-change requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Delivering,
    Delivered,
    Cancelled,
}

impl Default for OrderStatus {
    fn default() -> Self {
        OrderStatus::Pending
    }
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 5] = [
        OrderStatus::Pending,
        OrderStatus::Confirmed,
        OrderStatus::Delivering,
        OrderStatus::Delivered,
        OrderStatus::Cancelled,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "Pending",
            OrderStatus::Confirmed => "Confirmed",
            OrderStatus::Delivering => "Delivering",
            OrderStatus::Delivered => "Delivered",
            OrderStatus::Cancelled => "Cancelled",
        }
    }

    /// No edge leaves a terminal state.
    pub const fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }

    /// Whether `self → to` is an edge of the lifecycle.
    pub const fn can_transition_to(&self, to: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (*self, to),
            (Pending, Confirmed)
                | (Confirmed, Delivering)
                | (Delivering, Delivered)
                | (Pending, Cancelled)
                | (Confirmed, Cancelled)
        )
    }

    /// Whether an order in this state may still be cancelled.
    pub const fn is_cancellable(&self) -> bool {
        self.can_transition_to(OrderStatus::Cancelled)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = ValidationError;

    /// Parses against the closed set; arbitrary strings are refused.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OrderStatus::ALL
            .into_iter()
            .find(|st| st.as_str() == s)
            .ok_or_else(|| ValidationError::NotAllowed {
                field: "status".to_string(),
                allowed: OrderStatus::ALL.iter().map(|st| st.as_str().to_string()).collect(),
            })
    }
}

// =============================================================================
// Transitions
// =============================================================================

/// What a status-change request amounts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusChange {
    /// Move from `from` to `to`.
    Apply { from: OrderStatus, to: OrderStatus },
    /// Order is already in the requested state.
    Unchanged(OrderStatus),
}

/// Outcome of an applied or no-op status change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct StatusUpdate {
    pub order_code: String,
    pub from: OrderStatus,
    pub to: OrderStatus,
    /// False when the order already had the requested status.
    pub changed: bool,
}

/// Only back-office roles may move an order through its lifecycle.
pub fn authorize_status_change(role: ActorRole) -> CoreResult<()> {
    if role.is_back_office() {
        Ok(())
    } else {
        Err(CoreError::forbidden("change order status", role))
    }
}

/// A customer may withdraw their own order only until staff confirm it.
///
/// Back-office cancellation goes through [`authorize_status_change`].
pub fn authorize_customer_cancel(current: OrderStatus) -> CoreResult<()> {
    match current {
        OrderStatus::Pending | OrderStatus::Cancelled => Ok(()),
        _ => Err(CoreError::forbidden(
            format!("cancel a {current} order"),
            ActorRole::Customer,
        )),
    }
}

/// Decides what a request to move order `code` from `current` to `target` does.
pub fn plan_status_change(
    code: &str,
    current: OrderStatus,
    target: OrderStatus,
) -> CoreResult<StatusChange> {
    if current == target {
        return Ok(StatusChange::Unchanged(current));
    }
    if !current.can_transition_to(target) {
        return Err(CoreError::InvalidTransition {
            entity: "Order".to_string(),
            code: code.to_string(),
            from: current.to_string(),
            to: target.to_string(),
        });
    }
    Ok(StatusChange::Apply {
        from: current,
        to: target,
    })
}

// =============================================================================
// Order Lines
// =============================================================================

/// One product on an order, priced at the cart's snapshot price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct OrderLine {
    pub product_code: String,
    pub quantity: i64,
    pub unit_price: Money,
    pub unit_label: String,
}

impl OrderLine {
    #[inline]
    pub fn line_total(&self) -> Money {
        self.unit_price.multiply_quantity(self.quantity)
    }
}

/// A selected cart line refused at commit because the branch no longer
/// holds enough stock. It stays in the cart.
///
/// `requested` and `available` are counted in the line's own unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct RejectedLine {
    pub key: CartKey,
    pub product_code: String,
    pub requested: i64,
    pub available: i64,
}

impl From<&CartLine> for OrderLine {
    fn from(line: &CartLine) -> Self {
        OrderLine {
            product_code: line.product_code.clone(),
            quantity: line.quantity,
            unit_price: line.unit_price,
            unit_label: line.unit_label.clone(),
        }
    }
}

// =============================================================================
// Delivery
// =============================================================================

/// Requested delivery window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct DeliveryWindow {
    #[ts(as = "String")]
    pub from: DateTime<Utc>,
    #[ts(as = "String")]
    pub to: DateTime<Utc>,
}

/// Recipient details entered at checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct DeliveryDetails {
    pub recipient_name: String,
    pub recipient_phone: String,
    /// Street address; ignored for branch pickup.
    pub recipient_address: String,
    pub window: Option<DeliveryWindow>,
}

impl DeliveryDetails {
    /// Name and phone are always required; the address only for delivery.
    pub fn validate(&self, receiving: ReceivingMethod) -> ValidationResult<()> {
        validate_name("recipient_name", &self.recipient_name)?;
        validate_phone(&self.recipient_phone)?;
        if receiving == ReceivingMethod::Delivery && self.recipient_address.trim().is_empty() {
            return Err(ValidationError::required("recipient_address"));
        }
        if let Some(window) = &self.window {
            if window.to <= window.from {
                return Err(ValidationError::InvalidDateRange {
                    field: "delivery_window".to_string(),
                });
            }
        }
        Ok(())
    }
}

/// The delivery or pickup record attached one-to-one to an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct DeliveryRecord {
    pub order_code: String,
    pub recipient_name: String,
    pub recipient_phone: String,
    /// Empty for branch pickup.
    pub recipient_address: String,
    pub window: Option<DeliveryWindow>,
}

impl DeliveryRecord {
    pub fn new(order_code: &str, details: &DeliveryDetails, receiving: ReceivingMethod) -> Self {
        let recipient_address = match receiving {
            ReceivingMethod::Delivery => details.recipient_address.trim().to_string(),
            ReceivingMethod::BranchPickup => String::new(),
        };
        DeliveryRecord {
            order_code: order_code.to_string(),
            recipient_name: details.recipient_name.trim().to_string(),
            recipient_phone: details.recipient_phone.trim().to_string(),
            recipient_address,
            window: details.window.clone(),
        }
    }
}

// =============================================================================
// Purchase Order
// =============================================================================

/// Checkout choices other than the cart lines themselves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct OrderRequest {
    pub payment_method: PaymentMethod,
    pub receiving_method: ReceivingMethod,
    pub voucher_code: Option<String>,
    pub branch_code: String,
    pub delivery: DeliveryDetails,
}

impl OrderRequest {
    pub fn validate(&self) -> ValidationResult<()> {
        validate_code("branch_code", &self.branch_code)?;
        if let Some(code) = &self.voucher_code {
            validate_code("voucher_code", code)?;
        }
        self.delivery.validate(self.receiving_method)
    }

    /// Voucher code as stored, with the sentinel for "no voucher".
    pub fn stored_voucher_code(&self) -> String {
        self.voucher_code
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .unwrap_or(NO_VOUCHER)
            .to_string()
    }
}

/// A purchase order. Immutable after creation except for `status`.
///
/// ## Amounts
/// Computed once at creation and never recomputed:
/// `final_total = subtotal − direct_discount − voucher_discount + shipping_fee`
/// (floored at 0).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PurchaseOrder {
    pub id: String,

    /// Human-readable order code.
    #[serde(rename = "madonhang")]
    pub code: String,

    pub user_id: String,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    #[serde(rename = "trangthai")]
    pub status: OrderStatus,

    #[serde(rename = "phuongthucthanhtoan")]
    pub payment_method: PaymentMethod,

    #[serde(rename = "hinhthucnhanhang")]
    pub receiving_method: ReceivingMethod,

    /// Voucher code, or `NONE`.
    pub voucher_code: String,

    pub subtotal: Money,
    pub direct_discount: Money,
    pub voucher_discount: Money,
    pub shipping_fee: Money,

    #[serde(rename = "thanhtien")]
    pub final_total: Money,

    #[serde(rename = "machinhanh")]
    pub branch_code: String,

    pub lines: Vec<OrderLine>,
}

impl PurchaseOrder {
    /// Assembles a new `Pending` order from committed lines and their prices.
    pub fn new(
        id: String,
        code: String,
        user_id: String,
        request: &OrderRequest,
        lines: Vec<OrderLine>,
        totals: &PriceBreakdown,
        created_at: DateTime<Utc>,
    ) -> Self {
        PurchaseOrder {
            id,
            code,
            user_id,
            created_at,
            status: OrderStatus::Pending,
            payment_method: request.payment_method,
            receiving_method: request.receiving_method,
            voucher_code: request.stored_voucher_code(),
            subtotal: totals.subtotal,
            direct_discount: totals.direct_discount,
            voucher_discount: totals.voucher_discount,
            shipping_fee: totals.shipping_fee,
            final_total: totals.final_total,
            branch_code: request.branch_code.trim().to_string(),
            lines,
        }
    }

    pub fn has_voucher(&self) -> bool {
        self.voucher_code != NO_VOUCHER
    }

    /// Σ unit price × quantity over the lines.
    pub fn lines_total(&self) -> Money {
        self.lines.iter().map(OrderLine::line_total).sum()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
