//! # Order Repository
//!
//! Purchase orders, their lines and delivery records, and the status
//! lifecycle writes.
//!
//! ## Checkout Transaction
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  BEGIN                                                                  │
//! │   │  touch branch row            ◄── write lock + branch must exist    │
//! │   ▼                                                                     │
//! │  for each selected line: stock ≥ quantity × pack size?                 │
//! │   │      yes ──► accepted        no ──► rejected (stays in cart)       │
//! │   │                                                                     │
//! │   ├── nothing accepted ──► ROLLBACK, InsufficientStock                 │
//! │   ▼                                                                     │
//! │  price accepted lines (PricingEngine)                                  │
//! │   ▼                                                                     │
//! │  voucher: remaining -= 1 if > 0 and not expired ──► else ROLLBACK      │
//! │   ▼                                                                     │
//! │  INSERT purchase_orders + order_lines + delivery_records               │
//! │   ▼                                                                     │
//! │  DELETE accepted cart_lines                                            │
//! │   ▼                                                                     │
//! │  COMMIT   (order never visible without its delivery record)            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Creating an order does not move branch stock. Stock leaves the ledger
//! at point-of-sale, and cancelling never puts any back.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::repository::voucher::redeem_in;
use crate::repository::{decode, money};
use pharmacy_core::cart::{price_selection, CartKey, CartLine, CheckoutSnapshot, LinePromotions};
use pharmacy_core::inventory::{check_line, units_available};
use pharmacy_core::order::{
    authorize_customer_cancel, authorize_status_change, plan_status_change, DeliveryWindow,
    OrderRequest, RejectedLine, StatusChange, StatusUpdate,
};
use pharmacy_core::pricing::PricingEngine;
use pharmacy_core::voucher::Voucher;
use pharmacy_core::{
    ActorRole, CoreError, DeliveryRecord, Money, OrderLine, OrderStatus, PurchaseOrder,
    ValidationError, NO_VOUCHER,
};

/// Attempts at a status CAS before giving up on a hot order.
const MAX_STATUS_ATTEMPTS: usize = 3;

// =============================================================================
// Inputs and Outputs
// =============================================================================

/// Everything needed to commit one checkout.
#[derive(Debug, Clone, Copy)]
pub struct NewOrder<'a> {
    pub snapshot: &'a CheckoutSnapshot,
    pub request: &'a OrderRequest,
    pub engine: &'a PricingEngine,
    /// Effective campaign percentage per line, looked up for `now`.
    pub promotions: &'a LinePromotions,
    /// The voucher named by `request.voucher_code`, as read before checkout.
    pub voucher: Option<&'a Voucher>,
    pub shipping_fee: Money,
    pub now: DateTime<Utc>,
}

/// A committed checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommittedOrder {
    pub order: PurchaseOrder,
    pub delivery: DeliveryRecord,
    /// Cart lines that became order lines (and left the saved cart).
    pub accepted: Vec<CartKey>,
    /// Lines refused for lack of stock; still in the cart.
    pub rejected: Vec<RejectedLine>,
}

// =============================================================================
// Rows
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: String,
    code: String,
    user_id: String,
    created_at: DateTime<Utc>,
    status: String,
    payment_method: String,
    receiving_method: String,
    voucher_code: String,
    subtotal: i64,
    direct_discount: i64,
    voucher_discount: i64,
    shipping_fee: i64,
    final_total: i64,
    branch_code: String,
}

#[derive(Debug, sqlx::FromRow)]
struct OrderLineRow {
    product_code: String,
    unit_label: String,
    quantity: i64,
    unit_price: i64,
}

#[derive(Debug, sqlx::FromRow)]
struct DeliveryRow {
    order_code: String,
    recipient_name: String,
    recipient_phone: String,
    recipient_address: String,
    window_from: Option<DateTime<Utc>>,
    window_to: Option<DateTime<Utc>>,
}

impl From<DeliveryRow> for DeliveryRecord {
    fn from(row: DeliveryRow) -> Self {
        let window = match (row.window_from, row.window_to) {
            (Some(from), Some(to)) => Some(DeliveryWindow { from, to }),
            _ => None,
        };
        DeliveryRecord {
            order_code: row.order_code,
            recipient_name: row.recipient_name,
            recipient_phone: row.recipient_phone,
            recipient_address: row.recipient_address,
            window,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct StatusRow {
    status: String,
    user_id: String,
}

const SELECT_ORDER: &str = r#"
    SELECT
        id, code, user_id, created_at, status, payment_method, receiving_method,
        voucher_code, subtotal, direct_discount, voucher_discount, shipping_fee,
        final_total, branch_code
    FROM purchase_orders
"#;

/// Generates an order code: `DH` + date + random suffix.
fn generate_order_code(now: DateTime<Utc>) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("DH{}-{}", now.format("%Y%m%d"), suffix[..8].to_uppercase())
}

/// Splits the snapshot into lines the branch can cover and lines it cannot.
///
/// Stock rows are in base units. Every unit of a product draws on the same
/// row, so each line is converted to base units and checked against what
/// the earlier lines left.
async fn partition_by_stock<'s>(
    conn: &mut SqliteConnection,
    branch_code: &str,
    lines: &'s [CartLine],
) -> DbResult<(Vec<&'s CartLine>, Vec<RejectedLine>)> {
    let mut remaining: HashMap<&str, i64> = HashMap::new();
    let mut accepted = Vec::new();
    let mut rejected = Vec::new();

    for line in lines {
        let on_hand = match remaining.get(line.product_code.as_str()) {
            Some(left) => *left,
            None => {
                let on_hand: Option<i64> = sqlx::query_scalar(
                    "SELECT quantity FROM branch_stock WHERE branch_code = ?1 AND product_code = ?2",
                )
                .bind(branch_code)
                .bind(&line.product_code)
                .fetch_optional(&mut *conn)
                .await?;
                on_hand.unwrap_or(0)
            }
        };

        let needed = line.base_quantity();
        match check_line(&line.product_code, branch_code, needed, on_hand) {
            Ok(()) => {
                remaining.insert(line.product_code.as_str(), on_hand - needed);
                accepted.push(line);
            }
            Err(_) => {
                remaining.insert(line.product_code.as_str(), on_hand);
                let available = units_available(on_hand, line.quantity_per_unit);
                warn!(
                    product_code = %line.product_code,
                    unit_label = %line.unit_label,
                    branch_code = %branch_code,
                    on_hand,
                    needed,
                    "Line rejected at commit: insufficient stock"
                );
                rejected.push(RejectedLine {
                    key: line.key(),
                    product_code: line.product_code.clone(),
                    requested: line.quantity,
                    available,
                });
            }
        }
    }

    Ok((accepted, rejected))
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for purchase orders.
#[derive(Debug, Clone)]
pub struct OrderRepository {
    pool: SqlitePool,
}

impl OrderRepository {
    pub fn new(pool: SqlitePool) -> Self {
        OrderRepository { pool }
    }

    /// Commits a checkout: the order, its lines and its delivery record in
    /// one transaction, with the voucher redeemed and the accepted lines
    /// removed from the saved cart.
    ///
    /// ## Returns
    /// * `Ok(CommittedOrder)` - possibly with some lines rejected for stock
    /// * `Err(Domain(InsufficientStock))` - no selected line could be covered
    /// * `Err(Domain(VoucherUnavailable))` - voucher expired or used up
    /// * `Err(Domain(Validation(_)))` - request failed validation
    /// * `Err(NotFound)` - unknown branch
    pub async fn create_with_delivery(&self, new: NewOrder<'_>) -> DbResult<CommittedOrder> {
        let NewOrder {
            snapshot,
            request,
            engine,
            promotions,
            voucher,
            shipping_fee,
            now,
        } = new;
        let today = now.date_naive();

        request.validate().map_err(|e| DbError::Domain(e.into()))?;
        if snapshot.lines.is_empty() {
            return Err(CoreError::from(ValidationError::required("selection")).into());
        }

        let voucher_code = request.stored_voucher_code();
        let voucher = if voucher_code == NO_VOUCHER {
            None
        } else {
            match voucher {
                Some(v) if v.code == voucher_code => {
                    v.ensure_redeemable(today)?;
                    Some(v)
                }
                _ => {
                    return Err(CoreError::VoucherUnavailable {
                        code: voucher_code,
                        reason: "unknown voucher".to_string(),
                    }
                    .into())
                }
            }
        };

        let branch_code = request.branch_code.trim();
        let mut tx = self.pool.begin().await?;

        // Takes the write lock before any stock is read.
        let branch = sqlx::query("UPDATE branches SET code = code WHERE code = ?1")
            .bind(branch_code)
            .execute(&mut *tx)
            .await?;
        if branch.rows_affected() == 0 {
            return Err(DbError::not_found("Branch", branch_code));
        }

        let (accepted, rejected) = partition_by_stock(&mut tx, branch_code, &snapshot.lines).await?;

        if let (true, Some(first)) = (accepted.is_empty(), rejected.first()) {
            return Err(CoreError::InsufficientStock {
                product_code: first.product_code.clone(),
                branch_code: branch_code.to_string(),
                available: first.available,
                requested: first.requested,
            }
            .into());
        }

        let totals = price_selection(
            engine,
            accepted.iter().copied(),
            promotions,
            voucher.map(|v| v.kind),
            shipping_fee,
        );

        if let Some(v) = voucher {
            redeem_in(&mut tx, &v.code, today).await?;
        }

        let order = PurchaseOrder::new(
            Uuid::new_v4().to_string(),
            generate_order_code(now),
            snapshot.user_id.clone(),
            request,
            accepted.iter().map(|l| OrderLine::from(*l)).collect(),
            &totals,
            now,
        );
        let delivery = DeliveryRecord::new(&order.code, &request.delivery, request.receiving_method);

        debug!(order_code = %order.code, lines = order.lines.len(), "Inserting order");

        sqlx::query(
            r#"
            INSERT INTO purchase_orders (
                id, code, user_id, created_at, status, payment_method, receiving_method,
                voucher_code, subtotal, direct_discount, voucher_discount, shipping_fee,
                final_total, branch_code
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
            "#,
        )
        .bind(&order.id)
        .bind(&order.code)
        .bind(&order.user_id)
        .bind(order.created_at)
        .bind(order.status.as_str())
        .bind(order.payment_method.as_str())
        .bind(order.receiving_method.as_str())
        .bind(&order.voucher_code)
        .bind(order.subtotal.minor())
        .bind(order.direct_discount.minor())
        .bind(order.voucher_discount.minor())
        .bind(order.shipping_fee.minor())
        .bind(order.final_total.minor())
        .bind(&order.branch_code)
        .execute(&mut *tx)
        .await?;

        for (line_no, line) in order.lines.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO order_lines (order_id, line_no, product_code, unit_label, quantity, unit_price)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
            )
            .bind(&order.id)
            .bind(line_no as i64)
            .bind(&line.product_code)
            .bind(&line.unit_label)
            .bind(line.quantity)
            .bind(line.unit_price.minor())
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query(
            r#"
            INSERT INTO delivery_records (
                order_code, recipient_name, recipient_phone, recipient_address,
                window_from, window_to
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&delivery.order_code)
        .bind(&delivery.recipient_name)
        .bind(&delivery.recipient_phone)
        .bind(&delivery.recipient_address)
        .bind(delivery.window.as_ref().map(|w| w.from))
        .bind(delivery.window.as_ref().map(|w| w.to))
        .execute(&mut *tx)
        .await?;

        let accepted_keys: Vec<CartKey> = accepted.iter().map(|l| l.key()).collect();
        for key in &accepted_keys {
            sqlx::query("DELETE FROM cart_lines WHERE user_id = ?1 AND product_id = ?2 AND unit_label = ?3")
                .bind(&snapshot.user_id)
                .bind(&key.product_id)
                .bind(&key.unit_label)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        info!(
            order_code = %order.code,
            user_id = %order.user_id,
            final_total = %order.final_total,
            accepted = accepted_keys.len(),
            rejected = rejected.len(),
            "Order created"
        );

        Ok(CommittedOrder {
            order,
            delivery,
            accepted: accepted_keys,
            rejected,
        })
    }

    /// Gets an order with its lines.
    pub async fn get_by_code(&self, code: &str) -> DbResult<Option<PurchaseOrder>> {
        let sql = format!("{SELECT_ORDER} WHERE code = ?1");
        let row = sqlx::query_as::<_, OrderRow>(&sql)
            .bind(code)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(Some(self.hydrate(row).await?)),
            None => Ok(None),
        }
    }

    /// The delivery or pickup record of an order.
    pub async fn get_delivery(&self, order_code: &str) -> DbResult<Option<DeliveryRecord>> {
        let row = sqlx::query_as::<_, DeliveryRow>(
            r#"
            SELECT order_code, recipient_name, recipient_phone, recipient_address,
                   window_from, window_to
            FROM delivery_records
            WHERE order_code = ?1
            "#,
        )
        .bind(order_code)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(DeliveryRecord::from))
    }

    /// A customer's orders, newest first.
    pub async fn list_by_user(&self, user_id: &str) -> DbResult<Vec<PurchaseOrder>> {
        let sql = format!("{SELECT_ORDER} WHERE user_id = ?1 ORDER BY created_at DESC, code");
        let rows = sqlx::query_as::<_, OrderRow>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;

        let mut orders = Vec::with_capacity(rows.len());
        for row in rows {
            orders.push(self.hydrate(row).await?);
        }
        Ok(orders)
    }

    /// Moves an order along its lifecycle. Staff and admins only.
    ///
    /// Re-submitting the current status succeeds without a write.
    pub async fn update_status(
        &self,
        code: &str,
        target: OrderStatus,
        role: ActorRole,
        now: DateTime<Utc>,
    ) -> DbResult<StatusUpdate> {
        authorize_status_change(role)?;
        self.transition(code, target, now, None).await
    }

    /// Cancels an order.
    ///
    /// Staff and admins cancel from `Pending` or `Confirmed`; a customer
    /// cancels only their own order, and only while it is `Pending`.
    pub async fn cancel(
        &self,
        code: &str,
        role: ActorRole,
        requester: &str,
        now: DateTime<Utc>,
    ) -> DbResult<StatusUpdate> {
        let customer = if role.is_back_office() {
            None
        } else {
            Some(requester)
        };
        self.transition(code, OrderStatus::Cancelled, now, customer).await
    }

    /// Read, plan, compare-and-set; re-plan if another writer got there first.
    async fn transition(
        &self,
        code: &str,
        target: OrderStatus,
        now: DateTime<Utc>,
        customer: Option<&str>,
    ) -> DbResult<StatusUpdate> {
        for attempt in 1..=MAX_STATUS_ATTEMPTS {
            let row = sqlx::query_as::<_, StatusRow>(
                "SELECT status, user_id FROM purchase_orders WHERE code = ?1",
            )
            .bind(code)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("PurchaseOrder", code))?;
            let current: OrderStatus = decode("purchase_orders.status", &row.status)?;

            if let Some(requester) = customer {
                if requester != row.user_id {
                    return Err(CoreError::forbidden("cancel another customer's order", ActorRole::Customer).into());
                }
                authorize_customer_cancel(current)?;
            }

            let (from, to) = match plan_status_change(code, current, target)? {
                StatusChange::Unchanged(status) => {
                    debug!(order_code = %code, status = %status, "Status unchanged");
                    return Ok(StatusUpdate {
                        order_code: code.to_string(),
                        from: status,
                        to: status,
                        changed: false,
                    });
                }
                StatusChange::Apply { from, to } => (from, to),
            };

            let result = sqlx::query(
                r#"
                UPDATE purchase_orders
                SET status = ?1, status_changed_at = ?2
                WHERE code = ?3 AND status = ?4
                "#,
            )
            .bind(to.as_str())
            .bind(now)
            .bind(code)
            .bind(from.as_str())
            .execute(&self.pool)
            .await?;

            if result.rows_affected() == 1 {
                info!(order_code = %code, from = %from, to = %to, "Order status changed");
                return Ok(StatusUpdate {
                    order_code: code.to_string(),
                    from,
                    to,
                    changed: true,
                });
            }

            warn!(order_code = %code, attempt, "Order status changed concurrently, re-reading");
        }

        Err(DbError::TransactionFailed(format!(
            "order {code} kept changing; status update abandoned"
        )))
    }

    async fn hydrate(&self, row: OrderRow) -> DbResult<PurchaseOrder> {
        let lines = sqlx::query_as::<_, OrderLineRow>(
            r#"
            SELECT product_code, unit_label, quantity, unit_price
            FROM order_lines
            WHERE order_id = ?1
            ORDER BY line_no
            "#,
        )
        .bind(&row.id)
        .fetch_all(&self.pool)
        .await?;

        Ok(PurchaseOrder {
            status: decode("purchase_orders.status", &row.status)?,
            payment_method: decode("purchase_orders.payment_method", &row.payment_method)?,
            receiving_method: decode("purchase_orders.receiving_method", &row.receiving_method)?,
            id: row.id,
            code: row.code,
            user_id: row.user_id,
            created_at: row.created_at,
            voucher_code: row.voucher_code,
            subtotal: money(row.subtotal),
            direct_discount: money(row.direct_discount),
            voucher_discount: money(row.voucher_discount),
            shipping_fee: money(row.shipping_fee),
            final_total: money(row.final_total),
            branch_code: row.branch_code,
            lines: lines
                .into_iter()
                .map(|l| OrderLine {
                    product_code: l.product_code,
                    quantity: l.quantity,
                    unit_price: money(l.unit_price),
                    unit_label: l.unit_label,
                })
                .collect(),
        })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
