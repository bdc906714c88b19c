//! # Receipt Repository
//!
//! Stock receipts and their one-shot decision.
//!
//! ## Decision Transaction
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  BEGIN                                                                  │
//! │   │                                                                     │
//! │   ▼                                                                     │
//! │  UPDATE stock_receipts SET status = ?                                  │
//! │  WHERE code = ? AND status = 'Unapproved'     ◄── compare-and-set      │
//! │   │                                                                     │
//! │   ├── 0 rows ──► ROLLBACK, read status ──► NotFound | AlreadyDecided   │
//! │   │                                                                     │
//! │   ▼ 1 row                                                               │
//! │  Approve? ──► for each line: branch_stock += quantity (upsert)         │
//! │   │                                                                     │
//! │   ▼                                                                     │
//! │  COMMIT       (status and every increment become visible together)     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The status write comes first so the transaction takes SQLite's write
//! lock before reading anything; a concurrent decider waits on the lock
//! and then finds the status already moved.

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::repository::decode;
use pharmacy_core::inventory::merge_quantities;
use pharmacy_core::receipt::{
    already_decided, authorize_decision, ReceiptFilter, ReceiptSubmission,
};
use pharmacy_core::{ActorRole, ReceiptDecision, ReceiptLine, ReceiptStatus, StockReceipt};

#[derive(Debug, sqlx::FromRow)]
struct ReceiptRow {
    code: String,
    status: String,
    submitted_on: NaiveDate,
    submitted_by: String,
    branch_code: String,
}

#[derive(Debug, sqlx::FromRow)]
struct ReceiptLineRow {
    product_code: String,
    quantity: i64,
}

/// Generates a receipt code: `NH` + submission date + random suffix.
fn generate_receipt_code(submitted_on: NaiveDate) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!(
        "NH{}-{}",
        submitted_on.format("%Y%m%d"),
        suffix[..8].to_uppercase()
    )
}

/// Repository for stock receipts.
#[derive(Debug, Clone)]
pub struct ReceiptRepository {
    pool: SqlitePool,
}

impl ReceiptRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ReceiptRepository { pool }
    }

    /// Records a new `Unapproved` receipt.
    ///
    /// ## Returns
    /// * `Err(DbError::Domain(_))` - submission failed validation
    /// * `Err(DbError::ForeignKeyViolation)` - unknown branch or product code
    pub async fn submit(
        &self,
        submission: &ReceiptSubmission,
        submitted_on: NaiveDate,
    ) -> DbResult<StockReceipt> {
        submission.validate().map_err(|e| DbError::Domain(e.into()))?;

        let receipt = StockReceipt {
            code: generate_receipt_code(submitted_on),
            status: ReceiptStatus::Unapproved,
            submitted_on,
            submitted_by: submission.submitted_by.trim().to_string(),
            branch_code: submission.branch_code.trim().to_string(),
            lines: submission.lines.clone(),
        };

        debug!(receipt_code = %receipt.code, branch_code = %receipt.branch_code, "Submitting receipt");

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO stock_receipts (code, status, submitted_on, submitted_by, branch_code)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(&receipt.code)
        .bind(receipt.status.as_str())
        .bind(receipt.submitted_on)
        .bind(&receipt.submitted_by)
        .bind(&receipt.branch_code)
        .execute(&mut *tx)
        .await?;

        for (line_no, line) in receipt.lines.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO receipt_lines (receipt_code, line_no, product_code, quantity)
                VALUES (?1, ?2, ?3, ?4)
                "#,
            )
            .bind(&receipt.code)
            .bind(line_no as i64)
            .bind(line.product_code.trim())
            .bind(line.quantity)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        info!(receipt_code = %receipt.code, lines = receipt.lines.len(), "Receipt submitted");
        Ok(receipt)
    }

    /// Gets a receipt with its lines.
    pub async fn get_by_code(&self, code: &str) -> DbResult<Option<StockReceipt>> {
        let row = sqlx::query_as::<_, ReceiptRow>(
            r#"
            SELECT code, status, submitted_on, submitted_by, branch_code
            FROM stock_receipts
            WHERE code = ?1
            "#,
        )
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(self.hydrate(row).await?)),
            None => Ok(None),
        }
    }

    /// Lists receipts matching `filter`, newest submission first.
    pub async fn list(&self, filter: &ReceiptFilter) -> DbResult<Vec<StockReceipt>> {
        filter.validate().map_err(|e| DbError::Domain(e.into()))?;

        let mut query: QueryBuilder<Sqlite> = QueryBuilder::new(
            "SELECT code, status, submitted_on, submitted_by, branch_code FROM stock_receipts WHERE 1 = 1",
        );
        if let Some(status) = filter.status {
            query.push(" AND status = ").push_bind(status.as_str());
        }
        if let Some(branch) = &filter.branch_code {
            query.push(" AND branch_code = ").push_bind(branch.clone());
        }
        if let Some(from) = filter.submitted_from {
            query.push(" AND submitted_on >= ").push_bind(from);
        }
        if let Some(to) = filter.submitted_to {
            query.push(" AND submitted_on <= ").push_bind(to);
        }
        query.push(" ORDER BY submitted_on DESC, code");

        let rows = query
            .build_query_as::<ReceiptRow>()
            .fetch_all(&self.pool)
            .await?;

        let mut receipts = Vec::with_capacity(rows.len());
        for row in rows {
            receipts.push(self.hydrate(row).await?);
        }
        Ok(receipts)
    }

    /// Applies the one-shot decision on a receipt.
    ///
    /// ## Returns
    /// * `Ok(StockReceipt)` - the receipt in its new terminal status
    /// * `Err(Domain(AlreadyDecided))` - someone decided first; stock untouched
    /// * `Err(Domain(Forbidden))` - actor is not staff or admin
    /// * `Err(NotFound)` - no such receipt
    pub async fn decide(
        &self,
        code: &str,
        decision: ReceiptDecision,
        role: ActorRole,
        decided_at: DateTime<Utc>,
    ) -> DbResult<StockReceipt> {
        authorize_decision(role)?;
        let target = decision.target_status();

        let mut tx = self.pool.begin().await?;

        let claimed = sqlx::query(
            r#"
            UPDATE stock_receipts
            SET status = ?1, decided_at = ?2
            WHERE code = ?3 AND status = 'Unapproved'
            "#,
        )
        .bind(target.as_str())
        .bind(decided_at)
        .bind(code)
        .execute(&mut *tx)
        .await?;

        if claimed.rows_affected() == 0 {
            tx.rollback().await?;
            let current: Option<String> =
                sqlx::query_scalar("SELECT status FROM stock_receipts WHERE code = ?1")
                    .bind(code)
                    .fetch_optional(&self.pool)
                    .await?;
            return match current {
                None => Err(DbError::not_found("StockReceipt", code)),
                Some(status) => {
                    let status: ReceiptStatus = decode("stock_receipts.status", &status)?;
                    warn!(receipt_code = %code, status = %status, "Receipt already decided");
                    Err(already_decided(code, status).into())
                }
            };
        }

        if decision.moves_stock() {
            let (branch_code,): (String,) =
                sqlx::query_as("SELECT branch_code FROM stock_receipts WHERE code = ?1")
                    .bind(code)
                    .fetch_one(&mut *tx)
                    .await?;

            let lines = sqlx::query_as::<_, ReceiptLineRow>(
                "SELECT product_code, quantity FROM receipt_lines WHERE receipt_code = ?1 ORDER BY line_no",
            )
            .bind(code)
            .fetch_all(&mut *tx)
            .await?;

            let merged = merge_quantities(lines.iter().map(|l| (l.product_code.as_str(), l.quantity)));
            for (product_code, quantity) in &merged {
                sqlx::query(
                    r#"
                    INSERT INTO branch_stock (branch_code, product_code, quantity, updated_at)
                    VALUES (?1, ?2, ?3, ?4)
                    ON CONFLICT(branch_code, product_code)
                    DO UPDATE SET quantity = quantity + excluded.quantity,
                                  updated_at = excluded.updated_at
                    "#,
                )
                .bind(&branch_code)
                .bind(product_code)
                .bind(quantity)
                .bind(decided_at)
                .execute(&mut *tx)
                .await?;
            }
            debug!(receipt_code = %code, branch_code = %branch_code, products = merged.len(), "Stock incremented");
        }

        tx.commit().await?;
        info!(receipt_code = %code, status = %target, role = %role, "Receipt decided");

        self.get_by_code(code)
            .await?
            .ok_or_else(|| DbError::not_found("StockReceipt", code))
    }

    async fn hydrate(&self, row: ReceiptRow) -> DbResult<StockReceipt> {
        let lines = sqlx::query_as::<_, ReceiptLineRow>(
            "SELECT product_code, quantity FROM receipt_lines WHERE receipt_code = ?1 ORDER BY line_no",
        )
        .bind(&row.code)
        .fetch_all(&self.pool)
        .await?;

        Ok(StockReceipt {
            status: decode("stock_receipts.status", &row.status)?,
            code: row.code,
            submitted_on: row.submitted_on,
            submitted_by: row.submitted_by,
            branch_code: row.branch_code,
            lines: lines
                .into_iter()
                .map(|l| ReceiptLine {
                    product_code: l.product_code,
                    quantity: l.quantity,
                })
                .collect(),
        })
    }
}
