//! # Stock Repository
//!
//! Branches and the per-branch inventory ledger.
//!
//! ## Who Moves Stock
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  Receipt approved ──► + quantity   (ReceiptRepository::decide)          │
//! │  Point-of-sale    ──► − quantity × pack size (record_sale)              │
//! │  Admin count      ──► = quantity   (StockRepository::set_quantity)      │
//! │                                                                         │
//! │  Online orders and cancellations never touch the ledger.                │
//! │                                                                         │
//! │  Quantities are base units. A missing (branch, product) row reads 0.    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::{debug, info, warn};

use crate::error::{DbError, DbResult};
use pharmacy_core::inventory::{base_quantity, check_line, merge_quantities};
use pharmacy_core::validation::validate_code;
use pharmacy_core::{Branch, BranchStock};

/// One line of a point-of-sale sale: `quantity` packs of `unit_label`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleLine {
    pub product_code: String,
    pub unit_label: String,
    pub quantity: i64,
}

#[derive(Debug, sqlx::FromRow)]
struct BranchRow {
    code: String,
    name: String,
    address: String,
}

#[derive(Debug, sqlx::FromRow)]
struct StockRow {
    branch_code: String,
    product_code: String,
    quantity: i64,
}

/// Repository for branches and branch stock.
#[derive(Debug, Clone)]
pub struct StockRepository {
    pool: SqlitePool,
}

impl StockRepository {
    /// Creates a new StockRepository.
    pub fn new(pool: SqlitePool) -> Self {
        StockRepository { pool }
    }

    // =========================================================================
    // Branches
    // =========================================================================

    pub async fn insert_branch(&self, code: &str, name: &str, address: &str) -> DbResult<()> {
        validate_code("branch_code", code).map_err(|e| DbError::Domain(e.into()))?;
        debug!(branch_code = %code, "Inserting branch");

        sqlx::query("INSERT INTO branches (code, name, address) VALUES (?1, ?2, ?3)")
            .bind(code.trim())
            .bind(name.trim())
            .bind(address.trim())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn get_branch(&self, code: &str) -> DbResult<Option<Branch>> {
        let row = sqlx::query_as::<_, BranchRow>(
            "SELECT code, name, address FROM branches WHERE code = ?1",
        )
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| Branch {
            code: r.code,
            name: r.name,
            address: r.address,
        }))
    }

    pub async fn list_branches(&self) -> DbResult<Vec<Branch>> {
        let rows = sqlx::query_as::<_, BranchRow>("SELECT code, name, address FROM branches ORDER BY code")
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .into_iter()
            .map(|r| Branch {
                code: r.code,
                name: r.name,
                address: r.address,
            })
            .collect())
    }

    // =========================================================================
    // Ledger
    // =========================================================================

    /// Quantity on hand; 0 when the branch has never stocked the product.
    pub async fn quantity(&self, branch_code: &str, product_code: &str) -> DbResult<i64> {
        let qty: Option<i64> = sqlx::query_scalar(
            "SELECT quantity FROM branch_stock WHERE branch_code = ?1 AND product_code = ?2",
        )
        .bind(branch_code)
        .bind(product_code)
        .fetch_optional(&self.pool)
        .await?;

        Ok(qty.unwrap_or(0))
    }

    /// Overwrites the quantity on hand (stock count / correction).
    pub async fn set_quantity(
        &self,
        branch_code: &str,
        product_code: &str,
        quantity: i64,
    ) -> DbResult<()> {
        if quantity < 0 {
            return Err(DbError::Domain(
                pharmacy_core::ValidationError::OutOfRange {
                    field: "quantity".to_string(),
                    min: 0,
                    max: i64::MAX,
                }
                .into(),
            ));
        }

        debug!(branch_code = %branch_code, product_code = %product_code, quantity, "Setting stock");

        sqlx::query(
            r#"
            INSERT INTO branch_stock (branch_code, product_code, quantity, updated_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(branch_code, product_code)
            DO UPDATE SET quantity = excluded.quantity, updated_at = excluded.updated_at
            "#,
        )
        .bind(branch_code)
        .bind(product_code)
        .bind(quantity)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Every stocked product at a branch, by product code.
    pub async fn list_for_branch(&self, branch_code: &str) -> DbResult<Vec<BranchStock>> {
        let rows = sqlx::query_as::<_, StockRow>(
            r#"
            SELECT branch_code, product_code, quantity
            FROM branch_stock
            WHERE branch_code = ?1
            ORDER BY product_code
            "#,
        )
        .bind(branch_code)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| BranchStock {
                branch_code: r.branch_code,
                product_code: r.product_code,
                quantity: r.quantity,
            })
            .collect())
    }

    /// Records a point-of-sale sale: every line decremented, or none.
    ///
    /// Each line is converted to base units with its unit's pack size, and
    /// lines of one product are summed before the decrement. Each decrement is
    /// conditional on enough stock being on hand, so two tills selling the
    /// last box cannot both succeed.
    ///
    /// ## Returns
    /// * `Err(DbError::Domain(CoreError::InsufficientStock))` naming the first
    ///   product that did not fit, in base units; nothing was written.
    /// * `Err(DbError::NotFound)` for a product code or unit the catalog lacks.
    pub async fn record_sale(&self, branch_code: &str, lines: &[SaleLine]) -> DbResult<()> {
        if lines.is_empty() {
            return Err(DbError::Domain(
                pharmacy_core::ValidationError::required("lines").into(),
            ));
        }
        if lines.iter().any(|l| l.quantity <= 0) {
            return Err(DbError::Domain(
                pharmacy_core::ValidationError::MustBePositive {
                    field: "quantity".to_string(),
                }
                .into(),
            ));
        }

        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let mut in_base_units = Vec::with_capacity(lines.len());
        for line in lines {
            let per_unit: Option<i64> = sqlx::query_scalar(
                r#"
                SELECT u.quantity_per_unit
                FROM product_units u
                JOIN products p ON p.id = u.product_id
                WHERE p.code = ?1 AND u.unit_label = ?2
                "#,
            )
            .bind(&line.product_code)
            .bind(&line.unit_label)
            .fetch_optional(&mut *tx)
            .await?;
            let per_unit = per_unit.ok_or_else(|| {
                DbError::not_found(
                    "ProductUnit",
                    format!("{}/{}", line.product_code, line.unit_label),
                )
            })?;
            in_base_units.push((line.product_code.as_str(), base_quantity(line.quantity, per_unit)));
        }
        let merged = merge_quantities(in_base_units);

        for (product_code, quantity) in &merged {
            let result = sqlx::query(
                r#"
                UPDATE branch_stock
                SET quantity = quantity - ?1, updated_at = ?2
                WHERE branch_code = ?3 AND product_code = ?4 AND quantity >= ?1
                "#,
            )
            .bind(quantity)
            .bind(now)
            .bind(branch_code)
            .bind(product_code)
            .execute(&mut *tx)
            .await?;

            if result.rows_affected() == 0 {
                let available: Option<i64> = sqlx::query_scalar(
                    "SELECT quantity FROM branch_stock WHERE branch_code = ?1 AND product_code = ?2",
                )
                .bind(branch_code)
                .bind(product_code)
                .fetch_optional(&mut *tx)
                .await?;
                let available = available.unwrap_or(0);

                warn!(
                    branch_code = %branch_code,
                    product_code = %product_code,
                    available,
                    requested = quantity,
                    "Sale refused: insufficient stock"
                );
                check_line(product_code, branch_code, *quantity, available)?;
                // Row changed between the UPDATE and the read; still refuse.
                return Err(DbError::TransactionFailed(format!(
                    "stock for {product_code} changed during sale"
                )));
            }
        }

        tx.commit().await?;
        info!(branch_code = %branch_code, lines = merged.len(), "Sale recorded");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::fixtures::{self, BRANCH, OTHER_BRANCH};
    use pharmacy_core::CoreError;

    fn sale(code: &str, qty: i64) -> SaleLine {
        sale_of(code, "Hộp", qty)
    }

    fn sale_of(code: &str, unit: &str, qty: i64) -> SaleLine {
        SaleLine {
            product_code: code.to_string(),
            unit_label: unit.to_string(),
            quantity: qty,
        }
    }

    #[tokio::test]
    async fn test_missing_row_reads_as_zero() {
        let (db, _) = fixtures::with_stocked_product("PARA-500", 100_000, 5).await;
        assert_eq!(db.stock().quantity(BRANCH, "PARA-500").await.unwrap(), 5);
        assert_eq!(db.stock().quantity(OTHER_BRANCH, "PARA-500").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_set_quantity_overwrites() {
        let (db, _) = fixtures::with_stocked_product("PARA-500", 100_000, 5).await;
        db.stock().set_quantity(BRANCH, "PARA-500", 12).await.unwrap();

        let rows = db.stock().list_for_branch(BRANCH).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].quantity, 12);

        assert!(db.stock().set_quantity(BRANCH, "PARA-500", -1).await.is_err());
    }

    #[tokio::test]
    async fn test_sale_decrements_all_lines() {
        let (db, _) = fixtures::with_stocked_product("PARA-500", 100_000, 5).await;
        db.products()
            .insert(&fixtures::product("VITC-1000", 80_000))
            .await
            .unwrap();
        db.stock().set_quantity(BRANCH, "VITC-1000", 3).await.unwrap();

        db.stock()
            .record_sale(
                BRANCH,
                &[sale("PARA-500", 2), sale("VITC-1000", 1), sale("PARA-500", 1)],
            )
            .await
            .unwrap();

        assert_eq!(db.stock().quantity(BRANCH, "PARA-500").await.unwrap(), 2);
        assert_eq!(db.stock().quantity(BRANCH, "VITC-1000").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_short_sale_writes_nothing() {
        let (db, _) = fixtures::with_stocked_product("PARA-500", 100_000, 5).await;
        db.products()
            .insert(&fixtures::product("VITC-1000", 80_000))
            .await
            .unwrap();
        db.stock().set_quantity(BRANCH, "VITC-1000", 1).await.unwrap();

        let err = db
            .stock()
            .record_sale(BRANCH, &[sale("PARA-500", 2), sale("VITC-1000", 4)])
            .await
            .unwrap_err();

        match err.as_domain() {
            Some(CoreError::InsufficientStock {
                product_code,
                available,
                requested,
                ..
            }) => {
                assert_eq!(product_code, "VITC-1000");
                assert_eq!(*available, 1);
                assert_eq!(*requested, 4);
            }
            other => panic!("expected InsufficientStock, got {other:?}"),
        }
        // First line was rolled back with the second.
        assert_eq!(db.stock().quantity(BRANCH, "PARA-500").await.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_pack_sale_takes_its_base_quantity() {
        let (db, _) = fixtures::with_stocked_product("PARA-500", 100_000, 25).await;

        db.stock()
            .record_sale(BRANCH, &[sale_of("PARA-500", "Lốc", 2), sale("PARA-500", 3)])
            .await
            .unwrap();
        assert_eq!(db.stock().quantity(BRANCH, "PARA-500").await.unwrap(), 2);

        // One pack needs ten; two on hand is not enough
        let err = db
            .stock()
            .record_sale(BRANCH, &[sale_of("PARA-500", "Lốc", 1)])
            .await
            .unwrap_err();
        match err.as_domain() {
            Some(CoreError::InsufficientStock {
                available,
                requested,
                ..
            }) => {
                assert_eq!(*available, 2);
                assert_eq!(*requested, 10);
            }
            other => panic!("expected InsufficientStock, got {other:?}"),
        }
        assert_eq!(db.stock().quantity(BRANCH, "PARA-500").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_sale_in_unknown_unit_writes_nothing() {
        let (db, _) = fixtures::with_stocked_product("PARA-500", 100_000, 25).await;

        let err = db
            .stock()
            .record_sale(BRANCH, &[sale("PARA-500", 1), sale_of("PARA-500", "Chai", 1)])
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
        assert_eq!(db.stock().quantity(BRANCH, "PARA-500").await.unwrap(), 25);
    }

    #[tokio::test]
    async fn test_branches_listed_by_code() {
        let db = fixtures::database().await;
        let branches = db.stock().list_branches().await.unwrap();
        let codes: Vec<_> = branches.iter().map(|b| b.code.as_str()).collect();
        assert_eq!(codes, vec![BRANCH, OTHER_BRANCH]);
        assert!(db.stock().get_branch("CN99").await.unwrap().is_none());
    }
}
