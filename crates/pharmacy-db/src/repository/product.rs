//! # Product Repository
//!
//! Catalog reads and writes: products and their selling units.
//!
//! ## Shape on Disk
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  products                         product_units                         │
//! │  ┌────────────────────────┐       ┌──────────────────────────────────┐ │
//! │  │ id (UUID)  ◄───────────┼───────┤ product_id                       │ │
//! │  │ code (UNIQUE)          │       │ unit_label   "Hộp" / "Vỉ" / ...  │ │
//! │  │ name                   │       │ quantity_per_unit                │ │
//! │  │ campaign_code ─► promo │       │ price                            │ │
//! │  │ is_active              │       │ position (display order)         │ │
//! │  └────────────────────────┘       └──────────────────────────────────┘ │
//! │                                                                         │
//! │  Reads join both tables and fold the unit rows back into one Product.  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{DbError, DbResult};
use crate::repository::money;
use pharmacy_core::{Product, UnitDefinition};

/// One row of the products ⋈ product_units join.
#[derive(Debug, sqlx::FromRow)]
struct ProductUnitRow {
    id: String,
    code: String,
    name: String,
    campaign_code: Option<String>,
    is_active: bool,
    unit_label: String,
    quantity_per_unit: i64,
    price: i64,
}

const SELECT_PRODUCT_UNITS: &str = r#"
    SELECT
        p.id, p.code, p.name, p.campaign_code, p.is_active,
        u.unit_label, u.quantity_per_unit, u.price
    FROM products p
    JOIN product_units u ON u.product_id = p.id
"#;

/// Folds consecutive join rows of the same product into `Product`s.
fn fold_products(rows: Vec<ProductUnitRow>) -> Vec<Product> {
    let mut products: Vec<Product> = Vec::new();
    for row in rows {
        let unit = UnitDefinition {
            unit_label: row.unit_label,
            quantity_per_unit: row.quantity_per_unit,
            price: money(row.price),
        };
        match products.last_mut() {
            Some(last) if last.id == row.id => last.units.push(unit),
            _ => products.push(Product {
                id: row.id,
                code: row.code,
                name: row.name,
                units: vec![unit],
                campaign_code: row.campaign_code,
                is_active: row.is_active,
            }),
        }
    }
    products
}

/// Repository for catalog operations.
///
/// ## Usage
/// ```rust,ignore
/// let repo = db.products();
/// let product = repo.get_by_code("PARA-500").await?;
/// let page = repo.search("para", 20).await?;
/// ```
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    /// Creates a new ProductRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Inserts a product together with its units.
    ///
    /// ## Returns
    /// * `Err(DbError::UniqueViolation)` - code already exists
    /// * `Err(DbError::Domain(_))` - product failed validation
    pub async fn insert(&self, product: &Product) -> DbResult<()> {
        product
            .validate()
            .map_err(|e| DbError::Domain(e.into()))?;

        debug!(id = %product.id, code = %product.code, "Inserting product");

        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO products (id, code, name, campaign_code, is_active, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
            "#,
        )
        .bind(&product.id)
        .bind(product.code.trim())
        .bind(product.name.trim())
        .bind(&product.campaign_code)
        .bind(product.is_active)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        for (position, unit) in product.units.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO product_units (product_id, unit_label, quantity_per_unit, price, position)
                VALUES (?1, ?2, ?3, ?4, ?5)
                "#,
            )
            .bind(&product.id)
            .bind(&unit.unit_label)
            .bind(unit.quantity_per_unit)
            .bind(unit.price.minor())
            .bind(position as i64)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Gets a product by its ID.
    ///
    /// ## Returns
    /// * `Ok(Some(Product))` - Product found
    /// * `Ok(None)` - Product not found
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Product>> {
        let sql = format!("{SELECT_PRODUCT_UNITS} WHERE p.id = ?1 ORDER BY u.position");
        let rows = sqlx::query_as::<_, ProductUnitRow>(&sql)
            .bind(id)
            .fetch_all(&self.pool)
            .await?;

        Ok(fold_products(rows).into_iter().next())
    }

    /// Gets a product by its business code.
    pub async fn get_by_code(&self, code: &str) -> DbResult<Option<Product>> {
        let sql = format!("{SELECT_PRODUCT_UNITS} WHERE p.code = ?1 ORDER BY u.position");
        let rows = sqlx::query_as::<_, ProductUnitRow>(&sql)
            .bind(code)
            .fetch_all(&self.pool)
            .await?;

        Ok(fold_products(rows).into_iter().next())
    }

    /// Lists active products sorted by name.
    pub async fn list_active(&self, limit: u32) -> DbResult<Vec<Product>> {
        self.search("", limit).await
    }

    /// Searches active products by code or name (case-insensitive substring).
    ///
    /// An empty query lists everything active.
    pub async fn search(&self, query: &str, limit: u32) -> DbResult<Vec<Product>> {
        let pattern = format!("%{}%", query.trim().to_lowercase());
        debug!(query = %query, limit = limit, "Searching products");

        // LIMIT applies to products, not to join rows
        let sql = format!(
            "{SELECT_PRODUCT_UNITS} \
             WHERE p.id IN ( \
                 SELECT id FROM products \
                 WHERE is_active = 1 AND (lower(code) LIKE ?1 OR lower(name) LIKE ?1) \
                 ORDER BY name, id LIMIT ?2 \
             ) \
             ORDER BY p.name, p.id, u.position"
        );
        let rows = sqlx::query_as::<_, ProductUnitRow>(&sql)
            .bind(pattern)
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await?;

        Ok(fold_products(rows))
    }

    /// Soft-deletes or re-lists a product.
    pub async fn set_active(&self, id: &str, active: bool) -> DbResult<()> {
        let result = sqlx::query("UPDATE products SET is_active = ?1, updated_at = ?2 WHERE id = ?3")
            .bind(active)
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }
        Ok(())
    }

    /// Gets total product count (for diagnostics).
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products WHERE is_active = 1")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
