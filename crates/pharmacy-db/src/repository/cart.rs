//! # Cart Repository
//!
//! Saved carts of signed-in customers. A save replaces the user's rows
//! wholesale inside one transaction, so a reader sees the old cart or the
//! new one, never a mix.

use sqlx::SqlitePool;
use tracing::debug;

use crate::error::DbResult;
use crate::repository::money;
use pharmacy_core::cart::{Cart, CartLine};
use pharmacy_core::CoreError;

#[derive(Debug, sqlx::FromRow)]
struct CartLineRow {
    product_id: String,
    product_code: String,
    product_name: String,
    unit_label: String,
    quantity_per_unit: i64,
    quantity: i64,
    unit_price: i64,
}

impl From<CartLineRow> for CartLine {
    fn from(row: CartLineRow) -> Self {
        CartLine {
            product_id: row.product_id,
            product_code: row.product_code,
            product_name: row.product_name,
            unit_label: row.unit_label,
            quantity_per_unit: row.quantity_per_unit,
            quantity: row.quantity,
            unit_price: money(row.unit_price),
        }
    }
}

/// Repository for saved carts.
#[derive(Debug, Clone)]
pub struct CartRepository {
    pool: SqlitePool,
}

impl CartRepository {
    pub fn new(pool: SqlitePool) -> Self {
        CartRepository { pool }
    }

    /// Replaces the stored cart with `cart`'s lines.
    ///
    /// Anonymous carts are refused with `CheckoutUnavailable`; they only
    /// live in memory.
    pub async fn save(&self, cart: &Cart) -> DbResult<()> {
        let user_id = cart.owner().user_id().ok_or(CoreError::CheckoutUnavailable)?;
        debug!(user_id = %user_id, lines = cart.line_count(), "Saving cart");

        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM cart_lines WHERE user_id = ?1")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        for (position, line) in cart.lines().iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO cart_lines (
                    user_id, product_id, unit_label, product_code, product_name,
                    quantity_per_unit, quantity, unit_price, position
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                "#,
            )
            .bind(user_id)
            .bind(&line.product_id)
            .bind(&line.unit_label)
            .bind(&line.product_code)
            .bind(&line.product_name)
            .bind(line.quantity_per_unit)
            .bind(line.quantity)
            .bind(line.unit_price.minor())
            .bind(position as i64)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Loads a user's saved cart; an empty cart if nothing was saved.
    pub async fn load(&self, user_id: &str) -> DbResult<Cart> {
        let rows = sqlx::query_as::<_, CartLineRow>(
            r#"
            SELECT product_id, product_code, product_name, unit_label, quantity_per_unit,
                   quantity, unit_price
            FROM cart_lines
            WHERE user_id = ?1
            ORDER BY position
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(Cart::for_user(
            user_id,
            rows.into_iter().map(CartLine::from).collect(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use crate::repository::fixtures;
    use pharmacy_core::cart::{Cart, CartKey};
    use pharmacy_core::CoreError;

    #[tokio::test]
    async fn test_save_replaces_previous_lines() {
        let (db, product) = fixtures::with_stocked_product("PARA-500", 100_000, 5).await;

        let mut cart = Cart::for_user("u1", Vec::new());
        cart.add_or_increment(&product, "Hộp", 2).unwrap();
        cart.add_or_increment(&product, "Lốc", 1).unwrap();
        db.carts().save(&cart).await.unwrap();

        cart.remove(&CartKey::new(product.id.clone(), "Hộp")).unwrap();
        db.carts().save(&cart).await.unwrap();

        let loaded = db.carts().load("u1").await.unwrap();
        assert_eq!(loaded.lines(), cart.lines());
        assert_eq!(loaded.lines()[0].quantity_per_unit, 10);
        assert!(!loaded.needs_save());
    }

    #[tokio::test]
    async fn test_unsaved_user_has_empty_cart() {
        let db = fixtures::database().await;
        let cart = db.carts().load("nobody").await.unwrap();
        assert!(cart.is_empty());
        assert_eq!(cart.owner().user_id(), Some("nobody"));
    }

    #[tokio::test]
    async fn test_anonymous_cart_is_never_saved() {
        let db = fixtures::database().await;
        let err = db.carts().save(&Cart::anonymous()).await.unwrap_err();
        assert_eq!(err.as_domain(), Some(&CoreError::CheckoutUnavailable));
    }
}
