//! # Repository Module
//!
//! Database repository implementations for pharmacy commerce.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repositories and What They Own                       │
//! │                                                                         │
//! │  Service call                                                          │
//! │       │  db.receipts().decide("NH...", Approve, Staff)                 │
//! │       ▼                                                                 │
//! │  ReceiptRepository ──► one transaction: status CAS + stock upserts     │
//! │                                                                         │
//! │  ProductRepository    products, product_units                          │
//! │  StockRepository      branches, branch_stock (inventory ledger)        │
//! │  OrderRepository      purchase_orders, order_lines, delivery_records   │
//! │  ReceiptRepository    stock_receipts, receipt_lines                    │
//! │  PromotionRepository  promotion_campaigns, products.campaign_code      │
//! │  VoucherRepository    vouchers                                         │
//! │  CartRepository       cart_lines                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Queries are runtime-checked (`sqlx::query_as::<_, Row>`) into private
//! `FromRow` records, then converted into pharmacy-core types.

use std::str::FromStr;

use pharmacy_core::{Money, Percent};

use crate::error::{DbError, DbResult};

pub mod cart;
pub mod order;
pub mod product;
pub mod promotion;
pub mod receipt;
pub mod stock;
pub mod voucher;

/// Parses an enumeration column. Unknown strings are corruption, not defaults.
pub(crate) fn decode<T: FromStr>(column: &str, value: &str) -> DbResult<T> {
    value.parse::<T>().map_err(|_| DbError::CorruptValue {
        column: column.to_string(),
        value: value.to_string(),
    })
}

/// Reads a stored percentage back into [`Percent`].
pub(crate) fn decode_percent(column: &str, value: i64) -> DbResult<Percent> {
    u8::try_from(value)
        .ok()
        .and_then(|v| Percent::new(v).ok())
        .ok_or_else(|| DbError::CorruptValue {
            column: column.to_string(),
            value: value.to_string(),
        })
}

#[inline]
pub(crate) fn money(minor: i64) -> Money {
    Money::from_minor(minor)
}

/// Shared setup for repository tests: an in-memory database with two
/// branches and a small catalog.
#[cfg(test)]
pub(crate) mod fixtures {
    use std::path::Path;

    use pharmacy_core::{Money, Product, UnitDefinition};

    use crate::pool::{Database, DbConfig};

    pub const BRANCH: &str = "CN01";
    pub const OTHER_BRANCH: &str = "CN02";

    pub async fn database() -> Database {
        with_branches(Database::new(DbConfig::in_memory()).await.unwrap()).await
    }

    /// A file-backed database under `dir` whose pool really holds several
    /// connections, so concurrent writers contend for the SQLite lock.
    pub async fn file_database(dir: &Path, connections: u32) -> Database {
        let config = DbConfig::new(dir.join("pharmacy.db"))
            .max_connections(connections)
            .min_connections(connections);
        with_branches(Database::new(config).await.unwrap()).await
    }

    async fn with_branches(db: Database) -> Database {
        db.stock()
            .insert_branch(BRANCH, "Chi nhánh Quận 1", "12 Lê Lợi")
            .await
            .unwrap();
        db.stock()
            .insert_branch(OTHER_BRANCH, "Chi nhánh Quận 3", "5 Võ Văn Tần")
            .await
            .unwrap();
        db
    }

    pub fn product(code: &str, price: i64) -> Product {
        Product {
            id: format!("id-{code}"),
            code: code.to_string(),
            name: format!("Sản phẩm {code}"),
            units: vec![
                UnitDefinition {
                    unit_label: "Hộp".to_string(),
                    quantity_per_unit: 1,
                    price: Money::from_minor(price),
                },
                UnitDefinition {
                    unit_label: "Lốc".to_string(),
                    quantity_per_unit: 10,
                    price: Money::from_minor(price * 10),
                },
            ],
            campaign_code: None,
            is_active: true,
        }
    }

    /// A database with `product(code, price)` inserted and stocked at [`BRANCH`].
    pub async fn with_stocked_product(code: &str, price: i64, stock: i64) -> (Database, Product) {
        let db = database().await;
        let p = product(code, price);
        db.products().insert(&p).await.unwrap();
        db.stock().set_quantity(BRANCH, code, stock).await.unwrap();
        (db, p)
    }
}
