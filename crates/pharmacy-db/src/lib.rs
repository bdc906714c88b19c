//! # pharmacy-db: Database Layer for Pharmacy Commerce
//!
//! Persistence for the catalog, the per-branch stock ledger, stock
//! receipts, purchase orders, promotions, vouchers and saved carts.
//! SQLite through sqlx; every multi-row change runs in one transaction.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Pharmacy Commerce Data Flow                         │
//! │                                                                         │
//! │  pharmacy-commerce service (checkout, decide_receipt, ...)             │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                  pharmacy-db (THIS CRATE)                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌────────────────┐   ┌──────────────┐   │   │
//! │  │   │   Database    │    │  Repositories  │   │  Migrations  │   │   │
//! │  │   │   (pool.rs)   │    │                │   │  (embedded)  │   │   │
//! │  │   │               │    │ OrderRepo      │   │              │   │   │
//! │  │   │ SqlitePool    │◄───│ ReceiptRepo    │   │ 001_init.sql │   │   │
//! │  │   │               │    │ StockRepo ...  │   │              │   │   │
//! │  │   └───────────────┘    └────────────────┘   └──────────────┘   │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite database file                                                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Repository implementations
//!
//! ## Usage
//!
//! ```rust,ignore
//! use pharmacy_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("pharmacy.db")).await?;
//! let stock = db.stock().quantity("CN01", "PARA500").await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::cart::CartRepository;
pub use repository::order::{CommittedOrder, NewOrder, OrderRepository};
pub use repository::product::ProductRepository;
pub use repository::promotion::PromotionRepository;
pub use repository::receipt::ReceiptRepository;
pub use repository::stock::{SaleLine, StockRepository};
pub use repository::voucher::VoucherRepository;
