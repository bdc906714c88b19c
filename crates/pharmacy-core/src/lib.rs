//! # pharmacy-core: Pure Business Logic for the Pharmacy Storefront
//!
//! This crate holds the order fulfillment and inventory reconciliation rules
//! as pure functions and plain data types. Nothing in here touches a database,
//! a socket, or the clock of its own accord.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Pharmacy Commerce Architecture                     │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │              Storefront / Branch staff / Admin screens          │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                 pharmacy-commerce (services)                    │   │
//! │  │    cart, checkout, order status, receipts, promotions          │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │              ★ pharmacy-core (THIS CRATE) ★                     │   │
//! │  │                                                                 │   │
//! │  │   ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌─────────┐ │   │
//! │  │   │ pricing │ │  cart   │ │  order  │ │ receipt │ │promotion│ │   │
//! │  │   └─────────┘ └─────────┘ └─────────┘ └─────────┘ └─────────┘ │   │
//! │  │   ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌──────────┐            │   │
//! │  │   │  money  │ │ voucher │ │inventory│ │validation│            │   │
//! │  │   └─────────┘ └─────────┘ └─────────┘ └──────────┘            │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                 pharmacy-db (Database Layer)                    │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`money`] - Integer money and percentages
//! - [`types`] - Catalog, role and payment types
//! - [`pricing`] - Subtotal / discount / voucher / shipping computation
//! - [`cart`] - The customer's cart aggregate
//! - [`inventory`] - Stock clamping and shortfall detection
//! - [`order`] - Purchase orders, delivery records, order status lifecycle
//! - [`receipt`] - Stock receipts and their one-shot approval decision
//! - [`promotion`] - Campaign windows and product assignment rules
//! - [`voucher`] - Order-level voucher rules
//! - [`validation`] - Input validation
//! - [`error`] - Domain error types
//!
//! ## Example Usage
//!
//! ```rust
//! use pharmacy_core::money::{Money, Percent};
//! use pharmacy_core::pricing::{DirectDiscount, PricedLine, PricingEngine};
//!
//! let lines = vec![PricedLine::new(Money::from_minor(100_000), 2)
//!     .with_promotion(Percent::new(20).unwrap())];
//!
//! let totals = PricingEngine::new(DirectDiscount::LinePromotion)
//!     .price(&lines, None, Money::zero());
//!
//! assert_eq!(totals.subtotal.minor(), 200_000);
//! assert_eq!(totals.direct_discount.minor(), 40_000);
//! assert_eq!(totals.final_total.minor(), 160_000);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod cart;
pub mod error;
pub mod inventory;
pub mod money;
pub mod order;
pub mod pricing;
pub mod promotion;
pub mod receipt;
pub mod types;
pub mod validation;
pub mod voucher;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use money::{Money, Percent};
pub use order::{DeliveryRecord, OrderLine, OrderStatus, PurchaseOrder};
pub use receipt::{ReceiptDecision, ReceiptLine, ReceiptStatus, StockReceipt};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum distinct (product, unit) lines allowed in a single cart.
pub const MAX_CART_LINES: usize = 100;

/// Maximum quantity of a single cart or order line.
///
/// Guards against typing 1000 instead of 10.
pub const MAX_LINE_QUANTITY: i64 = 999;

/// Highest unit price the catalog accepts, in đồng.
///
/// With [`MAX_LINE_QUANTITY`] and [`MAX_CART_LINES`] this keeps every order
/// total two orders of magnitude below `i64::MAX`.
pub const MAX_UNIT_PRICE: i64 = 1_000_000_000_000;

/// Largest pack a selling unit may hold, in base units.
pub const MAX_QUANTITY_PER_UNIT: i64 = 100_000;

/// Flat discount applied on the cart page, independent of any campaign.
pub const STOREFRONT_DISCOUNT_PERCENT: u8 = 20;

/// Voucher column value for an order placed without a voucher.
pub const NO_VOUCHER: &str = "NONE";
