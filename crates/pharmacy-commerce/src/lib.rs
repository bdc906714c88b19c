//! # pharmacy-commerce: Storefront and Back-Office Services
//!
//! The operations a transport layer (HTTP handlers, desktop commands)
//! calls. Each one validates who is asking, delegates rules to
//! `pharmacy-core` and transactions to `pharmacy-db`, and returns an
//! [`ApiResult`] whose error carries a stable machine-readable code.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Pharmacy Commerce Request Flow                      │
//! │                                                                         │
//! │  transport (route handler / command)                                   │
//! │       │  &AppState, &CartState, Actor                                   │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │               pharmacy-commerce (THIS CRATE)                    │   │
//! │  │                                                                 │   │
//! │  │   services::{catalog, cart, checkout, orders,                   │   │
//! │  │              receipts, promotions, sales}                       │   │
//! │  │        │                  │                     │               │   │
//! │  │        ▼                  ▼                     ▼               │   │
//! │  │   CommerceConfig     PaymentGateway         ApiError            │   │
//! │  │   (env > TOML >      (redirect URL)         (code + message)    │   │
//! │  │    defaults)                                                    │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                   │                             │
//! │       ▼                                   ▼                             │
//! │  pharmacy-core (pricing, cart,       pharmacy-db (SQLite, one           │
//! │  lifecycle rules)                    transaction per change)            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use pharmacy_commerce::{init_tracing, AppState, CartState, CommerceConfig};
//! use pharmacy_commerce::services::cart;
//!
//! init_tracing();
//! let app = AppState::open(CommerceConfig::load()?).await?;
//! let cart_state = CartState::new("CN01");
//! cart::add_to_cart(&app, &cart_state, &product_id, "Hộp", 2).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod error;
pub mod gateway;
pub mod services;
pub mod state;

// =============================================================================
// Re-exports
// =============================================================================

pub use config::{CommerceConfig, ConfigError};
pub use error::{ApiError, ApiResult, ErrorCode};
pub use gateway::{PaymentGateway, RedirectGateway};
pub use services::Actor;
pub use state::{AppState, CartState};

use thiserror::Error;
use tracing_subscriber::EnvFilter;

use pharmacy_db::DbError;

/// Why the service layer could not start.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] DbError),
}

/// Installs the global fmt subscriber.
///
/// ## Log Levels
/// - `RUST_LOG=debug` - Show debug messages
/// - `RUST_LOG=pharmacy_db=trace` - Trace the database layer only
/// - Default: INFO, with DEBUG for the pharmacy crates
///
/// Returns false if a subscriber was already installed.
pub fn init_tracing() -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,pharmacy=debug,sqlx=warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .is_ok()
}
