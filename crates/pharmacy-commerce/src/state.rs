//! # Application State
//!
//! What every service call needs, split the same way the screens use it.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    State Architecture                                   │
//! │                                                                         │
//! │  ┌──────────────────────────────┐      ┌──────────────────────────┐    │
//! │  │          AppState            │      │        CartState         │    │
//! │  │  (one per process, Clone)    │      │  (one per visitor)       │    │
//! │  │                              │      │                          │    │
//! │  │  Database (SQLite pool)      │      │  Arc<Mutex<Cart>>        │    │
//! │  │  Arc<CommerceConfig>         │      │  + chosen branch         │    │
//! │  │  Arc<dyn PaymentGateway>     │      │                          │    │
//! │  └──────────────────────────────┘      └──────────────────────────┘    │
//! │                                                                         │
//! │  THREAD SAFETY:                                                        │
//! │  • Database: internal connection pool (thread-safe)                    │
//! │  • Config: read-only after startup                                     │
//! │  • Cart: tokio Mutex, held across the save so saves never interleave   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;

use tokio::sync::{Mutex, MutexGuard};
use tracing::info;

use crate::config::CommerceConfig;
use crate::gateway::{PaymentGateway, RedirectGateway};
use crate::StartupError;
use pharmacy_core::cart::Cart;
use pharmacy_db::{Database, DbConfig};

// =============================================================================
// AppState
// =============================================================================

/// Process-wide state shared by every request.
#[derive(Debug, Clone)]
pub struct AppState {
    db: Database,
    config: Arc<CommerceConfig>,
    gateway: Arc<dyn PaymentGateway>,
}

impl AppState {
    pub fn new(db: Database, config: CommerceConfig, gateway: Arc<dyn PaymentGateway>) -> Self {
        AppState {
            db,
            config: Arc::new(config),
            gateway,
        }
    }

    /// Opens the configured database (running migrations) and builds the
    /// redirect gateway from config.
    pub async fn open(config: CommerceConfig) -> Result<Self, StartupError> {
        let gateway = RedirectGateway::from_config(&config)?;
        let db = Database::new(DbConfig::new(&config.database_path)).await?;
        info!(database_path = %config.database_path.display(), "Commerce state ready");
        Ok(AppState::new(db, config, Arc::new(gateway)))
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    pub fn config(&self) -> &CommerceConfig {
        &self.config
    }

    pub fn gateway(&self) -> &dyn PaymentGateway {
        self.gateway.as_ref()
    }
}

// =============================================================================
// CartState
// =============================================================================

/// One visitor's cart and the branch it is being filled from.
///
/// Cloning shares the same cart.
#[derive(Debug, Clone)]
pub struct CartState {
    cart: Arc<Mutex<Cart>>,
    branch_code: Arc<str>,
}

impl CartState {
    /// An empty anonymous cart shopping at `branch_code`.
    pub fn new(branch_code: &str) -> Self {
        CartState::with_cart(Cart::anonymous(), branch_code)
    }

    pub fn with_cart(cart: Cart, branch_code: &str) -> Self {
        CartState {
            cart: Arc::new(Mutex::new(cart)),
            branch_code: Arc::from(branch_code.trim()),
        }
    }

    /// Branch whose stock the cart is checked against.
    pub fn branch_code(&self) -> &str {
        &self.branch_code
    }

    /// Exclusive access to the cart; hold it across a save.
    pub async fn lock(&self) -> MutexGuard<'_, Cart> {
        self.cart.lock().await
    }

    /// Reads the cart under the lock.
    ///
    /// ```rust,ignore
    /// let lines = cart_state.read(|cart| cart.line_count()).await;
    /// ```
    pub async fn read<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&Cart) -> R,
    {
        let cart = self.cart.lock().await;
        f(&cart)
    }
}
