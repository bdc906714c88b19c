//! # Commerce Configuration
//!
//! Settings loaded once at startup.
//!
//! ## Configuration Sources (Priority Order)
//! 1. Environment variables (`PHARMACY_*`)
//! 2. Config file (TOML, path in `PHARMACY_CONFIG`)
//! 3. Defaults (this file)
//!
//! ## Thread Safety
//! Configuration is read-only after initialization and shared through
//! `Arc`, so no mutex is needed.
//!
//! ## Example File
//! ```toml
//! database_path = "/var/lib/pharmacy/pharmacy.db"
//! storefront_discount_percent = 20
//! delivery_shipping_fee = 30000
//! payment_gateway_url = "https://pay.local/checkout"
//! payment_return_url = "https://shop.local/orders/return"
//! ```

use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use pharmacy_core::pricing::{DirectDiscount, PricingEngine};
use pharmacy_core::{Money, Percent, STOREFRONT_DISCOUNT_PERCENT};

/// Environment variable naming the optional TOML file.
pub const CONFIG_PATH_VAR: &str = "PHARMACY_CONFIG";

/// Commerce configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommerceConfig {
    /// SQLite database file.
    pub database_path: PathBuf,

    /// Flat discount shown on the cart page.
    /// Default: 20%
    pub storefront_discount_percent: Percent,

    /// Shipping fee charged for home delivery; pickup is always free.
    /// Default: 30.000đ
    pub delivery_shipping_fee: Money,

    /// Payment gateway page that bank-transfer orders are sent to.
    pub payment_gateway_url: String,

    /// Where the gateway sends the customer back after paying.
    pub payment_return_url: String,

    /// Currency symbol (for display)
    pub currency_symbol: String,
}

impl Default for CommerceConfig {
    /// Returns defaults suitable for local development.
    fn default() -> Self {
        CommerceConfig {
            database_path: PathBuf::from("./pharmacy_dev.db"),
            storefront_discount_percent: Percent::new(STOREFRONT_DISCOUNT_PERCENT)
                .unwrap_or_else(|_| Percent::zero()),
            delivery_shipping_fee: Money::from_minor(30_000),
            payment_gateway_url: "http://localhost:8088/payment".to_string(),
            payment_return_url: "http://localhost:3000/orders/payment-return".to_string(),
            currency_symbol: "₫".to_string(),
        }
    }
}

impl CommerceConfig {
    /// Loads configuration from the process environment and the optional
    /// file named by `PHARMACY_CONFIG`.
    pub fn load() -> Result<Self, ConfigError> {
        let file = match std::env::var(CONFIG_PATH_VAR) {
            Ok(path) => Some(read_file(Path::new(&path))?),
            Err(_) => None,
        };
        Self::from_sources(file.as_deref(), |key| std::env::var(key).ok())
    }

    /// Builds configuration from file contents and an environment lookup.
    ///
    /// Environment values win over the file; the file wins over defaults.
    pub fn from_sources<F>(file: Option<&str>, env: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match file {
            Some(text) => toml::from_str::<CommerceConfig>(text)?,
            None => CommerceConfig::default(),
        };

        if let Some(path) = env("PHARMACY_DATABASE_PATH") {
            config.database_path = PathBuf::from(path);
        }

        if let Some(raw) = env("PHARMACY_STOREFRONT_DISCOUNT_PERCENT") {
            let value: u8 = parse_var("PHARMACY_STOREFRONT_DISCOUNT_PERCENT", &raw)?;
            config.storefront_discount_percent =
                Percent::new(value).map_err(|_| ConfigError::InvalidValue {
                    key: "PHARMACY_STOREFRONT_DISCOUNT_PERCENT".to_string(),
                    value: raw.clone(),
                })?;
        }

        if let Some(raw) = env("PHARMACY_DELIVERY_SHIPPING_FEE") {
            let fee: i64 = parse_var("PHARMACY_DELIVERY_SHIPPING_FEE", &raw)?;
            config.delivery_shipping_fee = Money::from_minor(fee);
        }

        if let Some(url) = env("PHARMACY_PAYMENT_GATEWAY_URL") {
            config.payment_gateway_url = url;
        }

        if let Some(url) = env("PHARMACY_PAYMENT_RETURN_URL") {
            config.payment_return_url = url;
        }

        if let Some(symbol) = env("PHARMACY_CURRENCY_SYMBOL") {
            config.currency_symbol = symbol;
        }

        config.validate()?;
        debug!(
            database_path = %config.database_path.display(),
            storefront_discount = %config.storefront_discount_percent,
            delivery_shipping_fee = %config.delivery_shipping_fee,
            "Configuration loaded"
        );
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.delivery_shipping_fee.is_negative() {
            return Err(ConfigError::InvalidValue {
                key: "delivery_shipping_fee".to_string(),
                value: self.delivery_shipping_fee.minor().to_string(),
            });
        }
        if self.payment_gateway_url.trim().is_empty() {
            return Err(ConfigError::MissingRequired("payment_gateway_url".to_string()));
        }
        Ok(())
    }

    /// Engine for the cart page: the flat storefront discount.
    pub fn cart_page_engine(&self) -> PricingEngine {
        PricingEngine::new(DirectDiscount::FlatStorefront(self.storefront_discount_percent))
    }

    /// Engine for checkout: each line's own campaign percentage.
    pub fn checkout_engine(&self) -> PricingEngine {
        PricingEngine::new(DirectDiscount::LinePromotion)
    }
}

fn read_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn parse_var<T: FromStr>(key: &str, raw: &str) -> Result<T, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value: raw.to_string(),
    })
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value:?}")]
    InvalidValue { key: String, value: String },

    #[error("Missing required configuration: {0}")]
    MissingRequired(String),

    #[error("Cannot read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config file: {0}")]
    Parse(#[from] toml::de::Error),
}
