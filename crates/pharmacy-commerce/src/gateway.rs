//! # Payment Gateway
//!
//! Bank-transfer orders are handed to an external payment page. The
//! gateway only builds the redirect; confirmation comes back through a
//! separate callback and never through this trait.
//!
//! ```text
//! checkout (BankTransfer)
//!      │  order + delivery committed, status Pending
//!      ▼
//! PaymentGateway::create_payment_redirect(order_code, amount)
//!      │
//!      ├── Ok(url)  ──► NextStep::RedirectToPayment { url }
//!      └── Err(_)   ──► UpstreamFailure naming the order (still Pending)
//! ```

use std::fmt;

use async_trait::async_trait;
use url::Url;

use crate::config::{CommerceConfig, ConfigError};
use pharmacy_core::{CoreError, CoreResult, Money};

/// External payment collaborator.
#[async_trait]
pub trait PaymentGateway: Send + Sync + fmt::Debug {
    /// Returns the URL the customer must be sent to in order to pay
    /// `amount` for `order_code`. Does not change any order.
    async fn create_payment_redirect(&self, order_code: &str, amount: Money) -> CoreResult<String>;
}

/// Builds redirect URLs against the configured gateway page.
///
/// The same order and amount always produce the same URL.
#[derive(Debug, Clone)]
pub struct RedirectGateway {
    gateway: Url,
    return_url: String,
}

impl RedirectGateway {
    pub fn new(gateway_url: &str, return_url: impl Into<String>) -> Result<Self, ConfigError> {
        let gateway = Url::parse(gateway_url).map_err(|_| ConfigError::InvalidValue {
            key: "payment_gateway_url".to_string(),
            value: gateway_url.to_string(),
        })?;
        Ok(RedirectGateway {
            gateway,
            return_url: return_url.into(),
        })
    }

    pub fn from_config(config: &CommerceConfig) -> Result<Self, ConfigError> {
        RedirectGateway::new(&config.payment_gateway_url, config.payment_return_url.clone())
    }
}

#[async_trait]
impl PaymentGateway for RedirectGateway {
    async fn create_payment_redirect(&self, order_code: &str, amount: Money) -> CoreResult<String> {
        if order_code.trim().is_empty() {
            return Err(CoreError::upstream("payment gateway", "order code is empty"));
        }
        let mut url = self.gateway.clone();
        url.query_pairs_mut()
            .append_pair("orderCode", order_code)
            .append_pair("amount", &amount.minor().to_string())
            .append_pair("returnUrl", &self.return_url);
        Ok(url.into())
    }
}

/// Gateway that always fails, for exercising the post-commit failure path.
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct UnreachableGateway;

#[cfg(test)]
#[async_trait]
impl PaymentGateway for UnreachableGateway {
    async fn create_payment_redirect(&self, _order_code: &str, _amount: Money) -> CoreResult<String> {
        Err(CoreError::upstream("payment gateway", "connection refused"))
    }
}
