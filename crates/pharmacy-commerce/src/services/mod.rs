//! # Services
//!
//! The operations a transport layer exposes, one module per screen family.
//!
//! ```text
//! ┌──────────────┬──────────────────────────────────────────┬──────────────┐
//! │ Module       │ Operations                               │ Who          │
//! ├──────────────┼──────────────────────────────────────────┼──────────────┤
//! │ catalog      │ search, product details, branch stock    │ anyone       │
//! │ cart         │ add, set quantity, remove, clear, sign in│ customer     │
//! │ checkout     │ preview, checkout, retry payment         │ customer     │
//! │ orders       │ get, list own, update status, cancel     │ both         │
//! │ receipts     │ submit, list, decide                     │ staff, admin │
//! │ promotions   │ campaigns, assignment, vouchers          │ staff, admin │
//! │ sales        │ point-of-sale stock decrement            │ staff, admin │
//! └──────────────┴──────────────────────────────────────────┴──────────────┘
//! ```
//!
//! Every function takes `&AppState` plus whatever per-visitor state it
//! needs, and returns [`ApiResult`](crate::error::ApiResult).

pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod orders;
pub mod promotions;
pub mod receipts;
pub mod sales;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::ApiResult;
use pharmacy_core::{ActorRole, CoreError};

/// The authenticated person behind a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Actor {
    pub user_id: String,
    pub role: ActorRole,
}

impl Actor {
    pub fn customer(user_id: impl Into<String>) -> Self {
        Actor {
            user_id: user_id.into(),
            role: ActorRole::Customer,
        }
    }

    pub fn staff(user_id: impl Into<String>) -> Self {
        Actor {
            user_id: user_id.into(),
            role: ActorRole::Staff,
        }
    }

    pub fn admin(user_id: impl Into<String>) -> Self {
        Actor {
            user_id: user_id.into(),
            role: ActorRole::Admin,
        }
    }

    /// Refuses customers.
    pub(crate) fn require_back_office(&self, action: &str) -> ApiResult<()> {
        if self.role.is_back_office() {
            Ok(())
        } else {
            Err(CoreError::forbidden(action, self.role).into())
        }
    }
}

/// Shared setup for service tests.
#[cfg(test)]
pub(crate) mod fixtures {
    use std::sync::Arc;

    use chrono::{Duration, Utc};

    use crate::config::CommerceConfig;
    use crate::gateway::{PaymentGateway, RedirectGateway, UnreachableGateway};
    use crate::state::AppState;
    use pharmacy_core::order::{DeliveryDetails, OrderRequest};
    use pharmacy_core::promotion::PromotionCampaign;
    use pharmacy_core::voucher::{Voucher, VoucherKind};
    use pharmacy_core::{Money, PaymentMethod, Percent, Product, ReceivingMethod, UnitDefinition};
    use pharmacy_db::{Database, DbConfig};

    pub const BRANCH: &str = "CN01";

    async fn database() -> Database {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.stock()
            .insert_branch(BRANCH, "Chi nhánh Quận 1", "12 Lê Lợi")
            .await
            .unwrap();
        db
    }

    fn state_with(db: Database, gateway: Arc<dyn PaymentGateway>) -> AppState {
        AppState::new(db, CommerceConfig::default(), gateway)
    }

    /// In-memory state with the default redirect gateway.
    pub async fn app() -> AppState {
        let gateway = RedirectGateway::from_config(&CommerceConfig::default()).unwrap();
        state_with(database().await, Arc::new(gateway))
    }

    /// In-memory state whose payment gateway always fails.
    pub async fn app_with_broken_gateway() -> AppState {
        state_with(database().await, Arc::new(UnreachableGateway))
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

    /// Inserts `product(code, price)` and stocks it at [`BRANCH`].
    pub async fn stocked(app: &AppState, code: &str, price: i64, stock: i64) -> Product {
        let p = product(code, price);
        app.db().products().insert(&p).await.unwrap();
        app.db().stock().set_quantity(BRANCH, code, stock).await.unwrap();
        p
    }

    /// A campaign running from yesterday for a month.
    pub async fn running_campaign(app: &AppState, code: &str, percent: u8) -> PromotionCampaign {
        let today = Utc::now().date_naive();
        let campaign = PromotionCampaign {
            code: code.to_string(),
            name: format!("Campaign {code}"),
            percent: Percent::new(percent).unwrap(),
            unit_label: None,
            starts_on: today - Duration::days(1),
            ends_on: today + Duration::days(30),
        };
        app.db().promotions().create(&campaign).await.unwrap();
        campaign
    }

    pub async fn fixed_voucher(app: &AppState, code: &str, amount: i64, remaining: i64) -> Voucher {
        let voucher = Voucher {
            code: code.to_string(),
            kind: VoucherKind::Fixed(Money::from_minor(amount)),
            remaining,
            expires_on: Utc::now().date_naive() + Duration::days(30),
        };
        app.db().vouchers().create(&voucher).await.unwrap();
        voucher
    }

    pub fn pickup(payment: PaymentMethod, voucher: Option<&str>) -> OrderRequest {
        OrderRequest {
            payment_method: payment,
            receiving_method: ReceivingMethod::BranchPickup,
            voucher_code: voucher.map(str::to_string),
            branch_code: BRANCH.to_string(),
            delivery: DeliveryDetails {
                recipient_name: "Nguyễn Văn A".to_string(),
                recipient_phone: "0901234567".to_string(),
                recipient_address: String::new(),
                window: None,
            },
        }
    }

    pub fn home_delivery(payment: PaymentMethod) -> OrderRequest {
        OrderRequest {
            receiving_method: ReceivingMethod::Delivery,
            delivery: DeliveryDetails {
                recipient_name: "Trần Thị B".to_string(),
                recipient_phone: "0912345678".to_string(),
                recipient_address: "5 Võ Văn Tần, Quận 3".to_string(),
                window: None,
            },
            ..pickup(payment, None)
        }
    }
}
