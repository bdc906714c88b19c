//! # Point-of-Sale Service
//!
//! Counter sales at a branch. This is the only path that takes stock away;
//! online orders never do.

use tracing::info;

use crate::error::ApiResult;
use crate::services::Actor;
use crate::state::AppState;
use pharmacy_db::SaleLine;

/// Decrements branch stock for a counter sale. All lines or none.
pub async fn record_sale(
    app: &AppState,
    actor: &Actor,
    branch_code: &str,
    lines: &[SaleLine],
) -> ApiResult<()> {
    actor.require_back_office("record counter sales")?;
    let branch_code = branch_code.trim();
    app.db().stock().record_sale(branch_code, lines).await?;

    info!(
        branch_code = %branch_code,
        lines = lines.len(),
        by = %actor.user_id,
        "Counter sale recorded"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::services::fixtures::{self, BRANCH};

    fn sale(product_code: &str, quantity: i64) -> SaleLine {
        SaleLine {
            product_code: product_code.to_string(),
            unit_label: "Hộp".to_string(),
            quantity,
        }
    }

    #[tokio::test]
    async fn test_sale_decrements_stock() {
        let app = fixtures::app().await;
        fixtures::stocked(&app, "PARA-500", 100_000, 5).await;

        record_sale(&app, &Actor::staff("s1"), BRANCH, &[sale("PARA-500", 2), sale("PARA-500", 1)])
            .await
            .unwrap();
        assert_eq!(app.db().stock().quantity(BRANCH, "PARA-500").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_pack_sale_counts_every_box() {
        let app = fixtures::app().await;
        fixtures::stocked(&app, "PARA-500", 100_000, 12).await;
        let pack = SaleLine {
            unit_label: "Lốc".to_string(),
            ..sale("PARA-500", 1)
        };

        record_sale(&app, &Actor::staff("s1"), BRANCH, &[pack.clone(), sale("PARA-500", 1)])
            .await
            .unwrap();
        assert_eq!(app.db().stock().quantity(BRANCH, "PARA-500").await.unwrap(), 1);

        let err = record_sale(&app, &Actor::staff("s1"), BRANCH, &[pack])
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::InsufficientStock);
    }

    #[tokio::test]
    async fn test_oversell_changes_nothing() {
        let app = fixtures::app().await;
        fixtures::stocked(&app, "PARA-500", 100_000, 5).await;
        fixtures::stocked(&app, "AMOX-500", 120_000, 1).await;

        let err = record_sale(
            &app,
            &Actor::staff("s1"),
            BRANCH,
            &[sale("PARA-500", 2), sale("AMOX-500", 2)],
        )
        .await
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::InsufficientStock);
        assert_eq!(app.db().stock().quantity(BRANCH, "PARA-500").await.unwrap(), 5);
        assert_eq!(app.db().stock().quantity(BRANCH, "AMOX-500").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_customers_cannot_sell() {
        let app = fixtures::app().await;
        fixtures::stocked(&app, "PARA-500", 100_000, 5).await;

        let err = record_sale(&app, &Actor::customer("u1"), BRANCH, &[sale("PARA-500", 1)])
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::Forbidden);
    }
}
