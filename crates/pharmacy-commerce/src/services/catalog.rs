//! # Catalog Reads
//!
//! Products with their units, the campaign they are assigned to, and the
//! price each unit actually sells for today.

use chrono::{NaiveDate, Utc};
use serde::Serialize;
use tracing::debug;
use ts_rs::TS;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use pharmacy_core::promotion::{effective_percent, PromotionCampaign};
use pharmacy_core::{BranchStock, Money, Percent, Product};

/// Maximum rows a search returns.
const MAX_SEARCH_RESULTS: u32 = 50;

/// What one unit of a product costs today.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, TS)]
#[ts(export)]
pub struct UnitPrice {
    pub unit_label: String,
    pub base_price: Money,
    /// Running campaign discount for this unit, if any.
    pub promotion: Option<Percent>,
    pub effective_price: Money,
}

/// A product page.
#[derive(Debug, Clone, Serialize, TS)]
#[ts(export)]
pub struct ProductDetails {
    pub product: Product,
    pub campaign: Option<PromotionCampaign>,
    pub unit_prices: Vec<UnitPrice>,
}

/// Prices every unit of `product` against `campaign` on `today`.
pub fn unit_prices(
    product: &Product,
    campaign: Option<&PromotionCampaign>,
    today: NaiveDate,
) -> Vec<UnitPrice> {
    product
        .units
        .iter()
        .map(|unit| {
            let promotion = effective_percent(product, campaign, &unit.unit_label, today);
            let discount = promotion
                .map(|pct| unit.price.percentage(pct))
                .unwrap_or_default();
            UnitPrice {
                unit_label: unit.unit_label.clone(),
                base_price: unit.price,
                promotion,
                effective_price: unit.price - discount,
            }
        })
        .collect()
}

/// Loads an active product with its campaign and today's unit prices.
pub async fn product_details(app: &AppState, product_id: &str) -> ApiResult<ProductDetails> {
    debug!(product_id = %product_id, "product_details");

    let product = app
        .db()
        .products()
        .get_by_id(product_id)
        .await?
        .filter(|p| p.is_active)
        .ok_or_else(|| ApiError::not_found("Product", product_id))?;

    let campaign = app.db().promotions().campaign_for_product(&product.id).await?;
    let unit_prices = unit_prices(&product, campaign.as_ref(), Utc::now().date_naive());

    Ok(ProductDetails {
        product,
        campaign,
        unit_prices,
    })
}

/// Searches active products by code or name.
pub async fn search_products(app: &AppState, query: &str, limit: u32) -> ApiResult<Vec<Product>> {
    let limit = limit.clamp(1, MAX_SEARCH_RESULTS);
    debug!(query = %query, limit, "search_products");
    Ok(app.db().products().search(query, limit).await?)
}

/// Stock on hand at one branch.
pub async fn branch_stock(app: &AppState, branch_code: &str) -> ApiResult<Vec<BranchStock>> {
    app.db()
        .stock()
        .get_branch(branch_code)
        .await?
        .ok_or_else(|| ApiError::not_found("Branch", branch_code))?;
    Ok(app.db().stock().list_for_branch(branch_code).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::services::fixtures::{self, BRANCH};

    #[tokio::test]
    async fn test_product_details_show_campaign_price() {
        let app = fixtures::app().await;
        let product = fixtures::stocked(&app, "PARA-500", 100_000, 5).await;
        fixtures::running_campaign(&app, "KM-HE", 20).await;
        app.db()
            .promotions()
            .apply_to_products("KM-HE", &[product.id.clone()])
            .await
            .unwrap();

        let details = product_details(&app, &product.id).await.unwrap();
        assert_eq!(details.campaign.as_ref().map(|c| c.code.as_str()), Some("KM-HE"));

        let box_price = &details.unit_prices[0];
        assert_eq!(box_price.unit_label, "Hộp");
        assert_eq!(box_price.base_price.minor(), 100_000);
        assert_eq!(box_price.effective_price.minor(), 80_000);

        let pack_price = &details.unit_prices[1];
        assert_eq!(pack_price.unit_label, "Lốc");
        assert_eq!(pack_price.effective_price.minor(), 800_000);
    }

    #[tokio::test]
    async fn test_product_without_campaign_sells_at_base_price() {
        let app = fixtures::app().await;
        let product = fixtures::stocked(&app, "ORS-245", 30_000, 5).await;

        let details = product_details(&app, &product.id).await.unwrap();
        assert!(details.campaign.is_none());
        assert!(details.unit_prices.iter().all(|u| u.promotion.is_none()));
        assert_eq!(details.unit_prices[0].effective_price.minor(), 30_000);
    }

    #[tokio::test]
    async fn test_inactive_product_is_not_found() {
        let app = fixtures::app().await;
        let product = fixtures::stocked(&app, "AMOX-500", 120_000, 5).await;
        app.db().products().set_active(&product.id, false).await.unwrap();

        let err = product_details(&app, &product.id).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::NotFound);
    }

    #[tokio::test]
    async fn test_branch_stock_lists_products() {
        let app = fixtures::app().await;
        fixtures::stocked(&app, "PARA-500", 100_000, 7).await;

        let stock = branch_stock(&app, BRANCH).await.unwrap();
        assert_eq!(stock.len(), 1);
        assert_eq!(stock[0].quantity, 7);

        let err = branch_stock(&app, "CN99").await.unwrap_err();
        assert_eq!(err.code, ErrorCode::NotFound);
    }
}
