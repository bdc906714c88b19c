//! # Promotion Service
//!
//! Campaigns, which products they apply to, and vouchers. Everything that
//! writes is back office only.
//!
//! A product points at no more than one campaign. Assigning a product to a new
//! campaign replaces the old reference; removal only clears a reference that
//! still names the campaign being removed.

use chrono::Utc;
use tracing::info;

use crate::error::{ApiError, ApiResult};
use crate::services::Actor;
use crate::state::AppState;
use pharmacy_core::promotion::PromotionCampaign;
use pharmacy_core::voucher::Voucher;

// =============================================================================
// Campaigns
// =============================================================================

pub async fn create_campaign(
    app: &AppState,
    actor: &Actor,
    campaign: &PromotionCampaign,
) -> ApiResult<PromotionCampaign> {
    actor.require_back_office("create promotion campaigns")?;
    app.db().promotions().create(campaign).await?;
    get_campaign(app, &campaign.code).await
}

pub async fn get_campaign(app: &AppState, campaign_code: &str) -> ApiResult<PromotionCampaign> {
    let code = campaign_code.trim();
    app.db()
        .promotions()
        .get(code)
        .await?
        .ok_or_else(|| ApiError::not_found("PromotionCampaign", code))
}

/// All campaigns, newest window first.
pub async fn list_campaigns(app: &AppState, actor: &Actor) -> ApiResult<Vec<PromotionCampaign>> {
    actor.require_back_office("view promotion campaigns")?;
    Ok(app.db().promotions().list().await?)
}

/// Points every listed product at the campaign. All or nothing: an
/// unknown product id rolls the whole assignment back.
pub async fn apply_campaign(
    app: &AppState,
    actor: &Actor,
    campaign_code: &str,
    product_ids: &[String],
) -> ApiResult<u64> {
    actor.require_back_office("assign promotion campaigns")?;
    let assigned = app
        .db()
        .promotions()
        .apply_to_products(campaign_code.trim(), product_ids)
        .await?;
    info!(campaign = %campaign_code, assigned, by = %actor.user_id, "Campaign applied");
    Ok(assigned)
}

/// Clears the campaign from one product. Returns whether it was still assigned.
pub async fn remove_campaign_from_product(
    app: &AppState,
    actor: &Actor,
    campaign_code: &str,
    product_id: &str,
) -> ApiResult<bool> {
    actor.require_back_office("remove promotion campaigns")?;
    Ok(app
        .db()
        .promotions()
        .remove_from_product(campaign_code.trim(), product_id.trim())
        .await?)
}

/// Clears the campaign from each listed product still pointing at it.
pub async fn remove_campaign_from_products(
    app: &AppState,
    actor: &Actor,
    campaign_code: &str,
    product_ids: &[String],
) -> ApiResult<u64> {
    actor.require_back_office("remove promotion campaigns")?;
    let cleared = app
        .db()
        .promotions()
        .remove_all_from_campaign(campaign_code.trim(), product_ids)
        .await?;
    info!(campaign = %campaign_code, cleared, by = %actor.user_id, "Campaign removed from products");
    Ok(cleared)
}

// =============================================================================
// Vouchers
// =============================================================================

pub async fn create_voucher(app: &AppState, actor: &Actor, voucher: &Voucher) -> ApiResult<Voucher> {
    actor.require_back_office("create vouchers")?;
    app.db().vouchers().create(voucher).await?;
    app.db()
        .vouchers()
        .get(&voucher.code)
        .await?
        .ok_or_else(|| ApiError::internal(format!("Voucher {} vanished after insert", voucher.code)))
}

/// Looks up a voucher a customer typed in and checks it can be used today.
pub async fn check_voucher(app: &AppState, code: &str) -> ApiResult<Voucher> {
    let code = code.trim();
    let voucher = app
        .db()
        .vouchers()
        .get(code)
        .await?
        .ok_or_else(|| ApiError::not_found("Voucher", code))?;
    voucher.ensure_redeemable(Utc::now().date_naive())?;
    Ok(voucher)
}
