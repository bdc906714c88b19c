//! # Stock Receipt Service
//!
//! Goods arriving at a branch: recorded as `Unapproved`, then approved
//! (stock goes up) or rejected (nothing moves). The decision is made once;
//! whoever loses a decision race gets `ALREADY_PROCESSED`, which screens
//! show as a notice.

use chrono::Utc;
use tracing::info;

use crate::error::{ApiError, ApiResult};
use crate::services::Actor;
use crate::state::AppState;
use pharmacy_core::receipt::{ReceiptFilter, ReceiptSubmission};
use pharmacy_core::{ReceiptDecision, ReceiptLine, StockReceipt};

/// Records goods received at `branch_code`, submitted by the actor.
pub async fn submit_receipt(
    app: &AppState,
    actor: &Actor,
    branch_code: &str,
    lines: Vec<ReceiptLine>,
) -> ApiResult<StockReceipt> {
    actor.require_back_office("submit stock receipts")?;

    let submission = ReceiptSubmission {
        branch_code: branch_code.trim().to_string(),
        submitted_by: actor.user_id.clone(),
        lines,
    };
    let receipt = app
        .db()
        .receipts()
        .submit(&submission, Utc::now().date_naive())
        .await?;

    info!(
        receipt_code = %receipt.code,
        branch_code = %receipt.branch_code,
        lines = receipt.lines.len(),
        by = %actor.user_id,
        "Stock receipt submitted"
    );
    Ok(receipt)
}

pub async fn get_receipt(app: &AppState, actor: &Actor, receipt_code: &str) -> ApiResult<StockReceipt> {
    actor.require_back_office("view stock receipts")?;
    app.db()
        .receipts()
        .get_by_code(receipt_code)
        .await?
        .ok_or_else(|| ApiError::not_found("StockReceipt", receipt_code))
}

/// Receipts matching `filter`, newest first.
pub async fn list_receipts(
    app: &AppState,
    actor: &Actor,
    filter: &ReceiptFilter,
) -> ApiResult<Vec<StockReceipt>> {
    actor.require_back_office("view stock receipts")?;
    Ok(app.db().receipts().list(filter).await?)
}

/// Approves or rejects an `Unapproved` receipt.
pub async fn decide_receipt(
    app: &AppState,
    actor: &Actor,
    receipt_code: &str,
    decision: ReceiptDecision,
) -> ApiResult<StockReceipt> {
    let receipt = app
        .db()
        .receipts()
        .decide(receipt_code, decision, actor.role, Utc::now())
        .await?;

    info!(
        receipt_code = %receipt.code,
        status = %receipt.status,
        by = %actor.user_id,
        "Stock receipt decided"
    );
    Ok(receipt)
}
