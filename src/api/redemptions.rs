use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::api::AppState;
use crate::domain::Amount;
use crate::engine::redeem_closed;
use crate::error::{AppError, LedgerError};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RedemptionRequestBody {
    pub holder: String,
    pub shares: Amount,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RedemptionResponse {
    pub vault_id: String,
    pub holder: String,
    pub payout: Amount,
    pub perf_fee_charged: Amount,
    pub holder_shares: Amount,
    pub vault_cash: Amount,
    pub vault_total_shares: Amount,
}

pub async fn create_redemption(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Json(body): Json<RedemptionRequestBody>,
) -> Result<Json<RedemptionResponse>, AppError> {
    if body.holder.trim().is_empty() {
        return Err(AppError::BadRequest("holder must not be empty".into()));
    }
    let holder = body.holder.trim();

    let _guard = state.write_lock.lock().await;

    let mut vault = state
        .repo
        .get_vault(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("vault {}", id)))?;

    let holder_shares = state.repo.get_holding(vault.id, holder).await?;
    if body.shares > holder_shares {
        return Err(LedgerError::InsufficientShares.into());
    }

    let outcome = redeem_closed(&vault, body.shares)?;

    vault.cash = outcome.new_cash;
    vault.total_shares = outcome.new_total_shares;
    vault.perf_fee_paid = outcome.perf_fee_paid;

    let remaining = holder_shares.checked_sub(body.shares)?;
    state.repo.update_vault(&vault).await?;
    state.repo.set_holding(vault.id, holder, remaining).await?;

    info!(
        vault_id = %vault.id,
        holder,
        shares = %body.shares,
        payout = %outcome.payout,
        perf_fee_charged = %outcome.perf_fee_charged,
        "closed-stage redemption settled"
    );

    Ok(Json(RedemptionResponse {
        vault_id: vault.id.to_string(),
        holder: holder.to_string(),
        payout: outcome.payout,
        perf_fee_charged: outcome.perf_fee_charged,
        holder_shares: remaining,
        vault_cash: vault.cash,
        vault_total_shares: vault.total_shares,
    }))
}
