use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::api::AppState;
use crate::domain::Amount;
use crate::engine::settle_deposit;
use crate::error::AppError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepositRequest {
    pub holder: String,
    pub amount: Amount,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DepositResponse {
    pub vault_id: String,
    pub holder: String,
    pub fee: Amount,
    pub net_amount: Amount,
    pub shares_minted: Amount,
    pub holder_shares: Amount,
    pub vault_cash: Amount,
    pub vault_total_shares: Amount,
}

pub async fn create_deposit(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Json(body): Json<DepositRequest>,
) -> Result<Json<DepositResponse>, AppError> {
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

    let outcome = settle_deposit(&vault, body.amount)?;

    vault.cash = outcome.new_cash;
    vault.total_shares = outcome.new_total_shares;
    vault.high_water_mark = outcome.new_high_water_mark;

    let holder_shares = state
        .repo
        .get_holding(vault.id, holder)
        .await?
        .checked_add(outcome.shares_minted)?;

    state.repo.update_vault(&vault).await?;
    state.repo.set_holding(vault.id, holder, holder_shares).await?;

    info!(
        vault_id = %vault.id,
        holder,
        amount = %body.amount,
        shares_minted = %outcome.shares_minted,
        "deposit settled"
    );

    Ok(Json(DepositResponse {
        vault_id: vault.id.to_string(),
        holder: holder.to_string(),
        fee: outcome.fee,
        net_amount: outcome.net_amount,
        shares_minted: outcome.shares_minted,
        holder_shares,
        vault_cash: vault.cash,
        vault_total_shares: vault.total_shares,
    }))
}
