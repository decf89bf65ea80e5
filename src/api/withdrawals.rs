use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::api::AppState;
use crate::domain::{Amount, RedemptionRequest, RequestKind};
use crate::error::{AppError, LedgerError};
use crate::engine::{cancel_request, request_withdrawal, withdraw_open};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawalRequestBody {
    pub holder: String,
    pub shares: Amount,
    #[serde(default = "default_kind")]
    pub kind: RequestKind,
}

fn default_kind() -> RequestKind {
    RequestKind::Cash
}

pub async fn create_withdrawal(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Json(body): Json<WithdrawalRequestBody>,
) -> Result<Json<RedemptionRequest>, AppError> {
    if body.holder.trim().is_empty() {
        return Err(AppError::BadRequest("holder must not be empty".into()));
    }
    let holder = body.holder.trim();

    let _guard = state.write_lock.lock().await;

    let vault = state
        .repo
        .get_vault(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("vault {}", id)))?;

    let holder_shares = state.repo.get_holding(vault.id, holder).await?;
    let request = request_withdrawal(&vault, holder, holder_shares, body.shares, body.kind)?;

    // Escrow: the shares leave the holder's active balance and live in the
    // request record until settled or cancelled.
    let remaining = holder_shares.checked_sub(body.shares)?;
    state.repo.insert_request(&request).await?;
    state.repo.set_holding(vault.id, holder, remaining).await?;

    info!(
        vault_id = %vault.id,
        request_id = %request.id,
        holder,
        shares = %body.shares,
        kind = %body.kind,
        "withdrawal requested"
    );

    Ok(Json(request))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenWithdrawalBody {
    pub holder: String,
    pub shares: Amount,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenWithdrawalResponse {
    pub vault_id: String,
    pub holder: String,
    pub shares_burned: Amount,
    pub payout: Amount,
    pub holder_shares: Amount,
    pub vault_cash: Amount,
    pub vault_total_shares: Amount,
}

/// Immediate pro-rata exit while the vault is still open. No request record
/// is created; the burn and payout happen in this call.
pub async fn create_open_withdrawal(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Json(body): Json<OpenWithdrawalBody>,
) -> Result<Json<OpenWithdrawalResponse>, AppError> {
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

    let outcome = withdraw_open(&vault, body.shares)?;
    vault.cash = outcome.new_cash;
    vault.total_shares = outcome.new_total_shares;

    let remaining = holder_shares.checked_sub(body.shares)?;
    state.repo.update_vault(&vault).await?;
    state.repo.set_holding(vault.id, holder, remaining).await?;

    info!(
        vault_id = %vault.id,
        holder,
        shares = %body.shares,
        payout = %outcome.payout,
        "open-stage withdrawal"
    );

    Ok(Json(OpenWithdrawalResponse {
        vault_id: vault.id.to_string(),
        holder: holder.to_string(),
        shares_burned: body.shares,
        payout: outcome.payout,
        holder_shares: remaining,
        vault_cash: outcome.new_cash,
        vault_total_shares: outcome.new_total_shares,
    }))
}

pub async fn list_withdrawals(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<Vec<RedemptionRequest>>, AppError> {
    if state.repo.get_vault(id).await?.is_none() {
        return Err(AppError::NotFound(format!("vault {}", id)));
    }
    let requests = state.repo.list_requests(id).await?;
    Ok(Json(requests))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelResponse {
    pub shares_returned: Amount,
    pub holder_shares: Amount,
    pub request: RedemptionRequest,
}

pub async fn cancel_withdrawal(
    Path((id, request_id)): Path<(Uuid, Uuid)>,
    State(state): State<AppState>,
) -> Result<Json<CancelResponse>, AppError> {
    let _guard = state.write_lock.lock().await;

    let request = state
        .repo
        .get_request(request_id)
        .await?
        .filter(|r| r.vault_id == id)
        .ok_or_else(|| AppError::NotFound(format!("request {}", request_id)))?;

    let outcome = cancel_request(&request)?;

    let holder_shares = state
        .repo
        .get_holding(id, &request.holder)
        .await?
        .checked_add(outcome.shares_returned)?;

    state.repo.update_request(&outcome.request).await?;
    state
        .repo
        .set_holding(id, &request.holder, holder_shares)
        .await?;

    info!(
        vault_id = %id,
        request_id = %request_id,
        shares_returned = %outcome.shares_returned,
        "withdrawal cancelled"
    );

    Ok(Json(CancelResponse {
        shares_returned: outcome.shares_returned,
        holder_shares,
        request: outcome.request,
    }))
}
