use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::api::AppState;
use crate::domain::{Amount, Position, PriceSnapshot, RedemptionRequest};
use crate::engine;
use crate::error::AppError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CashEpochRequest {
    /// Externally supplied mark-to-market NAV numerator for this epoch.
    pub equity: Amount,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CashEpochResponse {
    pub vault_id: String,
    pub shares_burned: Amount,
    pub net_paid: Amount,
    pub fees_retained: Amount,
    pub new_cash: Amount,
    pub new_total_shares: Amount,
    pub requests: Vec<RedemptionRequest>,
}

pub async fn settle_cash_epoch(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Json(body): Json<CashEpochRequest>,
) -> Result<Json<CashEpochResponse>, AppError> {
    let _guard = state.write_lock.lock().await;

    let mut vault = state
        .repo
        .get_vault(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("vault {}", id)))?;

    // Only the open queue participates; settled rows are not re-persisted.
    let requests = state.repo.list_open_requests(id).await?;
    let outcome = engine::settle_epoch(&vault, &requests, body.equity)?;

    vault.cash = outcome.new_cash;
    vault.total_shares = outcome.new_total_shares;
    state.repo.apply_settlement(&vault, &outcome.requests).await?;

    info!(
        vault_id = %vault.id,
        shares_burned = %outcome.shares_burned,
        net_paid = %outcome.net_paid,
        fees_retained = %outcome.fees_retained,
        "cash epoch settled"
    );

    Ok(Json(CashEpochResponse {
        vault_id: vault.id.to_string(),
        shares_burned: outcome.shares_burned,
        net_paid: outcome.net_paid,
        fees_retained: outcome.fees_retained,
        new_cash: outcome.new_cash,
        new_total_shares: outcome.new_total_shares,
        requests: outcome.requests,
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BasketEpochRequest {
    /// YES-side quotes keyed by market id; every held market must be priced.
    pub prices: PriceSnapshot,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferDto {
    pub request_id: String,
    pub cash: Amount,
    pub positions: Vec<Position>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BasketEpochResponse {
    pub vault_id: String,
    pub shares_burned: Amount,
    pub cash_paid: Amount,
    pub fees_retained: Amount,
    pub cash_equity: Amount,
    pub new_cash: Amount,
    pub new_total_shares: Amount,
    pub transfers: Vec<TransferDto>,
    pub requests: Vec<RedemptionRequest>,
}

pub async fn settle_basket_epoch(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Json(body): Json<BasketEpochRequest>,
) -> Result<Json<BasketEpochResponse>, AppError> {
    let _guard = state.write_lock.lock().await;

    let mut vault = state
        .repo
        .get_vault(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("vault {}", id)))?;

    let requests = state.repo.list_open_requests(id).await?;
    let outcome =
        engine::settle_basket_epoch(&vault, &requests, &body.prices, state.config.cash_nav_mode)?;

    vault.cash = outcome.new_cash;
    vault.total_shares = outcome.new_total_shares;
    vault.positions = outcome.new_positions.clone();
    state.repo.apply_settlement(&vault, &outcome.requests).await?;

    info!(
        vault_id = %vault.id,
        shares_burned = %outcome.shares_burned,
        cash_paid = %outcome.cash_paid,
        transfers = outcome.transfers.len(),
        "basket epoch settled"
    );

    let transfers = outcome
        .transfers
        .into_iter()
        .map(|t| TransferDto {
            request_id: t.request_id.to_string(),
            cash: t.cash,
            positions: t.positions,
        })
        .collect();

    Ok(Json(BasketEpochResponse {
        vault_id: vault.id.to_string(),
        shares_burned: outcome.shares_burned,
        cash_paid: outcome.cash_paid,
        fees_retained: outcome.fees_retained,
        cash_equity: outcome.cash_equity,
        new_cash: outcome.new_cash,
        new_total_shares: outcome.new_total_shares,
        transfers,
        requests: outcome.requests,
    }))
}
