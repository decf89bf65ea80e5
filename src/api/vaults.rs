use axum::extract::{Path, State};
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::api::AppState;
use crate::domain::{Amount, BasisPoints, Position, Vault, VaultStage};
use crate::error::AppError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateVaultRequest {
    pub name: String,
    #[serde(default)]
    pub deposit_fee_bps: u16,
    #[serde(default)]
    pub perf_fee_bps: u16,
    #[serde(default)]
    pub early_exit_fee_bps: u16,
    #[serde(default)]
    pub liquidity_buffer_bps: u16,
}

pub async fn create_vault(
    State(state): State<AppState>,
    Json(body): Json<CreateVaultRequest>,
) -> Result<Json<Vault>, AppError> {
    if body.name.trim().is_empty() {
        return Err(AppError::BadRequest("name must not be empty".into()));
    }

    let deposit_fee_bps = checked_bps(
        body.deposit_fee_bps,
        "depositFeeBps",
        state.config.max_deposit_fee_bps,
    )?;
    let perf_fee_bps = checked_bps(body.perf_fee_bps, "perfFeeBps", state.config.max_perf_fee_bps)?;
    let early_exit_fee_bps = checked_bps(
        body.early_exit_fee_bps,
        "earlyExitFeeBps",
        state.config.max_early_exit_fee_bps,
    )?;
    let liquidity_buffer_bps = BasisPoints::new(body.liquidity_buffer_bps)
        .map_err(|e| AppError::BadRequest(format!("liquidityBufferBps: {}", e)))?;

    let vault = Vault {
        id: Uuid::new_v4(),
        name: body.name.trim().to_string(),
        stage: VaultStage::Open,
        cash: Amount::ZERO,
        total_shares: Amount::ZERO,
        high_water_mark: Amount::ZERO,
        deposit_fee_bps,
        perf_fee_bps,
        early_exit_fee_bps,
        liquidity_buffer_bps,
        perf_fee_due: Amount::ZERO,
        perf_fee_paid: false,
        positions: vec![],
        created_at: Utc::now(),
    };

    state.repo.insert_vault(&vault).await?;
    Ok(Json(vault))
}

fn checked_bps(raw: u16, field: &str, cap: BasisPoints) -> Result<BasisPoints, AppError> {
    let bps =
        BasisPoints::new(raw).map_err(|e| AppError::BadRequest(format!("{}: {}", field, e)))?;
    if bps.as_u16() > cap.as_u16() {
        return Err(AppError::BadRequest(format!(
            "{} exceeds cap of {} bps",
            field,
            cap.as_u16()
        )));
    }
    Ok(bps)
}

pub async fn list_vaults(State(state): State<AppState>) -> Result<Json<Vec<Vault>>, AppError> {
    let vaults = state.repo.list_vaults().await?;
    Ok(Json(vaults))
}

pub async fn get_vault(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<Vault>, AppError> {
    let vault = state
        .repo
        .get_vault(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("vault {}", id)))?;
    Ok(Json(vault))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdvanceStageRequest {
    pub action: String,
}

pub async fn advance_stage(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Json(body): Json<AdvanceStageRequest>,
) -> Result<Json<Vault>, AppError> {
    let _guard = state.write_lock.lock().await;

    let mut vault = state
        .repo
        .get_vault(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("vault {}", id)))?;

    match body.action.as_str() {
        "startTrading" => vault.start_trading()?,
        "endTrading" => vault.end_trading()?,
        "finalizeClose" => vault.finalize_close()?,
        other => {
            return Err(AppError::BadRequest(format!(
                "unknown action {:?}; expected startTrading, endTrading, or finalizeClose",
                other
            )))
        }
    }

    state.repo.update_vault(&vault).await?;
    Ok(Json(vault))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateBookRequest {
    pub cash: Amount,
    pub positions: Vec<Position>,
}

/// Record the vault's trading book: the cash balance and open positions that
/// resulted from external trading activity.
pub async fn update_book(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Json(body): Json<UpdateBookRequest>,
) -> Result<Json<Vault>, AppError> {
    let _guard = state.write_lock.lock().await;

    let mut vault = state
        .repo
        .get_vault(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("vault {}", id)))?;

    if vault.stage != VaultStage::Trading && vault.stage != VaultStage::Settlement {
        return Err(AppError::Conflict(format!(
            "book updates require stage trading or settlement, vault is {}",
            vault.stage
        )));
    }

    body.cash.ensure_non_negative("cash")?;
    for position in &body.positions {
        position.shares.ensure_non_negative("positionShares")?;
    }

    vault.cash = body.cash;
    vault.positions = body.positions;
    state.repo.update_vault(&vault).await?;
    Ok(Json(vault))
}
