//! Vault aggregate and lifecycle stages.

use crate::domain::{Amount, BasisPoints, Position};
use crate::error::LedgerError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Fund lifecycle stage.
///
/// Open: deposits allowed, no trading.
/// Trading: deposits locked, withdrawal requests queue for epoch settlement.
/// Settlement: no new trades, positions wind down, queue still cranks.
/// Closed: holders redeem pro-rata NAV.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum VaultStage {
    #[default]
    Open,
    Trading,
    Settlement,
    Closed,
}

impl std::fmt::Display for VaultStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            VaultStage::Open => "open",
            VaultStage::Trading => "trading",
            VaultStage::Settlement => "settlement",
            VaultStage::Closed => "closed",
        };
        write!(f, "{}", s)
    }
}

impl std::str::FromStr for VaultStage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(VaultStage::Open),
            "trading" => Ok(VaultStage::Trading),
            "settlement" => Ok(VaultStage::Settlement),
            "closed" => Ok(VaultStage::Closed),
            other => Err(format!("unknown vault stage: {}", other)),
        }
    }
}

/// Pooled-fund vault state.
///
/// Fee and buffer parameters are fixed per epoch; `high_water_mark` only ever
/// ratchets upward and is the performance-fee basis at close.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vault {
    pub id: Uuid,
    pub name: String,
    pub stage: VaultStage,
    pub cash: Amount,
    pub total_shares: Amount,
    pub high_water_mark: Amount,
    pub deposit_fee_bps: BasisPoints,
    pub perf_fee_bps: BasisPoints,
    pub early_exit_fee_bps: BasisPoints,
    pub liquidity_buffer_bps: BasisPoints,
    pub perf_fee_due: Amount,
    pub perf_fee_paid: bool,
    pub positions: Vec<Position>,
    pub created_at: DateTime<Utc>,
}

impl Vault {
    /// Require a specific lifecycle stage before a stateful operation.
    pub fn require_stage(&self, expected: VaultStage) -> Result<(), LedgerError> {
        if self.stage != expected {
            return Err(LedgerError::StageViolation {
                expected: expected.to_string(),
                actual: self.stage,
            });
        }
        Ok(())
    }

    /// Open -> Trading. Ratchets the high-water mark to current cash so the
    /// performance fee is only ever charged on profit above entry.
    pub fn start_trading(&mut self) -> Result<(), LedgerError> {
        self.require_stage(VaultStage::Open)?;
        self.high_water_mark = self.high_water_mark.max(self.cash);
        self.stage = VaultStage::Trading;
        Ok(())
    }

    /// Trading -> Settlement.
    pub fn end_trading(&mut self) -> Result<(), LedgerError> {
        self.require_stage(VaultStage::Trading)?;
        self.stage = VaultStage::Settlement;
        Ok(())
    }

    /// Settlement -> Closed.
    ///
    /// All positions must already be wound down; assesses the one-time
    /// performance fee on profit above the high-water mark. The fee is
    /// recorded as due and deducted from the pool on the first redemption.
    pub fn finalize_close(&mut self) -> Result<(), LedgerError> {
        self.require_stage(VaultStage::Settlement)?;
        if self.positions.iter().any(|p| p.shares.is_positive()) {
            return Err(LedgerError::PositionsOpen);
        }
        self.cash.ensure_non_negative("cash")?;

        let profit = self.cash.sub_or_zero(self.high_water_mark);
        self.perf_fee_due = self.perf_fee_bps.apply(profit)?;
        self.perf_fee_paid = false;
        self.stage = VaultStage::Closed;
        Ok(())
    }
}
