//! Closed-stage pro-rata redemption.

use crate::domain::{Amount, Vault, VaultStage};
use crate::error::LedgerError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedemptionOutcome {
    pub payout: Amount,
    /// Performance fee deducted from the pool by this call (zero on every
    /// call after the first).
    pub perf_fee_charged: Amount,
    pub new_cash: Amount,
    pub new_total_shares: Amount,
    pub perf_fee_paid: bool,
}

/// Redeem shares from a fully wound-down vault at pro-rata NAV.
///
/// If a performance fee is due and unpaid, it comes out of vault cash exactly
/// once, before this redeemer's payout is computed, so the first redemption
/// lowers NAV-per-share for the whole closing cohort. Subsequent calls see
/// `perf_fee_paid` and skip the deduction.
pub fn redeem_closed(vault: &Vault, shares: Amount) -> Result<RedemptionOutcome, LedgerError> {
    vault.require_stage(VaultStage::Closed)?;
    if !shares.is_positive() {
        return Err(LedgerError::ZeroAmount);
    }
    vault.cash.ensure_non_negative("cash")?;
    vault.total_shares.ensure_non_negative("totalShares")?;
    vault.perf_fee_due.ensure_non_negative("perfFeeDue")?;
    if shares > vault.total_shares {
        return Err(LedgerError::InsufficientShares);
    }
    if !vault.total_shares.is_positive() {
        return Err(LedgerError::ZeroShares);
    }

    let mut cash = vault.cash;
    let mut perf_fee_charged = Amount::ZERO;
    if vault.perf_fee_due.is_positive() && !vault.perf_fee_paid {
        if vault.perf_fee_due > cash {
            return Err(LedgerError::InsufficientFunds);
        }
        cash = cash.checked_sub(vault.perf_fee_due)?;
        perf_fee_charged = vault.perf_fee_due;
    }

    let payout = shares.mul_div_floor(cash, vault.total_shares)?;
    if payout > cash {
        return Err(LedgerError::InsufficientFunds);
    }

    Ok(RedemptionOutcome {
        payout,
        perf_fee_charged,
        new_cash: cash.checked_sub(payout)?,
        new_total_shares: vault.total_shares.checked_sub(shares)?,
        perf_fee_paid: vault.perf_fee_paid || perf_fee_charged.is_positive(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::BasisPoints;
    use chrono::Utc;
    use uuid::Uuid;

    fn closed_vault(cash: &str, shares: &str, fee_due: &str, fee_paid: bool) -> Vault {
        Vault {
            id: Uuid::new_v4(),
            name: "alpha".to_string(),
            stage: VaultStage::Closed,
            cash: Amount::parse(cash).unwrap(),
            total_shares: Amount::parse(shares).unwrap(),
            high_water_mark: Amount::parse(cash).unwrap(),
            deposit_fee_bps: BasisPoints::ZERO,
            perf_fee_bps: BasisPoints::ZERO,
            early_exit_fee_bps: BasisPoints::ZERO,
            liquidity_buffer_bps: BasisPoints::ZERO,
            perf_fee_due: Amount::parse(fee_due).unwrap(),
            perf_fee_paid: fee_paid,
            positions: vec![],
            created_at: Utc::now(),
        }
    }

    #[test]
    fn perf_fee_deducted_exactly_once() {
        // 1000 cash, 1000 shares, 100 due: first redeemer of 100 shares sees
        // NAV 0.9 after the fee comes out of the pool.
        let vault = closed_vault("1000", "1000", "100", false);
        let first = redeem_closed(&vault, Amount::parse("100").unwrap()).unwrap();
        assert_eq!(first.perf_fee_charged.to_string(), "100.000000");
        assert_eq!(first.payout.to_string(), "90.000000");
        assert!(first.perf_fee_paid);
        assert_eq!(first.new_cash.to_string(), "810.000000");
        assert_eq!(first.new_total_shares.to_string(), "900.000000");

        // Second redeemer against the updated state: fee already paid,
        // same reduced NAV per share.
        let second_vault = closed_vault("810", "900", "100", true);
        let second = redeem_closed(&second_vault, Amount::parse("100").unwrap()).unwrap();
        assert_eq!(second.perf_fee_charged, Amount::ZERO);
        assert_eq!(second.payout.to_string(), "90.000000");
    }

    #[test]
    fn full_redemption_drains_the_vault() {
        let vault = closed_vault("500", "500", "0", false);
        let outcome = redeem_closed(&vault, Amount::parse("500").unwrap()).unwrap();
        assert_eq!(outcome.payout.to_string(), "500.000000");
        assert_eq!(outcome.new_cash, Amount::ZERO);
        assert_eq!(outcome.new_total_shares, Amount::ZERO);
    }

    #[test]
    fn redeeming_more_than_outstanding_is_rejected() {
        let vault = closed_vault("500", "500", "0", false);
        assert_eq!(
            redeem_closed(&vault, Amount::parse("501").unwrap()),
            Err(LedgerError::InsufficientShares)
        );
    }

    #[test]
    fn fee_larger_than_cash_is_surfaced_not_clamped() {
        let vault = closed_vault("50", "500", "100", false);
        assert_eq!(
            redeem_closed(&vault, Amount::parse("10").unwrap()),
            Err(LedgerError::InsufficientFunds)
        );
    }

    #[test]
    fn redemption_requires_closed_stage() {
        let mut vault = closed_vault("500", "500", "0", false);
        vault.stage = VaultStage::Trading;
        assert!(matches!(
            redeem_closed(&vault, Amount::parse("10").unwrap()),
            Err(LedgerError::StageViolation { .. })
        ));
    }
}
