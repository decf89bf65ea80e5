//! Deposit settlement for open-stage vaults.

use crate::domain::{Amount, Vault, VaultStage};
use crate::error::LedgerError;

/// Result of settling a deposit. Pure data: the caller persists the new
/// balances and routes the fee to the manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepositOutcome {
    pub fee: Amount,
    pub net_amount: Amount,
    pub shares_minted: Amount,
    pub new_cash: Amount,
    pub new_total_shares: Amount,
    pub new_high_water_mark: Amount,
}

/// Compute minted shares and the fee split for new capital.
///
/// Requires an `Open` vault with no positions. The first deposit into an
/// empty vault mints 1:1 against the net amount; later deposits mint
/// proportionally to NAV-per-share. The deposit fee leaves the pool, so cash
/// grows by the net amount only.
pub fn settle_deposit(vault: &Vault, amount: Amount) -> Result<DepositOutcome, LedgerError> {
    vault.require_stage(VaultStage::Open)?;
    if !vault.positions.is_empty() {
        return Err(LedgerError::PositionsOpen);
    }
    if !amount.is_positive() {
        return Err(LedgerError::ZeroAmount);
    }
    vault.cash.ensure_non_negative("cash")?;
    vault.total_shares.ensure_non_negative("totalShares")?;

    let fee = vault.deposit_fee_bps.apply(amount)?;
    let net_amount = amount.checked_sub(fee)?;

    let shares_minted = if vault.total_shares.is_zero() {
        net_amount
    } else {
        if vault.cash.is_zero() {
            // Shares outstanding against an empty pool; no meaningful price.
            return Err(LedgerError::ZeroEquity);
        }
        net_amount.mul_div_floor(vault.total_shares, vault.cash)?
    };

    if !shares_minted.is_positive() {
        return Err(LedgerError::DepositTooSmall);
    }

    let new_cash = vault.cash.checked_add(net_amount)?;
    Ok(DepositOutcome {
        fee,
        net_amount,
        shares_minted,
        new_cash,
        new_total_shares: vault.total_shares.checked_add(shares_minted)?,
        new_high_water_mark: vault.high_water_mark.max(new_cash),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::BasisPoints;
    use chrono::Utc;
    use uuid::Uuid;

    fn open_vault(cash: &str, shares: &str, deposit_fee_bps: u16) -> Vault {
        Vault {
            id: Uuid::new_v4(),
            name: "alpha".to_string(),
            stage: VaultStage::Open,
            cash: Amount::parse(cash).unwrap(),
            total_shares: Amount::parse(shares).unwrap(),
            high_water_mark: Amount::parse(cash).unwrap(),
            deposit_fee_bps: BasisPoints::new(deposit_fee_bps).unwrap(),
            perf_fee_bps: BasisPoints::ZERO,
            early_exit_fee_bps: BasisPoints::ZERO,
            liquidity_buffer_bps: BasisPoints::ZERO,
            perf_fee_due: Amount::ZERO,
            perf_fee_paid: false,
            positions: vec![],
            created_at: Utc::now(),
        }
    }

    #[test]
    fn bootstrap_deposit_mints_one_to_one() {
        let vault = open_vault("0", "0", 100);
        let outcome = settle_deposit(&vault, Amount::parse("100").unwrap()).unwrap();
        assert_eq!(outcome.fee.to_string(), "1.000000");
        assert_eq!(outcome.net_amount.to_string(), "99.000000");
        assert_eq!(outcome.shares_minted.to_string(), "99.000000");
        assert_eq!(outcome.new_cash.to_string(), "99.000000");
        assert_eq!(outcome.new_total_shares.to_string(), "99.000000");
    }

    #[test]
    fn proportional_deposit_mints_at_nav() {
        let vault = open_vault("100.000000", "100.000000", 0);
        let outcome = settle_deposit(&vault, Amount::parse("50").unwrap()).unwrap();
        assert_eq!(outcome.shares_minted.to_string(), "50.000000");
        assert_eq!(outcome.new_cash.to_string(), "150.000000");
        assert_eq!(outcome.new_total_shares.to_string(), "150.000000");
    }

    #[test]
    fn deposit_ratchets_high_water_mark() {
        let vault = open_vault("100", "100", 0);
        let outcome = settle_deposit(&vault, Amount::parse("50").unwrap()).unwrap();
        assert_eq!(outcome.new_high_water_mark.to_string(), "150.000000");
    }

    #[test]
    fn dust_deposit_rejected_when_no_share_mints() {
        // NAV per share is 2.0; a single micro-unit floors to zero shares.
        let vault = open_vault("200", "100", 0);
        let result = settle_deposit(&vault, Amount::from_micros(1));
        assert_eq!(result, Err(LedgerError::DepositTooSmall));
    }

    #[test]
    fn deposit_rejected_outside_open_stage() {
        let mut vault = open_vault("100", "100", 0);
        vault.stage = VaultStage::Trading;
        assert!(matches!(
            settle_deposit(&vault, Amount::parse("50").unwrap()),
            Err(LedgerError::StageViolation { .. })
        ));
    }

    #[test]
    fn deposit_rejected_with_open_positions() {
        let mut vault = open_vault("100", "100", 0);
        vault.positions.push(crate::domain::Position {
            market_id: "mkt-1".to_string(),
            side: crate::domain::Side::Yes,
            shares: Amount::parse("1").unwrap(),
        });
        assert_eq!(
            settle_deposit(&vault, Amount::parse("50").unwrap()),
            Err(LedgerError::PositionsOpen)
        );
    }

    #[test]
    fn zero_and_negative_deposits_rejected() {
        let vault = open_vault("100", "100", 0);
        assert_eq!(
            settle_deposit(&vault, Amount::ZERO),
            Err(LedgerError::ZeroAmount)
        );
        assert_eq!(
            settle_deposit(&vault, Amount::parse("-5").unwrap()),
            Err(LedgerError::ZeroAmount)
        );
    }

    #[test]
    fn corrupted_negative_cash_is_localized() {
        let mut vault = open_vault("100", "100", 0);
        vault.cash = Amount::from_micros(-1);
        assert!(matches!(
            settle_deposit(&vault, Amount::parse("50").unwrap()),
            Err(LedgerError::Amount(crate::domain::AmountError::NegativeValue(_)))
        ));
    }
}
