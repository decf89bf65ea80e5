//! Withdrawal request escrow and cancellation.

use crate::domain::{
    Amount, RedemptionRequest, RequestKind, RequestStatus, Vault, VaultStage,
};
use crate::error::LedgerError;
use chrono::Utc;
use uuid::Uuid;

/// Record a holder's intent to exit.
///
/// Only records intent: the caller moves `shares` from the holder's active
/// balance into escrow (the returned request); no burn or payout happens until
/// an epoch settles.
pub fn request_withdrawal(
    vault: &Vault,
    holder: &str,
    holder_shares: Amount,
    shares: Amount,
    kind: RequestKind,
) -> Result<RedemptionRequest, LedgerError> {
    vault.require_stage(VaultStage::Trading)?;
    if !shares.is_positive() {
        return Err(LedgerError::ZeroAmount);
    }
    holder_shares.ensure_non_negative("holderShares")?;
    if shares > holder_shares {
        return Err(LedgerError::InsufficientShares);
    }

    Ok(RedemptionRequest {
        id: Uuid::new_v4(),
        vault_id: vault.id,
        holder: holder.to_string(),
        shares_requested: shares,
        shares_filled: Amount::ZERO,
        status: RequestStatus::Pending,
        kind,
        requested_at: Utc::now(),
    })
}

/// Result of an open-stage withdrawal. Pure data: the caller persists the
/// new balances and pays the holder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenWithdrawalOutcome {
    pub payout: Amount,
    pub new_cash: Amount,
    pub new_total_shares: Amount,
}

/// Pro-rata exit before trading starts.
///
/// While the vault is `Open` there is no queue and no fee: shares burn
/// immediately against the cash pool at current NAV. Once trading starts,
/// exits go through the escrowed request path instead.
pub fn withdraw_open(vault: &Vault, shares: Amount) -> Result<OpenWithdrawalOutcome, LedgerError> {
    vault.require_stage(VaultStage::Open)?;
    if !shares.is_positive() {
        return Err(LedgerError::ZeroAmount);
    }
    vault.cash.ensure_non_negative("cash")?;
    vault.total_shares.ensure_non_negative("totalShares")?;
    if shares > vault.total_shares {
        return Err(LedgerError::InsufficientShares);
    }
    if !vault.total_shares.is_positive() {
        return Err(LedgerError::ZeroShares);
    }

    let payout = shares.mul_div_floor(vault.cash, vault.total_shares)?;
    if payout > vault.cash {
        return Err(LedgerError::InsufficientFunds);
    }

    Ok(OpenWithdrawalOutcome {
        payout,
        new_cash: vault.cash.checked_sub(payout)?,
        new_total_shares: vault.total_shares.checked_sub(shares)?,
    })
}

/// Result of cancelling a request: the unfilled remainder goes back to the
/// holder's active balance; filled shares stay settled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CancelOutcome {
    pub shares_returned: Amount,
    pub request: RedemptionRequest,
}

/// Cancel the unfilled remainder of an escrowed request.
pub fn cancel_request(request: &RedemptionRequest) -> Result<CancelOutcome, LedgerError> {
    if request.is_corrupt() {
        return Err(LedgerError::CorruptRequest(request.id.to_string()));
    }
    if !request.is_open() {
        return Err(LedgerError::NothingToCancel);
    }

    let unfilled = request.shares_requested.checked_sub(request.shares_filled)?;
    if !unfilled.is_positive() {
        return Err(LedgerError::NothingToCancel);
    }

    let mut cancelled = request.clone();
    cancelled.status = RequestStatus::Cancelled;
    Ok(CancelOutcome {
        shares_returned: unfilled,
        request: cancelled,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::BasisPoints;

    fn trading_vault() -> Vault {
        Vault {
            id: Uuid::new_v4(),
            name: "alpha".to_string(),
            stage: VaultStage::Trading,
            cash: Amount::parse("1000").unwrap(),
            total_shares: Amount::parse("1000").unwrap(),
            high_water_mark: Amount::parse("1000").unwrap(),
            deposit_fee_bps: BasisPoints::ZERO,
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
    fn request_escrows_without_burning() {
        let vault = trading_vault();
        let request = request_withdrawal(
            &vault,
            "holder-1",
            Amount::parse("100").unwrap(),
            Amount::parse("40").unwrap(),
            RequestKind::Cash,
        )
        .unwrap();
        assert_eq!(request.status, RequestStatus::Pending);
        assert_eq!(request.shares_filled, Amount::ZERO);
        assert_eq!(request.shares_requested.to_string(), "40.000000");
    }

    #[test]
    fn request_rejected_beyond_holder_balance() {
        let vault = trading_vault();
        let result = request_withdrawal(
            &vault,
            "holder-1",
            Amount::parse("10").unwrap(),
            Amount::parse("40").unwrap(),
            RequestKind::Cash,
        );
        assert_eq!(result, Err(LedgerError::InsufficientShares));
    }

    #[test]
    fn request_rejected_outside_trading() {
        let mut vault = trading_vault();
        vault.stage = VaultStage::Open;
        let result = request_withdrawal(
            &vault,
            "holder-1",
            Amount::parse("100").unwrap(),
            Amount::parse("40").unwrap(),
            RequestKind::Cash,
        );
        assert!(matches!(result, Err(LedgerError::StageViolation { .. })));
    }

    #[test]
    fn open_withdrawal_pays_pro_rata_at_nav() {
        let mut vault = trading_vault();
        vault.stage = VaultStage::Open;
        vault.cash = Amount::parse("200").unwrap();
        vault.total_shares = Amount::parse("100").unwrap();

        // NAV per share is 2.0.
        let outcome = withdraw_open(&vault, Amount::parse("40").unwrap()).unwrap();
        assert_eq!(outcome.payout.to_string(), "80.000000");
        assert_eq!(outcome.new_cash.to_string(), "120.000000");
        assert_eq!(outcome.new_total_shares.to_string(), "60.000000");
    }

    #[test]
    fn open_withdrawal_can_drain_the_vault() {
        let mut vault = trading_vault();
        vault.stage = VaultStage::Open;
        let outcome = withdraw_open(&vault, Amount::parse("1000").unwrap()).unwrap();
        assert_eq!(outcome.payout.to_string(), "1000.000000");
        assert_eq!(outcome.new_cash, Amount::ZERO);
        assert_eq!(outcome.new_total_shares, Amount::ZERO);
    }

    #[test]
    fn open_withdrawal_rejected_beyond_outstanding_shares() {
        let mut vault = trading_vault();
        vault.stage = VaultStage::Open;
        assert_eq!(
            withdraw_open(&vault, Amount::parse("1001").unwrap()),
            Err(LedgerError::InsufficientShares)
        );
    }

    #[test]
    fn open_withdrawal_rejected_once_trading_starts() {
        let vault = trading_vault();
        assert!(matches!(
            withdraw_open(&vault, Amount::parse("10").unwrap()),
            Err(LedgerError::StageViolation { .. })
        ));
    }

    #[test]
    fn cancel_returns_unfilled_remainder_only() {
        let vault = trading_vault();
        let mut request = request_withdrawal(
            &vault,
            "holder-1",
            Amount::parse("100").unwrap(),
            Amount::parse("40").unwrap(),
            RequestKind::Cash,
        )
        .unwrap();
        request.shares_filled = Amount::parse("15").unwrap();
        request.status = RequestStatus::PartiallyFilled;

        let outcome = cancel_request(&request).unwrap();
        assert_eq!(outcome.shares_returned.to_string(), "25.000000");
        assert_eq!(outcome.request.status, RequestStatus::Cancelled);
        // The filled portion is never reversed.
        assert_eq!(outcome.request.shares_filled.to_string(), "15.000000");
    }

    #[test]
    fn cancel_fully_filled_has_nothing_to_return() {
        let vault = trading_vault();
        let mut request = request_withdrawal(
            &vault,
            "holder-1",
            Amount::parse("100").unwrap(),
            Amount::parse("40").unwrap(),
            RequestKind::Cash,
        )
        .unwrap();
        request.shares_filled = request.shares_requested;
        request.status = RequestStatus::Completed;
        assert_eq!(cancel_request(&request), Err(LedgerError::NothingToCancel));
    }

    #[test]
    fn cancel_corrupt_request_is_flagged() {
        let vault = trading_vault();
        let mut request = request_withdrawal(
            &vault,
            "holder-1",
            Amount::parse("100").unwrap(),
            Amount::parse("40").unwrap(),
            RequestKind::Cash,
        )
        .unwrap();
        request.shares_filled = Amount::parse("41").unwrap();
        assert!(matches!(
            cancel_request(&request),
            Err(LedgerError::CorruptRequest(_))
        ));
    }
}
