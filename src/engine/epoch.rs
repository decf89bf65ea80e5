//! Epoch settlement: FIFO liquidity-bounded filling of the withdrawal queue.

use crate::domain::{
    Amount, BasisPoints, RedemptionRequest, RequestStatus, Vault, VaultStage,
};
use crate::error::LedgerError;
use tracing::warn;

/// Bounded retry budget for the rounding-safety pass. Floor division on the
/// fee can push a fill's net payout at most a micro-unit or two past the
/// liquidity budget; shaving single micro-shares recovers it.
const MAX_ROUNDING_RETRIES: u32 = 3;

const BPS_DENOMINATOR: i128 = 10_000;

/// NAV basis for a settlement pass: the epoch-opening equity and share count.
/// Every request in one pass prices against the same pair.
#[derive(Debug, Clone, Copy)]
pub(crate) struct FillBasis {
    pub equity: Amount,
    pub total_shares: Amount,
    pub exit_fee_bps: BasisPoints,
}

/// A single computed fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Fill {
    pub shares: Amount,
    pub gross: Amount,
    pub fee: Amount,
    pub net: Amount,
}

/// Largest fill for `remaining_requested` whose net-of-fee payout fits in
/// `remaining_liquidity`, or `None` when nothing useful fits this epoch.
pub(crate) fn fill_cash_request(
    remaining_requested: Amount,
    remaining_liquidity: Amount,
    basis: &FillBasis,
) -> Result<Option<Fill>, LedgerError> {
    if !remaining_requested.is_positive() || !remaining_liquidity.is_positive() {
        return Ok(None);
    }

    // maxFillable = liquidity * 10000 * totalShares / (equity * (10000 - feeBps))
    let numerator = remaining_liquidity
        .as_micros()
        .checked_mul(BPS_DENOMINATOR)
        .and_then(|v| v.checked_mul(basis.total_shares.as_micros()))
        .ok_or(crate::domain::AmountError::Overflow)?;
    let denominator = basis
        .equity
        .as_micros()
        .checked_mul(basis.exit_fee_bps.complement())
        .ok_or(crate::domain::AmountError::Overflow)?;
    if denominator == 0 {
        return Err(LedgerError::ZeroEquity);
    }
    let max_fillable = Amount::from_micros(numerator / denominator);

    let mut shares = remaining_requested.min(max_fillable);

    for _ in 0..=MAX_ROUNDING_RETRIES {
        if !shares.is_positive() {
            return Ok(None);
        }

        let gross = shares.mul_div_floor(basis.equity, basis.total_shares)?;
        let fee = basis.exit_fee_bps.apply(gross)?;
        let net = gross.checked_sub(fee)?;

        if !net.is_positive() {
            return Ok(None);
        }
        if net <= remaining_liquidity {
            return Ok(Some(Fill { shares, gross, fee, net }));
        }

        // Rounding pushed the payout past the budget; shave a micro-share.
        shares = shares.checked_sub(Amount::from_micros(1))?;
    }

    Ok(None)
}

/// Aggregate result of one settlement pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EpochOutcome {
    pub requests: Vec<RedemptionRequest>,
    pub shares_burned: Amount,
    pub net_paid: Amount,
    pub fees_retained: Amount,
    pub new_cash: Amount,
    pub new_total_shares: Amount,
}

/// Settle the pending withdrawal queue against current liquidity.
///
/// `equity` is the externally supplied mark-to-market NAV numerator. Requests
/// are filled in arrival order against a running liquidity counter seeded from
/// cash minus the required buffer; whatever does not fit stays
/// `Pending`/`PartiallyFilled` for a later epoch. Early-exit fees are retained
/// in the vault, so cash drops by net payouts only. Corrupt requests are
/// quarantined as `Invalid` without aborting the rest of the queue.
pub fn settle_epoch(
    vault: &Vault,
    requests: &[RedemptionRequest],
    equity: Amount,
) -> Result<EpochOutcome, LedgerError> {
    if vault.stage != VaultStage::Trading && vault.stage != VaultStage::Settlement {
        return Err(LedgerError::StageViolation {
            expected: "trading or settlement".to_string(),
            actual: vault.stage,
        });
    }
    vault.cash.ensure_non_negative("cash")?;
    vault.total_shares.ensure_non_negative("totalShares")?;
    if !vault.total_shares.is_positive() {
        return Err(LedgerError::ZeroShares);
    }
    if !equity.is_positive() {
        return Err(LedgerError::ZeroEquity);
    }
    if !requests.iter().any(|r| r.is_open()) {
        return Err(LedgerError::NoPendingRequests);
    }

    let basis = FillBasis {
        equity,
        total_shares: vault.total_shares,
        exit_fee_bps: vault.early_exit_fee_bps,
    };

    let required_buffer = vault.liquidity_buffer_bps.apply(vault.cash)?;
    let mut remaining_liquidity = vault.cash.sub_or_zero(required_buffer);

    let mut updated = Vec::with_capacity(requests.len());
    let mut shares_burned = Amount::ZERO;
    let mut net_paid = Amount::ZERO;
    let mut fees_retained = Amount::ZERO;

    for request in requests {
        let mut request = request.clone();
        if !request.is_open() {
            updated.push(request);
            continue;
        }
        if request.is_corrupt() {
            warn!(request_id = %request.id, "quarantining corrupt withdrawal request");
            request.status = RequestStatus::Invalid;
            updated.push(request);
            continue;
        }

        match fill_cash_request(request.shares_remaining(), remaining_liquidity, &basis)? {
            None => updated.push(request),
            Some(fill) => {
                remaining_liquidity = remaining_liquidity.checked_sub(fill.net)?;
                shares_burned = shares_burned.checked_add(fill.shares)?;
                net_paid = net_paid.checked_add(fill.net)?;
                fees_retained = fees_retained.checked_add(fill.fee)?;

                request.shares_filled = request.shares_filled.checked_add(fill.shares)?;
                request.status = if request.shares_filled >= request.shares_requested {
                    RequestStatus::Completed
                } else {
                    RequestStatus::PartiallyFilled
                };
                updated.push(request);
            }
        }
    }

    Ok(EpochOutcome {
        requests: updated,
        shares_burned,
        net_paid,
        fees_retained,
        new_cash: vault.cash.checked_sub(net_paid)?,
        new_total_shares: vault.total_shares.checked_sub(shares_burned)?,
    })
}
