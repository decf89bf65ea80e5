//! Dual-mode (cash / in-kind) epoch settlement for basket vaults.

use crate::domain::{
    Amount, Position, PriceSnapshot, PricingMode, RedemptionRequest, RequestKind, RequestStatus,
    Vault, VaultStage,
};
use crate::engine::epoch::{fill_cash_request, FillBasis};
use crate::engine::equity::basket_equity;
use crate::error::LedgerError;
use tracing::warn;
use uuid::Uuid;

/// A pro-rata in-kind payout: a slice of epoch-opening cash plus a slice of
/// every epoch-opening position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InKindTransfer {
    pub request_id: Uuid,
    pub cash: Amount,
    pub positions: Vec<Position>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasketEpochOutcome {
    pub requests: Vec<RedemptionRequest>,
    pub shares_burned: Amount,
    /// Net paid to CASH redeemers (fees already deducted).
    pub cash_paid: Amount,
    pub fees_retained: Amount,
    pub transfers: Vec<InKindTransfer>,
    pub new_cash: Amount,
    pub new_total_shares: Amount,
    pub new_positions: Vec<Position>,
    /// The bid-mode equity the CASH fills priced against.
    pub cash_equity: Amount,
}

/// Settle one epoch of mixed CASH and IN_KIND requests.
///
/// Everything prices off the epoch-opening snapshot: in-kind slices divide
/// opening cash/positions by opening total shares so every in-kind request in
/// the pass sees identical terms, and CASH fills run the standard
/// liquidity-bounded algorithm against the opening cash-NAV equity. The
/// aggregate in-kind cash entitlement is reserved out of available liquidity
/// before any CASH request fills, so neither mode can starve the other.
pub fn settle_basket_epoch(
    vault: &Vault,
    requests: &[RedemptionRequest],
    snapshot: &PriceSnapshot,
    cash_nav_mode: PricingMode,
) -> Result<BasketEpochOutcome, LedgerError> {
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
    if !requests.iter().any(|r| r.is_open()) {
        return Err(LedgerError::NoPendingRequests);
    }

    // Epoch-opening snapshot: the fixed basis for every fill in this pass.
    let opening_cash = vault.cash;
    let opening_positions = vault.positions.clone();
    let opening_shares = vault.total_shares;

    let cash_equity = basket_equity(opening_cash, &opening_positions, snapshot, cash_nav_mode)?;
    if !cash_equity.is_positive() {
        return Err(LedgerError::ZeroEquity);
    }

    // Reserve the aggregate in-kind cash entitlement up front.
    let mut in_kind_reserved = Amount::ZERO;
    for request in requests {
        if request.is_open() && !request.is_corrupt() && request.kind == RequestKind::InKind {
            let slice = request
                .shares_remaining()
                .mul_div_floor(opening_cash, opening_shares)?;
            in_kind_reserved = in_kind_reserved.checked_add(slice)?;
        }
    }

    let required_buffer = vault.liquidity_buffer_bps.apply(opening_cash)?;
    let mut remaining_liquidity = opening_cash
        .sub_or_zero(required_buffer)
        .sub_or_zero(in_kind_reserved);

    let basis = FillBasis {
        equity: cash_equity,
        total_shares: opening_shares,
        exit_fee_bps: vault.early_exit_fee_bps,
    };

    let mut updated = Vec::with_capacity(requests.len());
    let mut transfers = Vec::new();
    let mut running_cash = opening_cash;
    let mut running_positions = opening_positions.clone();
    let mut shares_burned = Amount::ZERO;
    let mut cash_paid = Amount::ZERO;
    let mut fees_retained = Amount::ZERO;

    for request in requests {
        let mut request = request.clone();
        if !request.is_open() {
            updated.push(request);
            continue;
        }
        if request.is_corrupt() {
            warn!(request_id = %request.id, "quarantining corrupt redemption request");
            request.status = RequestStatus::Invalid;
            updated.push(request);
            continue;
        }

        match request.kind {
            RequestKind::InKind => {
                let remaining = request.shares_remaining();

                let cash_slice = remaining.mul_div_floor(opening_cash, opening_shares)?;
                let mut position_slices = Vec::with_capacity(opening_positions.len());
                for (opening, running) in
                    opening_positions.iter().zip(running_positions.iter_mut())
                {
                    let slice = remaining.mul_div_floor(opening.shares, opening_shares)?;
                    running.shares = running.shares.checked_sub(slice)?;
                    running.shares.ensure_non_negative("positionShares")?;
                    position_slices.push(Position {
                        market_id: opening.market_id.clone(),
                        side: opening.side,
                        shares: slice,
                    });
                }

                running_cash = running_cash.checked_sub(cash_slice)?;
                running_cash.ensure_non_negative("cash")?;
                shares_burned = shares_burned.checked_add(remaining)?;

                transfers.push(InKindTransfer {
                    request_id: request.id,
                    cash: cash_slice,
                    positions: position_slices,
                });

                request.shares_filled = request.shares_requested;
                request.status = RequestStatus::Completed;
                updated.push(request);
            }
            RequestKind::Cash => {
                match fill_cash_request(request.shares_remaining(), remaining_liquidity, &basis)? {
                    None => updated.push(request),
                    Some(fill) => {
                        remaining_liquidity = remaining_liquidity.checked_sub(fill.net)?;
                        running_cash = running_cash.checked_sub(fill.net)?;
                        shares_burned = shares_burned.checked_add(fill.shares)?;
                        cash_paid = cash_paid.checked_add(fill.net)?;
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
        }
    }

    Ok(BasketEpochOutcome {
        requests: updated,
        shares_burned,
        cash_paid,
        fees_retained,
        transfers,
        new_cash: running_cash,
        new_total_shares: opening_shares.checked_sub(shares_burned)?,
        new_positions: running_positions,
        cash_equity,
    })
}
