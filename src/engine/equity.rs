//! Basket mark-to-market valuation against a caller-supplied price snapshot.

use crate::domain::{Amount, Position, PriceSnapshot, PricingMode, Side};
use crate::error::LedgerError;

/// Per-share price for a position under the given mode.
///
/// Snapshots quote the YES side; NO derives as the complement `1 - yes`.
pub fn position_price(
    position: &Position,
    snapshot: &PriceSnapshot,
    mode: PricingMode,
) -> Result<Amount, LedgerError> {
    let quote = snapshot
        .get(&position.market_id)
        .ok_or_else(|| LedgerError::UnpricedMarket(position.market_id.clone()))?;
    let yes = quote.price(mode);
    match position.side {
        Side::Yes => Ok(yes),
        Side::No => Ok(Amount::ONE.checked_sub(yes)?),
    }
}

/// `cash + Σ floor(shares * price)` across the basket.
///
/// A market absent from the snapshot fails the valuation rather than being
/// silently priced at zero.
pub fn basket_equity(
    cash: Amount,
    positions: &[Position],
    snapshot: &PriceSnapshot,
    mode: PricingMode,
) -> Result<Amount, LedgerError> {
    cash.ensure_non_negative("cash")?;
    let mut equity = cash;
    for position in positions {
        position.shares.ensure_non_negative("positionShares")?;
        let price = position_price(position, snapshot, mode)?;
        let value = position.shares.mul_div_floor(price, Amount::ONE)?;
        equity = equity.checked_add(value)?;
    }
    Ok(equity)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Quote;
    use std::collections::HashMap;

    fn snapshot(market_id: &str, bid: &str, mid: &str, ask: &str) -> PriceSnapshot {
        let mut map = HashMap::new();
        map.insert(
            market_id.to_string(),
            Quote {
                bid: Amount::parse(bid).unwrap(),
                mid: Amount::parse(mid).unwrap(),
                ask: Amount::parse(ask).unwrap(),
            },
        );
        map
    }

    fn position(market_id: &str, side: Side, shares: &str) -> Position {
        Position {
            market_id: market_id.to_string(),
            side,
            shares: Amount::parse(shares).unwrap(),
        }
    }

    #[test]
    fn yes_position_values_at_chosen_quote() {
        let snap = snapshot("mkt-1", "0.40", "0.42", "0.44");
        let positions = vec![position("mkt-1", Side::Yes, "100")];
        let cash = Amount::parse("10").unwrap();

        let mid = basket_equity(cash, &positions, &snap, PricingMode::Mid).unwrap();
        assert_eq!(mid.to_string(), "52.000000");

        // Cash-NAV mode is deliberately conservative.
        let bid = basket_equity(cash, &positions, &snap, PricingMode::Bid).unwrap();
        assert_eq!(bid.to_string(), "50.000000");
    }

    #[test]
    fn no_position_prices_as_complement() {
        let snap = snapshot("mkt-1", "0.40", "0.42", "0.44");
        let positions = vec![position("mkt-1", Side::No, "100")];
        let equity =
            basket_equity(Amount::ZERO, &positions, &snap, PricingMode::Mid).unwrap();
        // 1 - 0.42 = 0.58 per share.
        assert_eq!(equity.to_string(), "58.000000");
    }

    #[test]
    fn missing_market_fails_the_valuation() {
        let snap = snapshot("mkt-1", "0.40", "0.42", "0.44");
        let positions = vec![position("mkt-2", Side::Yes, "100")];
        assert_eq!(
            basket_equity(Amount::ZERO, &positions, &snap, PricingMode::Mid),
            Err(LedgerError::UnpricedMarket("mkt-2".to_string()))
        );
    }

    #[test]
    fn position_value_floors_to_micro_units() {
        let snap = snapshot("mkt-1", "0.333333", "0.333333", "0.333333");
        let positions = vec![position("mkt-1", Side::Yes, "0.000001")];
        let equity =
            basket_equity(Amount::ZERO, &positions, &snap, PricingMode::Mid).unwrap();
        assert_eq!(equity, Amount::ZERO);
    }
}
