//! Basket positions and caller-supplied price snapshots.

use crate::domain::Amount;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Outcome side of a two-sided market position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Yes,
    No,
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Yes => write!(f, "YES"),
            Side::No => write!(f, "NO"),
        }
    }
}

impl std::str::FromStr for Side {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "YES" => Ok(Side::Yes),
            "NO" => Ok(Side::No),
            other => Err(format!("unknown side: {}", other)),
        }
    }
}

/// A priced holding owned by a basket vault.
///
/// The engine mutates share counts only; market identity never changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    pub market_id: String,
    pub side: Side,
    pub shares: Amount,
}

/// YES-side quote for one market.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    pub bid: Amount,
    pub ask: Amount,
    pub mid: Amount,
}

/// Caller-supplied pricing keyed by market id.
pub type PriceSnapshot = HashMap<String, Quote>;

/// Which quote field a valuation reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PricingMode {
    Bid,
    Mid,
    Ask,
}

impl Quote {
    /// YES-side price under the given mode.
    pub fn price(&self, mode: PricingMode) -> Amount {
        match mode {
            PricingMode::Bid => self.bid,
            PricingMode::Mid => self.mid,
            PricingMode::Ask => self.ask,
        }
    }
}
