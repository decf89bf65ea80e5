//! Domain types for the pooled-fund ledger.
//!
//! This module provides:
//! - `Amount`/`BasisPoints`: exact fixed-point arithmetic at scale 6
//! - `Vault`/`VaultStage`: the fund aggregate and its lifecycle
//! - `RedemptionRequest`: queued exit intents with escrowed shares
//! - `Position`/`Quote`/`PriceSnapshot`: basket holdings and pricing inputs

pub mod amount;
pub mod position;
pub mod request;
pub mod vault;

pub use amount::{Amount, AmountError, BasisPoints, SCALE};
pub use position::{Position, PriceSnapshot, PricingMode, Quote, Side};
pub use request::{RedemptionRequest, RequestKind, RequestStatus};
pub use vault::{Vault, VaultStage};
