//! The pure ledger/settlement engine.
//!
//! Every operation here is a synchronous function over an immutable snapshot
//! of vault/request state that returns new state; there is no I/O and no
//! ambient state. Callers are responsible for serializing mutating operations
//! per vault (the HTTP layer takes a write lock around read-compute-write).

pub mod basket;
pub mod deposit;
pub mod epoch;
pub mod equity;
pub mod redemption;
pub mod withdrawal;

pub use basket::{settle_basket_epoch, BasketEpochOutcome, InKindTransfer};
pub use deposit::{settle_deposit, DepositOutcome};
pub use epoch::{settle_epoch, EpochOutcome};
pub use equity::{basket_equity, position_price};
pub use redemption::{redeem_closed, RedemptionOutcome};
pub use withdrawal::{
    cancel_request, request_withdrawal, withdraw_open, CancelOutcome, OpenWithdrawalOutcome,
};
