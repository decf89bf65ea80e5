pub mod api;
pub mod config;
pub mod db;
pub mod domain;
pub mod engine;
pub mod error;

pub use config::Config;
pub use db::{init_db, Repository};
pub use domain::{
    Amount, BasisPoints, Position, PriceSnapshot, PricingMode, Quote, RedemptionRequest,
    RequestKind, RequestStatus, Side, Vault, VaultStage,
};
pub use error::{AppError, LedgerError};
