use crate::domain::{AmountError, VaultStage};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Engine-level error taxonomy.
///
/// Every failure is an explicit result value; settlement never throws past
/// the caller. Capacity shortfalls are not errors at all; they surface as
/// partially filled requests.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error(transparent)]
    Amount(#[from] AmountError),
    #[error("operation requires stage {expected}, vault is {actual}")]
    StageViolation { expected: String, actual: VaultStage },
    #[error("amount must be greater than zero")]
    ZeroAmount,
    #[error("insufficient funds")]
    InsufficientFunds,
    #[error("insufficient shares")]
    InsufficientShares,
    #[error("deposit too small to mint a share")]
    DepositTooSmall,
    #[error("settlement requires positive equity")]
    ZeroEquity,
    #[error("settlement requires outstanding shares")]
    ZeroShares,
    #[error("request {0} has corrupt state")]
    CorruptRequest(String),
    #[error("nothing left to cancel")]
    NothingToCancel,
    #[error("no pending requests to settle")]
    NoPendingRequests,
    #[error("vault still holds open positions")]
    PositionsOpen,
    #[error("no price for market {0}")]
    UnpricedMarket(String),
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Internal server error: {0}")]
    Internal(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Bad request: {0}")]
    BadRequest(String),
    #[error("Conflict: {0}")]
    Conflict(String),
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<LedgerError> for AppError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::StageViolation { .. } => AppError::Conflict(err.to_string()),
            _ => AppError::BadRequest(err.to_string()),
        }
    }
}

impl From<AmountError> for AppError {
    fn from(err: AmountError) -> Self {
        AppError::BadRequest(err.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::Config(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}
