//! Redemption/withdrawal request records.

use crate::domain::Amount;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Request lifecycle status.
///
/// `Invalid` marks a corrupt record (filled > requested, negative fields)
/// quarantined by a settlement pass; it is terminal like `Completed` and
/// `Cancelled`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RequestStatus {
    Pending,
    PartiallyFilled,
    Completed,
    Cancelled,
    Invalid,
}

impl std::fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RequestStatus::Pending => "pending",
            RequestStatus::PartiallyFilled => "partiallyFilled",
            RequestStatus::Completed => "completed",
            RequestStatus::Cancelled => "cancelled",
            RequestStatus::Invalid => "invalid",
        };
        write!(f, "{}", s)
    }
}

impl std::str::FromStr for RequestStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(RequestStatus::Pending),
            "partiallyFilled" => Ok(RequestStatus::PartiallyFilled),
            "completed" => Ok(RequestStatus::Completed),
            "cancelled" => Ok(RequestStatus::Cancelled),
            "invalid" => Ok(RequestStatus::Invalid),
            other => Err(format!("unknown request status: {}", other)),
        }
    }
}

/// Settlement mode requested by the holder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestKind {
    Cash,
    InKind,
}

impl std::fmt::Display for RequestKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RequestKind::Cash => write!(f, "CASH"),
            RequestKind::InKind => write!(f, "IN_KIND"),
        }
    }
}

impl std::str::FromStr for RequestKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CASH" => Ok(RequestKind::Cash),
            "IN_KIND" => Ok(RequestKind::InKind),
            other => Err(format!("unknown request kind: {}", other)),
        }
    }
}

/// A holder's recorded intent to exit, escrowing shares until settlement.
///
/// Created by a holder action; mutated only by epoch settlement (fill) or
/// cancel (on the unfilled remainder).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RedemptionRequest {
    pub id: Uuid,
    pub vault_id: Uuid,
    pub holder: String,
    pub shares_requested: Amount,
    pub shares_filled: Amount,
    pub status: RequestStatus,
    pub kind: RequestKind,
    pub requested_at: DateTime<Utc>,
}

impl RedemptionRequest {
    /// Shares not yet filled.
    pub fn shares_remaining(&self) -> Amount {
        self.shares_requested.sub_or_zero(self.shares_filled)
    }

    /// True while the request can still be filled by an epoch.
    pub fn is_open(&self) -> bool {
        matches!(
            self.status,
            RequestStatus::Pending | RequestStatus::PartiallyFilled
        )
    }

    /// Detect per-request state corruption: negative fields or an overfill.
    pub fn is_corrupt(&self) -> bool {
        self.shares_requested.is_negative()
            || self.shares_filled.is_negative()
            || self.shares_filled > self.shares_requested
    }
}
