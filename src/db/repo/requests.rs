//! Redemption request and holding operations for the repository.

use crate::domain::{Amount, RedemptionRequest, RequestKind, RequestStatus};
use sqlx::Row;
use std::str::FromStr;
use tracing::warn;
use uuid::Uuid;

use super::{parse_stored_amount, timestamp_from_ms, Repository};

impl Repository {
    // =========================================================================
    // Redemption request operations
    // =========================================================================

    /// Insert a redemption request, assigning the next arrival sequence for
    /// its vault. Arrival order, not wall-clock time, drives FIFO settlement.
    ///
    /// # Errors
    /// Returns an error if the insert fails.
    pub async fn insert_request(&self, request: &RedemptionRequest) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO redemption_requests (
                id, vault_id, holder, shares_requested, shares_filled,
                status, kind, requested_at_ms, arrival_seq
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?,
                (SELECT COALESCE(MAX(arrival_seq), 0) + 1
                 FROM redemption_requests WHERE vault_id = ?))
            "#,
        )
        .bind(request.id.to_string())
        .bind(request.vault_id.to_string())
        .bind(request.holder.as_str())
        .bind(request.shares_requested.to_string())
        .bind(request.shares_filled.to_string())
        .bind(request.status.to_string())
        .bind(request.kind.to_string())
        .bind(request.requested_at.timestamp_millis())
        .bind(request.vault_id.to_string())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Get a request by id.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn get_request(&self, id: Uuid) -> Result<Option<RedemptionRequest>, sqlx::Error> {
        let row = sqlx::query(
            r#"
            SELECT id, vault_id, holder, shares_requested, shares_filled,
                   status, kind, requested_at_ms
            FROM redemption_requests
            WHERE id = ?
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| request_from_row(&r)))
    }

    /// List all requests for a vault in arrival order.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn list_requests(&self, vault_id: Uuid) -> Result<Vec<RedemptionRequest>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT id, vault_id, holder, shares_requested, shares_filled,
                   status, kind, requested_at_ms
            FROM redemption_requests
            WHERE vault_id = ?
            ORDER BY arrival_seq ASC
            "#,
        )
        .bind(vault_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(request_from_row).collect())
    }

    /// List open (pending or partially filled) requests for a vault in
    /// arrival order. This is the settlement queue.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn list_open_requests(
        &self,
        vault_id: Uuid,
    ) -> Result<Vec<RedemptionRequest>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT id, vault_id, holder, shares_requested, shares_filled,
                   status, kind, requested_at_ms
            FROM redemption_requests
            WHERE vault_id = ? AND status IN ('pending', 'partiallyFilled')
            ORDER BY arrival_seq ASC
            "#,
        )
        .bind(vault_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(request_from_row).collect())
    }

    /// Update a request's fill progress and status.
    ///
    /// # Errors
    /// Returns an error if the update fails.
    pub async fn update_request(&self, request: &RedemptionRequest) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE redemption_requests
            SET shares_filled = ?, status = ?
            WHERE id = ?
            "#,
        )
        .bind(request.shares_filled.to_string())
        .bind(request.status.to_string())
        .bind(request.id.to_string())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    // =========================================================================
    // Holding operations
    // =========================================================================

    /// Get a holder's free share balance for a vault. Missing rows read as zero.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn get_holding(&self, vault_id: Uuid, holder: &str) -> Result<Amount, sqlx::Error> {
        let row = sqlx::query(
            r#"
            SELECT shares
            FROM holdings
            WHERE vault_id = ? AND holder = ?
            "#,
        )
        .bind(vault_id.to_string())
        .bind(holder)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row
            .map(|r| {
                let shares_str: String = r.get("shares");
                parse_stored_amount("holding.shares", &shares_str)
            })
            .unwrap_or(Amount::ZERO))
    }

    /// Set a holder's free share balance for a vault.
    ///
    /// # Errors
    /// Returns an error if the upsert fails.
    pub async fn set_holding(
        &self,
        vault_id: Uuid,
        holder: &str,
        shares: Amount,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO holdings (vault_id, holder, shares)
            VALUES (?, ?, ?)
            ON CONFLICT(vault_id, holder) DO UPDATE SET shares = excluded.shares
            "#,
        )
        .bind(vault_id.to_string())
        .bind(holder)
        .bind(shares.to_string())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

fn request_from_row(row: &sqlx::sqlite::SqliteRow) -> RedemptionRequest {
    let id_str: String = row.get("id");
    let id = Uuid::from_str(&id_str).unwrap_or_else(|e| {
        warn!(id = %id_str, error = %e, "Failed to parse stored request id, using nil");
        Uuid::nil()
    });

    let vault_id_str: String = row.get("vault_id");
    let vault_id = Uuid::from_str(&vault_id_str).unwrap_or_else(|e| {
        warn!(vault_id = %vault_id_str, error = %e, "Failed to parse stored vault id, using nil");
        Uuid::nil()
    });

    let status_str: String = row.get("status");
    let status = RequestStatus::from_str(&status_str).unwrap_or_else(|e| {
        warn!(id = %id_str, status = %status_str, error = %e, "Unknown stored request status, quarantining");
        RequestStatus::Invalid
    });

    let kind_str: String = row.get("kind");
    let kind = RequestKind::from_str(&kind_str).unwrap_or_else(|e| {
        warn!(id = %id_str, kind = %kind_str, error = %e, "Unknown stored request kind, defaulting to CASH");
        RequestKind::Cash
    });

    let shares_requested_str: String = row.get("shares_requested");
    let shares_filled_str: String = row.get("shares_filled");
    let requested_at_ms: i64 = row.get("requested_at_ms");

    RedemptionRequest {
        id,
        vault_id,
        holder: row.get("holder"),
        shares_requested: parse_stored_amount("request.shares_requested", &shares_requested_str),
        shares_filled: parse_stored_amount("request.shares_filled", &shares_filled_str),
        status,
        kind,
        requested_at: timestamp_from_ms(requested_at_ms),
    }
}
