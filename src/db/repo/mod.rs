//! Repository layer for database operations.
//!
//! This module provides the `Repository` struct for all database operations.
//! Methods are organized across submodules by domain:
//! - `requests.rs` - Redemption request and holding operations
//!
//! Monetary columns are stored as canonical decimal strings to avoid any
//! float involvement in SQLite.

mod requests;

use crate::domain::{
    Amount, BasisPoints, Position, RedemptionRequest, Side, Vault, VaultStage,
};
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqlitePool;
use sqlx::Row;
use std::str::FromStr;
use tracing::warn;
use uuid::Uuid;

/// Repository for database operations.
pub struct Repository {
    pool: SqlitePool,
}

/// Parse a stored amount column, logging and zeroing on corruption.
fn parse_stored_amount(field: &'static str, raw: &str) -> Amount {
    Amount::parse(raw).unwrap_or_else(|e| {
        warn!(field, value = %raw, error = %e, "Failed to parse stored amount, using zero");
        Amount::ZERO
    })
}

/// Parse a stored basis-points column, logging and zeroing on corruption.
fn parse_stored_bps(field: &'static str, raw: i64) -> BasisPoints {
    u16::try_from(raw)
        .ok()
        .and_then(|v| BasisPoints::new(v).ok())
        .unwrap_or_else(|| {
            warn!(field, value = raw, "Stored basis points out of range, using zero");
            BasisPoints::ZERO
        })
}

fn timestamp_from_ms(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or(DateTime::<Utc>::MIN_UTC)
}

impl Repository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Repository { pool }
    }

    /// Round-trip a trivial query, for readiness checks.
    ///
    /// # Errors
    /// Returns an error if the database is unreachable.
    pub async fn ping(&self) -> Result<(), sqlx::Error> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    // =========================================================================
    // Vault operations
    // =========================================================================

    /// Insert a vault and its positions atomically.
    ///
    /// # Errors
    /// Returns an error if the transaction fails.
    pub async fn insert_vault(&self, vault: &Vault) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO vaults (
                id, name, stage, cash, total_shares, high_water_mark,
                deposit_fee_bps, perf_fee_bps, early_exit_fee_bps,
                liquidity_buffer_bps, perf_fee_due, perf_fee_paid, created_at_ms
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(vault.id.to_string())
        .bind(vault.name.as_str())
        .bind(vault.stage.to_string())
        .bind(vault.cash.to_string())
        .bind(vault.total_shares.to_string())
        .bind(vault.high_water_mark.to_string())
        .bind(vault.deposit_fee_bps.as_u16() as i64)
        .bind(vault.perf_fee_bps.as_u16() as i64)
        .bind(vault.early_exit_fee_bps.as_u16() as i64)
        .bind(vault.liquidity_buffer_bps.as_u16() as i64)
        .bind(vault.perf_fee_due.to_string())
        .bind(vault.perf_fee_paid as i64)
        .bind(vault.created_at.timestamp_millis())
        .execute(&mut *tx)
        .await?;

        for position in &vault.positions {
            insert_position_tx(&mut tx, vault.id, position).await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Get a vault by id, including its positions.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn get_vault(&self, id: Uuid) -> Result<Option<Vault>, sqlx::Error> {
        let row = sqlx::query(
            r#"
            SELECT id, name, stage, cash, total_shares, high_water_mark,
                   deposit_fee_bps, perf_fee_bps, early_exit_fee_bps,
                   liquidity_buffer_bps, perf_fee_due, perf_fee_paid, created_at_ms
            FROM vaults
            WHERE id = ?
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let positions = self.query_positions(id).await?;
        Ok(Some(vault_from_row(&row, positions)))
    }

    /// List all vaults, newest first. Positions are not loaded.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn list_vaults(&self) -> Result<Vec<Vault>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT id, name, stage, cash, total_shares, high_water_mark,
                   deposit_fee_bps, perf_fee_bps, early_exit_fee_bps,
                   liquidity_buffer_bps, perf_fee_due, perf_fee_paid, created_at_ms
            FROM vaults
            ORDER BY created_at_ms DESC, id DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| vault_from_row(row, Vec::new()))
            .collect())
    }

    /// Update a vault's mutable state and replace its positions atomically.
    ///
    /// # Errors
    /// Returns an error if the transaction fails.
    pub async fn update_vault(&self, vault: &Vault) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        update_vault_tx(&mut tx, vault).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Persist a settlement outcome atomically: the updated vault, the updated
    /// requests, and any holder share adjustments.
    ///
    /// If any statement fails the whole settlement is rolled back, so the
    /// ledger never shows a vault debited without the matching request fills.
    ///
    /// # Errors
    /// Returns an error if the transaction fails.
    pub async fn apply_settlement(
        &self,
        vault: &Vault,
        settled_requests: &[RedemptionRequest],
    ) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        update_vault_tx(&mut tx, vault).await?;

        for request in settled_requests {
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
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn query_positions(&self, vault_id: Uuid) -> Result<Vec<Position>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT market_id, side, shares
            FROM positions
            WHERE vault_id = ?
            ORDER BY market_id ASC, side ASC
            "#,
        )
        .bind(vault_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| {
                let market_id: String = row.get("market_id");
                let side_str: String = row.get("side");
                let shares_str: String = row.get("shares");

                let side = Side::from_str(&side_str).unwrap_or_else(|e| {
                    warn!(market_id = %market_id, side = %side_str, error = %e, "Unknown stored side, defaulting to YES");
                    Side::Yes
                });

                Position {
                    market_id,
                    side,
                    shares: parse_stored_amount("position.shares", &shares_str),
                }
            })
            .collect())
    }
}

async fn update_vault_tx(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    vault: &Vault,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE vaults
        SET stage = ?, cash = ?, total_shares = ?, high_water_mark = ?,
            perf_fee_due = ?, perf_fee_paid = ?
        WHERE id = ?
        "#,
    )
    .bind(vault.stage.to_string())
    .bind(vault.cash.to_string())
    .bind(vault.total_shares.to_string())
    .bind(vault.high_water_mark.to_string())
    .bind(vault.perf_fee_due.to_string())
    .bind(vault.perf_fee_paid as i64)
    .bind(vault.id.to_string())
    .execute(&mut **tx)
    .await?;

    sqlx::query("DELETE FROM positions WHERE vault_id = ?")
        .bind(vault.id.to_string())
        .execute(&mut **tx)
        .await?;

    for position in &vault.positions {
        insert_position_tx(tx, vault.id, position).await?;
    }

    Ok(())
}

async fn insert_position_tx(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    vault_id: Uuid,
    position: &Position,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO positions (vault_id, market_id, side, shares)
        VALUES (?, ?, ?, ?)
        "#,
    )
    .bind(vault_id.to_string())
    .bind(position.market_id.as_str())
    .bind(position.side.to_string())
    .bind(position.shares.to_string())
    .execute(&mut **tx)
    .await?;
    Ok(())
}

fn vault_from_row(row: &sqlx::sqlite::SqliteRow, positions: Vec<Position>) -> Vault {
    let id_str: String = row.get("id");
    let id = Uuid::from_str(&id_str).unwrap_or_else(|e| {
        warn!(id = %id_str, error = %e, "Failed to parse stored vault id, using nil");
        Uuid::nil()
    });

    let stage_str: String = row.get("stage");
    let stage = VaultStage::from_str(&stage_str).unwrap_or_else(|e| {
        warn!(id = %id_str, stage = %stage_str, error = %e, "Unknown stored vault stage, defaulting to closed");
        VaultStage::Closed
    });

    let cash_str: String = row.get("cash");
    let total_shares_str: String = row.get("total_shares");
    let hwm_str: String = row.get("high_water_mark");
    let perf_fee_due_str: String = row.get("perf_fee_due");
    let perf_fee_paid: i64 = row.get("perf_fee_paid");
    let created_at_ms: i64 = row.get("created_at_ms");

    Vault {
        id,
        name: row.get("name"),
        stage,
        cash: parse_stored_amount("vault.cash", &cash_str),
        total_shares: parse_stored_amount("vault.total_shares", &total_shares_str),
        high_water_mark: parse_stored_amount("vault.high_water_mark", &hwm_str),
        deposit_fee_bps: parse_stored_bps("vault.deposit_fee_bps", row.get("deposit_fee_bps")),
        perf_fee_bps: parse_stored_bps("vault.perf_fee_bps", row.get("perf_fee_bps")),
        early_exit_fee_bps: parse_stored_bps(
            "vault.early_exit_fee_bps",
            row.get("early_exit_fee_bps"),
        ),
        liquidity_buffer_bps: parse_stored_bps(
            "vault.liquidity_buffer_bps",
            row.get("liquidity_buffer_bps"),
        ),
        perf_fee_due: parse_stored_amount("vault.perf_fee_due", &perf_fee_due_str),
        perf_fee_paid: perf_fee_paid != 0,
        positions,
        created_at: timestamp_from_ms(created_at_ms),
    }
}
