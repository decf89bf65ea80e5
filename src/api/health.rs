use axum::extract::State;
use axum::Json;

use crate::api::AppState;
use crate::error::AppError;

pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok", "service": "vaultledger"}))
}

/// Readiness checks the database, not just the process.
pub async fn ready(State(state): State<AppState>) -> Result<Json<serde_json::Value>, AppError> {
    state.repo.ping().await?;
    Ok(Json(serde_json::json!({"status": "ready"})))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::db::{init_db, Repository};
    use crate::domain::{BasisPoints, PricingMode};
    use std::sync::Arc;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_health_names_the_service() {
        let Json(body) = health().await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["service"], "vaultledger");
    }

    #[tokio::test]
    async fn test_ready_pings_the_database() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir
            .path()
            .join("test.db")
            .to_string_lossy()
            .to_string();
        let pool = init_db(&db_path).await.expect("init_db failed");
        let repo = Arc::new(Repository::new(pool));
        let config = Config {
            port: 0,
            database_path: db_path,
            cash_nav_mode: PricingMode::Bid,
            max_deposit_fee_bps: BasisPoints::new(300).unwrap(),
            max_perf_fee_bps: BasisPoints::new(3000).unwrap(),
            max_early_exit_fee_bps: BasisPoints::new(500).unwrap(),
        };
        let state = AppState::new(repo, config);

        let Json(body) = ready(State(state)).await.expect("ready failed");
        assert_eq!(body["status"], "ready");
    }
}
