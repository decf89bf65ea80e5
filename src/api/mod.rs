pub mod deposits;
pub mod epochs;
pub mod health;
pub mod redemptions;
pub mod vaults;
pub mod withdrawals;

use crate::config::Config;
use crate::db::Repository;
use axum::{
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::cors::{Any, CorsLayer};

#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<Repository>,
    pub config: Config,
    /// Serializes every read-compute-write mutation. One writer at a time
    /// keeps the ledger's conservation invariants intact without row locking.
    pub write_lock: Arc<Mutex<()>>,
}

impl AppState {
    pub fn new(repo: Arc<Repository>, config: Config) -> Self {
        Self {
            repo,
            config,
            write_lock: Arc::new(Mutex::new(())),
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health::health))
        .route("/ready", get(health::ready))
        .route("/v1/vaults", post(vaults::create_vault).get(vaults::list_vaults))
        .route("/v1/vaults/:id", get(vaults::get_vault))
        .route("/v1/vaults/:id/stage", post(vaults::advance_stage))
        .route("/v1/vaults/:id/book", put(vaults::update_book))
        .route("/v1/vaults/:id/deposits", post(deposits::create_deposit))
        .route(
            "/v1/vaults/:id/open-withdrawals",
            post(withdrawals::create_open_withdrawal),
        )
        .route(
            "/v1/vaults/:id/withdrawals",
            post(withdrawals::create_withdrawal).get(withdrawals::list_withdrawals),
        )
        .route(
            "/v1/vaults/:id/withdrawals/:request_id/cancel",
            post(withdrawals::cancel_withdrawal),
        )
        .route("/v1/vaults/:id/epochs", post(epochs::settle_cash_epoch))
        .route(
            "/v1/vaults/:id/basket-epochs",
            post(epochs::settle_basket_epoch),
        )
        .route(
            "/v1/vaults/:id/redemptions",
            post(redemptions::create_redemption),
        )
        .layer(cors)
        .with_state(state)
}
