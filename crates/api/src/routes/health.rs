use axum::extract::State;
use axum::{routing::get, Json, Router};
use serde::Serialize;

use crate::state::AppState;

/// Health check response payload.
#[derive(Serialize)]
pub struct HealthResponse {
    /// Overall service status.
    pub status: &'static str,
    /// Crate version from Cargo.toml.
    pub version: &'static str,
    /// Whether the lock store is reachable.
    pub store_healthy: bool,
    /// Configured lock TTL in seconds.
    pub lock_ttl_secs: u64,
    /// Which lock backend the server was started with.
    pub lock_backend: &'static str,
    /// Interval of the expired-lock sweeper in seconds.
    pub sweep_interval_secs: u64,
}

/// GET /health -- returns service and lock store health.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let store_healthy = state.store.ping().await.is_ok();

    let status = if store_healthy { "ok" } else { "degraded" };

    Json(HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION"),
        store_healthy,
        lock_ttl_secs: state.store.ttl_secs(),
        lock_backend: state.config.lock_backend.name(),
        sweep_interval_secs: state.config.sweep_interval_secs,
    })
}

/// Mount health check routes (intended for root-level, NOT under `/api/v1`).
pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
