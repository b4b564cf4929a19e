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
    /// Whether the database is reachable.
    pub db_healthy: bool,
    /// Whether the event dispatcher is running.
    pub bus_running: bool,
}

/// GET /health -- returns service, database and dispatcher health.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let db_healthy = modular_db::health_check(state.store.pool()).await.is_ok();
    let bus_running = state.bus.is_running();

    let status = if db_healthy && bus_running { "ok" } else { "degraded" };

    Json(HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION"),
        db_healthy,
        bus_running,
    })
}

/// Mount health check routes (root-level, not under `/api`).
pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
