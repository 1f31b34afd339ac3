use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::server::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    success: bool,
    status: &'static str,
    database: &'static str,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/api/health", get(health))
}

/// Checks the connection manager directly; the executor's retries would
/// only delay a "disconnected" answer.
async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let connected = state.executor.manager().is_connected().await;
    Json(HealthResponse {
        success: true,
        status: "ok",
        database: if connected { "connected" } else { "disconnected" },
    })
}
