//! Health and liveness endpoint handlers.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde_json::json;

use super::AppState;

/// Returns process health as JSON: uptime, the size of the scoped entity
/// catalog and the carrier's scope counters.
pub async fn health_handler(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "uptime_secs": state.start_time.elapsed().as_secs(),
        "scoped_entities": state.scope.registry.len(),
        "carrier": state.scope.carrier.snapshot(),
    }))
}

/// Liveness probe -- always returns 200 OK.
///
/// Checks only that the process is running and responsive, not downstream
/// dependencies.
pub async fn liveness_handler() -> StatusCode {
    StatusCode::OK
}
