use crate::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Health check endpoint
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadyResponse {
    pub status: String,
    pub store_degraded: bool,
    pub raft_healthy: bool,
}

/// Readiness: degrades when the config store has seen a write failure or
/// the replica has no leader.
pub async fn readiness(
    State(state): State<Arc<AppState>>,
) -> (StatusCode, Json<ReadyResponse>) {
    let store_degraded = state.control.store().is_degraded();
    let raft_healthy = state.control.raft().stats().healthy;

    let (status_code, status) = if store_degraded || !raft_healthy {
        (StatusCode::SERVICE_UNAVAILABLE, "degraded")
    } else {
        (StatusCode::OK, "ready")
    };

    (
        status_code,
        Json(ReadyResponse {
            status: status.to_string(),
            store_degraded,
            raft_healthy,
        }),
    )
}
