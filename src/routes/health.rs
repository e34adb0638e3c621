//! Health and readiness endpoints

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;

use crate::state::AppState;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

/// Readiness check response
#[derive(Debug, Serialize)]
pub struct ReadinessResponse {
    pub status: &'static str,
    pub checks: ReadinessChecks,
}

#[derive(Debug, Serialize)]
pub struct ReadinessChecks {
    pub store: CheckStatus,
    pub buffer: CheckStatus,
}

#[derive(Debug, Serialize)]
pub struct CheckStatus {
    pub healthy: bool,
    pub message: String,
}

/// GET /health
///
/// Basic health check - returns 200 if the server is running
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// GET /ready
///
/// Readiness check - verifies the store is reachable
pub async fn ready(State(state): State<AppState>) -> (StatusCode, Json<ReadinessResponse>) {
    let store_check = match state.store.ping().await {
        Ok(()) => CheckStatus {
            healthy: true,
            message: "Connected".to_string(),
        },
        Err(e) => CheckStatus {
            healthy: false,
            message: format!("Store unreachable: {}", e),
        },
    };

    let buffer_check = CheckStatus {
        healthy: true,
        message: format!("Buffer length: {}", state.event_buffer.len()),
    };

    let all_healthy = store_check.healthy && buffer_check.healthy;
    let status = if all_healthy { "ready" } else { "not_ready" };
    let status_code = if all_healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status_code,
        Json(ReadinessResponse {
            status,
            checks: ReadinessChecks {
                store: store_check,
                buffer: buffer_check,
            },
        }),
    )
}
