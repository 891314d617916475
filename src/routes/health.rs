//! Health check endpoints for liveness and readiness probes.

use axum::{extract::State, Json};
use serde::Serialize;

use crate::errors::ApiResponse;
use crate::AppState;

/// Readiness probe detail.
#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub status: String,
    pub data_service: String,
    pub dashboard: String,
}

/// Liveness probe: returns OK if the process is running.
pub async fn live() -> &'static str {
    "OK"
}

/// Readiness probe: checks the data service and the dashboard lifecycle.
pub async fn ready(State(state): State<AppState>) -> Json<ApiResponse<HealthStatus>> {
    let data_service = match state.service.ping().await {
        Ok(()) => "connected".to_string(),
        Err(e) => {
            tracing::warn!(error = %e, "Data service health check failed");
            format!("error: {e}")
        }
    };

    let dashboard = if state.dashboard.is_active() {
        "active"
    } else {
        "inactive"
    };

    ApiResponse::success(HealthStatus {
        status: "ok".to_string(),
        data_service,
        dashboard: dashboard.to_string(),
    })
}
