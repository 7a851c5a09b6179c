//! Liveness endpoints

use axum::{extract::State, http::StatusCode, Json};

use crate::models::HealthResponse;
use crate::state::AppState;

pub async fn root() -> &'static str {
    "Wallet Auth API Server"
}

/// Store reachability with the build version.
pub async fn health_status(state: &AppState) -> (bool, HealthResponse) {
    let (healthy, store) = match state.store.ping().await {
        Ok(()) => (true, "connected".to_string()),
        Err(e) => {
            tracing::error!(error = %e, "Health check failed");
            (false, "unreachable".to_string())
        }
    };

    let response = HealthResponse {
        status: if healthy { "healthy" } else { "unhealthy" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        store,
    };

    (healthy, response)
}

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let (healthy, response) = health_status(&state).await;
    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(response))
}
