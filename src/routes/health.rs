use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::app_state::AppState;
use crate::error::ApiError;

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub available: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VersionResponse {
    pub version: String,
}

/// GET /api/health — whether the Cloudrift CLI can be executed.
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let start = std::time::Instant::now();
    let available = state.cli.is_available().await;
    tracing::debug!(
        available,
        latency_ms = start.elapsed().as_millis() as u64,
        "CLI health check"
    );
    Json(HealthResponse { available })
}

/// GET /api/version — `cloudrift --version`.
pub async fn version(State(state): State<AppState>) -> Result<Json<VersionResponse>, ApiError> {
    let version = state
        .cli
        .version()
        .await
        .map_err(|_| ApiError::Unavailable("CLI not available".to_string()))?;
    Ok(Json(VersionResponse { version }))
}
