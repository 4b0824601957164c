use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;
use axum::Json;
use garde::Validate;

use crate::app_state::AppState;
use crate::error::ApiError;
use crate::models::scan::ScanRequest;

/// POST /api/scan — run `cloudrift scan` and return its JSON report.
pub async fn run_scan(
    State(state): State<AppState>,
    body: Result<Json<ScanRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = body?;
    if req.service.is_empty() {
        return Err(ApiError::BadRequest("service is required".to_string()));
    }
    req.validate()?;

    // The CLI reads these itself; keep them inside the working directory.
    state.sandbox.resolve(req.config_path())?;
    if let Some(dir) = req.policy_dir.as_deref().filter(|d| !d.is_empty()) {
        state.sandbox.resolve(dir)?;
    }

    metrics::counter!("scan_requests_total", "service" => req.service.clone()).increment(1);
    tracing::info!(service = %req.service, config = %req.config_path(), "Running scan");

    let report = state.cli.scan(&req).await?;
    Ok(([(header::CONTENT_TYPE, "application/json")], report))
}
