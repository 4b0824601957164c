pub mod files;
pub mod health;
pub mod metrics;
pub mod scan;
pub mod terraform;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::app_state::AppState;

const CONFIG_BODY_LIMIT: usize = 64 * 1024;
const PLAN_BODY_LIMIT: usize = 10 * 1024 * 1024;
const TF_UPLOAD_BODY_LIMIT: usize = 50 * 1024 * 1024;

/// All `/api` routes with their middleware stack.
pub fn api_router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health::health_check))
        .route("/api/version", get(health::version))
        .route("/api/scan", post(scan::run_scan))
        .route(
            "/api/config",
            get(files::get_config)
                .put(files::put_config)
                .layer(DefaultBodyLimit::max(CONFIG_BODY_LIMIT)),
        )
        .route(
            "/api/files/plan",
            get(files::get_plan)
                .put(files::put_plan)
                .layer(DefaultBodyLimit::max(PLAN_BODY_LIMIT)),
        )
        .route("/api/files/list", get(files::list_files))
        .route(
            "/api/files/upload",
            post(files::upload_plan).layer(DefaultBodyLimit::max(PLAN_BODY_LIMIT)),
        )
        .route("/api/files/generate-plan", post(files::generate_plan))
        .route("/api/terraform/status", get(terraform::status))
        .route(
            "/api/terraform/upload",
            post(terraform::upload).layer(DefaultBodyLimit::max(TF_UPLOAD_BODY_LIMIT)),
        )
        .route("/api/terraform/plan", post(terraform::start_plan))
        .route("/api/terraform/job", get(terraform::job_status))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(RequestBodyLimitLayer::new(TF_UPLOAD_BODY_LIMIT))
}
