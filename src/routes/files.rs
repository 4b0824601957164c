use axum::body::Bytes;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Multipart, Query, State};
use axum::http::header;
use axum::response::IntoResponse;
use axum::Json;
use std::io;
use std::path::Path;
use walkdir::WalkDir;

use crate::app_state::AppState;
use crate::error::ApiError;
use crate::models::files::{
    FileInfo, FileListResponse, GeneratePlanRequest, GeneratePlanResponse, PathQuery,
    StatusResponse, UploadResponse, DEFAULT_PLAN_PATH, GENERATED_PLAN_PATH,
};
use crate::models::scan::DEFAULT_CONFIG_PATH;
use crate::routes::terraform::base_name;
use crate::services::config_doc::update_plan_path;

pub const EC2_CONFIG_PATH: &str = "config/cloudrift-ec2.yml";
const CONFIG_DIR: &str = "config";
const PLANS_DIR: &str = "examples";

async fn write_file(target: &Path, data: &[u8]) -> io::Result<()> {
    if let Some(parent) = target.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(target, data).await
}

/// GET /api/config?path=
pub async fn get_config(
    State(state): State<AppState>,
    Query(query): Query<PathQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let rel = query.or(DEFAULT_CONFIG_PATH);
    let full = state.sandbox.resolve(rel)?;
    let data = tokio::fs::read(&full)
        .await
        .map_err(|_| ApiError::NotFound(format!("Config not found: {}", rel)))?;
    Ok(([(header::CONTENT_TYPE, "text/yaml")], data))
}

/// PUT /api/config?path=
pub async fn put_config(
    State(state): State<AppState>,
    Query(query): Query<PathQuery>,
    body: Bytes,
) -> Result<Json<StatusResponse>, ApiError> {
    let rel = query.or(DEFAULT_CONFIG_PATH);
    let full = state.sandbox.resolve(rel)?;
    write_file(&full, &body)
        .await
        .map_err(|e| ApiError::Internal(format!("Failed to write config: {}", e)))?;
    tracing::info!(path = %rel, bytes = body.len(), "Config written");
    Ok(Json(StatusResponse::ok()))
}

/// GET /api/files/plan?path=
pub async fn get_plan(
    State(state): State<AppState>,
    Query(query): Query<PathQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let rel = query.or(DEFAULT_PLAN_PATH);
    let full = state.sandbox.resolve(rel)?;
    let data = tokio::fs::read(&full)
        .await
        .map_err(|_| ApiError::NotFound(format!("Plan file not found: {}", rel)))?;
    Ok(([(header::CONTENT_TYPE, "application/json")], data))
}

/// PUT /api/files/plan?path= — body must be a JSON document.
pub async fn put_plan(
    State(state): State<AppState>,
    Query(query): Query<PathQuery>,
    body: Bytes,
) -> Result<Json<StatusResponse>, ApiError> {
    let rel = query.or(DEFAULT_PLAN_PATH);
    let full = state.sandbox.resolve(rel)?;
    if !is_json(&body) {
        return Err(ApiError::BadRequest("Invalid JSON content".to_string()));
    }
    write_file(&full, &body)
        .await
        .map_err(|e| ApiError::Internal(format!("Failed to write plan: {}", e)))?;
    tracing::info!(path = %rel, bytes = body.len(), "Plan written");
    Ok(Json(StatusResponse::ok()))
}

/// GET /api/files/list — configs under `config/`, plans under `examples/`.
pub async fn list_files(State(state): State<AppState>) -> Result<Json<FileListResponse>, ApiError> {
    let root = state.sandbox.root().to_path_buf();
    let listing = tokio::task::spawn_blocking(move || FileListResponse {
        configs: collect_files(&root, &root.join(CONFIG_DIR), &["yml", "yaml"]),
        plans: collect_files(&root, &root.join(PLANS_DIR), &["json"]),
    })
    .await
    .map_err(|e| ApiError::Internal(format!("File listing failed: {}", e)))?;
    Ok(Json(listing))
}

/// POST /api/files/upload — multipart `file` holding a JSON plan.
pub async fn upload_plan(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let mut upload: Option<(String, Bytes)> = None;
    while let Some(field) = multipart.next_field().await? {
        if field.name() == Some("file") {
            let name = field.file_name().unwrap_or_default().to_string();
            let data = field.bytes().await?;
            upload = Some((name, data));
        }
    }
    let (name, data) =
        upload.ok_or_else(|| ApiError::BadRequest("Missing file field: file".to_string()))?;

    if !name.ends_with(".json") {
        return Err(ApiError::BadRequest("Only .json files are allowed".to_string()));
    }
    if !is_json(&data) {
        return Err(ApiError::BadRequest("Uploaded file is not valid JSON".to_string()));
    }

    let base = base_name(&name)
        .ok_or_else(|| ApiError::BadRequest(format!("Invalid file name: {}", name)))?;
    let dest = format!("{}/{}", PLANS_DIR, base);
    let full = state.sandbox.resolve(&dest)?;
    write_file(&full, &data)
        .await
        .map_err(|e| ApiError::Internal(format!("Failed to save file: {}", e)))?;
    tracing::info!(path = %dest, bytes = data.len(), "Plan uploaded");

    Ok(Json(UploadResponse {
        status: "ok".to_string(),
        path: dest,
        name,
    }))
}

/// POST /api/files/generate-plan — store a plan built in the UI and point
/// the service's config at it.
pub async fn generate_plan(
    State(state): State<AppState>,
    body: Result<Json<GeneratePlanRequest>, JsonRejection>,
) -> Result<Json<GeneratePlanResponse>, ApiError> {
    let Json(req) = body?;
    let plan = req
        .plan
        .ok_or_else(|| ApiError::BadRequest("plan is required".to_string()))?;

    let rendered = serde_json::to_vec_pretty(&plan)
        .map_err(|e| ApiError::Internal(format!("Failed to marshal plan: {}", e)))?;
    let full = state.sandbox.resolve(GENERATED_PLAN_PATH)?;
    write_file(&full, &rendered)
        .await
        .map_err(|e| ApiError::Internal(format!("Failed to write plan: {}", e)))?;

    let config = config_for_service(&req.service);
    if let Err(e) = update_plan_path(&state.sandbox, config, GENERATED_PLAN_PATH).await {
        tracing::warn!(config, error = %e, "Could not update config plan_path");
    }

    Ok(Json(GeneratePlanResponse {
        status: "ok".to_string(),
        plan_path: GENERATED_PLAN_PATH.to_string(),
        config: config.to_string(),
    }))
}

fn config_for_service(service: &str) -> &'static str {
    if service.eq_ignore_ascii_case("ec2") {
        EC2_CONFIG_PATH
    } else {
        DEFAULT_CONFIG_PATH
    }
}

fn is_json(data: &[u8]) -> bool {
    serde_json::from_slice::<serde::de::IgnoredAny>(data).is_ok()
}

/// Files under `dir` (recursively) whose extension is in `extensions`, with
/// paths relative to `root`. Unreadable entries are skipped.
fn collect_files(root: &Path, dir: &Path, extensions: &[&str]) -> Vec<FileInfo> {
    let mut found: Vec<FileInfo> = WalkDir::new(dir)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| {
            entry
                .path()
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| extensions.contains(&e))
        })
        .filter_map(|entry| {
            let rel = entry.path().strip_prefix(root).ok()?;
            let size = entry.metadata().ok()?.len();
            Some(FileInfo {
                path: rel.to_string_lossy().replace('\\', "/"),
                name: entry.file_name().to_string_lossy().into_owned(),
                size,
            })
        })
        .collect();

    found.sort_by(|a, b| a.path.cmp(&b.path));
    found
}
