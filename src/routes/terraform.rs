use axum::extract::{Multipart, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use std::path::Path;

use crate::app_state::AppState;
use crate::error::ApiError;
use crate::models::job::{JobStartedResponse, JobView};
use crate::models::terraform::{JobQuery, TerraformStatusResponse, TerraformUploadResponse};
use crate::services::cli::terraform_version;
use crate::services::pipeline::{source_files, TF_DIR};

const TF_DIR_DISPLAY: &str = "terraform/";

/// GET /api/terraform/status — Terraform availability and uploaded sources.
pub async fn status(State(state): State<AppState>) -> Json<TerraformStatusResponse> {
    let version = terraform_version(&state.config.terraform_path).await;
    let tf_dir = state.jobs.engine().working_dir();
    let tf_files = source_files(&tf_dir).await.unwrap_or_default();
    let initialized = tokio::fs::try_exists(tf_dir.join(".terraform"))
        .await
        .unwrap_or(false);

    Json(TerraformStatusResponse {
        available: version.is_some(),
        version: version.unwrap_or_default(),
        has_files: !tf_files.is_empty(),
        tf_files,
        initialized,
        tf_dir: TF_DIR_DISPLAY.to_string(),
    })
}

/// POST /api/terraform/upload — store `.tf`/`.tfvars` files.
///
/// Every part is checked before anything is written, so a rejected upload
/// leaves the directory untouched.
pub async fn upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<TerraformUploadResponse>, ApiError> {
    let mut files: Vec<(String, Vec<u8>)> = Vec::new();

    while let Some(field) = multipart.next_field().await? {
        let Some(file_name) = field.file_name().map(str::to_string) else {
            continue;
        };
        if !file_name.ends_with(".tf") && !file_name.ends_with(".tfvars") {
            return Err(ApiError::BadRequest(format!(
                "Only .tf and .tfvars files allowed: {}",
                file_name
            )));
        }
        let name = base_name(&file_name)
            .ok_or_else(|| ApiError::BadRequest(format!("Invalid file name: {}", file_name)))?;
        let data = field.bytes().await?;
        files.push((name, data.to_vec()));
    }

    tokio::fs::create_dir_all(state.sandbox.resolve(TF_DIR)?)
        .await
        .map_err(|e| ApiError::Internal(format!("Failed to create terraform directory: {}", e)))?;

    let mut uploaded = Vec::with_capacity(files.len());
    for (name, data) in files {
        let target = state.sandbox.resolve(&format!("{}/{}", TF_DIR, name))?;
        tokio::fs::write(&target, &data)
            .await
            .map_err(|e| ApiError::Internal(format!("Failed to save file: {}", e)))?;
        uploaded.push(name);
    }

    tracing::info!(count = uploaded.len(), files = ?uploaded, "Terraform files uploaded");

    Ok(Json(TerraformUploadResponse {
        status: "ok".to_string(),
        uploaded,
        tf_dir: TF_DIR_DISPLAY.to_string(),
    }))
}

/// POST /api/terraform/plan — start an async plan job.
pub async fn start_plan(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<JobStartedResponse>), ApiError> {
    let job_id = state.jobs.trigger().await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(JobStartedResponse {
            status: "started".to_string(),
            job_id,
        }),
    ))
}

/// GET /api/terraform/job?id=<job_id> — poll a job.
pub async fn job_status(
    State(state): State<AppState>,
    Query(query): Query<JobQuery>,
) -> Result<Json<JobView>, ApiError> {
    let id = query
        .id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ApiError::BadRequest("job id is required".to_string()))?;

    state
        .registry()
        .view(&id, Utc::now())
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Job not found: {}", id)))
}

/// Final path component of a client-supplied file name.
pub(crate) fn base_name(file_name: &str) -> Option<String> {
    Path::new(file_name)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .filter(|n| !n.is_empty())
}
