use serde::{Deserialize, Serialize};

pub const DEFAULT_PLAN_PATH: &str = "examples/plan.json";
pub const GENERATED_PLAN_PATH: &str = "examples/generated-plan.json";

/// `?path=` selector shared by the config and plan file endpoints.
#[derive(Debug, Default, Deserialize)]
pub struct PathQuery {
    pub path: Option<String>,
}

impl PathQuery {
    pub fn or<'a>(&'a self, default: &'a str) -> &'a str {
        self.path.as_deref().filter(|p| !p.is_empty()).unwrap_or(default)
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
}

impl StatusResponse {
    pub fn ok() -> Self {
        Self {
            status: "ok".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FileInfo {
    pub path: String,
    pub name: String,
    pub size: u64,
}

/// `GET /api/files/list`
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct FileListResponse {
    pub configs: Vec<FileInfo>,
    pub plans: Vec<FileInfo>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UploadResponse {
    pub status: String,
    pub path: String,
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct GeneratePlanRequest {
    #[serde(default)]
    pub service: String,
    pub plan: Option<serde_json::Map<String, serde_json::Value>>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GeneratePlanResponse {
    pub status: String,
    pub plan_path: String,
    pub config: String,
}
