use serde::{Deserialize, Serialize};

/// `GET /api/terraform/status`
#[derive(Debug, Serialize, Deserialize)]
pub struct TerraformStatusResponse {
    pub available: bool,
    pub version: String,
    pub tf_files: Vec<String>,
    pub has_files: bool,
    pub initialized: bool,
    pub tf_dir: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TerraformUploadResponse {
    pub status: String,
    pub uploaded: Vec<String>,
    pub tf_dir: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct JobQuery {
    pub id: Option<String>,
}
