use garde::Validate;
use serde::Deserialize;

pub const DEFAULT_CONFIG_PATH: &str = "config/cloudrift.yml";

/// Body of `POST /api/scan`.
#[derive(Debug, Deserialize, Validate)]
pub struct ScanRequest {
    #[garde(length(min = 1, max = 64))]
    pub service: String,

    #[serde(default)]
    #[garde(length(max = 512))]
    pub config_path: String,

    #[serde(default)]
    #[garde(length(max = 512))]
    pub policy_dir: Option<String>,

    #[serde(default)]
    #[garde(skip)]
    pub skip_policies: bool,
}

impl ScanRequest {
    pub fn config_path(&self) -> &str {
        if self.config_path.is_empty() {
            DEFAULT_CONFIG_PATH
        } else {
            &self.config_path
        }
    }

    /// Arguments for `cloudrift scan`, in the order the CLI documents them.
    pub fn cli_args(&self) -> Vec<String> {
        let mut args = vec![
            "scan".to_string(),
            format!("--config={}", self.config_path()),
            format!("--service={}", self.service),
            "--format=json".to_string(),
            "--no-emoji".to_string(),
        ];
        if let Some(dir) = self.policy_dir.as_deref().filter(|d| !d.is_empty()) {
            args.push(format!("--policy-dir={}", dir));
        }
        if self.skip_policies {
            args.push("--skip-policies".to_string());
        }
        args
    }
}
