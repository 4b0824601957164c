use std::path::PathBuf;
use std::time::Duration;

use crate::models::scan::ScanRequest;
use crate::services::extract::extract_json;
use crate::services::process::{run_tool, ToolError};

/// `cloudrift scan` exits with this code when it ran fine and found violations.
pub const VIOLATIONS_FOUND_EXIT_CODE: i32 = 2;

const CHECK_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error(transparent)]
    Tool(#[from] ToolError),

    #[error("Scan failed: {0}")]
    Failed(String),

    #[error("No JSON output from CLI: {0}")]
    NoJson(String),
}

/// Thin wrapper around the Cloudrift scanner executable.
#[derive(Debug, Clone)]
pub struct CloudriftCli {
    program: String,
    work_dir: Option<PathBuf>,
    scan_timeout: Duration,
}

impl CloudriftCli {
    pub fn new(
        program: impl Into<String>,
        work_dir: Option<PathBuf>,
        scan_timeout: Duration,
    ) -> Self {
        Self {
            program: program.into(),
            work_dir,
            scan_timeout,
        }
    }

    /// Run a scan and return the JSON report the CLI printed.
    pub async fn scan(&self, req: &ScanRequest) -> Result<String, CliError> {
        let output = run_tool(
            &self.program,
            req.cli_args(),
            self.work_dir.as_deref(),
            self.scan_timeout,
        )
        .await?;
        let text = output.combined();

        if !output.success() && output.code() != Some(VIOLATIONS_FOUND_EXIT_CODE) {
            return Err(CliError::Failed(text));
        }

        match extract_json(&text) {
            Some(json) => Ok(json.to_string()),
            None => Err(CliError::NoJson(text)),
        }
    }

    /// Whether `cloudrift scan --help` runs cleanly.
    pub async fn is_available(&self) -> bool {
        matches!(
            run_tool(&self.program, ["scan", "--help"], None, CHECK_TIMEOUT).await,
            Ok(out) if out.success()
        )
    }

    pub async fn version(&self) -> Result<String, CliError> {
        let output = run_tool(&self.program, ["--version"], None, CHECK_TIMEOUT).await?;
        if !output.success() {
            return Err(CliError::Failed(output.combined()));
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

/// `terraform version -json`, returning `terraform_version` if the binary runs.
pub async fn terraform_version(program: &str) -> Option<String> {
    let output = run_tool(program, ["version", "-json"], None, CHECK_TIMEOUT)
        .await
        .ok()
        .filter(|out| out.success())?;
    let info: serde_json::Value = serde_json::from_slice(&output.stdout).ok()?;
    Some(
        info.get("terraform_version")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string(),
    )
}
