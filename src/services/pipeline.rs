use chrono::Utc;
use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitStatus;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::AppConfig;
use crate::models::job::JobStatus;
use crate::services::config_doc::update_plan_path;
use crate::services::process::{run_tool, ToolError};
use crate::services::registry::JobRegistry;
use crate::services::sandbox::{PathSandbox, PathViolation};

/// Terraform sources live here, relative to the sandbox root.
pub const TF_DIR: &str = "terraform";
/// Intermediate plan written by `terraform plan -out`.
pub const PLAN_BINARY: &str = "tfplan.binary";
/// Where the rendered plan lands, relative to the sandbox root.
pub const PLAN_JSON_PATH: &str = "examples/terraform-plan.json";
/// Config whose `plan_path:` is pointed at a fresh plan.
pub const CONFIG_PATH: &str = "config/cloudrift.yml";
pub const SOURCE_EXTENSION: &str = "tf";

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum Stage {
    Init,
    Plan,
    Show,
}

impl Stage {
    fn status(self) -> JobStatus {
        match self {
            Stage::Init => JobStatus::Init,
            Stage::Plan => JobStatus::Plan,
            Stage::Show => JobStatus::Show,
        }
    }

    fn running_phase(self) -> &'static str {
        match self {
            Stage::Init => "Running terraform init...",
            Stage::Plan => "Running terraform plan...",
            Stage::Show => "Converting plan to JSON...",
        }
    }

    fn failed_phase(self) -> &'static str {
        match self {
            Stage::Init => "Init failed",
            Stage::Plan => "Plan failed",
            Stage::Show => "Show failed",
        }
    }

    /// `show` prints the deliverable, not progress, so it stays out of the log.
    fn logs_output(self) -> bool {
        !matches!(self, Stage::Show)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct StageTimeouts {
    pub init: Duration,
    pub plan: Duration,
    pub show: Duration,
}

impl StageTimeouts {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            init: Duration::from_secs(config.tf_init_timeout_secs),
            plan: Duration::from_secs(config.tf_plan_timeout_secs),
            show: Duration::from_secs(config.tf_show_timeout_secs),
        }
    }

    fn for_stage(&self, stage: Stage) -> Duration {
        match stage {
            Stage::Init => self.init,
            Stage::Plan => self.plan,
            Stage::Show => self.show,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StageCause {
    #[error(transparent)]
    Tool(#[from] ToolError),

    #[error("{0}")]
    Exit(ExitStatus),
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("terraform {stage} failed: {cause}")]
    Stage { stage: Stage, cause: StageCause },

    #[error("terraform show produced invalid JSON")]
    MalformedOutput(#[source] serde_json::Error),

    #[error("Path error: {0}")]
    Path(#[from] PathViolation),

    #[error("Failed to save plan JSON: {0}")]
    Persist(#[source] io::Error),
}

impl PipelineError {
    fn stage(stage: Stage, cause: impl Into<StageCause>) -> Self {
        PipelineError::Stage {
            stage,
            cause: cause.into(),
        }
    }

    /// Phase text shown to pollers once the job has failed.
    pub fn phase(&self) -> &'static str {
        match self {
            PipelineError::Stage { stage, .. } => stage.failed_phase(),
            PipelineError::MalformedOutput(_) => "Invalid output",
            PipelineError::Path(_) | PipelineError::Persist(_) => "Save failed",
        }
    }
}

/// Runs `terraform init`, `plan` and `show -json` for one job and records
/// every step on the job in the registry.
#[derive(Debug)]
pub struct PipelineEngine {
    terraform: String,
    sandbox: Arc<PathSandbox>,
    timeouts: StageTimeouts,
}

impl PipelineEngine {
    pub fn new(
        terraform: impl Into<String>,
        sandbox: Arc<PathSandbox>,
        timeouts: StageTimeouts,
    ) -> Self {
        Self {
            terraform: terraform.into(),
            sandbox,
            timeouts,
        }
    }

    pub fn working_dir(&self) -> PathBuf {
        self.sandbox.root().join(TF_DIR)
    }

    /// Drive `job_id` to `completed` or `error`. Never panics on tool failure.
    pub async fn run(&self, registry: &JobRegistry, job_id: &str) {
        let started = Instant::now();
        let result = self.execute(registry, job_id).await;
        let now = Utc::now();

        match result {
            Ok(plan_path) => {
                registry.update(job_id, |job| job.complete(plan_path.as_str(), now));
                metrics::counter!("terraform_jobs_completed_total").increment(1);
                tracing::info!(
                    job_id,
                    plan_path = %plan_path,
                    duration_ms = started.elapsed().as_millis() as u64,
                    "Terraform plan generated"
                );
            }
            Err(e) => {
                registry.update(job_id, |job| job.fail(e.phase(), e.to_string(), now));
                metrics::counter!("terraform_jobs_failed_total").increment(1);
                tracing::warn!(job_id, error = %e, "Terraform pipeline failed");
            }
        }
    }

    async fn execute(&self, registry: &JobRegistry, job_id: &str) -> Result<String, PipelineError> {
        let dir = self.working_dir();
        let binary = dir.join(PLAN_BINARY);

        let init_args = vec!["init".into(), "-no-color".into(), "-input=false".into()];
        self.run_stage(registry, job_id, Stage::Init, &dir, init_args)
            .await?;

        let mut out_arg = OsString::from("-out=");
        out_arg.push(&binary);
        let plan_args = vec![
            "plan".into(),
            out_arg,
            "-no-color".into(),
            "-input=false".into(),
        ];
        self.run_stage(registry, job_id, Stage::Plan, &dir, plan_args)
            .await?;

        let show_args = vec![
            "show".into(),
            "-json".into(),
            "-no-color".into(),
            binary.clone().into_os_string(),
        ];
        let document = self
            .run_stage(registry, job_id, Stage::Show, &dir, show_args)
            .await?;
        serde_json::from_slice::<serde::de::IgnoredAny>(&document)
            .map_err(PipelineError::MalformedOutput)?;

        registry.update(job_id, |job| job.set_phase("Saving plan..."));
        let target = self.sandbox.resolve(PLAN_JSON_PATH)?;
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(PipelineError::Persist)?;
        }
        tokio::fs::write(&target, &document)
            .await
            .map_err(PipelineError::Persist)?;

        // Best effort: the plan is already saved.
        match update_plan_path(&self.sandbox, CONFIG_PATH, PLAN_JSON_PATH).await {
            Ok(true) => tracing::debug!(job_id, config = CONFIG_PATH, "Config plan_path updated"),
            Ok(false) => tracing::debug!(job_id, config = CONFIG_PATH, "No config to update"),
            Err(e) => tracing::warn!(job_id, error = %e, "Could not update config plan_path"),
        }

        if let Err(e) = tokio::fs::remove_file(&binary).await {
            tracing::debug!(job_id, error = %e, "Could not remove binary plan");
        }

        Ok(PLAN_JSON_PATH.to_string())
    }

    /// Run one stage and return its stdout. Output of logging stages is
    /// appended to the job even when the stage fails.
    async fn run_stage(
        &self,
        registry: &JobRegistry,
        job_id: &str,
        stage: Stage,
        dir: &Path,
        args: Vec<OsString>,
    ) -> Result<Vec<u8>, PipelineError> {
        registry.update(job_id, |job| job.advance(stage.status(), stage.running_phase()));
        tracing::info!(job_id, stage = %stage, "Running terraform stage");

        let start = Instant::now();
        let timeout = self.timeouts.for_stage(stage);
        let result = run_tool(&self.terraform, &args, Some(dir), timeout).await;
        metrics::histogram!("terraform_stage_seconds", "stage" => stage.to_string())
            .record(start.elapsed().as_secs_f64());

        let output = match result {
            Ok(output) => output,
            Err(e) => {
                if stage.logs_output() {
                    if let Some(partial) = e.partial_output() {
                        append_line(registry, job_id, partial);
                    }
                }
                return Err(PipelineError::stage(stage, e));
            }
        };

        if stage.logs_output() {
            append_line(registry, job_id, output.combined());
        }

        if !output.success() {
            return Err(PipelineError::stage(stage, StageCause::Exit(output.status)));
        }

        Ok(output.stdout)
    }
}

fn append_line(registry: &JobRegistry, job_id: &str, mut chunk: String) {
    chunk.push('\n');
    registry.update(job_id, |job| job.append_output(&chunk));
}

/// Names of `*.tf` files directly inside `dir`, sorted.
pub async fn source_files(dir: &Path) -> io::Result<Vec<String>> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        if entry.file_type().await?.is_dir() {
            continue;
        }
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) == Some(SOURCE_EXTENSION) {
            files.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_failure_messages() {
        let err = PipelineError::stage(
            Stage::Plan,
            ToolError::TimedOut {
                after: Duration::from_secs(600),
                stdout: b"Refreshing state...".to_vec(),
                stderr: Vec::new(),
            },
        );
        assert_eq!(err.to_string(), "terraform plan failed: timed out after 600s");
        assert_eq!(err.phase(), "Plan failed");
    }

    #[test]
    fn test_malformed_output_phase() {
        let json_err = serde_json::from_str::<serde_json::Value>("not json").unwrap_err();
        let err = PipelineError::MalformedOutput(json_err);
        assert_eq!(err.to_string(), "terraform show produced invalid JSON");
        assert_eq!(err.phase(), "Invalid output");
    }

    #[test]
    fn test_only_show_is_kept_out_of_log() {
        assert!(Stage::Init.logs_output());
        assert!(Stage::Plan.logs_output());
        assert!(!Stage::Show.logs_output());
    }

    #[tokio::test]
    async fn test_source_files_filters_extension() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join("main.tf"), "").unwrap();
        std::fs::write(dir.path().join("vars.tfvars"), "").unwrap();
        std::fs::write(dir.path().join("b.tf"), "").unwrap();
        std::fs::create_dir(dir.path().join("modules.tf")).unwrap();

        let files = source_files(dir.path()).await.unwrap();
        assert_eq!(files, vec!["b.tf", "main.tf"]);
    }
}
