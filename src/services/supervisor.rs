use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

use crate::models::job::TerraformJob;
use crate::services::gate::SingleFlightGate;
use crate::services::pipeline::{source_files, PipelineEngine};
use crate::services::registry::JobRegistry;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TriggerError {
    #[error("{0}")]
    PreconditionUnmet(String),

    #[error("Another Terraform operation is already running")]
    GateConflict,
}

/// Starts pipeline runs and owns the state they share.
///
/// One instance is built at startup and handed to the router through
/// `AppState`.
#[derive(Debug)]
pub struct JobSupervisor {
    registry: Arc<JobRegistry>,
    gate: SingleFlightGate,
    engine: Arc<PipelineEngine>,
}

impl JobSupervisor {
    pub fn new(registry: Arc<JobRegistry>, engine: PipelineEngine) -> Self {
        Self {
            registry,
            gate: SingleFlightGate::new(),
            engine: Arc::new(engine),
        }
    }

    pub fn registry(&self) -> &Arc<JobRegistry> {
        &self.registry
    }

    pub fn gate(&self) -> &SingleFlightGate {
        &self.gate
    }

    pub fn engine(&self) -> &PipelineEngine {
        &self.engine
    }

    /// Validate the Terraform directory, take the gate and launch a job.
    ///
    /// Returns the new job id without waiting for the pipeline. The gate is
    /// only touched once the preconditions hold, and is released by the
    /// spawned task whichever way it ends.
    pub async fn trigger(&self) -> Result<String, TriggerError> {
        let dir = self.engine.working_dir();
        match source_files(&dir).await {
            Err(_) => {
                return Err(TriggerError::PreconditionUnmet(
                    "Terraform directory not found. Upload .tf files first.".to_string(),
                ))
            }
            Ok(files) if files.is_empty() => {
                return Err(TriggerError::PreconditionUnmet(
                    "No .tf files found. Upload Terraform files first.".to_string(),
                ))
            }
            Ok(_) => {}
        }

        let Some(guard) = self.gate.try_acquire() else {
            metrics::counter!("terraform_trigger_conflicts_total").increment(1);
            return Err(TriggerError::GateConflict);
        };

        let job_id = new_job_id();
        self.registry.insert(TerraformJob::new(job_id.as_str(), Utc::now()));
        metrics::counter!("terraform_jobs_started_total").increment(1);
        tracing::info!(job_id = %job_id, dir = %dir.display(), "Terraform job started");

        let registry = Arc::clone(&self.registry);
        let engine = Arc::clone(&self.engine);
        let id = job_id.clone();
        tokio::spawn(async move {
            let _guard = guard;
            engine.run(&registry, &id).await;
        });

        Ok(job_id)
    }
}

/// `tf-<unix millis>-<8 hex>`; the random suffix keeps ids unique when two
/// jobs start within the same millisecond.
fn new_job_id() -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("tf-{}-{}", Utc::now().timestamp_millis(), &suffix[..8])
}
