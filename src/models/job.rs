use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle of a Terraform plan job.
///
/// `pending -> init -> plan -> show -> completed`, where any running stage may
/// drop to `error` instead.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, strum::Display, strum::AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Init,
    Plan,
    Show,
    Completed,
    Error,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Error)
    }
}

/// One attempt at generating a Terraform plan.
///
/// Fields are only reachable through the transition methods below, which
/// refuse to touch a job once it is terminal and stamp `done_at` exactly when
/// the status becomes terminal.
#[derive(Debug, Clone)]
pub struct TerraformJob {
    id: String,
    status: JobStatus,
    phase: String,
    output: String,
    plan_path: String,
    error: String,
    started_at: DateTime<Utc>,
    done_at: Option<DateTime<Utc>>,
}

impl TerraformJob {
    pub fn new(id: impl Into<String>, started_at: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            status: JobStatus::Pending,
            phase: "Starting...".to_string(),
            output: String::new(),
            plan_path: String::new(),
            error: String::new(),
            started_at,
            done_at: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn status(&self) -> JobStatus {
        self.status
    }

    pub fn phase(&self) -> &str {
        &self.phase
    }

    pub fn output(&self) -> &str {
        &self.output
    }

    pub fn plan_path(&self) -> &str {
        &self.plan_path
    }

    pub fn error(&self) -> &str {
        &self.error
    }

    pub fn done_at(&self) -> Option<DateTime<Utc>> {
        self.done_at
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Move to a running stage. Terminal statuses go through `fail`/`complete`.
    pub fn advance(&mut self, status: JobStatus, phase: impl Into<String>) {
        if self.is_terminal() || status.is_terminal() {
            return;
        }
        self.status = status;
        self.phase = phase.into();
    }

    pub fn set_phase(&mut self, phase: impl Into<String>) {
        if !self.is_terminal() {
            self.phase = phase.into();
        }
    }

    pub fn append_output(&mut self, chunk: &str) {
        if !self.is_terminal() {
            self.output.push_str(chunk);
        }
    }

    pub fn fail(&mut self, phase: impl Into<String>, error: impl Into<String>, at: DateTime<Utc>) {
        if self.is_terminal() {
            return;
        }
        self.status = JobStatus::Error;
        self.phase = phase.into();
        self.error = error.into();
        self.done_at = Some(at);
    }

    pub fn complete(&mut self, plan_path: impl Into<String>, at: DateTime<Utc>) {
        if self.is_terminal() {
            return;
        }
        self.status = JobStatus::Completed;
        self.phase = "Plan generated successfully".to_string();
        self.plan_path = plan_path.into();
        self.done_at = Some(at);
    }

    /// Whole seconds since start, frozen at `done_at` once the job finished.
    pub fn elapsed_secs(&self, now: DateTime<Utc>) -> i64 {
        let end = self.done_at.unwrap_or(now);
        (end - self.started_at).num_seconds().max(0)
    }

    /// Finished longer ago than `retention`. Running jobs never expire.
    pub fn is_expired(&self, now: DateTime<Utc>, retention: Duration) -> bool {
        match self.done_at {
            Some(done) => now - done > retention,
            None => false,
        }
    }
}

/// Poll response for `GET /api/terraform/job`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobView {
    pub id: String,
    pub status: JobStatus,
    pub phase: String,
    pub error: String,
    pub plan_path: String,
    pub elapsed_s: i64,
    pub output: String,
}

impl JobView {
    pub fn new(job: &TerraformJob, now: DateTime<Utc>) -> Self {
        Self {
            id: job.id.clone(),
            status: job.status,
            phase: job.phase.clone(),
            error: job.error.clone(),
            plan_path: job.plan_path.clone(),
            elapsed_s: job.elapsed_secs(now),
            output: job.output.clone(),
        }
    }
}

/// Response to a successful trigger.
#[derive(Debug, Serialize, Deserialize)]
pub struct JobStartedResponse {
    pub status: String,
    pub job_id: String,
}
