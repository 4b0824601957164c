use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::task::JoinHandle;

use crate::models::job::{JobView, TerraformJob};

/// In-memory job table polled by clients.
///
/// The lock is held for a single read or write only; the pipeline never keeps
/// it across a subprocess call.
#[derive(Debug, Default)]
pub struct JobRegistry {
    jobs: Mutex<HashMap<String, TerraformJob>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, TerraformJob>> {
        // Updates are single transitions on one job; poisoning is ignored.
        self.jobs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn insert(&self, job: TerraformJob) {
        let mut jobs = self.lock();
        jobs.insert(job.id().to_string(), job);
        metrics::gauge!("terraform_jobs_tracked").set(jobs.len() as f64);
    }

    /// Apply `f` to the job under the lock. Returns false if it was swept.
    pub fn update<F>(&self, id: &str, f: F) -> bool
    where
        F: FnOnce(&mut TerraformJob),
    {
        match self.lock().get_mut(id) {
            Some(job) => {
                f(job);
                true
            }
            None => false,
        }
    }

    pub fn get(&self, id: &str) -> Option<TerraformJob> {
        self.lock().get(id).cloned()
    }

    pub fn view(&self, id: &str, now: DateTime<Utc>) -> Option<JobView> {
        self.lock().get(id).map(|job| JobView::new(job, now))
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every terminal job that finished more than `retention` before `now`.
    pub fn sweep(&self, now: DateTime<Utc>, retention: Duration) -> usize {
        let mut jobs = self.lock();
        let before = jobs.len();
        jobs.retain(|_, job| !job.is_expired(now, retention));
        let removed = before - jobs.len();
        metrics::gauge!("terraform_jobs_tracked").set(jobs.len() as f64);
        removed
    }
}

/// Run [`JobRegistry::sweep`] every `interval` for the life of the process.
pub fn spawn_sweeper(
    registry: Arc<JobRegistry>,
    interval: std::time::Duration,
    retention: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // The first tick fires immediately; there is nothing to sweep at boot.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let removed = registry.sweep(Utc::now(), retention);
            if removed > 0 {
                metrics::counter!("terraform_jobs_swept_total").increment(removed as u64);
                tracing::info!(
                    removed,
                    remaining = registry.len(),
                    "Swept finished terraform jobs"
                );
            }
        }
    })
}
