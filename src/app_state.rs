use std::path::PathBuf;
use std::sync::Arc;

use crate::config::AppConfig;
use crate::services::{
    cli::CloudriftCli,
    pipeline::{PipelineEngine, StageTimeouts},
    registry::JobRegistry,
    sandbox::PathSandbox,
    supervisor::JobSupervisor,
};

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub sandbox: Arc<PathSandbox>,
    pub cli: Arc<CloudriftCli>,
    pub jobs: Arc<JobSupervisor>,
}

impl AppState {
    pub fn new(config: AppConfig) -> std::io::Result<Self> {
        let sandbox = Arc::new(PathSandbox::new(config.work_dir())?);

        let cli_dir = if config.cloudrift_work_dir.is_empty() {
            None
        } else {
            Some(PathBuf::from(&config.cloudrift_work_dir))
        };
        let cli = CloudriftCli::new(
            config.cloudrift_cli_path.clone(),
            cli_dir,
            config.scan_timeout(),
        );

        let engine = PipelineEngine::new(
            config.terraform_path.clone(),
            Arc::clone(&sandbox),
            StageTimeouts::from_config(&config),
        );
        let jobs = JobSupervisor::new(Arc::new(JobRegistry::new()), engine);

        Ok(Self {
            config: Arc::new(config),
            sandbox,
            cli: Arc::new(cli),
            jobs: Arc::new(jobs),
        })
    }

    pub fn registry(&self) -> &Arc<JobRegistry> {
        self.jobs.registry()
    }
}
