//! Shared setup for the integration tests

#![allow(dead_code)]

use chrono::Utc;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;
use tokio::time::sleep;

use cloudrift_api::app_state::AppState;
use cloudrift_api::config::AppConfig;
use cloudrift_api::models::job::TerraformJob;
use cloudrift_api::routes::api_router;
use cloudrift_api::services::registry::JobRegistry;

use crate::fixtures::{
    terraform_script, write_executable, TerraformBehavior, CLOUDRIFT_SCRIPT, MAIN_TF,
};

/// A sandbox root plus fake tool binaries kept outside of it.
pub struct TestEnv {
    pub work: TempDir,
    pub tools: TempDir,
    pub state: AppState,
}

impl TestEnv {
    pub fn root(&self) -> &Path {
        self.work.path()
    }

    pub fn tf_dir(&self) -> PathBuf {
        self.work.path().join("terraform")
    }

    pub fn add_tf_sources(&self) {
        std::fs::create_dir_all(self.tf_dir()).unwrap();
        std::fs::write(self.tf_dir().join("main.tf"), MAIN_TF).unwrap();
    }

    pub fn write(&self, rel: &str, contents: &str) {
        let path = self.root().join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, contents).unwrap();
    }

    pub fn read(&self, rel: &str) -> String {
        std::fs::read_to_string(self.root().join(rel)).unwrap()
    }
}

pub fn test_env(behavior: TerraformBehavior) -> TestEnv {
    test_env_with(behavior, Duration::from_secs(20))
}

pub fn test_env_with(behavior: TerraformBehavior, stage_timeout: Duration) -> TestEnv {
    let work = TempDir::new().unwrap();
    let tools = TempDir::new().unwrap();

    let terraform = tools.path().join("terraform");
    write_executable(&terraform, &terraform_script(&behavior));
    let cloudrift = tools.path().join("cloudrift");
    write_executable(&cloudrift, CLOUDRIFT_SCRIPT);

    let config = AppConfig {
        cloudrift_work_dir: work.path().to_string_lossy().into_owned(),
        cloudrift_cli_path: cloudrift.to_string_lossy().into_owned(),
        terraform_path: terraform.to_string_lossy().into_owned(),
        tf_init_timeout_secs: stage_timeout.as_secs().max(1),
        tf_plan_timeout_secs: stage_timeout.as_secs().max(1),
        tf_show_timeout_secs: stage_timeout.as_secs().max(1),
        ..AppConfig::default()
    };
    let state = AppState::new(config).unwrap();

    TestEnv { work, tools, state }
}

/// Serve the router on an ephemeral port and return its base URL.
pub async fn spawn_server(state: AppState) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, api_router(state)).await.unwrap();
    });
    format!("http://{}", addr)
}

/// Poll the registry until the job is terminal, checking the `done_at`
/// invariant on every observation.
pub async fn wait_for_terminal(
    registry: &JobRegistry,
    job_id: &str,
    timeout_secs: u64,
) -> TerraformJob {
    let deadline = Utc::now() + chrono::Duration::seconds(timeout_secs as i64);
    loop {
        let job = registry.get(job_id).expect("job vanished from registry");
        assert_eq!(
            job.done_at().is_some(),
            job.is_terminal(),
            "done_at must be set exactly when terminal (status {})",
            job.status()
        );
        if job.is_terminal() {
            return job;
        }
        assert!(Utc::now() < deadline, "job {} did not finish within {}s", job_id, timeout_secs);
        sleep(Duration::from_millis(25)).await;
    }
}

/// Poll `GET /api/terraform/job` until a terminal status is reported.
pub async fn poll_job_http(
    client: &reqwest::Client,
    base_url: &str,
    job_id: &str,
    timeout_secs: u64,
) -> serde_json::Value {
    let max_attempts = timeout_secs * 20;
    for _ in 0..max_attempts {
        let response = client
            .get(format!("{}/api/terraform/job", base_url))
            .query(&[("id", job_id)])
            .send()
            .await
            .unwrap();
        assert!(response.status().is_success(), "poll failed: {}", response.status());
        let body: serde_json::Value = response.json().await.unwrap();
        match body["status"].as_str() {
            Some("completed") | Some("error") => return body,
            Some("pending") | Some("init") | Some("plan") | Some("show") => {
                sleep(Duration::from_millis(50)).await;
            }
            other => panic!("Unknown job status: {:?}", other),
        }
    }
    panic!("Job did not complete within {} seconds", timeout_secs);
}
