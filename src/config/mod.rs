use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Listen port. The server binds on all interfaces.
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    /// Cloudrift scanner executable
    #[serde(default = "default_cli_path")]
    pub cloudrift_cli_path: String,

    /// Working directory shared by the CLI and every file endpoint. Empty means ".".
    #[serde(default)]
    pub cloudrift_work_dir: String,

    /// Terraform executable
    #[serde(default = "default_terraform_path")]
    pub terraform_path: String,

    #[serde(default = "default_init_timeout")]
    pub tf_init_timeout_secs: u64,

    #[serde(default = "default_plan_timeout")]
    pub tf_plan_timeout_secs: u64,

    /// `terraform show` is local conversion only, so it gets a shorter budget.
    #[serde(default = "default_show_timeout")]
    pub tf_show_timeout_secs: u64,

    #[serde(default = "default_scan_timeout")]
    pub scan_timeout_secs: u64,

    /// How often finished jobs are swept from memory
    #[serde(default = "default_sweep_interval")]
    pub job_sweep_interval_secs: u64,

    /// How long a finished job stays pollable
    #[serde(default = "default_retention")]
    pub job_retention_secs: u64,
}

fn default_api_port() -> u16 {
    8081
}

fn default_cli_path() -> String {
    "cloudrift".to_string()
}

fn default_terraform_path() -> String {
    "terraform".to_string()
}

fn default_init_timeout() -> u64 {
    600
}

fn default_plan_timeout() -> u64 {
    600
}

fn default_show_timeout() -> u64 {
    300
}

fn default_scan_timeout() -> u64 {
    300
}

fn default_sweep_interval() -> u64 {
    600
}

fn default_retention() -> u64 {
    3600
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_port: default_api_port(),
            cloudrift_cli_path: default_cli_path(),
            cloudrift_work_dir: String::new(),
            terraform_path: default_terraform_path(),
            tf_init_timeout_secs: default_init_timeout(),
            tf_plan_timeout_secs: default_plan_timeout(),
            tf_show_timeout_secs: default_show_timeout(),
            scan_timeout_secs: default_scan_timeout(),
            job_sweep_interval_secs: default_sweep_interval(),
            job_retention_secs: default_retention(),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env()
    }

    pub fn bind_addr(&self) -> String {
        format!("0.0.0.0:{}", self.api_port)
    }

    /// Sandbox root; falls back to the process working directory.
    pub fn work_dir(&self) -> PathBuf {
        if self.cloudrift_work_dir.is_empty() {
            PathBuf::from(".")
        } else {
            PathBuf::from(&self.cloudrift_work_dir)
        }
    }

    pub fn scan_timeout(&self) -> Duration {
        Duration::from_secs(self.scan_timeout_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.job_sweep_interval_secs)
    }

    pub fn retention(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.job_retention_secs as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_deserialize_from_empty_env() {
        let config: AppConfig = envy::from_iter(Vec::<(String, String)>::new()).unwrap();
        assert_eq!(config.api_port, 8081);
        assert_eq!(config.terraform_path, "terraform");
        assert_eq!(config.tf_show_timeout_secs, 300);
        assert_eq!(config.work_dir(), PathBuf::from("."));
        assert_eq!(config.bind_addr(), "0.0.0.0:8081");
    }

    #[test]
    fn test_env_overrides() {
        let vars = vec![
            ("API_PORT".to_string(), "9000".to_string()),
            ("CLOUDRIFT_WORK_DIR".to_string(), "/srv/cloudrift".to_string()),
            ("TERRAFORM_PATH".to_string(), "/usr/local/bin/terraform".to_string()),
            ("JOB_RETENTION_SECS".to_string(), "60".to_string()),
        ];
        let config: AppConfig = envy::from_iter(vars).unwrap();
        assert_eq!(config.api_port, 9000);
        assert_eq!(config.work_dir(), PathBuf::from("/srv/cloudrift"));
        assert_eq!(config.terraform_path, "/usr/local/bin/terraform");
        assert_eq!(config.retention(), chrono::Duration::seconds(60));
    }
}
