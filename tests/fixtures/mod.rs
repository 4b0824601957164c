//! Fake `terraform` and `cloudrift` executables for driving the service
//! without the real tools.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

/// JSON printed by the fake `terraform show -json`.
pub const SHOW_JSON: &str = r#"{"format_version":"1.2","terraform_version":"1.9.5","resource_changes":[{"address":"aws_s3_bucket.logs","change":{"actions":["create"]}}]}"#;

pub const INIT_BANNER: &str = "Terraform has been successfully initialized!";
pub const PLAN_SUMMARY: &str = "Plan: 1 to add, 0 to change, 0 to destroy.";
pub const INIT_PROGRESS: &str = "Downloading provider hashicorp/aws...";

/// How the fake terraform binary behaves.
#[derive(Debug, Clone)]
pub enum TerraformBehavior {
    Success,
    FailInit,
    FailPlan,
    InvalidShow,
    /// `init` prints progress, then sleeps far longer than any test timeout.
    HangInit,
    /// `init` blocks until the given file exists.
    WaitForFile(PathBuf),
}

fn init_body(behavior: &TerraformBehavior) -> String {
    match behavior {
        TerraformBehavior::FailInit => concat!(
            "    echo \"Initializing provider plugins...\"\n",
            "    echo \"Error: Failed to query available provider packages\" >&2\n",
            "    exit 1\n"
        )
        .to_string(),
        TerraformBehavior::HangInit => format!("    echo \"{INIT_PROGRESS}\"\n    sleep 30\n"),
        TerraformBehavior::WaitForFile(path) => format!(
            "    while [ ! -f '{}' ]; do sleep 0.05; done\n    echo \"{}\"\n",
            path.display(),
            INIT_BANNER
        ),
        _ => format!("    echo \"Initializing the backend...\"\n    echo \"{}\"\n", INIT_BANNER),
    }
}

fn plan_body(behavior: &TerraformBehavior) -> String {
    match behavior {
        TerraformBehavior::FailPlan => concat!(
            "    echo \"Error: Invalid reference\" >&2\n",
            "    exit 1\n"
        )
        .to_string(),
        _ => format!(
            "    out=\"${{2#-out=}}\"\n    printf 'tfplan' > \"$out\"\n    echo \"{}\"\n",
            PLAN_SUMMARY
        ),
    }
}

fn show_body(behavior: &TerraformBehavior) -> String {
    match behavior {
        TerraformBehavior::InvalidShow => "    echo \"this is not json {\"\n".to_string(),
        _ => format!("    printf '%s' '{}'\n", SHOW_JSON),
    }
}

pub fn terraform_script(behavior: &TerraformBehavior) -> String {
    format!(
        "#!/bin/sh\ncase \"$1\" in\n  init)\n{}    ;;\n  plan)\n{}    ;;\n  show)\n{}    ;;\n  version)\n    echo '{{\"terraform_version\":\"1.9.5\"}}'\n    ;;\n  *)\n    exit 64\n    ;;\nesac\n",
        init_body(behavior),
        plan_body(behavior),
        show_body(behavior)
    )
}

/// Scanner that prints a status line before its report and exits with
/// the "violations found" code.
pub const CLOUDRIFT_SCRIPT: &str = r#"#!/bin/sh
case "$1" in
  --version)
    echo "cloudrift version 0.3.1"
    ;;
  scan)
    if [ "$2" = "--help" ]; then
      echo "usage: cloudrift scan"
      exit 0
    fi
    echo "Scanning resources..."
    echo '{"service":"s3","drift_count":1}'
    exit 2
    ;;
esac
"#;

#[cfg(unix)]
pub fn write_executable(path: &Path, contents: &str) {
    use std::os::unix::fs::PermissionsExt;

    std::fs::write(path, contents).expect("write script");
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))
        .expect("chmod script");
}

/// Minimal Terraform configuration.
pub const MAIN_TF: &str = r#"resource "aws_s3_bucket" "logs" {
  bucket = "cloudrift-logs"
}
"#;
