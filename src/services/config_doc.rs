use std::io;

use crate::services::sandbox::{PathSandbox, PathViolation};

pub const PLAN_PATH_KEY: &str = "plan_path:";

#[derive(Debug, thiserror::Error)]
pub enum ConfigDocError {
    #[error(transparent)]
    Path(#[from] PathViolation),

    #[error("config update failed: {0}")]
    Io(#[from] io::Error),
}

/// Point the first `plan_path:` line at `plan_path`, appending one if absent.
///
/// This is a line edit, not a YAML round trip; comments and layout survive.
pub fn rewrite_plan_path(contents: &str, plan_path: &str) -> String {
    let replacement = format!("{} ./{}", PLAN_PATH_KEY, plan_path.trim_start_matches("./"));
    let mut lines: Vec<&str> = contents.split('\n').collect();

    match lines
        .iter()
        .position(|line| line.trim_start().starts_with(PLAN_PATH_KEY))
    {
        Some(idx) => lines[idx] = &replacement,
        None => {
            // Keep a trailing newline at the end of the file.
            let at = if lines.last().is_some_and(|l| l.is_empty()) && lines.len() > 1 {
                lines.len() - 1
            } else {
                lines.len()
            };
            lines.insert(at, &replacement);
        }
    }

    lines.join("\n")
}

/// Rewrite `plan_path:` in the config at `config_path` (sandbox-relative).
///
/// Returns `Ok(false)` when the config does not exist; a missing config is not
/// created.
pub async fn update_plan_path(
    sandbox: &PathSandbox,
    config_path: &str,
    plan_path: &str,
) -> Result<bool, ConfigDocError> {
    let full = sandbox.resolve(config_path)?;
    let contents = match tokio::fs::read_to_string(&full).await {
        Ok(c) => c,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(e.into()),
    };
    tokio::fs::write(&full, rewrite_plan_path(&contents, plan_path)).await?;
    Ok(true)
}
