use std::ffi::OsStr;
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

const ETXTBSY: i32 = 26;
const SPAWN_RETRIES: u32 = 5;

/// How long the readers get to drain a killed child's pipes. A grandchild
/// that inherited the pipe can keep it open long after the kill.
const DRAIN_GRACE: Duration = Duration::from_millis(200);

/// Captured result of a finished child process.
#[derive(Debug)]
pub struct ToolOutput {
    pub status: ExitStatus,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl ToolOutput {
    pub fn success(&self) -> bool {
        self.status.success()
    }

    pub fn code(&self) -> Option<i32> {
        self.status.code()
    }

    /// stdout followed by stderr, lossily decoded.
    pub fn combined(&self) -> String {
        combine(&self.stdout, &self.stderr)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The child was killed; `stdout`/`stderr` hold what it wrote before that.
    #[error("timed out after {after:?}")]
    TimedOut {
        after: Duration,
        stdout: Vec<u8>,
        stderr: Vec<u8>,
    },
}

impl ToolError {
    /// Output the tool produced before failing, if any was captured.
    pub fn partial_output(&self) -> Option<String> {
        match self {
            ToolError::TimedOut { stdout, stderr, .. } => Some(combine(stdout, stderr)),
            ToolError::Spawn { .. } => None,
        }
    }
}

fn combine(stdout: &[u8], stderr: &[u8]) -> String {
    let mut text = String::from_utf8_lossy(stdout).into_owned();
    text.push_str(&String::from_utf8_lossy(stderr));
    text
}

/// Copy `pipe` into `buf` until EOF so the bytes survive a kill.
fn drain<R>(pipe: Option<R>, buf: Arc<Mutex<Vec<u8>>>) -> Option<JoinHandle<()>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let mut pipe = pipe?;
    Some(tokio::spawn(async move {
        let mut chunk = vec![0u8; 4096];
        loop {
            match pipe.read(&mut chunk).await {
                Ok(0) | Err(_) => break,
                Ok(n) => buf.lock().await.extend_from_slice(&chunk[..n]),
            }
        }
    }))
}

async fn take(buf: &Mutex<Vec<u8>>) -> Vec<u8> {
    std::mem::take(&mut *buf.lock().await)
}

/// Run `program` to completion in `dir`, killing it if `timeout` elapses.
pub async fn run_tool<I, S>(
    program: &str,
    args: I,
    dir: Option<&Path>,
    timeout: Duration,
) -> Result<ToolOutput, ToolError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let mut cmd = Command::new(program);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(dir) = dir {
        cmd.current_dir(dir);
    }

    let mut attempt = 0;
    let mut child = loop {
        match cmd.spawn() {
            Ok(child) => break child,
            // ETXTBSY: the binary was written moments ago and another fork
            // still holds it open for writing.
            Err(e) if e.raw_os_error() == Some(ETXTBSY) && attempt < SPAWN_RETRIES => {
                attempt += 1;
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
            Err(source) => {
                return Err(ToolError::Spawn {
                    program: program.to_string(),
                    source,
                })
            }
        }
    };

    let stdout_buf = Arc::new(Mutex::new(Vec::new()));
    let stderr_buf = Arc::new(Mutex::new(Vec::new()));
    let mut readers = [
        drain(child.stdout.take(), Arc::clone(&stdout_buf)),
        drain(child.stderr.take(), Arc::clone(&stderr_buf)),
    ];

    let finished = tokio::time::timeout(timeout, async {
        let status = child.wait().await;
        for reader in readers.iter_mut().flatten() {
            let _ = reader.await;
        }
        status
    })
    .await;

    match finished {
        Ok(Ok(status)) => Ok(ToolOutput {
            status,
            stdout: take(&stdout_buf).await,
            stderr: take(&stderr_buf).await,
        }),
        Ok(Err(source)) => Err(ToolError::Spawn {
            program: program.to_string(),
            source,
        }),
        Err(_) => {
            if let Err(e) = child.kill().await {
                tracing::warn!(program, error = %e, "Failed to kill timed-out tool");
            }
            for reader in readers.iter_mut().flatten() {
                if tokio::time::timeout(DRAIN_GRACE, &mut *reader).await.is_err() {
                    reader.abort();
                }
            }
            Err(ToolError::TimedOut {
                after: timeout,
                stdout: take(&stdout_buf).await,
                stderr: take(&stderr_buf).await,
            })
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_captures_both_streams() {
        let out = run_tool(
            "sh",
            ["-c", "echo out; echo err >&2; exit 3"],
            None,
            Duration::from_secs(10),
        )
        .await
        .unwrap();
        assert!(!out.success());
        assert_eq!(out.code(), Some(3));
        assert_eq!(out.combined(), "out\nerr\n");
    }

    #[tokio::test]
    async fn test_runs_in_directory() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join("marker.tf"), "").unwrap();
        let out = run_tool("ls", Vec::<&str>::new(), Some(dir.path()), Duration::from_secs(10))
            .await
            .unwrap();
        assert!(out.combined().contains("marker.tf"));
    }

    #[tokio::test]
    async fn test_timeout_reported() {
        let err = run_tool("sleep", ["5"], None, Duration::from_millis(100))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::TimedOut { .. }));
        assert_eq!(err.to_string(), "timed out after 100ms");
    }

    #[tokio::test]
    async fn test_timeout_keeps_partial_output() {
        let err = run_tool(
            "sh",
            ["-c", "echo started; echo warming >&2; sleep 5"],
            None,
            Duration::from_millis(500),
        )
        .await
        .unwrap_err();
        assert_eq!(err.partial_output().as_deref(), Some("started\nwarming\n"));
    }

    #[tokio::test]
    async fn test_spawn_error_has_no_partial_output() {
        let err = run_tool("definitely-not-a-real-binary-7f3a", ["x"], None, Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(err.partial_output().is_none());
    }

    #[tokio::test]
    async fn test_missing_program() {
        let err = run_tool(
            "definitely-not-a-real-binary-7f3a",
            Vec::<&str>::new(),
            None,
            Duration::from_secs(1),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ToolError::Spawn { .. }));
    }
}
