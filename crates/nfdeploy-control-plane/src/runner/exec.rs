//! Subprocess execution for a single task.

use std::io;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::Duration;

use nfdeploy_core::{TaskId, TaskSpec, TaskStatus};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::output::OutputBuffer;

/// How long output pumps may keep reading after the child has exited.
///
/// A grandchild that inherited the pipes can hold them open indefinitely.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Exit code recorded for canceled tasks and exec failures.
pub const NO_EXIT_CODE: i32 = -1;

/// Resolve a command the way the OS would when spawning it.
///
/// Bare names are searched on `PATH`; anything containing a separator is
/// taken as a path. Only existing, executable regular files resolve.
pub fn resolve_command(command: &str) -> Option<PathBuf> {
    if command.trim().is_empty() {
        return None;
    }

    let path = Path::new(command);
    if path.components().count() > 1 {
        let path = if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir().ok()?.join(path)
        };
        return is_executable(&path).then_some(path);
    }

    let search = std::env::var_os("PATH")?;
    std::env::split_paths(&search)
        .map(|dir| dir.join(command))
        .find(|candidate| is_executable(candidate))
}

fn is_executable(path: &Path) -> bool {
    let Ok(meta) = std::fs::metadata(path) else {
        return false;
    };
    if !meta.is_file() {
        return false;
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        meta.permissions().mode() & 0o111 != 0
    }

    #[cfg(not(unix))]
    {
        true
    }
}

/// Terminal classification of one execution.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Outcome {
    pub status: TaskStatus,
    pub exit_code: i32,
    pub error: Option<String>,
}

impl Outcome {
    fn canceled() -> Self {
        Self {
            status: TaskStatus::Canceled,
            exit_code: NO_EXIT_CODE,
            error: Some("canceled".to_string()),
        }
    }

    fn exec_failure(error: impl Into<String>) -> Self {
        Self {
            status: TaskStatus::Failed,
            exit_code: NO_EXIT_CODE,
            error: Some(error.into()),
        }
    }

    /// Classify how the child ended.
    pub(crate) fn classify(canceled: bool, waited: io::Result<ExitStatus>) -> Self {
        if canceled {
            return Self::canceled();
        }
        match waited {
            Err(e) => Self::exec_failure(format!("failed to wait for process: {e}")),
            Ok(status) if status.success() => Self {
                status: TaskStatus::Succeeded,
                exit_code: 0,
                error: None,
            },
            Ok(status) => Self {
                status: TaskStatus::Failed,
                exit_code: status.code().unwrap_or(NO_EXIT_CODE),
                error: Some(status.to_string()),
            },
        }
    }
}

/// Everything the execution task needs, moved into it at submission.
pub(crate) struct Execution {
    pub id: TaskId,
    pub program: PathBuf,
    pub spec: TaskSpec,
    pub output: Arc<OutputBuffer>,
    pub cancel: CancellationToken,
    pub cancel_grace: Duration,
}

impl Execution {
    /// Run the subprocess to completion and classify the result.
    pub(crate) async fn run(self) -> Outcome {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.spec.args)
            .envs(&self.spec.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.spec.work_dir {
            cmd.current_dir(dir);
        }

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                warn!(task_id = %self.id, program = %self.program.display(), error = %e, "Failed to spawn process");
                return Outcome::exec_failure(format!("failed to spawn process: {e}"));
            }
        };

        info!(
            task_id = %self.id,
            pid = ?child.id(),
            program = %self.program.display(),
            args = ?self.spec.args,
            "Process started"
        );

        // Both streams feed the same buffer so readers see them interleaved.
        let mut pumps: Vec<JoinHandle<()>> = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            pumps.push(tokio::spawn(pump(stdout, self.output.clone())));
        }
        if let Some(stderr) = child.stderr.take() {
            pumps.push(tokio::spawn(pump(stderr, self.output.clone())));
        }

        let waited = tokio::select! {
            status = child.wait() => status,
            _ = self.cancel.cancelled() => {
                info!(task_id = %self.id, "Cancellation requested; terminating process");
                terminate(&mut child, self.cancel_grace, &self.id).await
            }
        };

        for mut pump in pumps {
            if timeout(DRAIN_TIMEOUT, &mut pump).await.is_err() {
                debug!(task_id = %self.id, "Output pipe still open after exit; abandoning reader");
                pump.abort();
            }
        }

        Outcome::classify(self.cancel.is_cancelled(), waited)
    }
}

async fn pump<R>(mut reader: R, output: Arc<OutputBuffer>)
where
    R: AsyncRead + Unpin,
{
    let mut buf = [0u8; 8192];
    loop {
        match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => output.write(&buf[..n]),
            Err(e) => {
                debug!(error = %e, "Output read failed");
                break;
            }
        }
    }
}

/// Ask the child to exit, escalating to a kill once the grace period lapses.
async fn terminate(child: &mut Child, grace: Duration, id: &TaskId) -> io::Result<ExitStatus> {
    #[cfg(unix)]
    {
        if let Some(pid) = child.id() {
            // SAFETY: kill(2) has no memory-safety preconditions; the pid
            // belongs to a child we have not reaped yet.
            let rc = unsafe { libc::kill(pid as libc::pid_t, libc::SIGTERM) };
            if rc == 0 {
                match timeout(grace, child.wait()).await {
                    Ok(status) => return status,
                    Err(_) => warn!(
                        task_id = %id,
                        grace_secs = grace.as_secs_f64(),
                        "Process ignored SIGTERM; killing"
                    ),
                }
            }
        }
    }

    #[cfg(not(unix))]
    let _ = (grace, id);

    child.kill().await?;
    child.wait().await
}
