//! Script runner
//!
//! Runs the optimization script under a hard wall-clock deadline. The call
//! resolves only once the child has exited or been killed.

use rackopt_core::domain::execution::{ABNORMAL_EXIT_CODE, ScriptExecution, TIMEOUT_EXIT_CODE};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// How long output readers may keep draining after a timeout kill
const READER_GRACE: Duration = Duration::from_millis(500);

/// Launches `<interpreter> <script> <args...>` for each job
#[derive(Debug, Clone)]
pub struct ScriptRunner {
    interpreter: String,
    script_path: PathBuf,
    timeout: Duration,
}

impl ScriptRunner {
    pub fn new(
        interpreter: impl Into<String>,
        script_path: impl Into<PathBuf>,
        timeout: Duration,
    ) -> Self {
        Self {
            interpreter: interpreter.into(),
            script_path: script_path.into(),
            timeout,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Runs the script in `work_dir` with `args` after the script path
    ///
    /// An empty `work_dir` leaves the current directory unchanged. Launch
    /// failures are reported through the returned execution, never as an
    /// error.
    pub async fn optimize(&self, work_dir: &Path, args: &[String]) -> ScriptExecution {
        let mut command = Command::new(&self.interpreter);
        command
            .arg(&self.script_path)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if !work_dir.as_os_str().is_empty() {
            command.current_dir(work_dir);
        }

        debug!(
            "Running {} {} with {} argument(s) in '{}'",
            self.interpreter,
            self.script_path.display(),
            args.len(),
            work_dir.display()
        );

        let started = Instant::now();
        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(e) => {
                return ScriptExecution {
                    exit_code: ABNORMAL_EXIT_CODE,
                    output: String::new(),
                    shell_error: format!("failed to start '{}': {}", self.interpreter, e),
                    duration: started.elapsed(),
                };
            }
        };

        let stdout = child.stdout.take().map(read_to_end);
        let stderr = child.stderr.take().map(read_to_end);

        let waited = tokio::time::timeout(self.timeout, child.wait()).await;
        let (exit_code, shell_error, timed_out) = match waited {
            Ok(Ok(status)) if status.success() => (0, String::new(), false),
            Ok(Ok(status)) => (
                status.code().unwrap_or(ABNORMAL_EXIT_CODE),
                status.to_string(),
                false,
            ),
            Ok(Err(e)) => (
                ABNORMAL_EXIT_CODE,
                format!("failed to wait for script: {}", e),
                false,
            ),
            Err(_) => {
                if let Err(e) = child.kill().await {
                    warn!("Failed to kill timed out script: {}", e);
                }
                (
                    TIMEOUT_EXIT_CODE,
                    format!("script timed out after {:?}", self.timeout),
                    true,
                )
            }
        };
        let duration = started.elapsed();

        // Descendants may still hold the pipes open after a kill
        let grace = timed_out.then_some(READER_GRACE);
        let mut output = collect(stdout, grace).await;
        output.push_str(&collect(stderr, grace).await);

        debug!(
            "Script finished with exit code {} in {:?}",
            exit_code, duration
        );

        ScriptExecution {
            exit_code,
            output,
            shell_error,
            duration,
        }
    }
}

fn read_to_end<R>(mut reader: R) -> JoinHandle<Vec<u8>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buf = Vec::new();
        if let Err(e) = reader.read_to_end(&mut buf).await {
            debug!("Script output stream closed with error: {}", e);
        }
        buf
    })
}

async fn collect(handle: Option<JoinHandle<Vec<u8>>>, grace: Option<Duration>) -> String {
    let Some(mut handle) = handle else {
        return String::new();
    };

    let bytes = match grace {
        None => handle.await.unwrap_or_default(),
        Some(grace) => match tokio::time::timeout(grace, &mut handle).await {
            Ok(joined) => joined.unwrap_or_default(),
            Err(_) => {
                handle.abort();
                Vec::new()
            }
        },
    };

    String::from_utf8_lossy(&bytes).into_owned()
}
