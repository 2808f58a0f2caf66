//! Single entry point for spawning external tools.
//!
//! Every process the agent starts goes through [`CommandRunner::run`]: a
//! `sh -c` spawn with a mandatory timeout, cancellation wired into the same
//! select, combined stdout/stderr capture, and forced termination of the
//! child when either budget trips.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;

use crate::agent::ControlWatcher;
use crate::error::ExecError;

/// Marker separating stdout from stderr in combined output.
const STDERR_MARKER: &str = "\n--- STDERR ---\n";

/// Result of executing one action: captured output plus success/failure.
#[derive(Debug)]
pub struct ExecResult {
    /// Combined stdout + stderr (possibly partial on failure).
    pub output: String,
    /// `None` on success.
    pub error: Option<ExecError>,
}

impl ExecResult {
    pub fn success(output: String) -> Self {
        Self {
            output,
            error: None,
        }
    }

    pub fn failure(output: String, error: ExecError) -> Self {
        Self {
            output,
            error: Some(error),
        }
    }

    pub fn ok(&self) -> bool {
        self.error.is_none()
    }

    pub fn was_cancelled(&self) -> bool {
        matches!(self.error, Some(ExecError::Cancelled))
    }
}

/// Spawns commands confined to a working root with injected environment.
#[derive(Debug, Clone)]
pub struct CommandRunner {
    env: Vec<(String, String)>,
}

impl CommandRunner {
    pub fn new(env: Vec<(String, String)>) -> Self {
        Self { env }
    }

    /// Run `command` through `sh -c` in `dir` with a hard `timeout`.
    ///
    /// On timeout or cancellation the child is killed (the future holding
    /// it is dropped with `kill_on_drop`) and the corresponding
    /// [`ExecError`] is recorded; the caller treats both as a failed
    /// iteration, not a fatal error.
    pub async fn run(
        &self,
        command: &str,
        dir: &Path,
        timeout: Duration,
        watcher: &mut ControlWatcher,
    ) -> ExecResult {
        let mut cmd = Command::new("sh");
        cmd.arg("-c")
            .arg(command)
            .current_dir(dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        for (key, value) in &self.env {
            cmd.env(key, value);
        }

        tracing::debug!(%command, dir = %dir.display(), ?timeout, "spawning command");

        let child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => return ExecResult::failure(String::new(), ExecError::Io(e)),
        };

        let wait = child.wait_with_output();
        tokio::pin!(wait);

        tokio::select! {
            result = tokio::time::timeout(timeout, &mut wait) => match result {
                Ok(Ok(out)) => {
                    let output = combine_output(&out.stdout, &out.stderr);
                    if out.status.success() {
                        ExecResult::success(output)
                    } else {
                        ExecResult::failure(
                            output,
                            ExecError::NonZeroExit {
                                code: out.status.code(),
                            },
                        )
                    }
                }
                Ok(Err(e)) => ExecResult::failure(String::new(), ExecError::Io(e)),
                Err(_) => {
                    tracing::warn!(%command, ?timeout, "command timed out, killing child");
                    ExecResult::failure(String::new(), ExecError::Timeout(timeout))
                }
            },
            _ = watcher.cancelled() => {
                tracing::info!(%command, "cancellation requested, killing child");
                ExecResult::failure(String::new(), ExecError::Cancelled)
            }
        }
    }
}

/// Merge stdout and stderr the way observations are fed back to the
/// reasoning service: stdout first, stderr appended behind a marker.
fn combine_output(stdout: &[u8], stderr: &[u8]) -> String {
    let mut output = String::from_utf8_lossy(stdout).into_owned();
    if !stderr.is_empty() {
        if !output.is_empty() {
            output.push_str(STDERR_MARKER);
        }
        output.push_str(&String::from_utf8_lossy(stderr));
    }
    output
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use super::*;
    use crate::agent::run_control;

    fn runner() -> CommandRunner {
        CommandRunner::new(vec![("OPSMEDIC_TEST_VAR".into(), "injected".into())])
    }

    #[tokio::test]
    async fn captures_stdout() {
        let dir = tempfile::tempdir().unwrap();
        let (_control, mut watcher) = run_control();

        let result = runner()
            .run("echo hello", dir.path(), Duration::from_secs(5), &mut watcher)
            .await;
        assert!(result.ok(), "{:?}", result.error);
        assert_eq!(result.output.trim(), "hello");
    }

    #[tokio::test]
    async fn injects_environment() {
        let dir = tempfile::tempdir().unwrap();
        let (_control, mut watcher) = run_control();

        let result = runner()
            .run(
                "echo $OPSMEDIC_TEST_VAR",
                dir.path(),
                Duration::from_secs(5),
                &mut watcher,
            )
            .await;
        assert_eq!(result.output.trim(), "injected");
    }

    #[tokio::test]
    async fn nonzero_exit_keeps_partial_output() {
        let dir = tempfile::tempdir().unwrap();
        let (_control, mut watcher) = run_control();

        let result = runner()
            .run(
                "echo partial; echo oops >&2; exit 3",
                dir.path(),
                Duration::from_secs(5),
                &mut watcher,
            )
            .await;
        assert!(!result.ok());
        assert!(matches!(
            result.error,
            Some(ExecError::NonZeroExit { code: Some(3) })
        ));
        assert!(result.output.contains("partial"));
        assert!(result.output.contains("--- STDERR ---"));
        assert!(result.output.contains("oops"));
    }

    #[tokio::test]
    async fn timeout_kills_the_child() {
        let dir = tempfile::tempdir().unwrap();
        let (_control, mut watcher) = run_control();

        let started = Instant::now();
        let result = runner()
            .run(
                "tail -f /dev/null",
                dir.path(),
                Duration::from_millis(200),
                &mut watcher,
            )
            .await;
        assert!(matches!(result.error, Some(ExecError::Timeout(_))));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn cancellation_terminates_within_grace_period() {
        let dir = tempfile::tempdir().unwrap();
        let (control, mut watcher) = run_control();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            control.cancel();
        });

        let started = Instant::now();
        let result = runner()
            .run(
                "tail -f /dev/null",
                dir.path(),
                Duration::from_secs(60),
                &mut watcher,
            )
            .await;
        assert!(result.was_cancelled());
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
