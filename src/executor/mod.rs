//! Sandboxed execution of validated actions.
//!
//! The executor is stateless per action: it spawns the underlying tool
//! through one entry point with a kind-specific timeout, captures combined
//! output, and honors the backup-before-destructive-write contract for file
//! mutations. It never sees an action the guard has not allowed.

mod file_edit;
mod runner;

use std::path::PathBuf;
use std::time::Duration;

use crate::agent::ControlWatcher;
use crate::context::ProblemContext;
use crate::error::ExecError;
use crate::guard::resolve_within;
use crate::protocol::Action;

pub use runner::{CommandRunner, ExecResult};

/// Per-kind execution budgets. Inspection commands stay short; apply-type
/// infrastructure changes get minutes.
#[derive(Debug, Clone, Copy)]
pub struct Timeouts {
    pub privileged_cli: Duration,
    pub shell: Duration,
    pub preview: Duration,
    pub apply: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            privileged_cli: Duration::from_secs(2 * 60),
            shell: Duration::from_secs(2 * 60),
            preview: Duration::from_secs(5 * 60),
            apply: Duration::from_secs(15 * 60),
        }
    }
}

/// Executes validated actions against the confined working root.
#[derive(Debug, Clone)]
pub struct Executor {
    root: PathBuf,
    environment: String,
    runner: CommandRunner,
    timeouts: Timeouts,
}

impl Executor {
    /// Build an executor from the problem context: working root, target
    /// environment, and the credential/region variables injected into every
    /// spawned command.
    pub fn new(context: &ProblemContext) -> Self {
        let mut env = Vec::new();
        if let Some(profile) = &context.profile {
            env.push(("AWS_PROFILE".to_string(), profile.clone()));
        }
        if let Some(region) = &context.region {
            env.push(("AWS_REGION".to_string(), region.clone()));
            env.push(("AWS_DEFAULT_REGION".to_string(), region.clone()));
        }

        Self {
            root: context.working_dir.clone(),
            environment: context.environment.clone(),
            runner: CommandRunner::new(env),
            timeouts: Timeouts::default(),
        }
    }

    /// Override the per-kind budgets (tests use short ones).
    pub fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Execute one guard-approved action.
    pub async fn execute(&self, action: &Action, watcher: &mut ControlWatcher) -> ExecResult {
        match action {
            Action::PrivilegedCli { command } => {
                self.runner
                    .run(command, &self.root, self.timeouts.privileged_cli, watcher)
                    .await
            }
            Action::Shell { command } => {
                self.runner
                    .run(command, &self.root, self.timeouts.shell, watcher)
                    .await
            }
            Action::PreviewChange { command } => {
                let dir = match self.change_dir() {
                    Ok(dir) => dir,
                    Err(e) => return ExecResult::failure(String::new(), e),
                };
                self.runner
                    .run(command, &dir, self.timeouts.preview, watcher)
                    .await
            }
            Action::ApplyChange { command } => {
                let dir = match self.change_dir() {
                    Ok(dir) => dir,
                    Err(e) => return ExecResult::failure(String::new(), e),
                };
                // Applies run non-interactively; a mid-run confirmation
                // prompt would hang the loop until the timeout.
                let command = ensure_auto_approve(command);
                self.runner
                    .run(&command, &dir, self.timeouts.apply, watcher)
                    .await
            }
            Action::FileEdit {
                path,
                old_text,
                new_text,
            } => {
                let resolved = match resolve_within(&self.root, path) {
                    Ok(resolved) => resolved,
                    Err(reason) => {
                        return ExecResult::failure(
                            String::new(),
                            ExecError::PathDenied(reason.to_string()),
                        );
                    }
                };
                match file_edit::apply_edit(&resolved, old_text, new_text) {
                    Ok(output) => ExecResult::success(output),
                    Err(e) => ExecResult::failure(String::new(), e),
                }
            }
            // Terminal actions never reach the executor; the controller
            // handles them before validation.
            Action::Complete { summary, .. } => ExecResult::success(summary.clone()),
        }
    }

    /// Infrastructure change commands run inside the per-environment
    /// directory under the root.
    fn change_dir(&self) -> Result<PathBuf, ExecError> {
        let dir = self.root.join("env").join(&self.environment);
        if dir.is_dir() {
            Ok(dir)
        } else {
            Err(ExecError::MissingEnvDir(dir.display().to_string()))
        }
    }
}

fn ensure_auto_approve(command: &str) -> String {
    if command.contains("-auto-approve") {
        command.to_string()
    } else {
        format!("{command} -auto-approve")
    }
}
