//! Pre-execution safety validation.
//!
//! Every parsed action passes through the guard before the executor may
//! touch it. Two independent checks apply: command validation (denial
//! patterns + executable allow-list) for the spawn-style kinds, and path
//! confinement + size ceiling for file edits. The guard is a pure function
//! of its inputs; it holds no run-scoped state and returns immutable
//! verdicts.

mod command;
mod path;

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::protocol::Action;

pub use command::{is_allowed_binary, validate_command};
pub use path::{MAX_FILE_SIZE, check_size, resolve_within};

/// Why the guard refused an action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "kebab-case")]
pub enum DenyReason {
    /// The resolved executable is not on the allow-list.
    UnlistedCommand { binary: String },
    /// The command matches a fixed destructive-command signature.
    DeniedPattern { pattern: String },
    /// The target path resolves outside the working root or into a
    /// sensitive location.
    PathEscape { path: String },
    /// The target file exceeds the size ceiling.
    SizeExceeded { size: u64, limit: u64 },
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnlistedCommand { binary } => {
                write!(f, "unlisted-command: '{binary}' is not an allowed executable")
            }
            Self::DeniedPattern { pattern } => {
                write!(f, "denied-pattern: command matches destructive pattern '{pattern}'")
            }
            Self::PathEscape { path } => {
                write!(f, "path-escape: '{path}' resolves outside the working root")
            }
            Self::SizeExceeded { size, limit } => {
                write!(f, "size-exceeded: file is {size} bytes (limit {limit})")
            }
        }
    }
}

/// Outcome of guard evaluation. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Allowed,
    Denied(DenyReason),
}

impl Verdict {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed)
    }

    pub fn denied(&self) -> Option<&DenyReason> {
        match self {
            Self::Allowed => None,
            Self::Denied(reason) => Some(reason),
        }
    }
}

/// Safety policy bound to one working root.
#[derive(Debug, Clone)]
pub struct Guard {
    root: PathBuf,
}

impl Guard {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Validate a parsed action against the safety policy.
    ///
    /// The specific [`DenyReason`] is preserved so the controller can feed
    /// it back to the reasoning service on the next turn.
    pub fn check(&self, action: &Action) -> Verdict {
        match action {
            Action::PrivilegedCli { command }
            | Action::Shell { command }
            | Action::PreviewChange { command }
            | Action::ApplyChange { command } => validate_command(command),
            Action::FileEdit { path, .. } => match resolve_within(&self.root, path) {
                Ok(resolved) => check_size(&resolved),
                Err(reason) => Verdict::Denied(reason),
            },
            Action::Complete { .. } => Verdict::Allowed,
        }
    }
}
