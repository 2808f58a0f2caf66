//! Error taxonomy for the agent core.
//!
//! Categories follow the propagation policy of the iteration loop:
//! [`ParseError`] and [`ExecError`] are recoverable and become failed
//! iteration records, [`LlmError`] is retried by the reasoning client and
//! only fatal once retries exhaust.

use std::time::Duration;

use thiserror::Error;

/// Failure turning a reasoning-service reply into a typed action.
///
/// Recoverable: the controller records it as a failed iteration and the
/// loop continues, so the reasoning service can correct itself next turn.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("reply is missing the {0} field")]
    MissingField(&'static str),

    #[error("unknown tool '{0}' (must be one of: privileged_cli, shell, file_edit, preview_change, apply_change, complete)")]
    UnknownTool(String),

    #[error("invalid file_edit payload: {0} (expected FILE:path|OLD:text|NEW:text)")]
    InvalidEditPayload(String),

    #[error("empty reply from reasoning service")]
    EmptyReply,
}

/// Transport-level failure talking to the reasoning service.
#[derive(Debug, Clone, Error)]
pub enum LlmError {
    #[error("request to {provider} failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("{provider} returned HTTP {status}: {reason}")]
    Api {
        provider: String,
        status: u16,
        reason: String,
    },

    #[error("authentication rejected by {provider}")]
    AuthRejected { provider: String },

    #[error("rate limited by {provider}")]
    RateLimited { provider: String },

    #[error("invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },

    #[error("retries exhausted after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: String },
}

impl LlmError {
    /// Whether the failure is transient and worth another attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::RequestFailed { .. } | Self::RateLimited { .. } => true,
            Self::Api { status, .. } => crate::llm::retry::is_retryable_status(*status),
            Self::AuthRejected { .. }
            | Self::InvalidResponse { .. }
            | Self::RetriesExhausted { .. } => false,
        }
    }
}

/// Failure executing a validated action.
///
/// Recoverable at the run level: the output (possibly partial) is captured
/// and fed back into the next reasoning turn.
#[derive(Debug, Error)]
pub enum ExecError {
    #[error("command exited with status {code:?}")]
    NonZeroExit { code: Option<i32> },

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("cancelled before completion")]
    Cancelled,

    #[error("old text not found in {path}")]
    OldTextMissing { path: String },

    #[error("old text occurs {count} times in {path}; need exactly one match")]
    OldTextAmbiguous { path: String, count: usize },

    #[error("environment directory not found: {0}")]
    MissingEnvDir(String),

    #[error("target path rejected: {0}")]
    PathDenied(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ExecError {
    /// Whether this failure was a timeout abandonment.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}

/// Top-level error for setup and plumbing outside the iteration loop.
#[derive(Debug, Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
