//! Initial problem context, assembled by the caller and consumed once at
//! run start. Prepended to every prompt alongside the growing history.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Everything the reasoning service is told about the failure before the
/// first iteration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProblemContext {
    /// The operation that failed, e.g. "apply" or "troubleshooting".
    pub operation: String,
    /// Target environment name; also selects `env/<name>` for change actions.
    pub environment: String,
    /// Cloud credential profile injected into spawned commands.
    pub profile: Option<String>,
    /// Cloud region injected into spawned commands.
    pub region: Option<String>,
    /// Working root every execution is confined to.
    pub working_dir: PathBuf,
    /// The error text that triggered the run.
    pub initial_error: String,
    /// Individual resource error messages, when available.
    pub resource_errors: Vec<String>,
    /// Extra context facts (cluster name, service name, ...).
    pub extra: BTreeMap<String, String>,
}

impl ProblemContext {
    pub fn new(
        environment: impl Into<String>,
        working_dir: impl Into<PathBuf>,
        initial_error: impl Into<String>,
    ) -> Self {
        Self {
            operation: "troubleshooting".to_string(),
            environment: environment.into(),
            profile: None,
            region: None,
            working_dir: working_dir.into(),
            initial_error: initial_error.into(),
            resource_errors: Vec::new(),
            extra: BTreeMap::new(),
        }
    }

    pub fn with_operation(mut self, operation: impl Into<String>) -> Self {
        self.operation = operation.into();
        self
    }

    pub fn with_profile(mut self, profile: impl Into<String>) -> Self {
        self.profile = Some(profile.into());
        self
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    pub fn with_resource_errors(mut self, errors: Vec<String>) -> Self {
        self.resource_errors = errors;
        self
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    /// JSON block of the structured errors, included verbatim in prompts.
    pub fn structured_errors_json(&self) -> String {
        let errors: &[String] = if self.resource_errors.is_empty() {
            std::slice::from_ref(&self.initial_error)
        } else {
            &self.resource_errors
        };
        let value = serde_json::json!({
            "operation": self.operation,
            "environment": self.environment,
            "error_count": errors.len(),
            "errors": errors,
        });
        serde_json::to_string_pretty(&value).unwrap_or_default()
    }
}
