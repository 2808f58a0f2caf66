//! Typed actions decoded from reasoning-service replies.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Closed set of tool names the reasoning service may choose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolKind {
    /// Infra-management CLI invocation with environment context injected.
    PrivilegedCli,
    /// General read/inspection shell command.
    Shell,
    /// Exact-match text replacement in one file.
    FileEdit,
    /// Non-mutating preview of an infrastructure change.
    PreviewChange,
    /// Mutating application of an infrastructure change, auto-confirmed.
    ApplyChange,
    /// Terminal action ending the run.
    Complete,
}

impl ToolKind {
    pub const ALL: [ToolKind; 6] = [
        ToolKind::PrivilegedCli,
        ToolKind::Shell,
        ToolKind::FileEdit,
        ToolKind::PreviewChange,
        ToolKind::ApplyChange,
        ToolKind::Complete,
    ];

    /// Parse a tool name case-insensitively. Returns `None` for anything
    /// outside the closed set.
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "privileged_cli" => Some(Self::PrivilegedCli),
            "shell" => Some(Self::Shell),
            "file_edit" => Some(Self::FileEdit),
            "preview_change" => Some(Self::PreviewChange),
            "apply_change" => Some(Self::ApplyChange),
            "complete" => Some(Self::Complete),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PrivilegedCli => "privileged_cli",
            Self::Shell => "shell",
            Self::FileEdit => "file_edit",
            Self::PreviewChange => "preview_change",
            Self::ApplyChange => "apply_change",
            Self::Complete => "complete",
        }
    }
}

impl fmt::Display for ToolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One step chosen by the reasoning service.
///
/// Exactly one variant is populated per reply; required payload fields are
/// non-empty after a successful parse. Every consumer matches exhaustively.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "tool", rename_all = "snake_case")]
pub enum Action {
    PrivilegedCli {
        command: String,
    },
    Shell {
        command: String,
    },
    FileEdit {
        path: String,
        old_text: String,
        new_text: String,
    },
    PreviewChange {
        command: String,
    },
    ApplyChange {
        command: String,
    },
    Complete {
        success: bool,
        summary: String,
    },
}

impl Action {
    pub fn kind(&self) -> ToolKind {
        match self {
            Self::PrivilegedCli { .. } => ToolKind::PrivilegedCli,
            Self::Shell { .. } => ToolKind::Shell,
            Self::FileEdit { .. } => ToolKind::FileEdit,
            Self::PreviewChange { .. } => ToolKind::PreviewChange,
            Self::ApplyChange { .. } => ToolKind::ApplyChange,
            Self::Complete { .. } => ToolKind::Complete,
        }
    }

    /// The shell-style command payload, for the kinds that carry one.
    pub fn command(&self) -> Option<&str> {
        match self {
            Self::PrivilegedCli { command }
            | Self::Shell { command }
            | Self::PreviewChange { command }
            | Self::ApplyChange { command } => Some(command),
            Self::FileEdit { .. } | Self::Complete { .. } => None,
        }
    }

    /// Whether this action ends the run.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete { .. })
    }

    /// Short human-readable rendering for history and logs.
    pub fn describe(&self) -> String {
        match self {
            Self::PrivilegedCli { command }
            | Self::Shell { command }
            | Self::PreviewChange { command }
            | Self::ApplyChange { command } => format!("{}: {}", self.kind(), command),
            Self::FileEdit { path, .. } => format!("file_edit: {path}"),
            Self::Complete { success, summary } => {
                format!(
                    "complete: {}: {summary}",
                    if *success { "success" } else { "failure" }
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_kind_parse_is_case_insensitive() {
        assert_eq!(ToolKind::parse("SHELL"), Some(ToolKind::Shell));
        assert_eq!(ToolKind::parse(" File_Edit "), Some(ToolKind::FileEdit));
        assert_eq!(ToolKind::parse("apply_change"), Some(ToolKind::ApplyChange));
        assert_eq!(ToolKind::parse("terraform"), None);
        assert_eq!(ToolKind::parse(""), None);
    }

    #[test]
    fn tool_kind_round_trips_through_as_str() {
        for kind in ToolKind::ALL {
            assert_eq!(ToolKind::parse(kind.as_str()), Some(kind));
        }
    }

    #[test]
    fn action_command_payloads() {
        let shell = Action::Shell {
            command: "ls env".into(),
        };
        assert_eq!(shell.command(), Some("ls env"));
        assert!(!shell.is_terminal());

        let done = Action::Complete {
            success: true,
            summary: "fixed".into(),
        };
        assert_eq!(done.command(), None);
        assert!(done.is_terminal());
    }
}
