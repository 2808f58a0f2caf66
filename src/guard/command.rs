//! Command validation: denial patterns and the executable allow-list.
//!
//! Both checks must pass. A denial-pattern match takes priority in the
//! reported reason even when the binary is allow-listed, since a listed
//! binary can still be invoked destructively through its arguments.

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

use crate::guard::{DenyReason, Verdict};

/// Executables the agent may invoke as the first token of a command.
const ALLOWED_BINARIES: &[&str] = &[
    // infra tooling
    "aws",
    "terraform",
    // read/inspection utilities
    "cat",
    "grep",
    "ls",
    "echo",
    "head",
    "tail",
    "find",
    "wc",
    "diff",
    "pwd",
    // version control
    "git",
    // light filesystem and text processing
    "cd",
    "mkdir",
    "touch",
    "jq",
];

/// Destructive-command signatures, matched case-insensitively anywhere in
/// the command string.
const DENIED_PATTERN_SOURCES: &[&str] = &[
    // recursive deletion of root, home, cwd, or glob expansions
    r"rm\s+-rf?\s*/",
    r"rm\s+-rf\s*~",
    r"rm\s+-rf\s*\*",
    r"rm\s+-rf?\s*\.",
    r"rm\s+-r\S*\s+.*\*",
    r"rm\s+.*-rf",
    // raw disk writes and filesystem formatting
    r"dd\s+if=",
    r"mkfs",
    r">\s*/dev",
    r"\bformat\s",
    r"\bfdisk\b",
    // piping a network fetch into a shell or interpreter
    r"curl[^|]*\|\s*(sh|bash|zsh|python\S*|perl)",
    r"wget[^|]*\|\s*(sh|bash|zsh|python\S*|perl)",
    // overly permissive permission changes
    r"chmod\s+(-\S+\s+)?777",
    // fork bomb
    r":\(\)\s*\{\s*:\|:&\s*\}\s*;\s*:",
    // dynamic code evaluation
    r"\beval\s",
];

static DENIED_PATTERNS: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    DENIED_PATTERN_SOURCES
        .iter()
        .map(|src| {
            let re = Regex::new(&format!("(?i){src}")).expect("denial pattern must compile");
            (*src, re)
        })
        .collect()
});

/// Whether `binary` (basename of the first command token) is allow-listed.
pub fn is_allowed_binary(binary: &str) -> bool {
    ALLOWED_BINARIES.contains(&binary)
}

/// Validate one command string before it may reach the executor.
pub fn validate_command(command: &str) -> Verdict {
    for (source, pattern) in DENIED_PATTERNS.iter() {
        if pattern.is_match(command) {
            return Verdict::Denied(DenyReason::DeniedPattern {
                pattern: (*source).to_string(),
            });
        }
    }

    let Some(first_token) = command.split_whitespace().next() else {
        return Verdict::Denied(DenyReason::UnlistedCommand {
            binary: "(empty command)".to_string(),
        });
    };

    // `/usr/bin/env`-style absolute invocations reduce to their basename.
    let binary = Path::new(first_token)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| first_token.to_string());

    if is_allowed_binary(&binary) {
        Verdict::Allowed
    } else {
        Verdict::Denied(DenyReason::UnlistedCommand { binary })
    }
}
