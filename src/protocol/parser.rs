//! Reply grammar for the think→act protocol.
//!
//! Each turn the reasoning service must answer with three labeled fields:
//!
//! ```text
//! THOUGHT: why this step comes next (may span multiple lines)
//! ACTION: one of privileged_cli | shell | file_edit | preview_change | apply_change | complete
//! COMMAND: the exact invocation string
//! ```
//!
//! Parsing is tolerant of surrounding whitespace, multi-line thought and
//! command sections, and tool-name casing, but any structural deviation is
//! a typed [`ParseError`] — never a best-effort guess.

use crate::error::ParseError;
use crate::protocol::action::{Action, ToolKind};

/// Delimiter reserved by the `file_edit` payload encoding.
const EDIT_DELIMITER: char = '|';

/// A successfully decoded reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedReply {
    /// The free-text rationale.
    pub thought: String,
    /// The typed action to validate and execute.
    pub action: Action,
}

/// Parse a raw reasoning-service reply into a thought and a typed action.
pub fn parse_reply(reply: &str) -> Result<ParsedReply, ParseError> {
    if reply.trim().is_empty() {
        return Err(ParseError::EmptyReply);
    }

    let fields = scan_fields(reply);

    let thought = fields.thought.ok_or(ParseError::MissingField("THOUGHT"))?;
    let tool_name = fields.action.ok_or(ParseError::MissingField("ACTION"))?;
    let command = fields.command.ok_or(ParseError::MissingField("COMMAND"))?;

    let kind =
        ToolKind::parse(&tool_name).ok_or_else(|| ParseError::UnknownTool(tool_name.clone()))?;

    let action = match kind {
        ToolKind::PrivilegedCli => Action::PrivilegedCli { command },
        ToolKind::Shell => Action::Shell { command },
        ToolKind::PreviewChange => Action::PreviewChange { command },
        ToolKind::ApplyChange => Action::ApplyChange { command },
        ToolKind::FileEdit => parse_edit_payload(&command)?,
        ToolKind::Complete => parse_complete_payload(&command),
    };

    Ok(ParsedReply { thought, action })
}

#[derive(Default)]
struct RawFields {
    thought: Option<String>,
    action: Option<String>,
    command: Option<String>,
}

/// Line-oriented scan for the three labeled sections.
///
/// A section runs from its label to the next label; unlabeled lines belong
/// to the section currently open, which lets THOUGHT and COMMAND span
/// multiple lines.
fn scan_fields(reply: &str) -> RawFields {
    #[derive(Clone, Copy, PartialEq)]
    enum Section {
        None,
        Thought,
        Action,
        Command,
    }

    let mut fields = RawFields::default();
    let mut current = Section::None;
    let mut thought_lines: Vec<String> = Vec::new();
    let mut command_lines: Vec<String> = Vec::new();

    for line in reply.lines() {
        let trimmed = line.trim();

        if let Some(rest) = strip_label(trimmed, "THOUGHT:") {
            current = Section::Thought;
            thought_lines.clear();
            if !rest.is_empty() {
                thought_lines.push(rest.to_string());
            }
        } else if let Some(rest) = strip_label(trimmed, "ACTION:") {
            current = Section::Action;
            fields.action = Some(rest.to_string());
        } else if let Some(rest) = strip_label(trimmed, "COMMAND:") {
            current = Section::Command;
            command_lines.clear();
            if !rest.is_empty() {
                command_lines.push(rest.to_string());
            }
        } else if !trimmed.is_empty() {
            match current {
                Section::Thought => thought_lines.push(trimmed.to_string()),
                Section::Command => command_lines.push(line.trim_end().to_string()),
                Section::None | Section::Action => {}
            }
        }
    }

    if !thought_lines.is_empty() {
        fields.thought = Some(thought_lines.join(" "));
    }
    if !command_lines.is_empty() {
        fields.command = Some(command_lines.join("\n"));
    }
    fields.action = fields.action.filter(|a| !a.is_empty());
    fields
}

/// Case-insensitive label match, returning the trimmed remainder.
fn strip_label<'a>(line: &'a str, label: &str) -> Option<&'a str> {
    match (line.get(..label.len()), line.get(label.len()..)) {
        (Some(head), Some(rest)) if head.eq_ignore_ascii_case(label) => Some(rest.trim()),
        _ => None,
    }
}

/// Decode the three-part `FILE:path|OLD:old|NEW:new` edit payload.
///
/// The payload is split on the reserved `|` delimiter with an exact count
/// of three: fewer segments fail explicitly, and any excess delimiters
/// belong to the final (NEW) segment rather than being truncated away.
fn parse_edit_payload(command: &str) -> Result<Action, ParseError> {
    let mut parts = command.splitn(3, EDIT_DELIMITER);
    let file_part = parts.next().unwrap_or_default().trim();
    let old_part = parts
        .next()
        .ok_or_else(|| ParseError::InvalidEditPayload("expected 3 segments, got 1".into()))?
        .trim();
    let new_part = parts
        .next()
        .ok_or_else(|| ParseError::InvalidEditPayload("expected 3 segments, got 2".into()))?
        .trim();

    let path = file_part
        .strip_prefix("FILE:")
        .ok_or_else(|| ParseError::InvalidEditPayload("first segment must start with FILE:".into()))?
        .trim();
    let old_text = old_part
        .strip_prefix("OLD:")
        .ok_or_else(|| ParseError::InvalidEditPayload("second segment must start with OLD:".into()))?;
    let new_text = new_part
        .strip_prefix("NEW:")
        .ok_or_else(|| ParseError::InvalidEditPayload("third segment must start with NEW:".into()))?;

    if path.is_empty() {
        return Err(ParseError::InvalidEditPayload("file path is empty".into()));
    }
    if old_text.is_empty() {
        return Err(ParseError::InvalidEditPayload("old text is empty".into()));
    }

    Ok(Action::FileEdit {
        path: path.to_string(),
        old_text: old_text.to_string(),
        new_text: new_text.to_string(),
    })
}

/// Decode the terminal `complete` payload.
///
/// The command is `success: <summary>` or `failure: <summary>`; a missing
/// verdict prefix is read as success with the whole command as summary.
fn parse_complete_payload(command: &str) -> Action {
    let trimmed = command.trim();
    let lower = trimmed.to_ascii_lowercase();

    let (success, rest) = if let Some(rest) = lower.strip_prefix("success") {
        (true, &trimmed[trimmed.len() - rest.len()..])
    } else if let Some(rest) = lower.strip_prefix("failure") {
        (false, &trimmed[trimmed.len() - rest.len()..])
    } else if let Some(rest) = lower.strip_prefix("failed") {
        (false, &trimmed[trimmed.len() - rest.len()..])
    } else {
        (true, trimmed)
    };

    let summary = rest.trim_start_matches([':', ' ']).trim().to_string();
    let summary = if summary.is_empty() {
        trimmed.to_string()
    } else {
        summary
    };

    Action::Complete { success, summary }
}
