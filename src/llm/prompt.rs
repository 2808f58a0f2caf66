//! Prompt rendering: problem context plus the growing iteration history.

use std::fmt::Write as _;

use crate::agent::{IterationRecord, IterationStatus};
use crate::context::ProblemContext;
use crate::protocol::Action;

/// Cap on how much of each observation is replayed into later prompts.
pub const MAX_OUTPUT_SNIPPET: usize = 500;

/// Render the full prompt for the next reasoning turn.
pub fn build_prompt(context: &ProblemContext, history: &[IterationRecord]) -> String {
    let mut prompt = String::new();

    let _ = write!(
        prompt,
        "You are an autonomous infrastructure troubleshooting agent. Your goal \
is to analyze and fix the deployment error described below.\n\n\
CURRENT CONTEXT:\n\
- Operation: {operation}\n\
- Environment: {environment}\n\
- AWS Profile: {profile}\n\
- AWS Region: {region}\n\
- Working Directory: {working_dir}\n\n\
INITIAL ERROR:\n{error}\n",
        operation = context.operation,
        environment = context.environment,
        profile = context.profile.as_deref().unwrap_or("(default)"),
        region = context.region.as_deref().unwrap_or("(default)"),
        working_dir = context.working_dir.display(),
        error = context.initial_error,
    );

    if !context.resource_errors.is_empty() {
        let _ = write!(
            prompt,
            "\nRESOURCE ERRORS:\n{}\n",
            context.structured_errors_json()
        );
    }
    for (key, value) in &context.extra {
        let _ = writeln!(prompt, "- {key}: {value}");
    }

    prompt.push_str(
        "\nAVAILABLE TOOLS:\n\
1. privileged_cli - Run cloud provider CLI commands (e.g. aws ecs describe-services)\n\
2. shell - Run shell commands (e.g. grep, find, cat files)\n\
3. file_edit - Edit configuration files (format: FILE:path|OLD:old_text|NEW:new_text)\n\
4. preview_change - Preview infrastructure changes without applying them\n\
5. apply_change - Apply infrastructure changes (use carefully!)\n\
6. complete - Mark the problem as solved or unsolvable\n\n\
Analyze the situation and decide on ONE action to take next.\n\n\
Respond in this EXACT format:\n\
THOUGHT: [Your reasoning about what to investigate or fix next]\n\
ACTION: [One of: privileged_cli, shell, file_edit, preview_change, apply_change, complete]\n\
COMMAND: [Exact command to run]\n\n\
IMPORTANT:\n\
- Only take ONE action per iteration\n\
- Always explain your reasoning in THOUGHT\n\
- For file edits, use the exact format: FILE:path|OLD:old_text|NEW:new_text\n\
- For complete, start COMMAND with \"Success:\" or \"Failure:\" followed by a summary\n\
- Mark as complete only when you have verified the fix worked\n\
- If stuck, try a different approach\n",
    );

    if history.is_empty() {
        prompt.push_str("\nNo previous actions taken. Start by investigating the error.\n");
    } else {
        prompt.push_str("\nPREVIOUS ACTIONS:\n");
        prompt.push_str(&render_history(history));
    }

    prompt
}

/// Render completed iterations as labeled blocks, oldest first.
pub fn render_history(history: &[IterationRecord]) -> String {
    let mut out = String::new();
    for record in history {
        let _ = write!(out, "\n--- Iteration {} ---\n", record.number);
        let _ = writeln!(out, "THOUGHT: {}", record.thought);
        if let Some(action) = &record.action {
            let _ = writeln!(out, "ACTION: {}", action.kind().as_str());
            match action {
                Action::FileEdit {
                    path,
                    old_text,
                    new_text,
                } => {
                    let _ = writeln!(out, "COMMAND: FILE:{path}|OLD:{old_text}|NEW:{new_text}");
                }
                _ => {
                    if let Some(command) = action.command() {
                        let _ = writeln!(out, "COMMAND: {command}");
                    }
                }
            }
        }
        let _ = writeln!(
            out,
            "OUTPUT: {}",
            truncate_output(&record.output, MAX_OUTPUT_SNIPPET)
        );
        if record.status == IterationStatus::Failed {
            if let Some(error) = &record.error {
                let _ = writeln!(out, "ERROR: {error}");
            }
        }
        let _ = writeln!(out, "STATUS: {}", record.status);
    }
    out
}

/// Truncate on a character boundary, noting how much was dropped.
fn truncate_output(output: &str, max_chars: usize) -> String {
    let total = output.chars().count();
    if total <= max_chars {
        return output.to_string();
    }
    let truncated: String = output.chars().take(max_chars).collect();
    format!("{truncated}... [truncated, {total} chars total]")
}
