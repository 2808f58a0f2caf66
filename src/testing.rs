//! Test harness: scripted reasoning providers for driving the loop
//! without a network.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::LlmError;
use crate::llm::ReasoningProvider;

/// A provider that replays a fixed list of replies.
///
/// Replies are served in order; when the script runs out, the last reply
/// repeats. This keeps ceiling tests short: two alternating commands cycle
/// forever without tripping stuck-loop detection.
pub struct ScriptedProvider {
    replies: Mutex<VecDeque<String>>,
    calls: AtomicU32,
    fail_with: Option<LlmError>,
}

impl ScriptedProvider {
    pub fn new(replies: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().map(Into::into).collect()),
            calls: AtomicU32::new(0),
            fail_with: None,
        }
    }

    /// A provider whose every call fails with a transport error.
    pub fn failing() -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            calls: AtomicU32::new(0),
            fail_with: Some(LlmError::RetriesExhausted {
                attempts: 4,
                last: "connection refused".to_string(),
            }),
        }
    }

    /// How many times the controller asked for a reply.
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReasoningProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn next_reply(&self, _prompt: &str) -> Result<String, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = &self.fail_with {
            return Err(err.clone());
        }

        let mut replies = match self.replies.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        match replies.len() {
            0 => Err(LlmError::InvalidResponse {
                provider: "scripted".to_string(),
                reason: "script is empty".to_string(),
            }),
            1 => Ok(replies[0].clone()),
            _ => {
                let reply = replies.pop_front().unwrap_or_default();
                Ok(reply)
            }
        }
    }
}

/// Build a reply in the labeled free-text format the agent expects.
pub fn reply(thought: &str, action: &str, command: &str) -> String {
    format!("THOUGHT: {thought}\nACTION: {action}\nCOMMAND: {command}")
}

/// A `complete` reply reporting success.
pub fn success_reply(summary: &str) -> String {
    reply("done", "complete", &format!("Success: {summary}"))
}
