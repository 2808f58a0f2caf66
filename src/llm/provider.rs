//! Provider abstraction over the reasoning service.

use async_trait::async_trait;

use crate::error::LlmError;

/// A source of free-text reasoning replies.
///
/// The controller only needs one operation: hand over the rendered prompt
/// and get back the raw reply text. Parsing and retry policy live
/// elsewhere, so implementations stay small and easy to script in tests.
#[async_trait]
pub trait ReasoningProvider: Send + Sync {
    /// Short provider name for logs and error messages.
    fn name(&self) -> &str;

    /// Request the next reply for `prompt`.
    async fn next_reply(&self, prompt: &str) -> Result<String, LlmError>;
}
