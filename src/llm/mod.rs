//! Reasoning-service integration: provider trait, the Anthropic client,
//! prompt rendering, and the retry policy.

mod anthropic;
mod prompt;
mod provider;
pub mod retry;

pub use anthropic::AnthropicProvider;
pub use prompt::{build_prompt, render_history, MAX_OUTPUT_SNIPPET};
pub use provider::ReasoningProvider;
