//! Environment-driven configuration.

use secrecy::SecretString;

use crate::agent::DEFAULT_MAX_ITERATIONS;
use crate::error::Error;
use crate::llm::retry::DEFAULT_MAX_RETRIES;

pub const DEFAULT_MODEL: &str = "claude-sonnet-4-5";
pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";

/// Reasoning-service connection settings.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub model: String,
    pub api_key: SecretString,
    pub base_url: String,
    /// Attempts beyond the first request.
    pub max_retries: u32,
}

/// Top-level runtime configuration.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub max_iterations: u32,
    pub llm: LlmConfig,
}

impl AgentConfig {
    /// Load from the process environment. `ANTHROPIC_API_KEY` is required,
    /// everything else has a default.
    pub fn from_env() -> Result<Self, Error> {
        let api_key = std::env::var("ANTHROPIC_API_KEY")
            .map_err(|_| Error::Config("ANTHROPIC_API_KEY is not set".to_string()))?;
        if api_key.trim().is_empty() {
            return Err(Error::Config("ANTHROPIC_API_KEY is empty".to_string()));
        }

        let model =
            std::env::var("OPSMEDIC_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());
        let base_url =
            std::env::var("ANTHROPIC_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());

        let max_iterations = parse_env_u32("OPSMEDIC_MAX_ITERATIONS", DEFAULT_MAX_ITERATIONS)?;
        let max_retries = parse_env_u32("OPSMEDIC_MAX_RETRIES", DEFAULT_MAX_RETRIES)?;

        Ok(Self {
            max_iterations,
            llm: LlmConfig {
                model,
                api_key: SecretString::from(api_key),
                base_url,
                max_retries,
            },
        })
    }
}

fn parse_env_u32(name: &str, default: u32) -> Result<u32, Error> {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| Error::Config(format!("{name} must be a positive integer, got '{raw}'"))),
        Err(_) => Ok(default),
    }
}
