//! Anthropic Messages API provider.

use async_trait::async_trait;
use reqwest::Client;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};

use crate::config::LlmConfig;
use crate::error::LlmError;
use crate::llm::provider::ReasoningProvider;
use crate::llm::retry::{backoff_delay, is_retryable_status};

const PROVIDER: &str = "anthropic";
const API_VERSION: &str = "2023-06-01";
const MAX_TOKENS: u32 = 2048;

/// Provider over `POST /v1/messages`.
pub struct AnthropicProvider {
    client: Client,
    config: LlmConfig,
}

impl AnthropicProvider {
    pub fn new(config: LlmConfig) -> Result<Self, LlmError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| LlmError::RequestFailed {
                provider: PROVIDER.to_string(),
                reason: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self { client, config })
    }

    fn api_url(&self) -> String {
        let base = self.config.base_url.trim_end_matches('/');
        format!("{base}/v1/messages")
    }

    async fn send_request(&self, body: &MessagesRequest) -> Result<MessagesResponse, LlmError> {
        let url = self.api_url();
        let mut last_error: Option<LlmError> = None;

        for attempt in 0..=self.config.max_retries {
            tracing::debug!(url = %url, attempt = attempt + 1, "sending reasoning request");

            let response = self
                .client
                .post(&url)
                .header("x-api-key", self.config.api_key.expose_secret())
                .header("anthropic-version", API_VERSION)
                .header("Content-Type", "application/json")
                .json(body)
                .send()
                .await;

            let response = match response {
                Ok(r) => r,
                Err(e) => {
                    let err = LlmError::RequestFailed {
                        provider: PROVIDER.to_string(),
                        reason: e.to_string(),
                    };
                    if attempt < self.config.max_retries {
                        let delay = backoff_delay(attempt);
                        tracing::warn!(
                            error = %err,
                            attempt = attempt + 1,
                            delay_ms = delay.as_millis() as u64,
                            "request error, retrying"
                        );
                        tokio::time::sleep(delay).await;
                        last_error = Some(err);
                        continue;
                    }
                    last_error = Some(err);
                    break;
                }
            };

            let status = response.status().as_u16();
            let response_text = response.text().await.unwrap_or_default();

            if status == 401 || status == 403 {
                return Err(LlmError::AuthRejected {
                    provider: PROVIDER.to_string(),
                });
            }

            if is_retryable_status(status) {
                let err = if status == 429 {
                    LlmError::RateLimited {
                        provider: PROVIDER.to_string(),
                    }
                } else {
                    LlmError::Api {
                        provider: PROVIDER.to_string(),
                        status,
                        reason: response_text.clone(),
                    }
                };
                if attempt < self.config.max_retries {
                    let delay = backoff_delay(attempt);
                    tracing::warn!(
                        status,
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        "retryable HTTP status"
                    );
                    tokio::time::sleep(delay).await;
                    last_error = Some(err);
                    continue;
                }
                last_error = Some(err);
                break;
            }

            if status >= 400 {
                return Err(LlmError::Api {
                    provider: PROVIDER.to_string(),
                    status,
                    reason: response_text,
                });
            }

            return serde_json::from_str(&response_text).map_err(|e| LlmError::InvalidResponse {
                provider: PROVIDER.to_string(),
                reason: format!("JSON parse error: {e}"),
            });
        }

        let last = last_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "no attempt recorded".to_string());
        Err(LlmError::RetriesExhausted {
            attempts: self.config.max_retries + 1,
            last,
        })
    }
}

#[async_trait]
impl ReasoningProvider for AnthropicProvider {
    fn name(&self) -> &str {
        PROVIDER
    }

    async fn next_reply(&self, prompt: &str) -> Result<String, LlmError> {
        let request = MessagesRequest {
            model: self.config.model.clone(),
            max_tokens: MAX_TOKENS,
            messages: vec![Message {
                role: "user",
                content: prompt.to_string(),
            }],
        };

        let response = self.send_request(&request).await?;

        let text = response
            .content
            .into_iter()
            .find_map(|block| match block {
                ContentBlock::Text { text } => Some(text),
            })
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(LlmError::InvalidResponse {
                provider: PROVIDER.to_string(),
                reason: "response contained no text content".to_string(),
            });
        }
        Ok(text)
    }
}

#[derive(Debug, Serialize)]
struct MessagesRequest {
    model: String,
    max_tokens: u32,
    messages: Vec<Message>,
}

#[derive(Debug, Serialize)]
struct Message {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text { text: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::SecretString;

    fn config(base_url: &str) -> LlmConfig {
        LlmConfig {
            model: "claude-sonnet-4-5".to_string(),
            api_key: SecretString::from("test-key"),
            base_url: base_url.to_string(),
            max_retries: 0,
        }
    }

    #[test]
    fn api_url_strips_trailing_slash() {
        let provider = AnthropicProvider::new(config("https://api.anthropic.com/")).unwrap();
        assert_eq!(provider.api_url(), "https://api.anthropic.com/v1/messages");
    }

    #[test]
    fn response_text_block_deserializes() {
        let raw = r#"{"content":[{"type":"text","text":"THOUGHT: hello"}]}"#;
        let parsed: MessagesResponse = serde_json::from_str(raw).unwrap();
        match &parsed.content[0] {
            ContentBlock::Text { text } => assert_eq!(text, "THOUGHT: hello"),
        }
    }
}
