//! OpenAI-compatible chat completions provider
//!
//! The API key is read from an environment variable named in the config
//! (`OPENAI_API_KEY` by default) at call time, so a missing key only fails
//! the calls that need it.

use super::{LLMError, LLMProvider, Message};
use crate::config::OpenAIConfig;
use async_trait::async_trait;
use serde_json::json;

pub struct OpenAIProvider {
    config: OpenAIConfig,
    client: reqwest::Client,
}

impl OpenAIProvider {
    pub fn new(config: OpenAIConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    fn api_key(&self) -> super::Result<String> {
        std::env::var(&self.config.api_key_env).map_err(|_| {
            LLMError::AuthenticationFailed(format!(
                "environment variable {} is not set",
                self.config.api_key_env
            ))
        })
    }
}

#[async_trait]
impl LLMProvider for OpenAIProvider {
    fn name(&self) -> &str {
        "openai"
    }

    fn is_local(&self) -> bool {
        false
    }

    async fn check_health(&self) -> bool {
        self.api_key().is_ok()
    }

    async fn complete(&self, messages: &[Message]) -> super::Result<String> {
        let api_key = self.api_key()?;

        let url = format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'));

        // Tool results are sent as user-visible context: the driving model
        // speaks a text protocol, not the native function-calling API.
        let api_messages: Vec<_> = messages
            .iter()
            .map(|msg| {
                let role = match msg.role {
                    super::MessageRole::Tool => "user".to_string(),
                    other => other.to_string(),
                };
                let content = match &msg.name {
                    Some(name) if msg.role == super::MessageRole::Tool => {
                        format!("[{} result] {}", name, msg.content)
                    }
                    _ => msg.wire_content(),
                };
                json!({ "role": role, "content": content })
            })
            .collect();

        let payload = json!({
            "model": self.config.model,
            "messages": api_messages,
        });

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Content-Type", "application/json")
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LLMError::Timeout
                } else {
                    LLMError::NetworkError(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();

            if status.as_u16() == 401 || status.as_u16() == 403 {
                return Err(LLMError::AuthenticationFailed(text));
            } else if status.as_u16() == 429 {
                return Err(LLMError::RateLimitExceeded);
            } else {
                return Err(LLMError::InvalidRequest(text));
            }
        }

        let data: serde_json::Value = response
            .json()
            .await
            .map_err(|e| LLMError::ParseError(e.to_string()))?;

        let message = data
            .get("choices")
            .and_then(|c| c.as_array())
            .and_then(|c| c.first())
            .and_then(|choice| choice.get("message"))
            .ok_or_else(|| LLMError::ParseError("No message in response".to_string()))?;

        message
            .get("content")
            .and_then(|c| c.as_str())
            .map(String::from)
            .ok_or_else(|| LLMError::ParseError("Empty content".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_api_key_fails_health_check() {
        let provider = OpenAIProvider::new(OpenAIConfig {
            api_key_env: "MIND2CODE_TEST_KEY_THAT_IS_NEVER_SET".to_string(),
            ..OpenAIConfig::default()
        });

        assert_eq!(provider.name(), "openai");
        assert!(!provider.is_local());
        assert!(!provider.check_health().await);

        let err = provider.complete(&[Message::user("hi")]).await.unwrap_err();
        assert!(matches!(err, LLMError::AuthenticationFailed(_)));
    }
}
