//! LLM Router
//!
//! Orders the configured providers (the configured default first, then local
//! providers before cloud ones) and fails over between them. The router is
//! itself an `LLMProvider`, so the orchestrator and the capability registry
//! never need to know how many providers sit behind it.

use super::ollama::OllamaProvider;
use super::openai::OpenAIProvider;
use super::{LLMError, LLMProvider, Message};
use crate::config::LLMConfig;
use async_trait::async_trait;
use std::time::Duration;

/// LLM Router that tries providers in preference order
pub struct LLMRouter {
    /// Available LLM providers
    providers: Vec<Box<dyn LLMProvider>>,

    /// Name of the preferred provider
    default_provider: String,

    /// Per-provider call timeout
    timeout: Duration,
}

impl LLMRouter {
    /// Create a new LLM router
    ///
    /// # Arguments
    /// * `providers` - List of available LLM providers
    /// * `default_provider` - Name of the provider to try first
    /// * `timeout` - Time limit for each provider attempt
    pub fn new(
        providers: Vec<Box<dyn LLMProvider>>,
        default_provider: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            providers,
            default_provider: default_provider.into(),
            timeout,
        }
    }

    /// Router over every provider in the `[llm]` config section
    ///
    /// The OpenAI provider is always registered; without its API key it
    /// fails fast and the router moves on.
    pub fn from_config(config: &LLMConfig) -> Self {
        let providers: Vec<Box<dyn LLMProvider>> = vec![
            Box::new(OllamaProvider::new(
                config.ollama.base_url.clone(),
                config.ollama.model.clone(),
            )),
            Box::new(OpenAIProvider::new(config.openai.clone())),
        ];
        Self::new(
            providers,
            config.default_provider.clone(),
            Duration::from_secs(config.timeout_secs),
        )
    }

    /// Providers in the order they will be attempted
    pub fn ranked_providers(&self) -> Vec<&dyn LLMProvider> {
        let mut providers: Vec<&dyn LLMProvider> =
            self.providers.iter().map(|b| b.as_ref()).collect();

        // Stable sort keeps registration order among equals
        providers.sort_by_key(|p| {
            if p.name() == self.default_provider {
                0
            } else if p.is_local() {
                1
            } else {
                2
            }
        });

        providers
    }

    /// Check the health of all registered providers
    /// Returns a list of (provider_name, is_healthy)
    pub async fn check_health_all(&self) -> Vec<(&str, bool)> {
        let mut results = Vec::new();
        for provider in &self.providers {
            let is_healthy = provider.check_health().await;
            results.push((provider.name(), is_healthy));
        }
        results
    }
}

#[async_trait]
impl LLMProvider for LLMRouter {
    fn name(&self) -> &str {
        "router"
    }

    fn is_local(&self) -> bool {
        self.providers.iter().all(|p| p.is_local())
    }

    /// Every provider may be tried once, each up to the per-provider timeout
    fn max_attempts(&self) -> u32 {
        u32::try_from(self.providers.len().max(1)).unwrap_or(u32::MAX)
    }

    async fn complete(&self, messages: &[Message]) -> super::Result<String> {
        if self.providers.is_empty() {
            return Err(LLMError::ProviderUnavailable(
                "No LLM providers configured".to_string(),
            ));
        }

        let mut last_error = None;
        for provider in self.ranked_providers() {
            tracing::debug!(
                "Attempting provider: {} (timeout: {}s)",
                provider.name(),
                self.timeout.as_secs()
            );

            match tokio::time::timeout(self.timeout, provider.complete(messages)).await {
                Ok(Ok(content)) => {
                    tracing::debug!("Provider {} succeeded", provider.name());
                    return Ok(content);
                }
                Ok(Err(e)) => {
                    tracing::warn!("Provider {} failed: {}", provider.name(), e);
                    last_error = Some(e);
                }
                Err(_) => {
                    tracing::warn!(
                        "Provider {} timed out after {}s",
                        provider.name(),
                        self.timeout.as_secs()
                    );
                    last_error = Some(LLMError::Timeout);
                }
            }
        }

        tracing::error!("All LLM providers exhausted");
        Err(last_error.unwrap_or_else(|| {
            LLMError::ProviderUnavailable("All LLM providers failed".to_string())
        }))
    }

    async fn check_health(&self) -> bool {
        for provider in &self.providers {
            if provider.check_health().await {
                return true;
            }
        }
        false
    }
}
