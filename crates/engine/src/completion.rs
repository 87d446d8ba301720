//! Completion seam used by the evaluator and synthesizer.

use async_trait::async_trait;
use crag_core::AppResult;
use crag_llm::{LlmClient, LlmRequest};
use std::sync::Arc;

/// Raw text completion.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Free-text completion bounded by `max_tokens`.
    async fn complete(&self, prompt: &str, system: &str, max_tokens: u32) -> AppResult<String>;

    /// Completion in the provider's JSON mode. Returns the raw text; callers
    /// decode it.
    async fn complete_structured(&self, prompt: &str, system: &str) -> AppResult<String>;
}

/// [`CompletionClient`] backed by any [`LlmClient`] and a fixed model.
#[derive(Clone)]
pub struct LlmCompletionClient {
    client: Arc<dyn LlmClient>,
    model: String,
    temperature: Option<f32>,
}

impl LlmCompletionClient {
    pub fn new(client: Arc<dyn LlmClient>, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
            temperature: None,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    fn request(&self, prompt: &str, system: &str) -> LlmRequest {
        let mut request = LlmRequest::new(prompt, self.model.as_str());
        if !system.is_empty() {
            request = request.with_system(system);
        }
        if let Some(temperature) = self.temperature {
            request = request.with_temperature(temperature);
        }
        request
    }
}

#[async_trait]
impl CompletionClient for LlmCompletionClient {
    async fn complete(&self, prompt: &str, system: &str, max_tokens: u32) -> AppResult<String> {
        let request = self.request(prompt, system).with_max_tokens(max_tokens);

        tracing::debug!(
            provider = self.client.provider_name(),
            model = %self.model,
            max_tokens,
            "Requesting completion"
        );

        Ok(self.client.complete(&request).await?.content)
    }

    async fn complete_structured(&self, prompt: &str, system: &str) -> AppResult<String> {
        let request = self.request(prompt, system).with_json_output();

        tracing::debug!(
            provider = self.client.provider_name(),
            model = %self.model,
            "Requesting structured completion"
        );

        Ok(self.client.complete(&request).await?.content)
    }
}
