//! LLM provider factory.
//!
//! Creates completion clients from a provider name, optional endpoint and
//! optional API key.

use crate::client::LlmClient;
use crate::providers::{OllamaClient, OpenAiClient};
use crate::types::ProviderType;
use crag_core::{AppError, AppResult};
use std::sync::Arc;

/// Create an LLM client based on the provider name.
///
/// # Arguments
/// * `provider` - Provider identifier ("ollama", "openai")
/// * `endpoint` - Optional custom endpoint URL
/// * `api_key` - API key, required by OpenAI
///
/// # Errors
/// Returns `AppError::Config` if the provider is unknown or a required
/// secret is missing.
pub fn create_client(
    provider: &str,
    endpoint: Option<&str>,
    api_key: Option<&str>,
) -> AppResult<Arc<dyn LlmClient>> {
    let provider_type = ProviderType::parse(provider)
        .ok_or_else(|| AppError::Config(format!("Unknown provider: {}", provider)))?;

    tracing::debug!("Creating {} completion client", provider_type.as_str());

    match provider_type {
        ProviderType::Ollama => {
            let client = match endpoint {
                Some(base_url) => OllamaClient::with_base_url(base_url)?,
                None => OllamaClient::new()?,
            };
            Ok(Arc::new(client))
        }
        ProviderType::OpenAI => {
            let api_key = api_key.ok_or_else(|| {
                AppError::Config("OpenAI provider requires API key".to_string())
            })?;
            let client = match endpoint {
                Some(base_url) => OpenAiClient::with_base_url(api_key, base_url)?,
                None => OpenAiClient::new(api_key)?,
            };
            Ok(Arc::new(client))
        }
    }
}
