//! Tavily search API client.

use super::WebSearchClient;
use crate::types::WebResult;
use async_trait::async_trait;
use crag_core::{AppConfig, AppError, AppResult};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_TAVILY_URL: &str = "https://api.tavily.com";

/// Tavily web search client.
#[derive(Debug, Clone)]
pub struct TavilyClient {
    client: Client,
    api_key: String,
    base_url: String,
}

#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    api_key: &'a str,
    query: &'a str,
    max_results: usize,
    search_depth: &'a str,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    #[serde(default)]
    title: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    url: Option<String>,
}

impl TavilyClient {
    /// Create a client against the public Tavily API.
    pub fn new(api_key: impl Into<String>, timeout_secs: u64) -> AppResult<Self> {
        Self::with_base_url(api_key, DEFAULT_TAVILY_URL, timeout_secs)
    }

    /// Create a client against a custom endpoint.
    pub fn with_base_url(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        timeout_secs: u64,
    ) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| AppError::WebSearch(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Build from application config (`webSearch` section and API key env var).
    pub fn from_config(config: &AppConfig) -> AppResult<Self> {
        let api_key = config.resolve_web_search_key()?;
        let settings = &config.web_search;

        match settings.endpoint.as_deref() {
            Some(endpoint) => Self::with_base_url(api_key, endpoint, settings.timeout),
            None => Self::new(api_key, settings.timeout),
        }
    }
}

#[async_trait]
impl WebSearchClient for TavilyClient {
    async fn search(&self, query: &str, max_results: usize) -> AppResult<Vec<WebResult>> {
        let url = format!("{}/search", self.base_url);

        tracing::debug!("Sending web search request to {} (max_results={})", url, max_results);

        let response = self
            .client
            .post(&url)
            .json(&SearchRequest {
                api_key: &self.api_key,
                query,
                max_results,
                search_depth: "basic",
            })
            .send()
            .await
            .map_err(|e| AppError::WebSearch(format!("Failed to send request to Tavily: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::WebSearch(format!(
                "Tavily API error ({}): {}",
                status, error_text
            )));
        }

        let body: SearchResponse = response
            .json()
            .await
            .map_err(|e| AppError::WebSearch(format!("Failed to parse Tavily response: {}", e)))?;

        let results: Vec<WebResult> = body
            .results
            .into_iter()
            .take(max_results)
            .map(|hit| WebResult {
                title: hit.title,
                content: hit.content,
                source: hit.url,
            })
            .collect();

        tracing::debug!("Web search returned {} results", results.len());

        Ok(results)
    }
}
