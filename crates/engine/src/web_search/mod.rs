//! Live web search.

pub mod tavily;

pub use tavily::TavilyClient;

use crate::types::WebResult;
use async_trait::async_trait;
use crag_core::AppResult;

/// Web search provider.
#[async_trait]
pub trait WebSearchClient: Send + Sync {
    /// Search the web, returning at most `max_results` hits.
    async fn search(&self, query: &str, max_results: usize) -> AppResult<Vec<WebResult>>;
}
