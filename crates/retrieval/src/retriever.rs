//! Query-time retrieval: embed the query, rank stored chunks.

use crate::embeddings::EmbeddingProvider;
use crate::types::Chunk;
use crate::vector_index::VectorIndex;
use async_trait::async_trait;
use crag_core::AppResult;
use std::sync::Arc;

/// Source of scored chunks for a query.
#[async_trait]
pub trait ChunkRetriever: Send + Sync {
    /// Return up to `top_k` chunks, most similar first.
    async fn retrieve(&self, query: &str, top_k: usize) -> AppResult<Vec<Chunk>>;
}

/// [`ChunkRetriever`] over an embedding provider and a vector index.
#[derive(Clone)]
pub struct Retriever {
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<dyn VectorIndex>,
}

impl Retriever {
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, index: Arc<dyn VectorIndex>) -> Self {
        Self { embedder, index }
    }
}

#[async_trait]
impl ChunkRetriever for Retriever {
    async fn retrieve(&self, query: &str, top_k: usize) -> AppResult<Vec<Chunk>> {
        if top_k == 0 {
            return Ok(Vec::new());
        }

        tracing::debug!(
            provider = self.embedder.provider_name(),
            model = self.embedder.model_name(),
            "Embedding query"
        );
        let query_embedding = self.embedder.embed(query).await?;

        let chunks: Vec<Chunk> = self
            .index
            .search(&query_embedding, top_k)?
            .into_iter()
            .map(|(stored, score)| stored.into_chunk(score))
            .collect();

        tracing::info!("Retrieved {} chunks (top_k={})", chunks.len(), top_k);

        Ok(chunks)
    }
}
