//! Retrieval types.

use serde::{Deserialize, Serialize};

/// A retrieved unit of previously indexed text.
///
/// Produced per query by a [`ChunkRetriever`](crate::ChunkRetriever); the
/// metadata is opaque to everything downstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// Chunk text
    pub content: String,

    /// Arbitrary metadata stored alongside the chunk
    #[serde(default)]
    pub metadata: serde_json::Value,

    /// Similarity to the query (higher is more similar)
    pub score: f32,
}

impl Chunk {
    /// Create a chunk with empty metadata.
    pub fn new(content: impl Into<String>, score: f32) -> Self {
        Self {
            content: content.into(),
            metadata: serde_json::Value::Object(Default::default()),
            score,
        }
    }

    /// Attach metadata.
    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }
}

/// A chunk as stored in the vector index, with its embedding.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredChunk {
    /// Stable chunk identifier
    pub id: String,

    /// Chunk text
    pub content: String,

    /// Arbitrary metadata (stored as JSON text)
    pub metadata: serde_json::Value,

    /// Embedding vector
    pub embedding: Vec<f32>,
}

impl StoredChunk {
    /// Convert into a retrieved [`Chunk`] with the given similarity score.
    pub fn into_chunk(self, score: f32) -> Chunk {
        Chunk {
            content: self.content,
            metadata: self.metadata,
            score,
        }
    }
}
