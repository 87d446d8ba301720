//! Query-time retrieval for the CRAG pipeline.
//!
//! Embeds a query and returns the top-K most similar chunks from an
//! already-populated SQLite index. Ingestion lives elsewhere; `insert` on
//! [`SqliteIndex`] exists to seed fixtures.

pub mod embeddings;
pub mod index;
pub mod retriever;
pub mod types;
pub mod vector_index;


pub use embeddings::{create_provider, EmbeddingProvider};
pub use retriever::{ChunkRetriever, Retriever};
pub use types::{Chunk, StoredChunk};
pub use vector_index::{SqliteIndex, VectorIndex};
