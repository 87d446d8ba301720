//! SQLite storage for chunk embeddings.
//!
//! Embeddings are stored as little-endian `f32` blobs. Ranking is a full scan
//! with cosine similarity, which is fine for the index sizes a local
//! workspace holds.

use crate::types::StoredChunk;
use crag_core::{AppError, AppResult};
use rusqlite::{params, Connection};
use std::path::Path;

/// Open (creating if needed) the SQLite index database.
pub fn init_index(db_path: &Path) -> AppResult<Connection> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| AppError::Retrieval(format!("Failed to create index directory: {}", e)))?;
    }

    let conn = Connection::open(db_path)
        .map_err(|e| AppError::Retrieval(format!("Failed to open SQLite index: {}", e)))?;

    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS chunks (
            id TEXT PRIMARY KEY,
            content TEXT NOT NULL,
            embedding BLOB NOT NULL,
            metadata TEXT
        );
        "#,
    )
    .map_err(|e| AppError::Retrieval(format!("Failed to create tables: {}", e)))?;

    tracing::debug!("Initialized SQLite index at {:?}", db_path);
    Ok(conn)
}

/// Insert or replace a chunk.
pub fn insert_chunk(conn: &Connection, chunk: &StoredChunk) -> AppResult<()> {
    let embedding_bytes = embedding_to_bytes(&chunk.embedding);
    let metadata_json = serde_json::to_string(&chunk.metadata)?;

    conn.execute(
        "INSERT OR REPLACE INTO chunks (id, content, embedding, metadata)
         VALUES (?1, ?2, ?3, ?4)",
        params![chunk.id, chunk.content, embedding_bytes, metadata_json],
    )
    .map_err(|e| AppError::Retrieval(format!("Failed to insert chunk: {}", e)))?;

    Ok(())
}

/// Return the top-k chunks by cosine similarity, best first.
pub fn query_chunks(
    conn: &Connection,
    query_embedding: &[f32],
    top_k: usize,
) -> AppResult<Vec<(StoredChunk, f32)>> {
    let mut stmt = conn
        .prepare("SELECT id, content, embedding, metadata FROM chunks")
        .map_err(|e| AppError::Retrieval(format!("Failed to prepare query: {}", e)))?;

    let rows = stmt
        .query_map([], |row| {
            let id: String = row.get(0)?;
            let content: String = row.get(1)?;
            let embedding_bytes: Vec<u8> = row.get(2)?;
            let metadata_json: Option<String> = row.get(3)?;
            Ok((id, content, embedding_bytes, metadata_json))
        })
        .map_err(|e| AppError::Retrieval(format!("Failed to query chunks: {}", e)))?;

    let mut results = Vec::new();
    for row in rows {
        let (id, content, embedding_bytes, metadata_json) =
            row.map_err(|e| AppError::Retrieval(format!("Failed to read chunk row: {}", e)))?;

        let embedding = bytes_to_embedding(&embedding_bytes)?;
        let metadata = match metadata_json {
            Some(json) => serde_json::from_str(&json)?,
            None => serde_json::Value::Null,
        };

        let score = cosine_similarity(query_embedding, &embedding);
        results.push((
            StoredChunk {
                id,
                content,
                metadata,
                embedding,
            },
            score,
        ));
    }

    results.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    results.truncate(top_k);

    tracing::debug!(
        "Retrieved {} chunks (requested top-{})",
        results.len(),
        top_k
    );

    Ok(results)
}

/// Number of stored chunks.
pub fn count_chunks(conn: &Connection) -> AppResult<usize> {
    conn.query_row("SELECT COUNT(*) FROM chunks", [], |row| {
        row.get::<_, i64>(0).map(|v| v as usize)
    })
    .map_err(|e| AppError::Retrieval(format!("Failed to count chunks: {}", e)))
}

fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(embedding.len() * 4);
    for &value in embedding {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes
}

fn bytes_to_embedding(bytes: &[u8]) -> AppResult<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return Err(AppError::Retrieval(
            "Invalid embedding bytes length".to_string(),
        ));
    }

    Ok(bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect())
}

/// Cosine similarity; 0.0 for mismatched lengths or zero vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}
