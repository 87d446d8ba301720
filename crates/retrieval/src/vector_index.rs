//! Vector index abstraction.

use crate::index;
use crate::types::StoredChunk;
use crag_core::{AppError, AppResult};
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

/// Trait for vector index backends.
pub trait VectorIndex: Send + Sync {
    /// Search for the top-k most similar chunks to the query embedding.
    ///
    /// Returns chunks ordered by descending similarity score.
    fn search(&self, query_embedding: &[f32], top_k: usize) -> AppResult<Vec<(StoredChunk, f32)>>;

    /// Number of chunks in the index.
    fn len(&self) -> AppResult<usize>;

    /// Whether the index holds no chunks.
    fn is_empty(&self) -> AppResult<bool> {
        Ok(self.len()? == 0)
    }
}

/// SQLite-backed [`VectorIndex`].
pub struct SqliteIndex {
    path: PathBuf,
    conn: Mutex<Connection>,
}

impl SqliteIndex {
    /// Open the index at `path`, creating the schema if needed.
    pub fn open(path: &Path) -> AppResult<Self> {
        let conn = index::init_index(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            conn: Mutex::new(conn),
        })
    }

    /// Database file location.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Insert or replace a chunk. Used to populate fixtures.
    pub fn insert(&self, chunk: &StoredChunk) -> AppResult<()> {
        let conn = self.lock()?;
        index::insert_chunk(&conn, chunk)
    }

    fn lock(&self) -> AppResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| AppError::Retrieval("SQLite index lock poisoned".to_string()))
    }
}

impl VectorIndex for SqliteIndex {
    fn search(&self, query_embedding: &[f32], top_k: usize) -> AppResult<Vec<(StoredChunk, f32)>> {
        let conn = self.lock()?;
        index::query_chunks(&conn, query_embedding, top_k)
    }

    fn len(&self) -> AppResult<usize> {
        let conn = self.lock()?;
        index::count_chunks(&conn)
    }
}

impl std::fmt::Debug for SqliteIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteIndex")
            .field("path", &self.path)
            .finish()
    }
}
