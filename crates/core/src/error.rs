//! Error types for the CRAG workspace.
//!
//! One error enum covers every failure category a query can hit: configuration,
//! I/O, completion, retrieval, web search, prompt rendering and synthesis.

use thiserror::Error;

/// Unified error type for the CRAG crates.
///
/// All fallible functions return `Result<T, AppError>`. Relevance grading
/// failures never reach this type; the evaluator recovers them locally.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O and filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// LLM provider errors (transport, HTTP status, response shape)
    #[error("LLM error: {0}")]
    Llm(String),

    /// Embedding and vector index errors
    #[error("Retrieval error: {0}")]
    Retrieval(String),

    /// Web search provider errors
    #[error("Web search error: {0}")]
    WebSearch(String),

    /// Prompt loading and rendering errors
    #[error("Prompt error: {0}")]
    Prompt(String),

    /// Final answer generation errors
    #[error("Synthesis error: {0}")]
    Synthesis(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors
    #[error("{0}")]
    Other(String),
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(err: serde_yaml::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;
