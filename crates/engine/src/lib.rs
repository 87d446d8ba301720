//! Corrective RAG engine.
//!
//! Grades retrieved chunks with an LLM, routes to live web search when the
//! context is judged insufficient, and synthesizes an answer from the
//! resulting context mix.
//!
//! Collaborators are injected as trait objects:
//! - [`CompletionClient`] for grading and answer generation
//! - [`WebSearchClient`] for live search
//! - [`crag_retrieval::ChunkRetriever`] for query-time retrieval

pub mod completion;
pub mod evaluator;
pub mod pipeline;
pub mod synthesizer;
pub mod types;
pub mod web_search;

#[cfg(test)]
mod tests;

pub use completion::{CompletionClient, LlmCompletionClient};
pub use evaluator::{build_grading_context, decode_grade, GradeDecodeError, RelevanceEvaluator};
pub use pipeline::CragPipeline;
pub use synthesizer::{assemble_context, AnswerSynthesizer};
pub use types::{
    needs_web_search, CragAnswer, GradingFailureKind, PipelineResult, PipelineStage,
    RelevanceEvaluation, RelevanceLabel, WebResult,
};
pub use web_search::{TavilyClient, WebSearchClient};
