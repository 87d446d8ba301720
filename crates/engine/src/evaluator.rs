//! Relevance grading.
//!
//! The grader sees a condensed view of the chunks (first 300 characters of
//! each) and must answer with a JSON object carrying score, label and
//! confidence. Anything that prevents a usable grade collapses to
//! [`RelevanceEvaluation::fallback`], which routes to web search.

use crate::completion::CompletionClient;
use crate::types::{GradingFailureKind, RelevanceEvaluation, RelevanceLabel};
use crag_core::AppError;
use crag_prompt::{build_prompt, grade_prompt, PromptDefinition};
use crag_retrieval::Chunk;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// Characters of each chunk shown to the grader.
pub const CHUNK_PREVIEW_CHARS: usize = 300;

const DEFAULT_SCORE: f64 = 0.5;
const DEFAULT_LABEL: RelevanceLabel = RelevanceLabel::Ambiguous;
const DEFAULT_CONFIDENCE: f64 = 0.7;

/// Why a grader reply could not be turned into a grade.
#[derive(Debug, Error)]
pub enum GradeDecodeError {
    #[error("no JSON object in grader output")]
    NoJsonObject,

    #[error("invalid grader JSON: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("unknown relevance label: {0:?}")]
    UnknownLabel(String),

    #[error("{field} out of range [0, 1]: {value}")]
    OutOfRange { field: &'static str, value: f64 },
}

/// The grader's reply. Absent or null fields take their defaults.
#[derive(Debug, Deserialize)]
struct GradePayload {
    relevance_score: Option<f64>,
    relevance_label: Option<String>,
    confidence: Option<f64>,
    reasoning: Option<String>,
}

/// A decoded, range-checked grade.
#[derive(Debug, Clone, PartialEq)]
pub struct Grade {
    pub score: f64,
    pub label: RelevanceLabel,
    pub confidence: f64,
    pub reasoning: Option<String>,
}

enum GradingFailure {
    Transport(AppError),
    Decode(GradeDecodeError),
}

/// Slice from the first `{` to the last `}`, tolerating prose or code fences
/// around the object.
fn extract_json(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (start < end).then(|| &text[start..=end])
}

fn unit_interval(field: &'static str, value: f64) -> Result<f64, GradeDecodeError> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(GradeDecodeError::OutOfRange { field, value })
    }
}

/// Decode raw grader output into a [`Grade`].
pub fn decode_grade(raw: &str) -> Result<Grade, GradeDecodeError> {
    let json = extract_json(raw).ok_or(GradeDecodeError::NoJsonObject)?;
    let payload: GradePayload = serde_json::from_str(json)?;

    let label = match payload.relevance_label {
        Some(label) => {
            RelevanceLabel::parse(&label).ok_or(GradeDecodeError::UnknownLabel(label))?
        }
        None => DEFAULT_LABEL,
    };

    Ok(Grade {
        score: unit_interval(
            "relevance_score",
            payload.relevance_score.unwrap_or(DEFAULT_SCORE),
        )?,
        label,
        confidence: unit_interval("confidence", payload.confidence.unwrap_or(DEFAULT_CONFIDENCE))?,
        reasoning: payload.reasoning.filter(|r| !r.trim().is_empty()),
    })
}

/// Condensed grading context: `Chunk {i}: <first 300 chars>`, blank-line
/// separated, 1-based.
pub fn build_grading_context(chunks: &[Chunk]) -> String {
    chunks
        .iter()
        .enumerate()
        .map(|(i, chunk)| {
            let preview: String = chunk.content.chars().take(CHUNK_PREVIEW_CHARS).collect();
            format!("Chunk {}: {}", i + 1, preview)
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// LLM-backed relevance grader.
#[derive(Clone)]
pub struct RelevanceEvaluator {
    completion: Arc<dyn CompletionClient>,
    prompt: PromptDefinition,
    ambiguous_threshold: f64,
}

impl RelevanceEvaluator {
    /// Create an evaluator using the built-in grading prompt.
    pub fn new(completion: Arc<dyn CompletionClient>, ambiguous_threshold: f64) -> Self {
        Self {
            completion,
            prompt: grade_prompt(),
            ambiguous_threshold,
        }
    }

    /// Replace the grading prompt (e.g. a workspace override).
    pub fn with_prompt(mut self, prompt: PromptDefinition) -> Self {
        self.prompt = prompt;
        self
    }

    /// Grade `chunks` against `query`. Never fails.
    pub async fn evaluate(&self, query: &str, chunks: &[Chunk]) -> RelevanceEvaluation {
        match self.grade(query, chunks).await {
            Ok(grade) => {
                let evaluation = RelevanceEvaluation::graded(
                    grade.score,
                    grade.label,
                    grade.confidence,
                    grade.reasoning,
                    self.ambiguous_threshold,
                );
                tracing::info!(
                    label = %evaluation.relevance_label(),
                    score = evaluation.relevance_score(),
                    confidence = evaluation.confidence(),
                    needs_web_search = evaluation.needs_web_search(),
                    "Relevance graded"
                );
                evaluation
            }
            Err(GradingFailure::Transport(e)) => {
                tracing::warn!("Relevance grading request failed, using fallback: {}", e);
                RelevanceEvaluation::fallback(GradingFailureKind::Transport)
            }
            Err(GradingFailure::Decode(e)) => {
                tracing::warn!("Relevance grader output unusable, using fallback: {}", e);
                RelevanceEvaluation::fallback(GradingFailureKind::Decode)
            }
        }
    }

    async fn grade(&self, query: &str, chunks: &[Chunk]) -> Result<Grade, GradingFailure> {
        let mut variables = HashMap::new();
        variables.insert("query".to_string(), query.to_string());
        variables.insert("context".to_string(), build_grading_context(chunks));

        let built = build_prompt(&self.prompt, variables).map_err(GradingFailure::Transport)?;

        tracing::debug!("Grading {} chunks", chunks.len());

        let raw = self
            .completion
            .complete_structured(&built.user, built.system_or_empty())
            .await
            .map_err(GradingFailure::Transport)?;

        tracing::debug!("Grader output: {}", raw);

        decode_grade(&raw).map_err(GradingFailure::Decode)
    }
}
