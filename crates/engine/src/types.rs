//! Pipeline data model.
//!
//! [`RelevanceEvaluation`] and [`PipelineResult`] keep their fields private so
//! the routing decision can only come from [`needs_web_search`] and a result
//! can only be built in a shape that agrees with its evaluation.

use chrono::{DateTime, Utc};
use crag_core::{AppError, AppResult};
use crag_retrieval::Chunk;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Evaluation method recorded on every grade, fallback included.
pub const EVALUATION_METHOD: &str = "llm_grader";

/// Grader verdict on the retrieved context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelevanceLabel {
    Relevant,
    Ambiguous,
    Irrelevant,
}

impl RelevanceLabel {
    /// Parse a grader label (case-insensitive, surrounding whitespace ignored).
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "relevant" => Some(Self::Relevant),
            "ambiguous" => Some(Self::Ambiguous),
            "irrelevant" => Some(Self::Irrelevant),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Relevant => "relevant",
            Self::Ambiguous => "ambiguous",
            Self::Irrelevant => "irrelevant",
        }
    }
}

impl fmt::Display for RelevanceLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why an evaluation is a fallback rather than a real grade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GradingFailureKind {
    /// The grading request could not be completed.
    Transport,
    /// The grader replied, but not with a usable grade.
    Decode,
}

/// The routing rule.
///
/// Irrelevant context always triggers a search; ambiguous context triggers
/// one only when its score falls below `ambiguous_threshold`.
pub fn needs_web_search(label: RelevanceLabel, score: f64, ambiguous_threshold: f64) -> bool {
    match label {
        RelevanceLabel::Relevant => false,
        RelevanceLabel::Irrelevant => true,
        RelevanceLabel::Ambiguous => score < ambiguous_threshold,
    }
}

/// Relevance grade for one query's retrieved chunks.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RelevanceEvaluation {
    relevance_score: f64,
    relevance_label: RelevanceLabel,
    confidence: f64,
    evaluation_method: String,
    needs_web_search: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    reasoning: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    fallback: Option<GradingFailureKind>,
    evaluated_at: DateTime<Utc>,
}

impl RelevanceEvaluation {
    /// A real grade; the search decision is derived from `label`, `score`
    /// and `ambiguous_threshold`.
    pub fn graded(
        relevance_score: f64,
        relevance_label: RelevanceLabel,
        confidence: f64,
        reasoning: Option<String>,
        ambiguous_threshold: f64,
    ) -> Self {
        Self {
            relevance_score,
            relevance_label,
            confidence,
            evaluation_method: EVALUATION_METHOD.to_string(),
            needs_web_search: needs_web_search(
                relevance_label,
                relevance_score,
                ambiguous_threshold,
            ),
            reasoning,
            fallback: None,
            evaluated_at: Utc::now(),
        }
    }

    /// The fixed evaluation used when grading fails: ambiguous, 0.5, and
    /// always routed to web search.
    pub fn fallback(kind: GradingFailureKind) -> Self {
        Self {
            relevance_score: 0.5,
            relevance_label: RelevanceLabel::Ambiguous,
            confidence: 0.5,
            evaluation_method: EVALUATION_METHOD.to_string(),
            needs_web_search: true,
            reasoning: None,
            fallback: Some(kind),
            evaluated_at: Utc::now(),
        }
    }

    pub fn relevance_score(&self) -> f64 {
        self.relevance_score
    }

    pub fn relevance_label(&self) -> RelevanceLabel {
        self.relevance_label
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    pub fn evaluation_method(&self) -> &str {
        &self.evaluation_method
    }

    pub fn needs_web_search(&self) -> bool {
        self.needs_web_search
    }

    pub fn reasoning(&self) -> Option<&str> {
        self.reasoning.as_deref()
    }

    pub fn fallback_kind(&self) -> Option<GradingFailureKind> {
        self.fallback
    }

    pub fn is_fallback(&self) -> bool {
        self.fallback.is_some()
    }

    pub fn evaluated_at(&self) -> DateTime<Utc> {
        self.evaluated_at
    }
}

/// One live web search hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebResult {
    pub title: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl WebResult {
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
            source: None,
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

/// States a query passes through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PipelineStage {
    Retrieved,
    Evaluated,
    WebSearched,
    Skipped,
    Result,
}

/// Outcome of evaluate-and-route for one query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineResult {
    used_web_search: bool,
    evaluation: RelevanceEvaluation,
    retrieved_chunks: Vec<Chunk>,
    web_results: Option<Vec<WebResult>>,
    stages: Vec<PipelineStage>,
}

impl PipelineResult {
    /// Result for an evaluation that did not call for a web search.
    pub fn skipped(evaluation: RelevanceEvaluation, retrieved_chunks: Vec<Chunk>) -> AppResult<Self> {
        if evaluation.needs_web_search() {
            return Err(AppError::Other(
                "Cannot skip web search for an evaluation that requires it".to_string(),
            ));
        }

        Ok(Self {
            used_web_search: false,
            evaluation,
            retrieved_chunks,
            web_results: None,
            stages: vec![
                PipelineStage::Retrieved,
                PipelineStage::Evaluated,
                PipelineStage::Skipped,
                PipelineStage::Result,
            ],
        })
    }

    /// Result for an evaluation that called for a web search.
    pub fn searched(
        evaluation: RelevanceEvaluation,
        retrieved_chunks: Vec<Chunk>,
        web_results: Vec<WebResult>,
    ) -> AppResult<Self> {
        if !evaluation.needs_web_search() {
            return Err(AppError::Other(
                "Web results supplied for an evaluation that did not require a search".to_string(),
            ));
        }

        Ok(Self {
            used_web_search: true,
            evaluation,
            retrieved_chunks,
            web_results: Some(web_results),
            stages: vec![
                PipelineStage::Retrieved,
                PipelineStage::Evaluated,
                PipelineStage::WebSearched,
                PipelineStage::Result,
            ],
        })
    }

    pub fn used_web_search(&self) -> bool {
        self.used_web_search
    }

    pub fn evaluation(&self) -> &RelevanceEvaluation {
        &self.evaluation
    }

    pub fn retrieved_chunks(&self) -> &[Chunk] {
        &self.retrieved_chunks
    }

    /// Present iff a web search was performed (possibly empty).
    pub fn web_results(&self) -> Option<&[WebResult]> {
        self.web_results.as_deref()
    }

    pub fn stages(&self) -> &[PipelineStage] {
        &self.stages
    }
}

/// Final answer plus the decision trace that produced it.
#[derive(Debug, Clone, Serialize)]
pub struct CragAnswer {
    pub answer: String,
    pub result: PipelineResult,
}
