//! Grade command handler.
//!
//! Retrieves and grades without searching or answering. Useful for tuning
//! the ambiguity threshold against a populated index.

use crate::bootstrap::{build_evaluator, build_retriever};
use clap::Args;
use crag_core::{config::AppConfig, AppError, AppResult};
use crag_engine::RelevanceEvaluation;
use crag_retrieval::{Chunk, ChunkRetriever};
use serde::Serialize;

/// Grade retrieved context for a question
#[derive(Args, Debug)]
pub struct GradeCommand {
    /// The question to grade retrieval for
    pub query: String,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Serialize)]
struct GradeReport<'a> {
    query: &'a str,
    chunks: &'a [Chunk],
    evaluation: &'a RelevanceEvaluation,
}

impl GradeCommand {
    /// Execute the grade command.
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing grade command");

        let query = self.query.trim();
        if query.is_empty() {
            return Err(AppError::Config("Query cannot be empty".to_string()));
        }

        let retriever = build_retriever(config)?;
        let evaluator = build_evaluator(config)?;

        let chunks = retriever.retrieve(query, config.crag.top_k).await?;
        let evaluation = evaluator.evaluate(query, &chunks).await;

        if self.json {
            let report = GradeReport {
                query,
                chunks: &chunks,
                evaluation: &evaluation,
            };
            println!("{}", serde_json::to_string_pretty(&report)?);
        } else {
            println!("{}", format_evaluation(&evaluation, chunks.len()));
        }

        Ok(())
    }
}

fn format_evaluation(evaluation: &RelevanceEvaluation, chunk_count: usize) -> String {
    let mut lines = vec![
        format!("Chunks:      {}", chunk_count),
        format!("Label:       {}", evaluation.relevance_label()),
        format!("Score:       {:.2}", evaluation.relevance_score()),
        format!("Confidence:  {:.2}", evaluation.confidence()),
        format!(
            "Web search:  {}",
            if evaluation.needs_web_search() { "yes" } else { "no" }
        ),
    ];

    if let Some(reasoning) = evaluation.reasoning() {
        lines.push(format!("Reasoning:   {}", reasoning));
    }
    if let Some(kind) = evaluation.fallback_kind() {
        lines.push(format!("Fallback:    {:?}", kind));
    }

    lines.join("\n")
}
