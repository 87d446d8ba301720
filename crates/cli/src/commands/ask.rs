//! Ask command handler.
//!
//! Runs the full pipeline: retrieve, grade, route, synthesize.

use crate::bootstrap::build_pipeline;
use clap::Args;
use crag_core::{config::AppConfig, AppError, AppResult};
use crag_engine::CragAnswer;

/// Answer a question with corrective retrieval
#[derive(Args, Debug)]
pub struct AskCommand {
    /// The question to ask
    pub query: String,

    /// Output the answer and decision trace as JSON
    #[arg(long)]
    pub json: bool,

    /// Number of chunks to retrieve
    #[arg(long)]
    pub top_k: Option<usize>,

    /// Maximum web results when search is triggered
    #[arg(long)]
    pub web_results: Option<usize>,
}

impl AskCommand {
    /// Execute the ask command.
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing ask command");
        tracing::debug!("Ask command options: {:?}", self);

        let query = self.query.trim();
        if query.is_empty() {
            return Err(AppError::Config("Query cannot be empty".to_string()));
        }

        let config = self.apply_overrides(config)?;
        let pipeline = build_pipeline(&config)?;

        let answer = pipeline.answer(query).await?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&answer)?);
        } else {
            println!("{}", answer.answer);
            print_trace(&answer);
        }

        Ok(())
    }

    fn apply_overrides(&self, config: &AppConfig) -> AppResult<AppConfig> {
        let mut config = config.clone();

        if let Some(top_k) = self.top_k {
            config.crag.top_k = top_k;
        }
        if let Some(web_results) = self.web_results {
            config.crag.max_web_results = web_results;
        }

        config.crag.validate()?;
        Ok(config)
    }
}

/// Decision summary on stderr, keeping stdout for the answer.
fn print_trace(answer: &CragAnswer) {
    let result = &answer.result;
    let evaluation = result.evaluation();

    let mut line = format!(
        "[{} {:.2}] {} chunks",
        evaluation.relevance_label(),
        evaluation.relevance_score(),
        result.retrieved_chunks().len()
    );
    if let Some(web) = result.web_results() {
        line.push_str(&format!(", {} web results", web.len()));
    }
    if let Some(kind) = evaluation.fallback_kind() {
        line.push_str(&format!(" (grading fallback: {:?})", kind));
    }

    eprintln!("{}", line);
}
