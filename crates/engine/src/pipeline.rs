//! CRAG orchestration.
//!
//! One query moves through `RETRIEVED -> EVALUATED -> {WEB_SEARCHED | SKIPPED}
//! -> RESULT` exactly once. Steps run in order; each awaits the previous.

use crate::completion::CompletionClient;
use crate::evaluator::RelevanceEvaluator;
use crate::synthesizer::AnswerSynthesizer;
use crate::types::{CragAnswer, PipelineResult, RelevanceEvaluation, WebResult};
use crate::web_search::WebSearchClient;
use crag_core::{AppError, AppResult, CragSettings, SearchFailurePolicy};
use crag_prompt::PromptDefinition;
use crag_retrieval::{Chunk, ChunkRetriever};
use std::sync::Arc;
use tracing::Instrument;

/// Corrective RAG pipeline.
#[derive(Clone)]
pub struct CragPipeline {
    settings: CragSettings,
    evaluator: RelevanceEvaluator,
    synthesizer: AnswerSynthesizer,
    web_search: Arc<dyn WebSearchClient>,
    retriever: Option<Arc<dyn ChunkRetriever>>,
}

impl CragPipeline {
    /// Build a pipeline. Grading and synthesis share `completion`.
    pub fn new(
        settings: CragSettings,
        completion: Arc<dyn CompletionClient>,
        web_search: Arc<dyn WebSearchClient>,
    ) -> Self {
        let evaluator = RelevanceEvaluator::new(completion.clone(), settings.ambiguous_threshold);
        let synthesizer = AnswerSynthesizer::new(completion, settings.answer_max_tokens);

        Self {
            settings,
            evaluator,
            synthesizer,
            web_search,
            retriever: None,
        }
    }

    /// Attach a retriever, enabling [`run`](Self::run) and [`answer`](Self::answer).
    pub fn with_retriever(mut self, retriever: Arc<dyn ChunkRetriever>) -> Self {
        self.retriever = Some(retriever);
        self
    }

    /// Override the grading and answer prompts.
    pub fn with_prompts(mut self, grade: PromptDefinition, answer: PromptDefinition) -> Self {
        self.evaluator = self.evaluator.with_prompt(grade);
        self.synthesizer = self.synthesizer.with_prompt(answer);
        self
    }

    pub fn settings(&self) -> &CragSettings {
        &self.settings
    }

    /// Fetch the top-K chunks for `query` with the configured retriever.
    pub async fn retrieve(&self, query: &str) -> AppResult<Vec<Chunk>> {
        let retriever = self
            .retriever
            .as_ref()
            .ok_or_else(|| AppError::Config("No retriever configured for pipeline".to_string()))?;

        retriever.retrieve(query, self.settings.top_k).await
    }

    /// Grade `chunks` without routing. Never fails.
    pub async fn evaluate(&self, query: &str, chunks: &[Chunk]) -> RelevanceEvaluation {
        self.evaluator.evaluate(query, chunks).await
    }

    /// Evaluate and route caller-supplied chunks.
    pub async fn execute(&self, query: &str, chunks: Vec<Chunk>) -> AppResult<PipelineResult> {
        let span = tracing::info_span!("crag", chunks = chunks.len());
        self.route(query, chunks).instrument(span).await
    }

    /// Retrieve, then [`execute`](Self::execute).
    pub async fn run(&self, query: &str) -> AppResult<PipelineResult> {
        let chunks = self.retrieve(query).await?;
        self.execute(query, chunks).await
    }

    /// Generate the final answer for a routed result.
    pub async fn synthesize(&self, query: &str, result: &PipelineResult) -> AppResult<String> {
        self.synthesizer.synthesize(query, result).await
    }

    /// Full query: retrieve, evaluate, route, synthesize.
    pub async fn answer(&self, query: &str) -> AppResult<CragAnswer> {
        let result = self.run(query).await?;
        let answer = self.synthesize(query, &result).await?;

        Ok(CragAnswer { answer, result })
    }

    async fn route(&self, query: &str, chunks: Vec<Chunk>) -> AppResult<PipelineResult> {
        let evaluation = self.evaluator.evaluate(query, &chunks).await;

        if !evaluation.needs_web_search() {
            tracing::info!(
                "Context {} ({:.2}), skipping web search",
                evaluation.relevance_label(),
                evaluation.relevance_score()
            );
            return PipelineResult::skipped(evaluation, chunks);
        }

        tracing::info!(
            "Context {} ({:.2}), triggering web search",
            evaluation.relevance_label(),
            evaluation.relevance_score()
        );
        let web_results = self.search(query).await?;

        PipelineResult::searched(evaluation, chunks, web_results)
    }

    async fn search(&self, query: &str) -> AppResult<Vec<WebResult>> {
        let max_results = self.settings.max_web_results;

        match self.web_search.search(query, max_results).await {
            Ok(mut results) => {
                results.truncate(max_results);
                tracing::debug!("Web search returned {} results", results.len());
                Ok(results)
            }
            Err(e) => match self.settings.search_failure_policy {
                SearchFailurePolicy::Propagate => Err(e),
                SearchFailurePolicy::TreatAsEmpty => {
                    tracing::warn!("Web search failed, continuing without web results: {}", e);
                    Ok(Vec::new())
                }
            },
        }
    }
}
