//! Wiring concrete collaborators from configuration.

use crag_core::{config::AppConfig, AppResult};
use crag_engine::{CragPipeline, LlmCompletionClient, RelevanceEvaluator, TavilyClient};
use crag_llm::create_client;
use crag_prompt::{load_prompt, ANSWER_PROMPT_ID, GRADE_PROMPT_ID};
use crag_retrieval::{create_provider, Retriever, SqliteIndex, VectorIndex};
use std::sync::Arc;

/// Completion client for the configured provider and model.
pub fn build_completion(config: &AppConfig) -> AppResult<Arc<LlmCompletionClient>> {
    let api_key = config.resolve_api_key();
    let client = create_client(&config.provider, config.endpoint.as_deref(), api_key.as_deref())?;

    Ok(Arc::new(LlmCompletionClient::new(client, config.model.as_str())))
}

/// Retriever over the workspace index.
pub fn build_retriever(config: &AppConfig) -> AppResult<Arc<Retriever>> {
    let embedder = create_provider(&config.embedding)?;
    let index_path = config.resolved_index_path();
    let index = SqliteIndex::open(&index_path)?;

    if index.is_empty()? {
        tracing::warn!(
            "Index at {:?} is empty; answers will rely on web search",
            index_path
        );
    }

    tracing::debug!(
        "Retriever ready: embeddings={}/{} index={:?}",
        embedder.provider_name(),
        embedder.model_name(),
        index_path
    );

    Ok(Arc::new(Retriever::new(embedder, Arc::new(index))))
}

/// Grader with the workspace's prompt (override or built-in).
pub fn build_evaluator(config: &AppConfig) -> AppResult<RelevanceEvaluator> {
    let completion = build_completion(config)?;
    let prompt = load_prompt(Some(&config.workspace), GRADE_PROMPT_ID)?;

    Ok(RelevanceEvaluator::new(completion, config.crag.ambiguous_threshold).with_prompt(prompt))
}

/// Full pipeline: completion, Tavily search, retriever and prompts.
pub fn build_pipeline(config: &AppConfig) -> AppResult<CragPipeline> {
    let completion = build_completion(config)?;
    let web_search = Arc::new(TavilyClient::from_config(config)?);
    let retriever = build_retriever(config)?;

    let grade = load_prompt(Some(&config.workspace), GRADE_PROMPT_ID)?;
    let answer = load_prompt(Some(&config.workspace), ANSWER_PROMPT_ID)?;

    Ok(CragPipeline::new(config.crag.clone(), completion, web_search)
        .with_retriever(retriever)
        .with_prompts(grade, answer))
}
