//! Answer synthesis from the routed context.

use crate::completion::CompletionClient;
use crate::types::{PipelineResult, RelevanceLabel};
use crag_core::{AppError, AppResult};
use crag_prompt::{answer_prompt, build_prompt, PromptDefinition};
use std::collections::HashMap;
use std::sync::Arc;

/// Assemble the answer context for a routed result.
///
/// Irrelevant context is dropped entirely in favor of web results (an empty
/// string when there are none). Otherwise every retrieved chunk comes first,
/// followed by web results when a search ran.
pub fn assemble_context(result: &PipelineResult) -> String {
    let mut parts: Vec<String> = Vec::new();
    let web_results = result.web_results().unwrap_or_default();

    match result.evaluation().relevance_label() {
        RelevanceLabel::Irrelevant => {
            if !web_results.is_empty() {
                parts.push("=== Web Search Results ===".to_string());
                for (i, web) in web_results.iter().enumerate() {
                    parts.push(format!("\nSource {} ({}):\n{}", i + 1, web.title, web.content));
                }
            }
        }
        RelevanceLabel::Relevant | RelevanceLabel::Ambiguous => {
            parts.push("=== Retrieved Documents ===".to_string());
            for (i, chunk) in result.retrieved_chunks().iter().enumerate() {
                parts.push(format!("\nDocument {}:\n{}", i + 1, chunk.content));
            }

            if result.used_web_search() && !web_results.is_empty() {
                parts.push("\n\n=== Additional Web Information ===".to_string());
                for (i, web) in web_results.iter().enumerate() {
                    parts.push(format!("\nWeb Source {}:\n{}", i + 1, web.content));
                }
            }
        }
    }

    parts.join("\n")
}

/// Generates the final answer with one completion call.
#[derive(Clone)]
pub struct AnswerSynthesizer {
    completion: Arc<dyn CompletionClient>,
    prompt: PromptDefinition,
    max_tokens: u32,
}

impl AnswerSynthesizer {
    pub fn new(completion: Arc<dyn CompletionClient>, max_tokens: u32) -> Self {
        Self {
            completion,
            prompt: answer_prompt(),
            max_tokens,
        }
    }

    /// Replace the answer prompt (e.g. a workspace override).
    pub fn with_prompt(mut self, prompt: PromptDefinition) -> Self {
        self.prompt = prompt;
        self
    }

    /// Generate the answer. The completion text is returned unmodified.
    pub async fn synthesize(&self, query: &str, result: &PipelineResult) -> AppResult<String> {
        let context = assemble_context(result);

        let mut variables = HashMap::new();
        variables.insert("query".to_string(), query.to_string());
        variables.insert("context".to_string(), context);

        let built = build_prompt(&self.prompt, variables)?;

        tracing::debug!(
            "Synthesizing answer (label={}, web_search={}, max_tokens={})",
            result.evaluation().relevance_label(),
            result.used_web_search(),
            self.max_tokens
        );

        self.completion
            .complete(&built.user, built.system_or_empty(), self.max_tokens)
            .await
            .map_err(|e| AppError::Synthesis(format!("Answer generation failed: {}", e)))
    }
}
