//! Hand-written collaborators for pipeline tests.

use crate::completion::CompletionClient;
use crate::types::WebResult;
use crate::web_search::WebSearchClient;
use async_trait::async_trait;
use crag_core::{AppError, AppResult};
use crag_retrieval::{Chunk, ChunkRetriever};
use std::sync::Mutex;

/// A recorded completion call.
#[derive(Debug, Clone)]
pub struct CompletionCall {
    pub prompt: String,
    pub system: String,
    pub max_tokens: Option<u32>,
    pub structured: bool,
}

/// Completion double: scripted grader reply, fixed answer, records calls.
pub struct ScriptedCompletion {
    grade: Result<String, String>,
    answer: Result<String, String>,
    calls: Mutex<Vec<CompletionCall>>,
}

impl ScriptedCompletion {
    pub fn grading(raw: impl Into<String>) -> Self {
        Self {
            grade: Ok(raw.into()),
            answer: Ok("synthesized answer".to_string()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn grade_json(score: f64, label: &str) -> Self {
        Self::grading(format!(
            r#"{{"relevance_score": {}, "relevance_label": "{}", "confidence": 0.9, "reasoning": "scripted"}}"#,
            score, label
        ))
    }

    pub fn grader_down() -> Self {
        Self {
            grade: Err("connection refused".to_string()),
            answer: Ok("synthesized answer".to_string()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_answer_failure(mut self) -> Self {
        self.answer = Err("answer model unavailable".to_string());
        self
    }

    pub fn calls(&self) -> Vec<CompletionCall> {
        self.calls.lock().unwrap().clone()
    }

    /// The prompt of the answer (free-text) call.
    pub fn answer_prompt(&self) -> Option<String> {
        self.calls()
            .into_iter()
            .find(|c| !c.structured)
            .map(|c| c.prompt)
    }
}

#[async_trait]
impl CompletionClient for ScriptedCompletion {
    async fn complete(&self, prompt: &str, system: &str, max_tokens: u32) -> AppResult<String> {
        self.calls.lock().unwrap().push(CompletionCall {
            prompt: prompt.to_string(),
            system: system.to_string(),
            max_tokens: Some(max_tokens),
            structured: false,
        });
        self.answer.clone().map_err(AppError::Llm)
    }

    async fn complete_structured(&self, prompt: &str, system: &str) -> AppResult<String> {
        self.calls.lock().unwrap().push(CompletionCall {
            prompt: prompt.to_string(),
            system: system.to_string(),
            max_tokens: None,
            structured: true,
        });
        self.grade.clone().map_err(AppError::Llm)
    }
}

/// Web search double returning fixed results (or failing).
pub struct StubWebSearch {
    results: Result<Vec<WebResult>, String>,
    requests: Mutex<Vec<(String, usize)>>,
}

impl StubWebSearch {
    pub fn returning(results: Vec<WebResult>) -> Self {
        Self {
            results: Ok(results),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            results: Err("search quota exceeded".to_string()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<(String, usize)> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl WebSearchClient for StubWebSearch {
    async fn search(&self, query: &str, max_results: usize) -> AppResult<Vec<WebResult>> {
        self.requests
            .lock()
            .unwrap()
            .push((query.to_string(), max_results));
        self.results.clone().map_err(AppError::WebSearch)
    }
}

/// Retriever double returning fixed chunks, truncated to `top_k`.
pub struct StubRetriever {
    chunks: Vec<Chunk>,
    requested_top_k: Mutex<Option<usize>>,
}

impl StubRetriever {
    pub fn new(chunks: Vec<Chunk>) -> Self {
        Self {
            chunks,
            requested_top_k: Mutex::new(None),
        }
    }

    pub fn requested_top_k(&self) -> Option<usize> {
        *self.requested_top_k.lock().unwrap()
    }
}

#[async_trait]
impl ChunkRetriever for StubRetriever {
    async fn retrieve(&self, _query: &str, top_k: usize) -> AppResult<Vec<Chunk>> {
        *self.requested_top_k.lock().unwrap() = Some(top_k);
        Ok(self.chunks.iter().take(top_k).cloned().collect())
    }
}

pub fn france_chunks() -> Vec<Chunk> {
    vec![
        Chunk::new("Paris is the capital and most populous city of France.", 0.88),
        Chunk::new("France is a country in Western Europe.", 0.74),
    ]
}

pub fn web_results(n: usize) -> Vec<WebResult> {
    (1..=n)
        .map(|i| {
            WebResult::new(format!("Result {}", i), format!("Web content number {}.", i))
                .with_source(format!("https://example.com/{}", i))
        })
        .collect()
}
