//! End-to-end routing scenarios with scripted collaborators.

use super::doubles::{france_chunks, web_results, ScriptedCompletion, StubRetriever, StubWebSearch};
use crate::pipeline::CragPipeline;
use crate::types::{GradingFailureKind, PipelineResult, PipelineStage, RelevanceLabel};
use crag_core::{AppError, CragSettings, SearchFailurePolicy};
use crag_prompt::{PromptDefinition, PromptOutputSpec};
use crag_retrieval::Chunk;
use std::sync::Arc;

const QUERY: &str = "What is the capital of France?";

struct Harness {
    completion: Arc<ScriptedCompletion>,
    search: Arc<StubWebSearch>,
    pipeline: CragPipeline,
}

fn harness(completion: ScriptedCompletion, search: StubWebSearch) -> Harness {
    harness_with(CragSettings::default(), completion, search)
}

fn harness_with(
    settings: CragSettings,
    completion: ScriptedCompletion,
    search: StubWebSearch,
) -> Harness {
    let completion = Arc::new(completion);
    let search = Arc::new(search);
    let pipeline = CragPipeline::new(settings, completion.clone(), search.clone());
    Harness {
        completion,
        search,
        pipeline,
    }
}

fn assert_consistent(result: &PipelineResult) {
    assert_eq!(result.used_web_search(), result.evaluation().needs_web_search());
    assert_eq!(result.web_results().is_some(), result.used_web_search());
}

#[tokio::test]
async fn scenario_relevant_chunks_answer_without_search() {
    let h = harness(
        ScriptedCompletion::grade_json(0.92, "relevant"),
        StubWebSearch::returning(web_results(3)),
    );

    let result = h.pipeline.execute(QUERY, france_chunks()).await.unwrap();
    assert_consistent(&result);
    assert!(!result.used_web_search());
    assert_eq!(result.evaluation().relevance_label(), RelevanceLabel::Relevant);
    assert!(h.search.requests().is_empty());
    assert_eq!(
        result.stages(),
        &[
            PipelineStage::Retrieved,
            PipelineStage::Evaluated,
            PipelineStage::Skipped,
            PipelineStage::Result
        ]
    );

    let answer = h.pipeline.synthesize(QUERY, &result).await.unwrap();
    assert_eq!(answer, "synthesized answer");

    let prompt = h.completion.answer_prompt().unwrap();
    assert!(prompt.contains("Query: What is the capital of France?"));
    assert!(prompt.contains("Paris is the capital and most populous city of France."));
    assert!(prompt.contains("France is a country in Western Europe."));
    assert!(!prompt.contains("Web"));
}

#[tokio::test]
async fn scenario_irrelevant_chunks_replaced_by_web_results() {
    let h = harness(
        ScriptedCompletion::grade_json(0.2, "irrelevant"),
        StubWebSearch::returning(web_results(3)),
    );

    let result = h.pipeline.execute(QUERY, france_chunks()).await.unwrap();
    assert_consistent(&result);
    assert!(result.used_web_search());
    assert_eq!(result.web_results().unwrap().len(), 3);
    assert_eq!(result.stages()[2], PipelineStage::WebSearched);

    h.pipeline.synthesize(QUERY, &result).await.unwrap();
    let prompt = h.completion.answer_prompt().unwrap();
    for i in 1..=3 {
        assert!(prompt.contains(&format!("Web content number {}.", i)));
        assert!(prompt.contains(&format!("Source {} (Result {}):", i, i)));
    }
    assert!(!prompt.contains("Paris is the capital"));
    assert!(!prompt.contains("Western Europe"));
}

#[tokio::test]
async fn scenario_low_ambiguous_supplements_with_web() {
    let h = harness(
        ScriptedCompletion::grade_json(0.45, "ambiguous"),
        StubWebSearch::returning(web_results(2)),
    );

    let result = h.pipeline.execute(QUERY, france_chunks()).await.unwrap();
    assert_consistent(&result);
    assert!(result.used_web_search());

    h.pipeline.synthesize(QUERY, &result).await.unwrap();
    let prompt = h.completion.answer_prompt().unwrap();
    let chunk_pos = prompt.find("Western Europe").unwrap();
    let web_pos = prompt.find("Web content number 1.").unwrap();
    assert!(prompt.find("Paris is the capital").unwrap() < chunk_pos);
    assert!(chunk_pos < web_pos);
}

#[tokio::test]
async fn scenario_high_ambiguous_skips_search() {
    let h = harness(
        ScriptedCompletion::grade_json(0.6, "ambiguous"),
        StubWebSearch::returning(web_results(3)),
    );

    let result = h.pipeline.execute(QUERY, france_chunks()).await.unwrap();
    assert_consistent(&result);
    assert!(!result.used_web_search());
    assert!(result.web_results().is_none());
    assert!(h.search.requests().is_empty());

    h.pipeline.synthesize(QUERY, &result).await.unwrap();
    let prompt = h.completion.answer_prompt().unwrap();
    assert!(prompt.contains("Paris is the capital"));
    assert!(!prompt.contains("Web"));
}

#[tokio::test]
async fn ambiguous_score_just_under_threshold_searches() {
    let h = harness(
        ScriptedCompletion::grading(
            r#"{"relevance_score": 0.49999999999, "relevance_label": "ambiguous"}"#,
        ),
        StubWebSearch::returning(web_results(1)),
    );

    let result = h.pipeline.execute(QUERY, france_chunks()).await.unwrap();
    assert_consistent(&result);
    assert_eq!(result.evaluation().relevance_score(), 0.49999999999);
    assert!(result.used_web_search());
    assert_eq!(h.search.requests().len(), 1);
}

#[tokio::test]
async fn ambiguous_score_at_threshold_skips_search() {
    let h = harness(
        ScriptedCompletion::grade_json(0.5, "ambiguous"),
        StubWebSearch::returning(web_results(1)),
    );

    let result = h.pipeline.execute(QUERY, france_chunks()).await.unwrap();
    assert!(!result.used_web_search());
}

#[tokio::test]
async fn threshold_is_configurable() {
    let settings = CragSettings {
        ambiguous_threshold: 0.65,
        ..Default::default()
    };
    let h = harness_with(
        settings,
        ScriptedCompletion::grade_json(0.6, "ambiguous"),
        StubWebSearch::returning(web_results(1)),
    );

    let result = h.pipeline.execute(QUERY, france_chunks()).await.unwrap();
    assert!(result.used_web_search());
}

#[tokio::test]
async fn grader_transport_failure_falls_back_to_search() {
    let h = harness(
        ScriptedCompletion::grader_down(),
        StubWebSearch::returning(web_results(3)),
    );

    let result = h.pipeline.execute(QUERY, france_chunks()).await.unwrap();
    let eval = result.evaluation();
    assert_eq!(eval.relevance_score(), 0.5);
    assert_eq!(eval.relevance_label(), RelevanceLabel::Ambiguous);
    assert_eq!(eval.confidence(), 0.5);
    assert!(eval.needs_web_search());
    assert_eq!(eval.evaluation_method(), "llm_grader");
    assert_eq!(eval.fallback_kind(), Some(GradingFailureKind::Transport));
    assert_consistent(&result);
    assert_eq!(h.search.requests().len(), 1);
}

#[tokio::test]
async fn malformed_grader_output_falls_back() {
    for raw in [
        "I think these documents are relevant.",
        r#"{"relevance_score": 0.9, "relevance_label": "very relevant"}"#,
        r#"{"relevance_score": 1.7, "relevance_label": "relevant"}"#,
        r#"{"relevance_score": "0.9", "relevance_label": "relevant"}"#,
        r#"{"relevance_score": 0.9, "relevance_label": "relevant""#,
    ] {
        let h = harness(
            ScriptedCompletion::grading(raw),
            StubWebSearch::returning(web_results(1)),
        );

        let result = h.pipeline.execute(QUERY, france_chunks()).await.unwrap();
        let eval = result.evaluation();
        assert_eq!(
            eval.fallback_kind(),
            Some(GradingFailureKind::Decode),
            "expected fallback for {raw:?}"
        );
        assert_eq!(eval.relevance_score(), 0.5);
        assert_eq!(eval.confidence(), 0.5);
        assert!(result.used_web_search());
    }
}

#[tokio::test]
async fn partial_grader_output_uses_defaults() {
    let h = harness(
        ScriptedCompletion::grading("{}"),
        StubWebSearch::returning(web_results(1)),
    );

    let result = h.pipeline.execute(QUERY, france_chunks()).await.unwrap();
    let eval = result.evaluation();
    assert!(!eval.is_fallback());
    assert_eq!(eval.relevance_score(), 0.5);
    assert_eq!(eval.relevance_label(), RelevanceLabel::Ambiguous);
    assert!((eval.confidence() - 0.7).abs() < 1e-6);
    // 0.5 is not below the default threshold of 0.5.
    assert!(!result.used_web_search());
}

#[tokio::test]
async fn irrelevant_with_no_web_results_excludes_chunks() {
    let h = harness(
        ScriptedCompletion::grade_json(0.1, "irrelevant"),
        StubWebSearch::returning(vec![]),
    );

    let result = h.pipeline.execute(QUERY, france_chunks()).await.unwrap();
    assert_eq!(result.web_results(), Some(&[][..]));

    h.pipeline.synthesize(QUERY, &result).await.unwrap();
    let prompt = h.completion.answer_prompt().unwrap();
    assert!(!prompt.contains("Paris is the capital"));
    assert!(!prompt.contains("Western Europe"));
    assert!(prompt.contains("acknowledge what's missing"));
}

#[tokio::test]
async fn search_failure_propagates_by_default() {
    let h = harness(
        ScriptedCompletion::grade_json(0.2, "irrelevant"),
        StubWebSearch::failing(),
    );

    let err = h.pipeline.execute(QUERY, france_chunks()).await.unwrap_err();
    assert!(matches!(err, AppError::WebSearch(_)));
}

#[tokio::test]
async fn search_failure_can_degrade_to_empty() {
    let settings = CragSettings {
        search_failure_policy: SearchFailurePolicy::TreatAsEmpty,
        ..Default::default()
    };
    let h = harness_with(
        settings,
        ScriptedCompletion::grade_json(0.45, "ambiguous"),
        StubWebSearch::failing(),
    );

    let result = h.pipeline.execute(QUERY, france_chunks()).await.unwrap();
    assert_consistent(&result);
    assert!(result.used_web_search());
    assert_eq!(result.web_results().map(|w| w.len()), Some(0));
}

#[tokio::test]
async fn web_search_is_bounded_by_max_web_results() {
    let h = harness(
        ScriptedCompletion::grade_json(0.2, "irrelevant"),
        StubWebSearch::returning(web_results(7)),
    );

    let result = h.pipeline.execute(QUERY, france_chunks()).await.unwrap();
    assert_eq!(h.search.requests(), vec![(QUERY.to_string(), 3)]);
    assert_eq!(result.web_results().unwrap().len(), 3);
}

#[tokio::test]
async fn grading_request_is_structured_and_truncated() {
    let h = harness(
        ScriptedCompletion::grade_json(0.9, "relevant"),
        StubWebSearch::returning(vec![]),
    );
    let chunks = vec![Chunk::new(format!("{}TAIL", "a".repeat(300)), 0.9)];

    h.pipeline.execute(QUERY, chunks).await.unwrap();

    let calls = h.completion.calls();
    assert_eq!(calls.len(), 1);
    assert!(calls[0].structured);
    assert!(calls[0].system.contains("relevance evaluator"));
    assert!(calls[0].prompt.contains(&format!("Chunk 1: {}", "a".repeat(300))));
    assert!(!calls[0].prompt.contains("TAIL"));
}

#[tokio::test]
async fn answer_uses_configured_token_budget() {
    let h = harness(
        ScriptedCompletion::grade_json(0.9, "relevant"),
        StubWebSearch::returning(vec![]),
    );

    let result = h.pipeline.execute(QUERY, france_chunks()).await.unwrap();
    h.pipeline.synthesize(QUERY, &result).await.unwrap();

    let answer_call = h
        .completion
        .calls()
        .into_iter()
        .find(|c| !c.structured)
        .unwrap();
    assert_eq!(answer_call.max_tokens, Some(500));
    assert!(answer_call.system.contains("helpful assistant"));
}

#[tokio::test]
async fn synthesis_failure_propagates() {
    let h = harness(
        ScriptedCompletion::grade_json(0.9, "relevant").with_answer_failure(),
        StubWebSearch::returning(vec![]),
    );

    let result = h.pipeline.execute(QUERY, france_chunks()).await.unwrap();
    let err = h.pipeline.synthesize(QUERY, &result).await.unwrap_err();
    assert!(matches!(err, AppError::Synthesis(_)));
}

#[tokio::test]
async fn answer_runs_full_pipeline_with_retriever() {
    let retriever = Arc::new(StubRetriever::new(france_chunks()));
    let settings = CragSettings {
        top_k: 1,
        ..Default::default()
    };
    let h = harness_with(
        settings,
        ScriptedCompletion::grade_json(0.92, "relevant"),
        StubWebSearch::returning(vec![]),
    );
    let pipeline = h.pipeline.clone().with_retriever(retriever.clone());

    let answer = pipeline.answer(QUERY).await.unwrap();
    assert_eq!(answer.answer, "synthesized answer");
    assert_eq!(retriever.requested_top_k(), Some(1));
    assert_eq!(answer.result.retrieved_chunks().len(), 1);

    let json = serde_json::to_value(&answer).unwrap();
    assert_eq!(json["result"]["evaluation"]["relevance_label"], "relevant");
    assert_eq!(json["result"]["used_web_search"], false);
}

#[tokio::test]
async fn run_without_retriever_is_config_error() {
    let h = harness(
        ScriptedCompletion::grade_json(0.9, "relevant"),
        StubWebSearch::returning(vec![]),
    );

    let err = h.pipeline.run(QUERY).await.unwrap_err();
    assert!(matches!(err, AppError::Config(_)));
}

#[tokio::test]
async fn prompt_overrides_are_used() {
    let h = harness(
        ScriptedCompletion::grade_json(0.9, "relevant"),
        StubWebSearch::returning(vec![]),
    );
    let custom = |id: &str, template: &str| PromptDefinition {
        id: id.to_string(),
        title: "custom".to_string(),
        api_version: "1.0".to_string(),
        system: None,
        template: template.to_string(),
        output: PromptOutputSpec {
            format: "text".to_string(),
        },
    };
    let pipeline = h.pipeline.clone().with_prompts(
        custom("crag.grade", "GRADE {{query}}"),
        custom("crag.answer", "ANSWER {{query}} / {{context}}"),
    );

    let result = pipeline.execute(QUERY, france_chunks()).await.unwrap();
    pipeline.synthesize(QUERY, &result).await.unwrap();

    let calls = h.completion.calls();
    assert_eq!(calls[0].prompt, format!("GRADE {}", QUERY));
    assert!(calls[0].system.is_empty());
    assert!(calls[1].prompt.starts_with(&format!("ANSWER {} / === Retrieved Documents ===", QUERY)));
}
