//! Built-in CRAG prompts.
//!
//! Both can be replaced per workspace with `.crag/prompts/<id>.yml`.

use crate::types::{PromptDefinition, PromptOutputSpec};

/// Relevance grading prompt. Variables: `query`, `context`.
pub const GRADE_PROMPT_ID: &str = "crag.grade";

/// Answer synthesis prompt. Variables: `query`, `context`.
pub const ANSWER_PROMPT_ID: &str = "crag.answer";

const GRADE_SYSTEM: &str =
    "You are a relevance evaluator for RAG systems. Always respond with valid JSON.";

const GRADE_TEMPLATE: &str = r#"Evaluate if the following retrieved documents are relevant to answer the query.

Query: {{query}}

Retrieved Documents:
{{context}}

Provide evaluation as JSON:
{
    "relevance_score": <float 0.0-1.0>,
    "relevance_label": "<relevant|ambiguous|irrelevant>",
    "confidence": <float 0.0-1.0>,
    "reasoning": "<brief explanation>"
}

Scoring guide:
- relevant (0.7-1.0): Documents directly answer the query
- ambiguous (0.4-0.7): Partial information, may need web search
- irrelevant (0.0-0.4): Documents don't help answer the query
"#;

const ANSWER_SYSTEM: &str =
    "You are a helpful assistant that answers questions based on provided context.";

const ANSWER_TEMPLATE: &str = r#"Answer the following query using the provided context.

Query: {{query}}

Context:
{{context}}

Provide a clear, accurate answer based on the context. If the context doesn't fully answer the query, acknowledge what's missing."#;

/// Built-in relevance grading prompt.
pub fn grade_prompt() -> PromptDefinition {
    definition(GRADE_PROMPT_ID, "Relevance grader", GRADE_SYSTEM, GRADE_TEMPLATE, "json")
}

/// Built-in answer synthesis prompt.
pub fn answer_prompt() -> PromptDefinition {
    definition(ANSWER_PROMPT_ID, "Answer synthesis", ANSWER_SYSTEM, ANSWER_TEMPLATE, "text")
}

/// Look up a built-in prompt by ID.
pub fn builtin_prompt(id: &str) -> Option<PromptDefinition> {
    match id {
        GRADE_PROMPT_ID => Some(grade_prompt()),
        ANSWER_PROMPT_ID => Some(answer_prompt()),
        _ => None,
    }
}

fn definition(
    id: &str,
    title: &str,
    system: &str,
    template: &str,
    format: &str,
) -> PromptDefinition {
    PromptDefinition {
        id: id.to_string(),
        title: title.to_string(),
        api_version: "1.0".to_string(),
        system: Some(system.to_string()),
        template: template.to_string(),
        output: PromptOutputSpec {
            format: format.to_string(),
        },
    }
}
