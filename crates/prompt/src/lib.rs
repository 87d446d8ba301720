//! Prompt system for the CRAG pipeline.
//!
//! - Built-in grading and answer prompts
//! - YAML overrides under `.crag/prompts/`
//! - Handlebars template rendering

pub mod builder;
pub mod builtin;
pub mod loader;
pub mod types;

// Re-export main types
pub use builder::build_prompt;
pub use builtin::{answer_prompt, builtin_prompt, grade_prompt, ANSWER_PROMPT_ID, GRADE_PROMPT_ID};
pub use loader::load_prompt;
pub use types::{BuiltPrompt, BuiltPromptMetadata, PromptDefinition, PromptOutputSpec};
