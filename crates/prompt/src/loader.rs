//! Prompt loader.
//!
//! Resolves a prompt ID to a definition: a workspace override in
//! `.crag/prompts/<id>.yml` wins, otherwise the built-in is used.

use crate::builtin::builtin_prompt;
use crate::types::PromptDefinition;
use crag_core::{AppError, AppResult};
use std::path::Path;

/// Load a prompt definition by ID.
///
/// # Arguments
/// * `workspace_path` - Root workspace directory containing `.crag/`, if any
/// * `prompt_id` - Prompt identifier (e.g., "crag.grade")
///
/// # Example
/// ```no_run
/// use crag_prompt::load_prompt;
/// use std::path::Path;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let prompt = load_prompt(Some(Path::new(".")), "crag.grade")?;
/// println!("Loaded prompt: {}", prompt.title);
/// # Ok(())
/// # }
/// ```
pub fn load_prompt(workspace_path: Option<&Path>, prompt_id: &str) -> AppResult<PromptDefinition> {
    if let Some(workspace) = workspace_path {
        let prompt_file = workspace
            .join(".crag/prompts")
            .join(format!("{}.yml", prompt_id));

        if prompt_file.exists() {
            tracing::debug!("Loading prompt override from: {:?}", prompt_file);
            return load_prompt_file(&prompt_file);
        }
    }

    builtin_prompt(prompt_id)
        .ok_or_else(|| AppError::Prompt(format!("Unknown prompt: {}", prompt_id)))
}

fn load_prompt_file(prompt_file: &Path) -> AppResult<PromptDefinition> {
    let contents = std::fs::read_to_string(prompt_file).map_err(|e| {
        AppError::Prompt(format!(
            "Failed to read prompt file {:?}: {}",
            prompt_file, e
        ))
    })?;

    let definition: PromptDefinition = serde_yaml::from_str(&contents).map_err(|e| {
        AppError::Prompt(format!(
            "Failed to parse prompt YAML {:?}: {}",
            prompt_file, e
        ))
    })?;

    validate_prompt(&definition)?;

    tracing::info!("Loaded prompt: {} ({})", definition.id, definition.title);

    Ok(definition)
}

/// Validate a prompt definition.
fn validate_prompt(def: &PromptDefinition) -> AppResult<()> {
    if def.id.is_empty() {
        return Err(AppError::Prompt("Prompt ID cannot be empty".to_string()));
    }

    if def.template.trim().is_empty() {
        return Err(AppError::Prompt(
            "Prompt template cannot be empty".to_string(),
        ));
    }

    if !def.api_version.contains('.') {
        return Err(AppError::Prompt(format!(
            "Invalid apiVersion format: {}. Expected format: 'x.y'",
            def.api_version
        )));
    }

    Ok(())
}
