//! Configuration management for the CRAG CLI.
//!
//! Configuration is merged from, in increasing precedence:
//! - Built-in defaults
//! - Config file (`.crag/config.yaml`, or the path in `CRAG_CONFIG`)
//! - Environment variables
//! - Command-line flags
//!
//! The result is an immutable value. Components receive the parts they need
//! (`CragSettings`, provider settings) by injection; nothing reads a global.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{AppError, AppResult};

/// Completion providers known to the LLM factory.
pub const KNOWN_PROVIDERS: [&str; 2] = ["ollama", "openai"];

/// Embedding providers known to the retrieval crate.
pub const KNOWN_EMBEDDING_PROVIDERS: [&str; 2] = ["mock", "ollama"];

/// What the pipeline does when web search fails after routing chose it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchFailurePolicy {
    /// Abort the query and return the search error to the caller
    #[default]
    Propagate,
    /// Log the failure and continue with an empty web result set
    TreatAsEmpty,
}

impl SearchFailurePolicy {
    /// Parse a policy from its environment spelling.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "propagate" | "abort" => Some(Self::Propagate),
            "treat_as_empty" | "degrade" => Some(Self::TreatAsEmpty),
            _ => None,
        }
    }
}

/// Settings that govern routing and context assembly.
///
/// Read once at startup, never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CragSettings {
    /// Ambiguous grades scoring below this trigger web search
    pub ambiguous_threshold: f64,

    /// Reserved. Validated but not consulted by the routing rule.
    pub relevance_threshold: f64,

    /// Number of chunks requested from the retriever
    pub top_k: usize,

    /// Upper bound on web results per query
    pub max_web_results: usize,

    /// Output token bound for the final answer
    pub answer_max_tokens: u32,

    /// Behavior on web search failure
    pub search_failure_policy: SearchFailurePolicy,
}

impl Default for CragSettings {
    fn default() -> Self {
        Self {
            ambiguous_threshold: 0.5,
            relevance_threshold: 0.7,
            top_k: 5,
            max_web_results: 3,
            answer_max_tokens: 500,
            search_failure_policy: SearchFailurePolicy::Propagate,
        }
    }
}

impl CragSettings {
    /// Check ranges. Thresholds must be finite and within [0, 1].
    pub fn validate(&self) -> AppResult<()> {
        for (name, value) in [
            ("ambiguousThreshold", self.ambiguous_threshold),
            ("relevanceThreshold", self.relevance_threshold),
        ] {
            if !value.is_finite() || !(0.0..=1.0).contains(&value) {
                return Err(AppError::Config(format!(
                    "{} must be between 0.0 and 1.0, got {}",
                    name, value
                )));
            }
        }

        if self.top_k == 0 {
            return Err(AppError::Config("topK must be at least 1".to_string()));
        }

        if self.max_web_results == 0 {
            return Err(AppError::Config(
                "maxWebResults must be at least 1".to_string(),
            ));
        }

        if self.answer_max_tokens == 0 {
            return Err(AppError::Config(
                "answerMaxTokens must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}

/// Embedding provider settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EmbeddingSettings {
    /// Provider name: "mock" or "ollama"
    pub provider: String,

    /// Model identifier (provider-specific)
    pub model: String,

    /// Expected vector dimensions
    pub dimensions: usize,

    /// Custom endpoint (Ollama base URL)
    pub endpoint: Option<String>,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            provider: "mock".to_string(),
            model: "trigram-v1".to_string(),
            dimensions: 384,
            endpoint: None,
        }
    }
}

/// Web search provider settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WebSearchSettings {
    /// Environment variable holding the Tavily API key
    pub api_key_env: String,

    /// Custom endpoint (defaults to the public Tavily API)
    pub endpoint: Option<String>,

    /// Request timeout in seconds
    pub timeout: u64,
}

impl Default for WebSearchSettings {
    fn default() -> Self {
        Self {
            api_key_env: "TAVILY_API_KEY".to_string(),
            endpoint: None,
            timeout: 30,
        }
    }
}

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the workspace root (contains .crag/)
    pub workspace: PathBuf,

    /// Optional config file path
    pub config_file: Option<PathBuf>,

    /// Completion provider ("ollama", "openai")
    pub provider: String,

    /// Completion model identifier
    pub model: String,

    /// Custom completion endpoint
    pub endpoint: Option<String>,

    /// Explicit API key for the completion provider
    pub api_key: Option<String>,

    /// Environment variable holding the completion API key
    pub api_key_env: Option<String>,

    /// Path to the SQLite vector index
    pub index_path: Option<PathBuf>,

    /// Log level override
    pub log_level: Option<String>,

    /// Verbose mode (enables debug logging)
    pub verbose: bool,

    /// Disable colored output
    pub no_color: bool,

    /// Routing and synthesis settings
    pub crag: CragSettings,

    /// Embedding provider settings
    pub embedding: EmbeddingSettings,

    /// Web search settings
    pub web_search: WebSearchSettings,
}

/// Full configuration file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConfigFile {
    llm: Option<LlmSection>,
    crag: Option<CragSettings>,
    embedding: Option<EmbeddingSettings>,
    web_search: Option<WebSearchSettings>,
    index: Option<IndexSection>,
    logging: Option<LoggingSection>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LlmSection {
    provider: Option<String>,
    model: Option<String>,
    endpoint: Option<String>,
    api_key_env: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct IndexSection {
    path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LoggingSection {
    level: Option<String>,
    color: Option<bool>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            workspace: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            config_file: None,
            provider: "ollama".to_string(),
            model: "llama3.2".to_string(),
            endpoint: None,
            api_key: None,
            api_key_env: None,
            index_path: None,
            log_level: None,
            verbose: false,
            no_color: false,
            crag: CragSettings::default(),
            embedding: EmbeddingSettings::default(),
            web_search: WebSearchSettings::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from defaults, the config file and environment.
    ///
    /// Environment variables:
    /// - `CRAG_WORKSPACE`: Override workspace path
    /// - `CRAG_CONFIG`: Path to config file
    /// - `CRAG_PROVIDER`: Completion provider
    /// - `CRAG_MODEL`: Completion model
    /// - `CRAG_API_KEY`: Completion API key
    /// - `CRAG_AMBIGUOUS_THRESHOLD`: Routing threshold
    /// - `CRAG_TOP_K`: Retrieval depth
    /// - `CRAG_SEARCH_FAILURE_POLICY`: `propagate` or `treat_as_empty`
    /// - `RUST_LOG`: Log level
    /// - `NO_COLOR`: Disable colored output
    ///
    /// # Example
    /// ```no_run
    /// use crag_core::config::AppConfig;
    ///
    /// let config = AppConfig::load().expect("Failed to load config");
    /// println!("Threshold: {}", config.crag.ambiguous_threshold);
    /// ```
    pub fn load() -> AppResult<Self> {
        Self::load_from(None, None)
    }

    /// Like [`load`](Self::load), but an explicit workspace or config file
    /// wins over `CRAG_WORKSPACE` / `CRAG_CONFIG` and decides which YAML file
    /// is merged.
    pub fn load_from(workspace: Option<PathBuf>, config_file: Option<PathBuf>) -> AppResult<Self> {
        let mut config = Self::default();

        if let Some(workspace) =
            workspace.or_else(|| std::env::var("CRAG_WORKSPACE").ok().map(PathBuf::from))
        {
            config.workspace = workspace;
        }

        if let Some(config_file) =
            config_file.or_else(|| std::env::var("CRAG_CONFIG").ok().map(PathBuf::from))
        {
            config.config_file = Some(config_file);
        }

        if !config.workspace.exists() {
            return Err(AppError::Config(format!(
                "Workspace directory does not exist: {:?}",
                config.workspace
            )));
        }

        let config_path = config
            .config_file
            .clone()
            .unwrap_or_else(|| config.crag_dir().join("config.yaml"));

        if config_path.exists() {
            config = config.merge_yaml(&config_path)?;
        }

        if let Ok(provider) = std::env::var("CRAG_PROVIDER") {
            config.provider = provider;
        }

        if let Ok(model) = std::env::var("CRAG_MODEL") {
            config.model = model;
        }

        if let Ok(threshold) = std::env::var("CRAG_AMBIGUOUS_THRESHOLD") {
            config.crag.ambiguous_threshold = threshold.parse().map_err(|e| {
                AppError::Config(format!(
                    "Invalid CRAG_AMBIGUOUS_THRESHOLD '{}': {}",
                    threshold, e
                ))
            })?;
        }

        if let Ok(policy) = std::env::var("CRAG_SEARCH_FAILURE_POLICY") {
            config.crag.search_failure_policy =
                SearchFailurePolicy::parse(&policy).ok_or_else(|| {
                    AppError::Config(format!(
                        "Invalid CRAG_SEARCH_FAILURE_POLICY '{}': expected propagate or treat_as_empty",
                        policy
                    ))
                })?;
        }

        if let Ok(top_k) = std::env::var("CRAG_TOP_K") {
            config.crag.top_k = top_k
                .parse()
                .map_err(|e| AppError::Config(format!("Invalid CRAG_TOP_K '{}': {}", top_k, e)))?;
        }

        config.api_key = std::env::var("CRAG_API_KEY").ok();
        if let Ok(level) = std::env::var("RUST_LOG") {
            config.log_level = Some(level);
        }

        if std::env::var("NO_COLOR").is_ok() {
            config.no_color = true;
        }

        Ok(config)
    }

    /// Merge a YAML configuration file into this config.
    pub fn merge_yaml(&self, path: &Path) -> AppResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        let config_file: ConfigFile = serde_yaml::from_str(&contents).map_err(|e| {
            AppError::Config(format!("Failed to parse config file {:?}: {}", path, e))
        })?;

        let mut result = self.clone();

        if let Some(llm) = config_file.llm {
            if let Some(provider) = llm.provider {
                result.provider = provider;
            }
            if let Some(model) = llm.model {
                result.model = model;
            }
            if llm.endpoint.is_some() {
                result.endpoint = llm.endpoint;
            }
            if llm.api_key_env.is_some() {
                result.api_key_env = llm.api_key_env;
            }
        }

        if let Some(crag) = config_file.crag {
            result.crag = crag;
        }

        if let Some(embedding) = config_file.embedding {
            result.embedding = embedding;
        }

        if let Some(web_search) = config_file.web_search {
            result.web_search = web_search;
        }

        if let Some(path) = config_file.index.and_then(|index| index.path) {
            result.index_path = Some(PathBuf::from(path));
        }

        if let Some(logging) = config_file.logging {
            if let Some(level) = logging.level {
                result.log_level = Some(level);
            }
            if let Some(color) = logging.color {
                result.no_color = !color;
            }
        }

        Ok(result)
    }

    /// Apply CLI overrides to the configuration.
    ///
    /// CLI flags take precedence over environment variables and the file.
    #[allow(clippy::too_many_arguments)]
    pub fn with_overrides(
        mut self,
        workspace: Option<PathBuf>,
        config_file: Option<PathBuf>,
        provider: Option<String>,
        model: Option<String>,
        log_level: Option<String>,
        verbose: bool,
        no_color: bool,
    ) -> Self {
        if let Some(workspace) = workspace {
            self.workspace = workspace;
        }

        if let Some(config_file) = config_file {
            self.config_file = Some(config_file);
        }

        if let Some(provider) = provider {
            self.provider = provider;
        }

        if let Some(model) = model {
            self.model = model;
        }

        if let Some(log_level) = log_level {
            self.log_level = Some(log_level);
        }

        if verbose {
            self.verbose = true;
            if self.log_level.is_none() {
                self.log_level = Some("debug".to_string());
            }
        }

        if no_color {
            self.no_color = true;
        }

        self
    }

    /// Get the path to the .crag directory.
    pub fn crag_dir(&self) -> PathBuf {
        self.workspace.join(".crag")
    }

    /// Resolve the SQLite index location.
    ///
    /// Relative paths are taken from the workspace root.
    pub fn resolved_index_path(&self) -> PathBuf {
        match &self.index_path {
            Some(path) if path.is_absolute() => path.clone(),
            Some(path) => self.workspace.join(path),
            None => self.crag_dir().join("index.db"),
        }
    }

    /// Resolve the completion API key.
    ///
    /// `CRAG_API_KEY` wins over the variable named by `llm.apiKeyEnv`.
    pub fn resolve_api_key(&self) -> Option<String> {
        if let Some(ref key) = self.api_key {
            return Some(key.clone());
        }

        self.api_key_env
            .as_ref()
            .and_then(|env_var| std::env::var(env_var).ok())
    }

    /// Resolve the web search API key from the configured variable.
    pub fn resolve_web_search_key(&self) -> AppResult<String> {
        std::env::var(&self.web_search.api_key_env).map_err(|_| {
            AppError::Config(format!(
                "Web search API key not found in environment variable: {}",
                self.web_search.api_key_env
            ))
        })
    }

    /// Validate providers and CRAG settings.
    pub fn validate(&self) -> AppResult<()> {
        if !KNOWN_PROVIDERS.contains(&self.provider.to_lowercase().as_str()) {
            return Err(AppError::Config(format!(
                "Unknown provider: {}. Supported: {}",
                self.provider,
                KNOWN_PROVIDERS.join(", ")
            )));
        }

        if !KNOWN_EMBEDDING_PROVIDERS.contains(&self.embedding.provider.as_str()) {
            return Err(AppError::Config(format!(
                "Unknown embedding provider: {}. Supported: {}",
                self.embedding.provider,
                KNOWN_EMBEDDING_PROVIDERS.join(", ")
            )));
        }

        if self.provider.eq_ignore_ascii_case("openai") && self.resolve_api_key().is_none() {
            return Err(AppError::Config(
                "OpenAI provider requires CRAG_API_KEY or llm.apiKeyEnv".to_string(),
            ));
        }

        self.crag.validate()?;

        tracing::debug!(
            ambiguous_threshold = self.crag.ambiguous_threshold,
            top_k = self.crag.top_k,
            max_web_results = self.crag.max_web_results,
            search_failure_policy = ?self.crag.search_failure_policy,
            "Configuration validated"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_yaml(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.provider, "ollama");
        assert_eq!(config.model, "llama3.2");
        assert!(!config.verbose);
        assert_eq!(config.crag.ambiguous_threshold, 0.5);
        assert_eq!(config.crag.relevance_threshold, 0.7);
        assert_eq!(config.crag.top_k, 5);
        assert_eq!(config.crag.max_web_results, 3);
        assert_eq!(config.crag.answer_max_tokens, 500);
        assert_eq!(
            config.crag.search_failure_policy,
            SearchFailurePolicy::Propagate
        );
    }

    #[test]
    fn test_merge_yaml_partial_crag_section_keeps_defaults() {
        let file = write_yaml(
            r#"
llm:
  provider: openai
  model: gpt-4o-mini
  apiKeyEnv: OPENAI_API_KEY
crag:
  ambiguousThreshold: 0.4
  searchFailurePolicy: treat_as_empty
index:
  path: data/index.db
logging:
  level: debug
  color: false
"#,
        );

        let merged = AppConfig::default().merge_yaml(file.path()).unwrap();
        assert_eq!(merged.provider, "openai");
        assert_eq!(merged.model, "gpt-4o-mini");
        assert_eq!(merged.api_key_env.as_deref(), Some("OPENAI_API_KEY"));
        assert_eq!(merged.crag.ambiguous_threshold, 0.4);
        assert_eq!(merged.crag.max_web_results, 3);
        assert_eq!(
            merged.crag.search_failure_policy,
            SearchFailurePolicy::TreatAsEmpty
        );
        assert_eq!(merged.log_level.as_deref(), Some("debug"));
        assert!(merged.no_color);
        assert!(merged.resolved_index_path().ends_with("data/index.db"));
    }

    #[test]
    fn test_merge_yaml_rejects_garbage() {
        let file = write_yaml("crag: [1, 2");
        let result = AppConfig::default().merge_yaml(file.path());
        assert!(matches!(result, Err(AppError::Config(_))));
    }

    #[test]
    fn test_with_overrides() {
        let overridden = AppConfig::default().with_overrides(
            None,
            None,
            Some("openai".to_string()),
            Some("gpt-4o-mini".to_string()),
            None,
            true,
            false,
        );

        assert_eq!(overridden.provider, "openai");
        assert_eq!(overridden.model, "gpt-4o-mini");
        assert!(overridden.verbose);
        assert_eq!(overridden.log_level, Some("debug".to_string()));
    }

    #[test]
    fn test_default_index_path_under_crag_dir() {
        let config = AppConfig::default();
        let path = config.resolved_index_path();
        assert!(path.ends_with(".crag/index.db"));
    }

    #[test]
    fn test_validate_unknown_provider() {
        let mut config = AppConfig::default();
        config.provider = "unknown".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_ollama_defaults() {
        assert!(AppConfig::default().validate().is_ok());
    }

    #[test]
    fn test_validate_openai_with_explicit_key() {
        let mut config = AppConfig::default();
        config.provider = "openai".to_string();
        config.api_key = Some("sk-test".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_crag_settings_reject_out_of_range_threshold() {
        let mut settings = CragSettings::default();
        settings.ambiguous_threshold = 1.5;
        assert!(settings.validate().is_err());

        let mut settings = CragSettings::default();
        settings.relevance_threshold = f64::NAN;
        assert!(settings.validate().is_err());

        let mut settings = CragSettings::default();
        settings.max_web_results = 0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_load_from_explicit_workspace_merges_its_config() {
        let workspace = tempfile::TempDir::new().unwrap();
        let crag_dir = workspace.path().join(".crag");
        std::fs::create_dir_all(&crag_dir).unwrap();
        std::fs::write(
            crag_dir.join("config.yaml"),
            "crag:\n  maxWebResults: 5\nembedding:\n  dimensions: 64\n",
        )
        .unwrap();

        let config = AppConfig::load_from(Some(workspace.path().to_path_buf()), None).unwrap();
        assert_eq!(config.workspace, workspace.path());
        assert_eq!(config.crag.max_web_results, 5);
        assert_eq!(config.embedding.dimensions, 64);
    }

    #[test]
    fn test_load_from_missing_workspace_is_error() {
        let result = AppConfig::load_from(Some(PathBuf::from("/definitely/not/here")), None);
        assert!(matches!(result, Err(AppError::Config(_))));
    }

    #[test]
    fn test_load_from_reads_search_failure_policy_env() {
        let workspace = tempfile::TempDir::new().unwrap();

        std::env::set_var("CRAG_SEARCH_FAILURE_POLICY", "treat-as-empty");
        let config = AppConfig::load_from(Some(workspace.path().to_path_buf()), None);
        std::env::remove_var("CRAG_SEARCH_FAILURE_POLICY");

        assert_eq!(
            config.unwrap().crag.search_failure_policy,
            SearchFailurePolicy::TreatAsEmpty
        );
    }

    #[test]
    fn test_search_failure_policy_parse() {
        assert_eq!(
            SearchFailurePolicy::parse("propagate"),
            Some(SearchFailurePolicy::Propagate)
        );
        assert_eq!(
            SearchFailurePolicy::parse("treat-as-empty"),
            Some(SearchFailurePolicy::TreatAsEmpty)
        );
        assert_eq!(SearchFailurePolicy::parse("retry"), None);
    }
}
