//! CRAG CLI
//!
//! Corrective retrieval-augmented question answering over a local index.

mod bootstrap;
mod commands;

use clap::{Parser, Subcommand};
use commands::{AskCommand, GradeCommand};
use crag_core::{config::AppConfig, logging, AppResult};
use std::path::PathBuf;

/// CRAG - corrective retrieval-augmented answers
#[derive(Parser, Debug)]
#[command(name = "crag")]
#[command(about = "Corrective RAG: grade retrieved context, search the web when it falls short", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to workspace directory (default: current directory)
    #[arg(short, long, global = true, env = "CRAG_WORKSPACE")]
    workspace: Option<PathBuf>,

    /// Path to config file
    #[arg(short, long, global = true, env = "CRAG_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, env = "RUST_LOG")]
    log_level: Option<String>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    no_color: bool,

    /// Completion provider (ollama, openai)
    #[arg(short, long, global = true, env = "CRAG_PROVIDER")]
    provider: Option<String>,

    /// Completion model identifier
    #[arg(short, long, global = true, env = "CRAG_MODEL")]
    model: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Answer a question, correcting retrieval with web search when needed
    Ask(AskCommand),

    /// Retrieve and grade context without searching or answering
    Grade(GradeCommand),
}

#[tokio::main]
async fn main() -> AppResult<()> {
    let cli = Cli::parse();

    // Workspace and config file decide which YAML is merged, so they go first.
    let config = AppConfig::load_from(cli.workspace, cli.config)?.with_overrides(
        None,
        None,
        cli.provider,
        cli.model,
        cli.log_level,
        cli.verbose,
        cli.no_color,
    );

    logging::init_logging(config.log_level.as_deref(), config.no_color)?;

    tracing::info!("CRAG CLI starting");
    tracing::debug!("Workspace: {:?}", config.workspace);
    tracing::debug!("Provider: {}", config.provider);
    tracing::debug!("Model: {}", config.model);

    config.validate()?;

    let command_name = match &cli.command {
        Commands::Ask(_) => "ask",
        Commands::Grade(_) => "grade",
    };
    let _span = tracing::info_span!("command", name = command_name).entered();

    let result = match cli.command {
        Commands::Ask(cmd) => cmd.execute(&config).await,
        Commands::Grade(cmd) => cmd.execute(&config).await,
    };

    match &result {
        Ok(_) => tracing::info!("Command completed successfully"),
        Err(e) => tracing::error!("Command failed: {}", e),
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_ask_with_flags() {
        let cli = Cli::try_parse_from([
            "crag",
            "ask",
            "What is the capital of France?",
            "--json",
            "--top-k",
            "3",
            "--web-results",
            "2",
        ])
        .unwrap();

        match cli.command {
            Commands::Ask(cmd) => {
                assert_eq!(cmd.query, "What is the capital of France?");
                assert!(cmd.json);
                assert_eq!(cmd.top_k, Some(3));
                assert_eq!(cmd.web_results, Some(2));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_grade_with_global_provider() {
        let cli = Cli::try_parse_from(["crag", "grade", "query", "--provider", "openai"]).unwrap();

        assert_eq!(cli.provider.as_deref(), Some("openai"));
        assert!(matches!(cli.command, Commands::Grade(_)));
    }

    #[test]
    fn test_query_is_required() {
        assert!(Cli::try_parse_from(["crag", "ask"]).is_err());
    }
}
