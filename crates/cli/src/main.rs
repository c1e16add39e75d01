//! llamaserve CLI
//!
//! Entry point for serving a local llama model over HTTP, building document
//! indexes and load-testing a running server.

mod commands;

use clap::{Parser, Subcommand};
use commands::{IndexCommand, LoadTestCommand, ServeCommand};
use llamaserve_core::{logging, AppConfig, AppResult, ConfigOverrides};
use std::path::PathBuf;

/// llamaserve - local llama inference over HTTP
#[derive(Parser, Debug)]
#[command(name = "llamaserve")]
#[command(about = "Serve a local llama model over HTTP", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to workspace directory (default: current directory)
    #[arg(short, long, global = true, env = "LLAMASERVE_WORKSPACE")]
    workspace: Option<PathBuf>,

    /// Path to config file
    #[arg(short, long, global = true, env = "LLAMASERVE_CONFIG")]
    config: Option<PathBuf>,

    /// Log level or filter directive; RUST_LOG applies when neither this nor the config sets one
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    no_color: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    /// LLM provider (gguf, ollama)
    #[arg(short, long, global = true)]
    provider: Option<String>,

    /// Path to the GGUF model file
    #[arg(long, global = true)]
    model_path: Option<PathBuf>,

    /// Path to the tokenizer.json matching the model
    #[arg(long, global = true)]
    tokenizer_path: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            workspace: self.workspace.clone(),
            config_file: self.config.clone(),
            provider: self.provider.clone(),
            model_path: self.model_path.clone(),
            tokenizer_path: self.tokenizer_path.clone(),
            log_level: self.log_level.clone(),
            verbose: self.verbose,
            no_color: self.no_color,
            log_json: self.log_json,
            ..Default::default()
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Load the model and serve the HTTP API
    Serve(ServeCommand),

    /// Build and inspect document indexes
    Index(IndexCommand),

    /// Drive concurrent simulated users against a running server
    Loadtest(LoadTestCommand),
}

#[tokio::main]
async fn main() -> AppResult<()> {
    let cli = Cli::parse();

    let overrides = cli.overrides();
    let config = AppConfig::load(&overrides)?.with_overrides(overrides);

    logging::init_logging(config.log_level.as_deref(), config.no_color, config.log_json)?;

    tracing::info!("llamaserve starting");
    tracing::debug!("Workspace: {:?}", config.workspace);
    tracing::debug!("Provider: {}", config.llm.provider);

    let command_name = match &cli.command {
        Commands::Serve(_) => "serve",
        Commands::Index(_) => "index",
        Commands::Loadtest(_) => "loadtest",
    };
    let _span = tracing::info_span!("command", name = command_name).entered();

    let result = match cli.command {
        Commands::Serve(cmd) => cmd.execute(&config).await,
        Commands::Index(cmd) => cmd.execute(&config).await,
        Commands::Loadtest(cmd) => cmd.execute().await,
    };

    match &result {
        Ok(_) => tracing::info!("Command completed successfully"),
        Err(e) => tracing::error!("Command failed: {}", e),
    }

    result
}
