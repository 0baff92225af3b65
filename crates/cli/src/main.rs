//! Umrah Guide CLI
//!
//! Ask questions about Umrah rituals, destinations, hotels and pilgrim
//! experiences, answered from a local retrieval index.

mod commands;

use anyhow::Context;
use clap::{Parser, Subcommand};
use commands::{AskCommand, BuildCommand, RouteCommand, StatsCommand};
use std::path::PathBuf;
use umrah_core::{config::AppConfig, logging};

/// Umrah Guide - grounded answers for pilgrims
#[derive(Parser, Debug)]
#[command(name = "umrah")]
#[command(about = "Grounded answers about Umrah travel", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to workspace directory (default: current directory)
    #[arg(short, long, global = true, env = "UMRAH_WORKSPACE")]
    workspace: Option<PathBuf>,

    /// Path to config file
    #[arg(short, long, global = true, env = "UMRAH_CONFIG")]
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

    /// Generative model provider (ollama, gemini)
    #[arg(short, long, global = true, env = "UMRAH_PROVIDER")]
    provider: Option<String>,

    /// Generative model identifier
    #[arg(short, long, global = true, env = "UMRAH_MODEL")]
    model: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Ask a question
    Ask(AskCommand),

    /// Ingest source records and persist the index
    Build(BuildCommand),

    /// Show how a question would be routed
    Route(RouteCommand),

    /// Show index statistics
    Stats(StatsCommand),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = AppConfig::load_with(cli.workspace, cli.config)
        .context("Failed to load configuration")?
        .with_overrides(
            cli.provider,
            cli.model,
            cli.log_level,
            cli.verbose,
            cli.no_color,
        );

    logging::init_logging(config.log_level.as_deref(), config.no_color)?;
    config.validate()?;

    tracing::info!("Umrah Guide CLI starting");
    tracing::debug!("Workspace: {:?}", config.workspace);
    tracing::debug!(
        "Generation: {}/{}, embedding: {}/{}",
        config.generation.provider,
        config.generation.model,
        config.embedding.provider,
        config.embedding.model
    );

    config.ensure_umrah_dir()?;

    let command_name = match &cli.command {
        Commands::Ask(_) => "ask",
        Commands::Build(_) => "build",
        Commands::Route(_) => "route",
        Commands::Stats(_) => "stats",
    };
    let _span = tracing::info_span!("command", name = command_name).entered();

    let result = match cli.command {
        Commands::Ask(cmd) => cmd.execute(&config).await,
        Commands::Build(cmd) => cmd.execute(&config).await,
        Commands::Route(cmd) => cmd.execute(),
        Commands::Stats(cmd) => cmd.execute(&config),
    };

    match &result {
        Ok(_) => tracing::info!("Command completed successfully"),
        Err(e) => tracing::error!("Command failed: {}", e),
    }

    Ok(result?)
}
