//! Vigil CLI - operator tooling for the quiz integrity engine
//!
//! - `vigil simulate <script.json>`: replay a timed page-event script through
//!   a full attempt with in-memory collaborators
//! - `vigil keys`: show the AI credential pool, masked
//! - `vigil config`: print the effective configuration

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod config;

use config::VigilConfig;

/// Vigil CLI
#[derive(Parser)]
#[command(name = "vigil")]
#[command(about = "Vigil - quiz attempt integrity engine", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "VIGIL_CONFIG")]
    config: Option<String>,

    /// Log level (overrides the configuration file)
    #[arg(long, env = "VIGIL_LOG_LEVEL")]
    log_level: Option<String>,

    /// Enable JSON logging
    #[arg(long, env = "VIGIL_LOG_JSON")]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a page-event script through a simulated attempt
    Simulate {
        /// Script file (JSON)
        script: PathBuf,
    },

    /// List the configured AI credentials
    Keys,

    /// Print the effective configuration as TOML
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = VigilConfig::load(cli.config.as_deref())?;

    // Logs go to stderr so command output stays parseable
    let level = cli
        .log_level
        .clone()
        .unwrap_or_else(|| config.logging.level.clone());
    let env_filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| level.into());

    if cli.json || config.logging.json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }

    match cli.command {
        Commands::Simulate { script } => commands::simulate::execute(&script, &config).await,
        Commands::Keys => commands::keys::execute(&config),
        Commands::Config => commands::show::execute(&config),
    }
}
