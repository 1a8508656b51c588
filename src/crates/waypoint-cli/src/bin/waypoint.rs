//! Waypoint CLI - checkpointed, interruptible LLM workflows
//!
//! Main entry point for the waypoint command-line tool.

use clap::Parser;
use tracing::Level;
use waypoint_cli::cli::{self, Cli};
use waypoint_cli::config::load_config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match load_config(cli.config.as_deref()).await {
        Ok(config) => config,
        Err(e) => {
            eprintln!("✗ {}", e);
            return Err(e.into());
        }
    };

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        config.logging.level.parse().unwrap_or(Level::INFO)
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = cli::execute(config, cli).await {
        eprintln!("✗ {}", e);
        return Err(e);
    }
    Ok(())
}
