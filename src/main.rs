// ABOUTME: Entry point for the keepsake binary.
// ABOUTME: Loads configuration, initializes tracing, opens the state database, and runs one command.

mod commands;
mod config;

use std::io;

use anyhow::Context;
use clap::Parser;
use keepsake_core::PersistentState;
use keepsake_store::SqlitePersistentState;

use crate::commands::Cli;
use crate::config::KeepsakeConfig;

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("keepsake=info")),
        )
        .init();

    let cli = Cli::parse();
    let config = KeepsakeConfig::from_env()?;
    let state_path = cli.state.clone().unwrap_or(config.state_path);

    tracing::debug!(home = %config.home.display(), state = %state_path.display(), "keepsake starting up");

    let mut state = SqlitePersistentState::open(&state_path)
        .with_context(|| format!("opening state database {}", state_path.display()))?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    commands::run(&cli.command, &mut state, config.format, &mut out)?;

    state.close()?;
    Ok(())
}
