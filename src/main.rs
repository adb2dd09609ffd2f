//! tapkey CLI
//!
//! Inspect tap maps and drive the composer from tap scripts.

use anyhow::Result;
use clap::Parser;
use tracing::info;

use tapkey::Settings;

// CLI definitions
mod cli;
use cli::{Cli, Commands};

// Command handlers
mod commands;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    // Load settings
    let settings_path = cli.settings.unwrap_or_else(Settings::default_path);
    info!("Loading settings from {:?}", settings_path);
    let settings = Settings::load(&settings_path)?;

    match cli.command {
        Commands::Check { map } => commands::map::check(&settings, map),
        Commands::Dump { map } => commands::map::dump(&settings, map),
        Commands::Replay {
            script,
            map,
            dry_run,
        } => commands::replay::run(&settings, &script, map, dry_run).await,
        Commands::InitSettings => commands::settings::init(&settings, &settings_path),
    }
}
