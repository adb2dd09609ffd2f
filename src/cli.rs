// CLI definitions using clap

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "tapkey")]
#[command(author, version, about = "Tap gesture to keyboard composer")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Settings file path (default: ~/.config/tapkey/settings.toml)
    #[arg(long, global = true, value_name = "PATH")]
    pub settings: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Validate a tap map and print a summary
    Check {
        /// Map file (default: $TAPMAP, settings, or nearest default.tapmap.yaml)
        map: Option<PathBuf>,
    },

    /// Print every mode and bound slot of a tap map
    Dump {
        /// Map file (default: $TAPMAP, settings, or nearest default.tapmap.yaml)
        map: Option<PathBuf>,
    },

    /// Drive the engine from a tap script
    Replay {
        /// Script with taps (`----.`), pauses (`100ms`) and connect/disconnect
        script: PathBuf,

        /// Map file (default: $TAPMAP, settings, or nearest default.tapmap.yaml)
        #[arg(long)]
        map: Option<PathBuf>,

        /// Log key events instead of sending them
        #[arg(long)]
        dry_run: bool,
    },

    /// Write the current settings (defaults if none) to the settings file
    InitSettings,
}
