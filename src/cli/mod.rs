//! Command-line interface definitions.

pub mod check;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// signalkeeper - real-time trade-signal lifecycle engine.
#[derive(Parser, Debug)]
#[command(name = "signalkeeper")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file.
    #[arg(short, long, default_value = "config.toml", global = true)]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the engine in the foreground until Ctrl+C.
    Run(RunArgs),

    /// Load and validate the configuration, then print an effective summary.
    CheckConfig,
}

/// Arguments for the `run` subcommand.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Override the configured log level (trace, debug, info, warn, error).
    #[arg(long)]
    pub log_level: Option<String>,
}
