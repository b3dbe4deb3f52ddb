//! `signalkeeper` binary entrypoint: parses the CLI, loads configuration, and
//! either validates it (`check-config`) or runs the engine until Ctrl+C.

use clap::Parser;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info};

use signalkeeper::cli::{self, Cli, Commands, RunArgs};
use signalkeeper::config::Config;
use signalkeeper::{app, Result};

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    if let Err(err) = dispatch(cli).await {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

async fn dispatch(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::CheckConfig => cli::check::execute(&cli.config),
        Commands::Run(args) => run_engine(&cli.config, args).await,
    }
}

async fn run_engine(config_path: &std::path::Path, args: RunArgs) -> Result<()> {
    let mut config = Config::load(config_path)?;
    if let Some(level) = args.log_level {
        config.logging.level = level;
    }
    config.init_logging();

    info!("signalkeeper starting");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let result = tokio::select! {
        result = app::run(config, shutdown_rx) => result,
        _ = signal::ctrl_c() => {
            info!("shutdown signal received");
            let _ = shutdown_tx.send(true);
            Ok(())
        }
    };

    if let Err(ref err) = result {
        error!(error = %err, "engine exited with error");
    }
    info!("signalkeeper stopped");
    result
}
