//! fleetrecap - deduplicating result reporter
//!
//! This is the main entry point for the fleetrecap CLI.

mod cli;

use anyhow::Result;
use cli::{Cli, Commands};
use fleetrecap::config::ConfigLoader;
use fleetrecap::error::Error;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Exit code when the configuration cannot be loaded.
const CONFIG_ERROR_EXIT_CODE: i32 = 5;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse_args();

    // Initialize logging based on verbosity
    init_logging(cli.verbosity());

    let mut loader = ConfigLoader::new().with_overrides(cli.overrides());
    if let Some(path) = &cli.config {
        loader = loader.with_file(path);
    }

    let config = match loader.load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("ERROR: {:#}", e);
            std::process::exit(CONFIG_ERROR_EXIT_CODE);
        }
    };

    let outcome = match &cli.command {
        Commands::Replay(args) => cli::replay::execute(args, config).await,
    };

    let exit_code = match outcome {
        Ok(code) => code,
        Err(e) => {
            eprintln!("ERROR: {:#}", e);
            e.downcast_ref::<Error>().map_or(1, Error::exit_code)
        }
    };

    std::process::exit(exit_code);
}

/// Initialize logging based on verbosity level
///
/// Diagnostics go to stderr; stdout carries the transcript only.
fn init_logging(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_target(verbosity >= 3))
        .with(env_filter)
        .init();
}
