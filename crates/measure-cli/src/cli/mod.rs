//! CLI argument parsing and command dispatch.

pub mod args;
pub mod commands;

use anyhow::{Context as _, Result};
use args::{Cli, Commands};
use clap::Parser;
use measure_engine::MeasureConfig;
use tracing::warn;

use crate::logging;

/// Run the CLI application.
///
/// Errors are returned, not logged; `main` reports them once on exit.
pub fn run() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let config = load_config(&cli)?;
    let ctx = commands::Context { config };
    match cli.command {
        None | Some(Commands::Measure) => commands::measure::execute(&ctx),
        Some(Commands::Inspect(args)) => commands::inspect::execute(&ctx, &args),
    }
}

fn load_config(cli: &Cli) -> Result<MeasureConfig> {
    let Some(path) = &cli.config else {
        return Ok(MeasureConfig::default());
    };
    if !path.exists() {
        warn!(path = %path.display(), "config file not found, using defaults");
    }
    MeasureConfig::load(path).with_context(|| format!("loading {}", path.display()))
}
