//! Command-line argument definitions using clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Measure the configuration partition into a TPM PCR
///
/// Extends the configuration PCR with every file of interest under the
/// configuration root and writes a TCG event log a verifier can replay.
/// Does nothing, successfully, when the machine has no TPM.
#[derive(Parser, Debug)]
#[command(name = "measure-config")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// TOML configuration file (compiled-in defaults when omitted)
    #[arg(short, long, env = "MEASURE_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Log at debug level
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Measure the configuration directory and write the event log (default)
    Measure,

    /// Decode and replay an event log
    Inspect(InspectArgs),
}

#[derive(Args, Debug)]
pub struct InspectArgs {
    /// Event log to read
    pub log: PathBuf,

    /// Print JSON instead of text
    #[arg(long)]
    pub json: bool,
}
