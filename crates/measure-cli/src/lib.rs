//! # measure-cli
//!
//! The `measure-config` command.
//!
//! Run once per boot, before anything reads the configuration partition:
//!
//! - **measure** (default): extend PCR 14 with every file of interest under
//!   `/config` and write the event log to `/run/measurefs/tpm_log.bin`.
//!   Exits 0 without doing anything on machines without a TPM.
//! - **inspect**: decode a written log, replay it and print the events and
//!   the PCR value it implies.

pub mod cli;
pub mod logging;

pub use cli::run;
