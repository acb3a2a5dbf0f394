//! Logging initialization for the `measure-config` binary.
//!
//! The library crates log through `tracing`, built with its `log` feature,
//! so `env_logger` receives their events without a separate subscriber.

use std::sync::OnceLock;

use log::LevelFilter;

static INIT: OnceLock<()> = OnceLock::new();

/// Initialize the logger once.
///
/// The level is `info`, or `debug` with `verbose`. `RUST_LOG` overrides
/// both when set.
pub fn init(verbose: bool) {
    INIT.get_or_init(|| {
        let level = if verbose {
            LevelFilter::Debug
        } else {
            LevelFilter::Info
        };

        env_logger::Builder::new()
            .filter_level(level)
            .parse_default_env()
            .format_timestamp_millis()
            .try_init()
            .ok(); // Ignore error if already initialized
    });
}
