//! Command implementations.

pub mod inspect;
pub mod measure;

use measure_engine::MeasureConfig;

/// Shared context for all commands.
#[derive(Debug, Clone)]
pub struct Context {
    /// Effective run configuration
    pub config: MeasureConfig,
}
