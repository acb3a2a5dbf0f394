//! `measure-config measure` - extend the PCR and write the event log.

use anyhow::{Context as _, Result};
use measure_engine::RunOutcome;
use tracing::{debug, info};

use super::Context;

pub fn execute(ctx: &Context) -> Result<()> {
    let config = &ctx.config;
    debug!(?config, "effective configuration");

    let outcome = measure_engine::run(config).with_context(|| {
        format!(
            "measuring {} into PCR {}",
            config.config_root.display(),
            config.pcr_index
        )
    })?;

    match outcome {
        RunOutcome::TpmAbsent => {}
        RunOutcome::Measured(summary) => {
            for digest in &summary.final_digests {
                info!(
                    "final pcr: {} {} {}",
                    config.pcr_index,
                    digest.algorithm,
                    hex::encode(&digest.value)
                );
            }
            debug!(events = summary.events, path = %summary.log_path.display(), "done");
        }
    }
    Ok(())
}
