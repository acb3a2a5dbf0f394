//! measure-config - measure the configuration partition into the TPM.

use anyhow::Result;

fn main() -> Result<()> {
    measure_cli::run()
}
