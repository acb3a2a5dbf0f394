//! TPM 2.0 PCR driver.
//!
//! The measurement engine only needs three things from a TPM: the list of
//! allocated PCR banks, `TPM2_PCR_Event` on one register, and
//! `TPM2_PCR_Read` of that register per bank. These are exposed through
//! the [`Tpm`] trait with two implementations:
//!
//! - [`CommandTpm`]: marshals TPM 2.0 commands and sends them over a
//!   [`Transport`], normally the kernel resource manager at `/dev/tpmrm0`
//! - [`SimulatedTpm`]: a deterministic in-memory device for tests
//!
//! ```rust
//! use measure_core::{HashAlgorithm, PcrIndex};
//! use measure_tpm::{SimulatedTpm, Tpm};
//!
//! let mut tpm = SimulatedTpm::new(&[HashAlgorithm::Sha256]).unwrap();
//! tpm.extend(PcrIndex::CONFIG, b"file:/config/a exist:false").unwrap();
//! let value = tpm.read_pcr(PcrIndex::CONFIG, HashAlgorithm::Sha256).unwrap();
//! assert_eq!(value.len(), 32);
//! ```

pub mod command;
mod device;
mod driver;
mod simulator;

pub use device::{open_device, CommandTpm, DeviceTpm, DeviceTransport, Transport};
pub use driver::{check_event_size, Tpm, MAX_EVENT_SIZE};
pub use simulator::{ExtendCall, SimulatedTpm};
