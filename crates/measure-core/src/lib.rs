//! Core types and errors for configuration measurement.
//!
//! This crate provides the foundational types shared by the TPM driver,
//! the measurement engine and the command-line tool:
//!
//! - **Algorithms**: TCG hash algorithm identifiers, PCR banks and the
//!   per-run [`AlgorithmSet`]
//! - **Inventory**: the canonical set of files of interest and the
//!   [`Observation`] recorded for each one
//! - **Policy**: the content-exclude and presence-sensitive path lists
//! - **Errors**: one error taxonomy, [`MeasureError`], for every fatal
//!   condition of a run
//!
//! # Example
//!
//! ```rust
//! use measure_core::Observation;
//!
//! let payload = Observation::Presence(false).payload(b"/config/Force-API-V1");
//! assert_eq!(payload, b"file:/config/Force-API-V1 exist:false");
//! ```

mod error;
pub mod policy;
pub mod types;

pub use error::{MeasureError, Result};
pub use policy::MeasurePolicy;
pub use types::*;
