use std::path::Path;

use thiserror::Error;

/// Result type alias for measurement operations
pub type Result<T> = std::result::Result<T, MeasureError>;

/// Errors that can occur during a measurement run
///
/// Apart from [`MeasureError::TpmNotPresent`], every variant is fatal: a run
/// that hits one must stop, because the PCR sequence can no longer match
/// the one produced on other devices.
#[derive(Error, Debug)]
pub enum MeasureError {
    /// No TPM device node exists on this machine
    #[error("TPM device {path} not present")]
    TpmNotPresent {
        /// Device node that was checked
        path: String,
    },

    /// A file or device could not be opened, read or written
    #[error("I/O error on {path}: {source}")]
    Io {
        /// Path of the file involved
        path: String,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Sending a command to the TPM or receiving its response failed
    #[error("TPM transport error: {0}")]
    TpmTransport(String),

    /// The TPM answered a command with a non-success response code
    #[error("TPM command {command} failed with response code {code:#010x}")]
    TpmResponse {
        /// Name of the command that failed
        command: &'static str,
        /// TPM response code
        code: u32,
    },

    /// A capability query or response carried unexpected data
    #[error("unexpected TPM data: {0}")]
    Capability(String),

    /// A hash algorithm id is unknown or cannot be computed in software
    #[error("unsupported hash algorithm {0:#06x}")]
    UnsupportedAlgorithm(u16),

    /// The TPM reports no allocated PCR bank
    #[error("TPM has no allocated PCR banks")]
    NoActiveBanks,

    /// An extend was attempted with more data than one event can carry
    #[error("event data of {size} bytes exceeds the {max} byte limit")]
    EventTooLarge {
        /// Size of the rejected data
        size: usize,
        /// Largest accepted size
        max: usize,
    },

    /// Measuring a single file failed
    #[error("cannot measure {path}: {source}")]
    Measurement {
        /// File being measured
        path: String,
        /// What went wrong
        #[source]
        source: Box<MeasureError>,
    },

    /// An event log could not be decoded
    #[error("malformed event log: {0}")]
    LogFormat(String),

    /// Replaying an event log did not reproduce a recorded digest
    #[error("replay mismatch at event {event} ({algorithm}): logged {expected}, computed {actual}")]
    ReplayMismatch {
        /// Index of the event in the log (header is 0)
        event: usize,
        /// Bank being replayed
        algorithm: String,
        /// Hex digest recorded in the log
        expected: String,
        /// Hex digest recomputed from the payloads
        actual: String,
    },

    /// Configuration is invalid
    #[error("configuration error: {0}")]
    Config(String),
}

impl MeasureError {
    /// Build an I/O error for `path`.
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().display().to_string(),
            source,
        }
    }

    /// Attach the path of the file being measured.
    #[must_use]
    pub fn for_path(self, path: impl Into<String>) -> Self {
        Self::Measurement {
            path: path.into(),
            source: Box::new(self),
        }
    }

    /// Returns true if the error only means this machine has no TPM
    #[must_use]
    pub const fn is_environment_absence(&self) -> bool {
        matches!(self, Self::TpmNotPresent { .. })
    }

    /// Returns true if the error came from talking to the TPM, which may
    /// have left the PCR partially extended
    #[must_use]
    pub fn is_hardware(&self) -> bool {
        match self {
            Self::TpmTransport(_) | Self::TpmResponse { .. } | Self::Capability(_) => true,
            Self::Measurement { source, .. } => source.is_hardware(),
            _ => false,
        }
    }
}
