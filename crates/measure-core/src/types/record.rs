use std::path::PathBuf;

use super::digest::DigestMap;

/// What is recorded about one inventory entry.
///
/// The canonical payload is a pure function of the path and this value, so
/// no timestamps or inode data can leak into the measurement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Observation {
    /// The file exists and its content hashes to this lowercase hex SHA-256
    Content(String),
    /// Only presence or absence is recorded
    Presence(bool),
}

impl Observation {
    /// The canonical payload extended into the PCR for `path`.
    ///
    /// `path` goes in as the raw bytes the filesystem stores, so a file name
    /// that is not UTF-8 yields a payload that is not UTF-8 either.
    #[must_use]
    pub fn payload(&self, path: &[u8]) -> Vec<u8> {
        let mut payload = Vec::with_capacity(path.len() + 96);
        payload.extend_from_slice(b"file:");
        payload.extend_from_slice(path);
        match self {
            Self::Content(hash) => {
                payload.extend_from_slice(b" exist:true content-hash:");
                payload.extend_from_slice(hash.as_bytes());
            }
            Self::Presence(true) => payload.extend_from_slice(b" exist:true"),
            Self::Presence(false) => payload.extend_from_slice(b" exist:false"),
        }
        payload
    }
}

/// The result of measuring one inventory entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeasurementRecord {
    /// Path of the measured file
    pub path: PathBuf,
    /// Canonical payload that was extended
    pub payload: Vec<u8>,
    /// PCR value per active bank, read back after the last extend
    pub digests: DigestMap,
}
