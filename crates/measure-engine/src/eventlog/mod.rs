//! TCG event log for the measured PCR.
//!
//! The log starts with an `EV_NO_ACTION` header event carrying a
//! [`SpecIdEvent`] manifest of the active banks, followed by one `EV_IPL`
//! event per measured file in extension order. Each measurement event
//! carries the PCR value read back after its extends, so a verifier can
//! replay the payloads and compare at every step.
//!
//! ## Binary layout (little-endian)
//!
//! ```text
//! header  (TCG_PCClientPCREvent):
//!   pcrIndex u32 | eventType u32 | sha1 digest [20] | eventSize u32 | SpecIdEvent
//! events  (TCG_PCR_EVENT2):
//!   pcrIndex u32 | eventType u32 | count u32 | { algId u16 | digest }* |
//!   eventSize u32 | payload NUL
//! ```

mod parse;
mod reader;
mod replay;
mod spec_id;
mod write;

use measure_core::{AlgorithmSet, DigestMap, HashAlgorithm, MeasurementRecord, PcrIndex, Result};
use serde::Serialize;

pub use replay::replay;
pub use spec_id::{AlgorithmSize, SpecIdEvent, SPEC_ID_SIGNATURE, UINTN_SIZE_U64};

/// `EV_NO_ACTION`: informational, never extended
pub const EV_NO_ACTION: u32 = 0x0000_0003;
/// `EV_IPL`: measurement of loaded or configured data
pub const EV_IPL: u32 = 0x0000_000D;

/// Event type field of a log event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    /// `EV_NO_ACTION`
    NoAction,
    /// `EV_IPL`
    Ipl,
    /// Any other type, kept as read
    Other(u32),
}

impl EventType {
    /// Numeric event type
    #[must_use]
    pub const fn value(self) -> u32 {
        match self {
            Self::NoAction => EV_NO_ACTION,
            Self::Ipl => EV_IPL,
            Self::Other(v) => v,
        }
    }

    /// Event type from its numeric value
    #[must_use]
    pub const fn from_value(value: u32) -> Self {
        match value {
            EV_NO_ACTION => Self::NoAction,
            EV_IPL => Self::Ipl,
            v => Self::Other(v),
        }
    }
}

/// One event of the log
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogEvent {
    /// PCR the event belongs to
    pub pcr_index: u32,
    /// Event type
    pub event_type: EventType,
    /// Digest per bank, in header order
    pub digests: DigestMap,
    /// Raw event data
    #[serde(skip)]
    pub data: Vec<u8>,
}

impl LogEvent {
    /// Payload text without the trailing NUL, if it is valid UTF-8
    #[must_use]
    pub fn payload(&self) -> Option<&str> {
        std::str::from_utf8(self.payload_bytes()).ok()
    }

    /// Payload bytes without the trailing NUL
    #[must_use]
    pub fn payload_bytes(&self) -> &[u8] {
        self.data.strip_suffix(&[0]).unwrap_or(&self.data)
    }
}

/// An ordered TCG event log
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventLog {
    spec_id: SpecIdEvent,
    events: Vec<LogEvent>,
}

impl EventLog {
    /// New log holding only the header event for `algorithms`.
    #[must_use]
    pub fn new(algorithms: &AlgorithmSet) -> Self {
        Self {
            spec_id: SpecIdEvent::for_algorithms(algorithms),
            events: Vec::new(),
        }
    }

    /// Append the event for one measurement, after all earlier ones.
    ///
    /// The event carries `pcr`, the register that was actually extended
    /// (14 by default). Logs written by the older `measurefs` tool record
    /// PCR 0 for these events instead, so a verifier comparing against
    /// such a log must not match on the PCR index.
    pub fn append(&mut self, pcr: PcrIndex, record: &MeasurementRecord) {
        let mut data = Vec::with_capacity(record.payload.len() + 1);
        data.extend_from_slice(&record.payload);
        data.push(0);

        self.events.push(LogEvent {
            pcr_index: pcr.value(),
            event_type: EventType::Ipl,
            digests: record.digests.clone(),
            data,
        });
    }

    /// Header manifest
    #[must_use]
    pub const fn spec_id(&self) -> &SpecIdEvent {
        &self.spec_id
    }

    /// The header event as written: PCR 0, `EV_NO_ACTION`, one zeroed
    /// SHA-1 digest kept for TPM 1.2 era parsers.
    #[must_use]
    pub fn header_event(&self) -> LogEvent {
        LogEvent {
            pcr_index: 0,
            event_type: EventType::NoAction,
            digests: [(
                HashAlgorithm::Sha1,
                vec![0; HashAlgorithm::Sha1.digest_size()],
            )]
            .into_iter()
            .collect(),
            data: self.spec_id.to_bytes(),
        }
    }

    /// Measurement events in order, excluding the header
    #[must_use]
    pub fn events(&self) -> &[LogEvent] {
        &self.events
    }

    /// Banks announced by the header
    pub fn algorithms(&self) -> Result<AlgorithmSet> {
        self.spec_id.algorithm_set()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(path: &str, digest: u8) -> MeasurementRecord {
        MeasurementRecord {
            path: path.into(),
            payload: format!("file:{path} exist:false").into_bytes(),
            digests: [(HashAlgorithm::Sha256, vec![digest; 32])]
                .into_iter()
                .collect(),
        }
    }

    #[test]
    fn new_log_has_sha1_only_header() {
        let algs = AlgorithmSet::from_algorithms(&[HashAlgorithm::Sha256]).unwrap();
        let log = EventLog::new(&algs);
        assert!(log.events().is_empty());

        let header = log.header_event();
        assert_eq!(header.event_type, EventType::NoAction);
        assert_eq!(header.digests.len(), 1);
        assert_eq!(header.digests.get(HashAlgorithm::Sha1), Some(&[0u8; 20][..]));
        assert_eq!(log.spec_id().digest_sizes.len(), 1);
    }

    #[test]
    fn append_preserves_order_and_nul_terminates() {
        let algs = AlgorithmSet::from_algorithms(&[HashAlgorithm::Sha256]).unwrap();
        let mut log = EventLog::new(&algs);
        log.append(PcrIndex::CONFIG, &record("/config/b", 1));
        log.append(PcrIndex::CONFIG, &record("/config/a", 2));

        let events = log.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].payload(), Some("file:/config/b exist:false"));
        assert_eq!(events[1].payload(), Some("file:/config/a exist:false"));
        assert_eq!(events[0].data.last(), Some(&0));
        assert_eq!(events[0].pcr_index, 14);
        assert_eq!(events[0].event_type, EventType::Ipl);
    }
}
