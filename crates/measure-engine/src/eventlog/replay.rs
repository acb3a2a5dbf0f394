//! Recompute PCR values from a log's payloads.

use measure_core::{DigestMap, MeasureError, Result};
use tracing::debug;

use super::{EventLog, EventType};
use crate::measure::chunks;

/// Replay every measurement event of `log` from an all-zero PCR.
///
/// Each payload is split exactly as it was extended (`max_event_size`
/// bytes per chunk) and every chunk is folded into each bank announced by
/// the header. After each event the running value must equal the digest
/// the event recorded.
///
/// Returns the final value per bank, which must match the live PCR of the
/// device that wrote the log.
///
/// # Errors
///
/// - `MeasureError::ReplayMismatch` at the first event whose recorded
///   digest differs from the recomputed one
/// - `MeasureError::LogFormat` if an event lacks a bank's digest or events
///   target more than one PCR
/// - `MeasureError::UnsupportedAlgorithm` for banks that cannot be hashed
///   in software
pub fn replay(log: &EventLog, max_event_size: usize) -> Result<DigestMap> {
    if max_event_size == 0 {
        return Err(MeasureError::Config("max event size must be non-zero".into()));
    }
    let algorithms = log.algorithms()?;

    let mut pcrs: DigestMap = algorithms
        .banks()
        .iter()
        .map(|b| (b.algorithm, vec![0; usize::from(b.digest_size)]))
        .collect();
    let mut pcr_index = None;

    for (i, event) in log.events().iter().enumerate() {
        // header is event 0
        let number = i + 1;
        if event.event_type == EventType::NoAction {
            continue;
        }
        match pcr_index {
            None => pcr_index = Some(event.pcr_index),
            Some(p) if p != event.pcr_index => {
                return Err(MeasureError::LogFormat(format!(
                    "event {number} targets PCR {} but earlier events target PCR {p}",
                    event.pcr_index
                )));
            }
            Some(_) => {}
        }

        for chunk in chunks(event.payload_bytes(), max_event_size) {
            for bank in algorithms.banks() {
                let current = pcrs.get(bank.algorithm).unwrap_or_default();
                let next = bank
                    .algorithm
                    .extend(current, &bank.algorithm.digest(chunk)?)?;
                pcrs.insert(bank.algorithm, next);
            }
        }

        for bank in algorithms.banks() {
            let computed = pcrs.get(bank.algorithm).unwrap_or_default();
            let recorded = event.digests.get(bank.algorithm).ok_or_else(|| {
                MeasureError::LogFormat(format!(
                    "event {number} has no {} digest",
                    bank.algorithm
                ))
            })?;
            if recorded != computed {
                return Err(MeasureError::ReplayMismatch {
                    event: number,
                    algorithm: bank.algorithm.to_string(),
                    expected: hex::encode(recorded),
                    actual: hex::encode(computed),
                });
            }
        }
        debug!(event = number, "replayed");
    }

    Ok(pcrs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use measure_core::{
        AlgorithmSet, HashAlgorithm, InventoryEntry, MeasurementRecord, PcrIndex,
    };
    use measure_tpm::{SimulatedTpm, Tpm};

    use crate::measure::Measurer;

    const ALGS: [HashAlgorithm; 2] = [HashAlgorithm::Sha1, HashAlgorithm::Sha256];

    fn measured_log(paths: &[&str], max: usize) -> (EventLog, SimulatedTpm) {
        let set = AlgorithmSet::from_algorithms(&ALGS).unwrap();
        let mut tpm = SimulatedTpm::new(&ALGS).unwrap();
        let mut log = EventLog::new(&set);
        for path in paths {
            let record = Measurer::new(&mut tpm, PcrIndex::CONFIG, &set)
                .with_max_event_size(max)
                .unwrap()
                .measure(&InventoryEntry::absent(*path))
                .unwrap();
            log.append(PcrIndex::CONFIG, &record);
        }
        (log, tpm)
    }

    #[test]
    fn replay_matches_simulated_pcr() {
        let (log, mut tpm) = measured_log(&["/config/a", "/config/b"], 1024);
        let parsed = EventLog::parse(&log.to_bytes()).unwrap();
        let replayed = replay(&parsed, 1024).unwrap();

        for alg in ALGS {
            assert_eq!(
                replayed.get(alg).unwrap(),
                tpm.read_pcr(PcrIndex::CONFIG, alg).unwrap().as_slice()
            );
        }
    }

    #[test]
    fn replay_uses_same_chunking() {
        let (log, tpm) = measured_log(&["/config/chunked-path"], 7);
        let replayed = replay(&log, 7).unwrap();
        assert_eq!(
            replayed.get(HashAlgorithm::Sha256).unwrap(),
            tpm.pcr_value(PcrIndex::CONFIG, HashAlgorithm::Sha256)
        );
        assert!(matches!(
            replay(&log, 1024),
            Err(MeasureError::ReplayMismatch { event: 1, .. })
        ));
    }

    #[test]
    fn empty_log_replays_to_zero() {
        let set = AlgorithmSet::from_algorithms(&[HashAlgorithm::Sha256]).unwrap();
        let replayed = replay(&EventLog::new(&set), 1024).unwrap();
        assert_eq!(replayed.get(HashAlgorithm::Sha256), Some(&[0u8; 32][..]));
    }

    #[test]
    fn tampered_digest_names_event_and_bank() {
        let (log, _) = measured_log(&["/config/a", "/config/b"], 1024);
        let mut bytes = log.to_bytes();
        // last byte before the second event's payload size is its final sha256 byte
        let payload = b"file:/config/b exist:false\0";
        let at = bytes.len() - payload.len() - 4 - 1;
        bytes[at] ^= 0xff;

        let err = replay(&EventLog::parse(&bytes).unwrap(), 1024).unwrap_err();
        match err {
            MeasureError::ReplayMismatch {
                event, algorithm, ..
            } => {
                assert_eq!(event, 2);
                assert_eq!(algorithm, "sha256");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn mixed_pcr_indices_are_rejected() {
        let (mut log, _) = measured_log(&["/config/a"], 1024);
        let record = MeasurementRecord {
            path: "/config/b".into(),
            payload: "file:/config/b exist:false".into(),
            digests: DigestMap::new(),
        };
        log.append(PcrIndex::new(13).unwrap(), &record);
        assert!(matches!(
            replay(&log, 1024),
            Err(MeasureError::LogFormat(ref m)) if m.contains("PCR 13")
        ));
    }
}
