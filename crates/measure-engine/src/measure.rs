//! Measurement of single inventory entries into the PCR.

use measure_core::{
    AlgorithmSet, DigestMap, Inventory, InventoryEntry, MeasureError, MeasurementRecord, Observation,
    PcrIndex, Result,
};
use measure_tpm::{Tpm, MAX_EVENT_SIZE};
use tracing::{debug, info};

use crate::hash::sha256_file;

/// Decide what is recorded for `entry`, hashing its content if required.
///
/// # Errors
///
/// Returns `MeasureError::Io` if a content-measured file cannot be read.
/// The hash is never skipped.
pub fn observe(entry: &InventoryEntry) -> Result<Observation> {
    if entry.exists && entry.measure_content {
        Ok(Observation::Content(sha256_file(&entry.path)?))
    } else {
        Ok(Observation::Presence(entry.exists))
    }
}

/// Split a payload into extend-sized pieces, in order.
///
/// # Panics
///
/// Panics if `max_event_size` is zero.
pub fn chunks(payload: &[u8], max_event_size: usize) -> std::slice::Chunks<'_, u8> {
    payload.chunks(max_event_size)
}

/// Drives the extend/read-back protocol for one PCR.
pub struct Measurer<'a, T: ?Sized> {
    tpm: &'a mut T,
    pcr: PcrIndex,
    algorithms: &'a AlgorithmSet,
    max_event_size: usize,
}

impl<'a, T: Tpm + ?Sized> Measurer<'a, T> {
    /// Measurer extending `pcr` and reading back every bank in `algorithms`.
    pub fn new(tpm: &'a mut T, pcr: PcrIndex, algorithms: &'a AlgorithmSet) -> Self {
        Self {
            tpm,
            pcr,
            algorithms,
            max_event_size: MAX_EVENT_SIZE,
        }
    }

    /// Use a smaller chunk size than the hardware limit.
    ///
    /// # Errors
    ///
    /// Returns `MeasureError::Config` unless `size` is in `1..=MAX_EVENT_SIZE`.
    pub fn with_max_event_size(mut self, size: usize) -> Result<Self> {
        if size == 0 || size > MAX_EVENT_SIZE {
            return Err(MeasureError::Config(format!(
                "max event size {size} not in 1..={MAX_EVENT_SIZE}"
            )));
        }
        self.max_event_size = size;
        Ok(self)
    }

    /// Extend the PCR with the canonical payload of `entry` and read back the
    /// new value of every bank.
    ///
    /// Any error names the path; the PCR may already have been extended by
    /// some of the chunks when it is returned.
    pub fn measure(&mut self, entry: &InventoryEntry) -> Result<MeasurementRecord> {
        self.measure_entry(entry)
            .map_err(|e| e.for_path(entry.path.display().to_string()))
    }

    /// Measure every entry of `inventory` in lexicographic path order.
    ///
    /// Stops at the first failure; records measured before it are dropped
    /// along with the error.
    pub fn measure_all(&mut self, inventory: &Inventory) -> Result<Vec<MeasurementRecord>> {
        inventory
            .sorted_entries()
            .into_iter()
            .map(|entry| self.measure(entry))
            .collect()
    }

    fn measure_entry(&mut self, entry: &InventoryEntry) -> Result<MeasurementRecord> {
        let payload = observe(entry)?.payload(entry.path_bytes());

        // TPM2_PCR_Event takes at most MAX_EVENT_SIZE bytes
        for (i, chunk) in chunks(&payload, self.max_event_size).enumerate() {
            debug!(path = %entry.path.display(), chunk = i, len = chunk.len(), "extending PCR");
            self.tpm.extend(self.pcr, chunk)?;
        }

        let digests = self.read_back()?;
        let text = String::from_utf8_lossy(&payload);
        for digest in &digests {
            info!(
                "{} pcr: {} {} {}",
                text,
                self.pcr,
                digest.algorithm,
                hex::encode(&digest.value)
            );
        }

        Ok(MeasurementRecord {
            path: entry.path.clone(),
            payload,
            digests,
        })
    }

    fn read_back(&mut self) -> Result<DigestMap> {
        let mut digests = DigestMap::new();
        for bank in self.algorithms.banks() {
            let value = self.tpm.read_pcr(self.pcr, bank.algorithm)?;
            if value.len() != usize::from(bank.digest_size) {
                return Err(MeasureError::Capability(format!(
                    "{} PCR {} read back {} bytes",
                    bank.algorithm,
                    self.pcr,
                    value.len()
                )));
            }
            digests.insert(bank.algorithm, value);
        }
        Ok(digests)
    }
}
