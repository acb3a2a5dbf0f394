use measure_core::{HashAlgorithm, MeasureError, PcrBank, PcrIndex, Result};

/// Largest event `TPM2_PCR_Event` accepts (`TPM2B_EVENT` buffer size).
pub const MAX_EVENT_SIZE: usize = 1024;

/// PCR operations the measurement engine needs from a TPM.
///
/// Calls are strictly serial; an extend cannot be undone, so callers must
/// stop at the first error.
pub trait Tpm {
    /// Banks with at least one allocated PCR, in the order the TPM reports
    /// them.
    fn allocated_banks(&mut self) -> Result<Vec<PcrBank>>;

    /// Hash `data` under every allocated bank and extend `pcr` in each.
    ///
    /// `data` must not exceed [`MAX_EVENT_SIZE`].
    fn extend(&mut self, pcr: PcrIndex, data: &[u8]) -> Result<()>;

    /// Current value of `pcr` in the `algorithm` bank.
    fn read_pcr(&mut self, pcr: PcrIndex, algorithm: HashAlgorithm) -> Result<Vec<u8>>;
}

impl<T: Tpm + ?Sized> Tpm for &mut T {
    fn allocated_banks(&mut self) -> Result<Vec<PcrBank>> {
        (**self).allocated_banks()
    }

    fn extend(&mut self, pcr: PcrIndex, data: &[u8]) -> Result<()> {
        (**self).extend(pcr, data)
    }

    fn read_pcr(&mut self, pcr: PcrIndex, algorithm: HashAlgorithm) -> Result<Vec<u8>> {
        (**self).read_pcr(pcr, algorithm)
    }
}

impl<T: Tpm + ?Sized> Tpm for Box<T> {
    fn allocated_banks(&mut self) -> Result<Vec<PcrBank>> {
        (**self).allocated_banks()
    }

    fn extend(&mut self, pcr: PcrIndex, data: &[u8]) -> Result<()> {
        (**self).extend(pcr, data)
    }

    fn read_pcr(&mut self, pcr: PcrIndex, algorithm: HashAlgorithm) -> Result<Vec<u8>> {
        (**self).read_pcr(pcr, algorithm)
    }
}

/// Reject event data the TPM would refuse.
pub fn check_event_size(data: &[u8]) -> Result<()> {
    if data.len() > MAX_EVENT_SIZE {
        return Err(MeasureError::EventTooLarge {
            size: data.len(),
            max: MAX_EVENT_SIZE,
        });
    }
    Ok(())
}
