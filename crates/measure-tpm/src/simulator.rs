use std::collections::HashMap;

use measure_core::{HashAlgorithm, MeasureError, PcrBank, PcrIndex, Result};

use crate::driver::{check_event_size, Tpm};

/// `TPM_RC_FAILURE`, returned for injected failures
const TPM_RC_FAILURE: u32 = 0x0000_0101;

/// One `extend` call seen by the simulator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtendCall {
    /// Register extended
    pub pcr: PcrIndex,
    /// Event data passed in
    pub data: Vec<u8>,
}

/// Deterministic in-memory TPM.
///
/// All registers start at zero. `extend` follows `TPM2_PCR_Event`: the data
/// is hashed under every allocated bank and each bank is extended with its
/// own digest.
#[derive(Debug, Clone)]
pub struct SimulatedTpm {
    banks: Vec<(HashAlgorithm, bool)>,
    pcrs: HashMap<(PcrIndex, HashAlgorithm), Vec<u8>>,
    extends: Vec<ExtendCall>,
    fail_extend_after: Option<usize>,
    fail_reads: bool,
}

impl SimulatedTpm {
    /// Simulator with the given banks allocated, in this order.
    ///
    /// # Errors
    ///
    /// Returns [`MeasureError::UnsupportedAlgorithm`] for a bank whose hash
    /// cannot be computed in software.
    pub fn new(algorithms: &[HashAlgorithm]) -> Result<Self> {
        for alg in algorithms {
            alg.digest(&[])?;
        }
        Ok(Self {
            banks: algorithms.iter().map(|a| (*a, true)).collect(),
            pcrs: HashMap::new(),
            extends: Vec::new(),
            fail_extend_after: None,
            fail_reads: false,
        })
    }

    /// Add a bank that exists but has no PCR allocated.
    #[must_use]
    pub fn with_empty_bank(mut self, algorithm: HashAlgorithm) -> Self {
        self.banks.push((algorithm, false));
        self
    }

    /// Make every extend after the first `count` fail.
    #[must_use]
    pub const fn fail_extend_after(mut self, count: usize) -> Self {
        self.fail_extend_after = Some(count);
        self
    }

    /// Make every PCR read fail.
    #[must_use]
    pub const fn fail_reads(mut self) -> Self {
        self.fail_reads = true;
        self
    }

    /// Every successful extend, in call order
    #[must_use]
    pub fn extend_calls(&self) -> &[ExtendCall] {
        &self.extends
    }

    /// Current value of `pcr` in the `algorithm` bank (zero if untouched).
    #[must_use]
    pub fn pcr_value(&self, pcr: PcrIndex, algorithm: HashAlgorithm) -> Vec<u8> {
        self.pcrs
            .get(&(pcr, algorithm))
            .cloned()
            .unwrap_or_else(|| vec![0; algorithm.digest_size()])
    }

    fn allocated(&self) -> impl Iterator<Item = HashAlgorithm> + '_ {
        self.banks
            .iter()
            .filter(|(_, allocated)| *allocated)
            .map(|(alg, _)| *alg)
    }
}

impl Tpm for SimulatedTpm {
    fn allocated_banks(&mut self) -> Result<Vec<PcrBank>> {
        Ok(self.allocated().map(PcrBank::new).collect())
    }

    fn extend(&mut self, pcr: PcrIndex, data: &[u8]) -> Result<()> {
        check_event_size(data)?;
        if self
            .fail_extend_after
            .is_some_and(|limit| self.extends.len() >= limit)
        {
            return Err(MeasureError::TpmResponse {
                command: "TPM2_PCR_Event",
                code: TPM_RC_FAILURE,
            });
        }

        let algorithms: Vec<HashAlgorithm> = self.allocated().collect();
        for alg in algorithms {
            let digest = alg.digest(data)?;
            let current = self.pcr_value(pcr, alg);
            self.pcrs.insert((pcr, alg), alg.extend(&current, &digest)?);
        }
        self.extends.push(ExtendCall {
            pcr,
            data: data.to_vec(),
        });
        Ok(())
    }

    fn read_pcr(&mut self, pcr: PcrIndex, algorithm: HashAlgorithm) -> Result<Vec<u8>> {
        if self.fail_reads {
            return Err(MeasureError::TpmResponse {
                command: "TPM2_PCR_Read",
                code: TPM_RC_FAILURE,
            });
        }
        if !self.allocated().any(|a| a == algorithm) {
            return Err(MeasureError::Capability(format!(
                "no {algorithm} bank allocated"
            )));
        }
        Ok(self.pcr_value(pcr, algorithm))
    }
}
