use ring::digest::{Context, SHA1_FOR_LEGACY_USE_ONLY, SHA256, SHA384, SHA512};
use serde::{Deserialize, Serialize};

use crate::error::{MeasureError, Result};

/// Hash algorithm backing a PCR bank, identified by its TCG `TPM_ALG_ID`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    /// SHA-1, kept for TPM 1.2 compatibility
    Sha1,
    /// SHA-256
    Sha256,
    /// SHA-384
    Sha384,
    /// SHA-512
    Sha512,
    /// SM3 with 256-bit output
    #[serde(rename = "sm3_256")]
    Sm3_256,
}

impl HashAlgorithm {
    /// Returns the `TPM_ALG_ID` of the algorithm
    #[must_use]
    pub const fn id(self) -> u16 {
        match self {
            Self::Sha1 => 0x0004,
            Self::Sha256 => 0x000B,
            Self::Sha384 => 0x000C,
            Self::Sha512 => 0x000D,
            Self::Sm3_256 => 0x0012,
        }
    }

    /// Looks up an algorithm by `TPM_ALG_ID`
    #[must_use]
    pub const fn from_id(id: u16) -> Option<Self> {
        match id {
            0x0004 => Some(Self::Sha1),
            0x000B => Some(Self::Sha256),
            0x000C => Some(Self::Sha384),
            0x000D => Some(Self::Sha512),
            0x0012 => Some(Self::Sm3_256),
            _ => None,
        }
    }

    /// Returns the digest size in bytes
    #[must_use]
    pub const fn digest_size(self) -> usize {
        match self {
            Self::Sha1 => 20,
            Self::Sha256 | Self::Sm3_256 => 32,
            Self::Sha384 => 48,
            Self::Sha512 => 64,
        }
    }

    fn context(self) -> Result<Context> {
        let algorithm = match self {
            Self::Sha1 => &SHA1_FOR_LEGACY_USE_ONLY,
            Self::Sha256 => &SHA256,
            Self::Sha384 => &SHA384,
            Self::Sha512 => &SHA512,
            Self::Sm3_256 => return Err(MeasureError::UnsupportedAlgorithm(self.id())),
        };
        Ok(Context::new(algorithm))
    }

    /// Hashes `data` in software.
    ///
    /// SM3 is not available and yields [`MeasureError::UnsupportedAlgorithm`].
    pub fn digest(self, data: &[u8]) -> Result<Vec<u8>> {
        let mut ctx = self.context()?;
        ctx.update(data);
        Ok(ctx.finish().as_ref().to_vec())
    }

    /// Computes `H(current || digest)`, the value a PCR takes after an extend.
    pub fn extend(self, current: &[u8], digest: &[u8]) -> Result<Vec<u8>> {
        let mut ctx = self.context()?;
        ctx.update(current);
        ctx.update(digest);
        Ok(ctx.finish().as_ref().to_vec())
    }
}

impl std::fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sha1 => write!(f, "sha1"),
            Self::Sha256 => write!(f, "sha256"),
            Self::Sha384 => write!(f, "sha384"),
            Self::Sha512 => write!(f, "sha512"),
            Self::Sm3_256 => write!(f, "sm3_256"),
        }
    }
}

/// One allocated PCR bank as reported by the TPM
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PcrBank {
    /// Hash algorithm of the bank
    pub algorithm: HashAlgorithm,
    /// Digest size in bytes
    pub digest_size: u16,
}

impl PcrBank {
    /// Bank for `algorithm` with its natural digest size
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn new(algorithm: HashAlgorithm) -> Self {
        Self {
            algorithm,
            digest_size: algorithm.digest_size() as u16,
        }
    }
}

/// The ordered list of active PCR banks for one run.
///
/// Discovered once from the TPM and never modified afterwards. Its order
/// drives both the header manifest of the event log and the order of the
/// digests attached to every event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlgorithmSet {
    banks: Vec<PcrBank>,
}

impl AlgorithmSet {
    /// Build the set from banks in discovery order.
    ///
    /// # Errors
    ///
    /// Returns [`MeasureError::NoActiveBanks`] for an empty list and
    /// [`MeasureError::Capability`] for duplicate algorithms or a digest
    /// size that does not match the algorithm.
    pub fn from_banks(banks: Vec<PcrBank>) -> Result<Self> {
        if banks.is_empty() {
            return Err(MeasureError::NoActiveBanks);
        }
        for (i, bank) in banks.iter().enumerate() {
            if usize::from(bank.digest_size) != bank.algorithm.digest_size() {
                return Err(MeasureError::Capability(format!(
                    "{} bank reports digest size {}",
                    bank.algorithm, bank.digest_size
                )));
            }
            if banks[..i].iter().any(|b| b.algorithm == bank.algorithm) {
                return Err(MeasureError::Capability(format!(
                    "{} bank reported twice",
                    bank.algorithm
                )));
            }
        }
        Ok(Self { banks })
    }

    /// Build the set from algorithms, using their natural digest sizes.
    pub fn from_algorithms(algorithms: &[HashAlgorithm]) -> Result<Self> {
        Self::from_banks(algorithms.iter().copied().map(PcrBank::new).collect())
    }

    /// Banks in discovery order
    #[must_use]
    pub fn banks(&self) -> &[PcrBank] {
        &self.banks
    }

    /// Algorithms in discovery order
    pub fn algorithms(&self) -> impl Iterator<Item = HashAlgorithm> + '_ {
        self.banks.iter().map(|b| b.algorithm)
    }

    /// Returns true if `algorithm` has an active bank
    #[must_use]
    pub fn contains(&self, algorithm: HashAlgorithm) -> bool {
        self.banks.iter().any(|b| b.algorithm == algorithm)
    }

    /// Number of active banks
    #[must_use]
    pub fn len(&self) -> usize {
        self.banks.len()
    }

    /// Always false for a constructed set
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.banks.is_empty()
    }
}

/// Index of a Platform Configuration Register
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct PcrIndex(u32);

impl PcrIndex {
    /// Number of PCRs in a TPM 2.0 PC client bank
    pub const COUNT: u32 = 24;

    /// PCR holding the configuration partition measurement
    pub const CONFIG: Self = Self(14);

    /// Validated constructor
    pub fn new(index: u32) -> Result<Self> {
        if index < Self::COUNT {
            Ok(Self(index))
        } else {
            Err(MeasureError::Config(format!(
                "PCR index {index} out of range 0..{}",
                Self::COUNT
            )))
        }
    }

    /// Register number
    #[must_use]
    pub const fn value(self) -> u32 {
        self.0
    }

    /// The `TPMI_DH_PCR` handle of this register (PCR handles start at zero)
    #[must_use]
    pub const fn handle(self) -> u32 {
        self.0
    }
}

impl TryFrom<u32> for PcrIndex {
    type Error = MeasureError;

    fn try_from(value: u32) -> Result<Self> {
        Self::new(value)
    }
}

impl From<PcrIndex> for u32 {
    fn from(index: PcrIndex) -> Self {
        index.0
    }
}

impl std::fmt::Display for PcrIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
