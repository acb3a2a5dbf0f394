//! `TCG_EfiSpecIdEvent`, the payload of the log's header event.

use measure_core::{AlgorithmSet, HashAlgorithm, MeasureError, PcrBank, Result};
use serde::Serialize;

use super::reader::LogReader;

/// Signature identifying a crypto-agile log
pub const SPEC_ID_SIGNATURE: &[u8; 16] = b"Spec ID Event03\0";

/// `uintnSize` value for UINT64, the value log consumers expect
pub const UINTN_SIZE_U64: u8 = 2;

/// One `(algorithmId, digestSize)` pair of the header manifest
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AlgorithmSize {
    /// `TPM_ALG_ID`
    pub algorithm_id: u16,
    /// Digest size in bytes
    pub digest_size: u16,
}

/// Header event payload announcing the banks present in the log
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SpecIdEvent {
    /// Platform class (0 = client)
    pub platform_class: u32,
    /// Spec version minor number
    pub spec_version_minor: u8,
    /// Spec version major number
    pub spec_version_major: u8,
    /// Spec errata
    pub spec_errata: u8,
    /// Size class of UINTN fields
    pub uintn_size: u8,
    /// Algorithms and their digest sizes, in bank discovery order
    pub digest_sizes: Vec<AlgorithmSize>,
    /// Vendor-defined bytes
    pub vendor_info: Vec<u8>,
}

impl SpecIdEvent {
    /// Manifest for the given active banks.
    #[must_use]
    pub fn for_algorithms(algorithms: &AlgorithmSet) -> Self {
        Self {
            platform_class: 0,
            spec_version_minor: 0,
            spec_version_major: 2,
            spec_errata: 0,
            uintn_size: UINTN_SIZE_U64,
            digest_sizes: algorithms
                .banks()
                .iter()
                .map(|b| AlgorithmSize {
                    algorithm_id: b.algorithm.id(),
                    digest_size: b.digest_size,
                })
                .collect(),
            vendor_info: Vec::new(),
        }
    }

    /// Digest size announced for `algorithm_id`
    #[must_use]
    pub fn digest_size(&self, algorithm_id: u16) -> Option<u16> {
        self.digest_sizes
            .iter()
            .find(|s| s.algorithm_id == algorithm_id)
            .map(|s| s.digest_size)
    }

    /// The banks announced by the header.
    ///
    /// # Errors
    ///
    /// Fails for unknown algorithm ids or inconsistent sizes.
    pub fn algorithm_set(&self) -> Result<AlgorithmSet> {
        let banks = self
            .digest_sizes
            .iter()
            .map(|s| {
                let algorithm = HashAlgorithm::from_id(s.algorithm_id)
                    .ok_or(MeasureError::UnsupportedAlgorithm(s.algorithm_id))?;
                Ok(PcrBank {
                    algorithm,
                    digest_size: s.digest_size,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        AlgorithmSet::from_banks(banks)
    }

    /// Little-endian wire encoding.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(33 + 4 * self.digest_sizes.len());
        out.extend_from_slice(SPEC_ID_SIGNATURE);
        out.extend_from_slice(&self.platform_class.to_le_bytes());
        out.push(self.spec_version_minor);
        out.push(self.spec_version_major);
        out.push(self.spec_errata);
        out.push(self.uintn_size);
        out.extend_from_slice(&(self.digest_sizes.len() as u32).to_le_bytes());
        for size in &self.digest_sizes {
            out.extend_from_slice(&size.algorithm_id.to_le_bytes());
            out.extend_from_slice(&size.digest_size.to_le_bytes());
        }
        out.push(self.vendor_info.len() as u8);
        out.extend_from_slice(&self.vendor_info);
        out
    }

    /// Decode the header event payload.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let mut reader = LogReader::new(data);
        if reader.read_bytes(16)? != SPEC_ID_SIGNATURE {
            return Err(MeasureError::LogFormat(
                "header event is not a Spec ID Event03".into(),
            ));
        }
        let platform_class = reader.read_u32()?;
        let spec_version_minor = reader.read_u8()?;
        let spec_version_major = reader.read_u8()?;
        let spec_errata = reader.read_u8()?;
        let uintn_size = reader.read_u8()?;

        let count = reader.read_u32()?;
        let mut digest_sizes = Vec::new();
        for _ in 0..count {
            digest_sizes.push(AlgorithmSize {
                algorithm_id: reader.read_u16()?,
                digest_size: reader.read_u16()?,
            });
        }
        let vendor_size = reader.read_u8()?;
        let vendor_info = reader.read_bytes(usize::from(vendor_size))?.to_vec();
        if !reader.is_empty() {
            return Err(MeasureError::LogFormat(
                "trailing bytes after Spec ID event".into(),
            ));
        }

        Ok(Self {
            platform_class,
            spec_version_minor,
            spec_version_major,
            spec_errata,
            uintn_size,
            digest_sizes,
            vendor_info,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_manifest() {
        let algs =
            AlgorithmSet::from_algorithms(&[HashAlgorithm::Sha1, HashAlgorithm::Sha256]).unwrap();
        let bytes = SpecIdEvent::for_algorithms(&algs).to_bytes();

        let expected: Vec<u8> = [
            &b"Spec ID Event03\0"[..],
            &[0, 0, 0, 0],
            &[0, 2, 0, 2],
            &[2, 0, 0, 0],
            &[0x04, 0x00, 20, 0],
            &[0x0B, 0x00, 32, 0],
            &[0],
        ]
        .concat();
        assert_eq!(bytes, expected);
    }

    #[test]
    fn parses_what_it_writes() {
        let algs = AlgorithmSet::from_algorithms(&[HashAlgorithm::Sha384]).unwrap();
        let event = SpecIdEvent::for_algorithms(&algs);
        let parsed = SpecIdEvent::parse(&event.to_bytes()).unwrap();
        assert_eq!(parsed, event);
        assert_eq!(parsed.algorithm_set().unwrap(), algs);
        assert_eq!(parsed.digest_size(0x000C), Some(48));
    }

    #[test]
    fn rejects_wrong_signature() {
        let mut bytes = SpecIdEvent::for_algorithms(
            &AlgorithmSet::from_algorithms(&[HashAlgorithm::Sha1]).unwrap(),
        )
        .to_bytes();
        bytes[14] = b'2';
        assert!(matches!(
            SpecIdEvent::parse(&bytes),
            Err(MeasureError::LogFormat(_))
        ));
    }
}
