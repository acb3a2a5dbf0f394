use serde::{Deserialize, Serialize};

use super::algorithm::HashAlgorithm;

/// A digest tagged with the algorithm that produced it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Digest {
    /// Algorithm of the digest
    pub algorithm: HashAlgorithm,
    /// Raw digest bytes (hex in serialized form)
    #[serde(with = "hex")]
    pub value: Vec<u8>,
}

/// Small ordered association from algorithm to digest bytes.
///
/// Insertion order is preserved so the digests of every event follow the
/// bank discovery order, matching the header manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DigestMap {
    entries: Vec<Digest>,
}

impl DigestMap {
    /// Empty map
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Set the digest for `algorithm`, replacing an earlier value in place.
    pub fn insert(&mut self, algorithm: HashAlgorithm, value: Vec<u8>) {
        if let Some(existing) = self.entries.iter_mut().find(|d| d.algorithm == algorithm) {
            existing.value = value;
        } else {
            self.entries.push(Digest { algorithm, value });
        }
    }

    /// Digest recorded for `algorithm`
    #[must_use]
    pub fn get(&self, algorithm: HashAlgorithm) -> Option<&[u8]> {
        self.entries
            .iter()
            .find(|d| d.algorithm == algorithm)
            .map(|d| d.value.as_slice())
    }

    /// Digests in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &Digest> {
        self.entries.iter()
    }

    /// Number of digests
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no digest has been recorded
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(HashAlgorithm, Vec<u8>)> for DigestMap {
    fn from_iter<I: IntoIterator<Item = (HashAlgorithm, Vec<u8>)>>(iter: I) -> Self {
        let mut map = Self::new();
        for (algorithm, value) in iter {
            map.insert(algorithm, value);
        }
        map
    }
}

impl<'a> IntoIterator for &'a DigestMap {
    type Item = &'a Digest;
    type IntoIter = std::slice::Iter<'a, Digest>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
