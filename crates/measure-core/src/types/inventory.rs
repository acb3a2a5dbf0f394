use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// One file of interest in the configuration directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InventoryEntry {
    /// Absolute path, the unique key of the entry. Not necessarily UTF-8.
    pub path: PathBuf,
    /// Whether the file is present on this device
    pub exists: bool,
    /// Whether the file content goes into the measurement. False for
    /// device-unique files and for every absent file.
    pub measure_content: bool,
}

impl InventoryEntry {
    /// Entry for a file found on disk
    #[must_use]
    pub fn present(path: impl Into<PathBuf>, measure_content: bool) -> Self {
        Self {
            path: path.into(),
            exists: true,
            measure_content,
        }
    }

    /// Entry recording that a policy-listed file is missing
    #[must_use]
    pub fn absent(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            exists: false,
            measure_content: false,
        }
    }

    /// Raw bytes of the path as the filesystem stores them
    #[must_use]
    pub fn path_bytes(&self) -> &[u8] {
        self.path.as_os_str().as_encoded_bytes()
    }
}

/// The set of files of interest for one run, keyed by path.
///
/// The map itself is unordered; [`Inventory::sorted_entries`] is the only
/// way to iterate it for measurement.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Inventory {
    entries: HashMap<PathBuf, InventoryEntry>,
}

impl Inventory {
    /// Empty inventory
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an entry.
    pub fn insert(&mut self, entry: InventoryEntry) {
        self.entries.insert(entry.path.clone(), entry);
    }

    /// Record `path` as absent unless the walk already found it.
    ///
    /// Returns true if a new entry was added.
    pub fn insert_absent(&mut self, path: impl AsRef<Path>) -> bool {
        let path = path.as_ref();
        if self.entries.contains_key(path) {
            return false;
        }
        self.insert(InventoryEntry::absent(path));
        true
    }

    /// Entry for `path`
    #[must_use]
    pub fn get(&self, path: impl AsRef<Path>) -> Option<&InventoryEntry> {
        self.entries.get(path.as_ref())
    }

    /// Number of entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if there are no entries
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries sorted by path in byte-wise lexicographic order.
    ///
    /// This order is the extension order and the event log order.
    #[must_use]
    pub fn sorted_entries(&self) -> Vec<&InventoryEntry> {
        let mut entries: Vec<&InventoryEntry> = self.entries.values().collect();
        entries.sort_unstable_by(|a, b| a.path_bytes().cmp(b.path_bytes()));
        entries
    }
}

impl FromIterator<InventoryEntry> for Inventory {
    fn from_iter<I: IntoIterator<Item = InventoryEntry>>(iter: I) -> Self {
        let mut inventory = Self::new();
        for entry in iter {
            inventory.insert(entry);
        }
        inventory
    }
}
