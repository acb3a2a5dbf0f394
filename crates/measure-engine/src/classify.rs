//! File classification -- walk the configuration directory and build the
//! inventory.

use std::path::Path;

use measure_core::{Inventory, InventoryEntry, MeasureError, MeasurePolicy, Result};
use tracing::debug;
use walkdir::WalkDir;

/// Build the inventory of files of interest under `root`.
///
/// Every non-directory entry found by the walk is recorded as present;
/// symlinks are not followed. Afterwards every path named by the policy
/// that the walk did not find is recorded as absent, so the set of paths
/// is the same on every device.
///
/// The returned inventory is unordered; measurement sorts it.
///
/// # Errors
///
/// Returns `MeasureError::Io` if any part of the tree cannot be read. File
/// names are kept as raw bytes, so a name that is not UTF-8 is recorded
/// like any other.
pub fn classify(root: &Path, policy: &MeasurePolicy) -> Result<Inventory> {
    let mut inventory = Inventory::new();

    for entry in WalkDir::new(root).follow_links(false) {
        let entry = entry.map_err(|e| walk_error(root, e))?;
        if entry.file_type().is_dir() {
            continue;
        }

        let path = entry.path();
        // excluded files still get their presence measured
        let measure_content = !policy.excludes_content(path);
        debug!(path = %path.display(), measure_content, "found file");
        inventory.insert(InventoryEntry::present(path, measure_content));
    }

    for path in policy.listed_paths() {
        if inventory.insert_absent(path) {
            debug!(path, "policy file absent");
        }
    }

    Ok(inventory)
}

fn walk_error(root: &Path, err: walkdir::Error) -> MeasureError {
    let path = err.path().unwrap_or(root).to_path_buf();
    let source = err.into_io_error().unwrap_or_else(|| {
        std::io::Error::new(std::io::ErrorKind::Other, "filesystem loop detected")
    });
    MeasureError::io(path, source)
}
