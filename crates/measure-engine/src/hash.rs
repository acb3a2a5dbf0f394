//! Streaming SHA-256 hashing via `ring::digest`.

use std::fs::File;
use std::io::{self, ErrorKind, Read};
use std::path::Path;

use measure_core::{MeasureError, Result};
use ring::digest::{Context, SHA256};

/// Buffer size for streaming file reads (64 KiB).
const BUF_SIZE: usize = 64 * 1024;

/// Compute SHA-256 of a file in one streaming pass.
///
/// Returns lowercase hex-encoded digest.
///
/// # Errors
///
/// Returns `MeasureError::Io` if the file cannot be opened or read.
pub fn sha256_file(path: &Path) -> Result<String> {
    let file = File::open(path).map_err(|e| MeasureError::io(path, e))?;
    sha256_reader(file).map_err(|e| MeasureError::io(path, e))
}

/// Hash everything `reader` yields, retrying interrupted reads.
fn sha256_reader<R: Read>(mut reader: R) -> io::Result<String> {
    let mut context = Context::new(&SHA256);
    let mut buf = vec![0u8; BUF_SIZE];

    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        context.update(&buf[..n]);
    }

    let digest = context.finish();
    Ok(hex::encode(digest.as_ref()))
}
