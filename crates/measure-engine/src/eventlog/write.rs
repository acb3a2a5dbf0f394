use std::fs;
use std::io::{self, Write};
use std::path::Path;

use measure_core::{MeasureError, Result};
use tempfile::NamedTempFile;
use tracing::debug;

use super::{EventLog, LogEvent};

/// Mode of the written log; other attestation agents read it.
#[cfg(unix)]
const LOG_MODE: u32 = 0o644;

impl EventLog {
    /// Serialize the whole log to `w`.
    pub fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        write_legacy_event(w, &self.header_event())?;
        for event in &self.events {
            write_event2(w, event)?;
        }
        Ok(())
    }

    /// Serialize the whole log into memory.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        // writing into a Vec cannot fail
        let _ = self.write_to(&mut out);
        out
    }

    /// Write the log to `path` so that it either appears complete or not
    /// at all: the bytes go to a temporary file in the same directory,
    /// which is synced and then renamed over `path`. On unix the log ends
    /// up world-readable (mode 0644).
    ///
    /// # Errors
    ///
    /// Returns `MeasureError::Io` if the directory cannot be created or any
    /// write, sync or rename fails. The temporary file is removed on error.
    pub fn write_atomic(&self, path: &Path) -> Result<()> {
        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir).map_err(|e| MeasureError::io(dir, e))?;

        let mut tmp = NamedTempFile::new_in(dir).map_err(|e| MeasureError::io(dir, e))?;
        let written = {
            let mut w = io::BufWriter::new(tmp.as_file_mut());
            self.write_to(&mut w).and_then(|()| w.flush())
        };
        written
            .and_then(|()| set_log_mode(tmp.as_file()))
            .and_then(|()| tmp.as_file().sync_all())
            .map_err(|e| MeasureError::io(tmp.path(), e))?;
        tmp.persist(path)
            .map_err(|e| MeasureError::io(path, e.error))?;

        debug!(path = %path.display(), events = self.events.len(), "event log written");
        Ok(())
    }
}

#[cfg(unix)]
fn set_log_mode(file: &fs::File) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    file.set_permissions(fs::Permissions::from_mode(LOG_MODE))
}

#[cfg(not(unix))]
fn set_log_mode(_file: &fs::File) -> io::Result<()> {
    Ok(())
}

/// `TCG_PCClientPCREvent`: fixed SHA-1 digest, used for the header.
#[allow(clippy::cast_possible_truncation)]
fn write_legacy_event<W: Write>(w: &mut W, event: &LogEvent) -> io::Result<()> {
    w.write_all(&event.pcr_index.to_le_bytes())?;
    w.write_all(&event.event_type.value().to_le_bytes())?;
    for digest in &event.digests {
        w.write_all(&digest.value)?;
    }
    w.write_all(&(event.data.len() as u32).to_le_bytes())?;
    w.write_all(&event.data)
}

/// `TCG_PCR_EVENT2`: crypto-agile digest list.
#[allow(clippy::cast_possible_truncation)]
fn write_event2<W: Write>(w: &mut W, event: &LogEvent) -> io::Result<()> {
    w.write_all(&event.pcr_index.to_le_bytes())?;
    w.write_all(&event.event_type.value().to_le_bytes())?;
    w.write_all(&(event.digests.len() as u32).to_le_bytes())?;
    for digest in &event.digests {
        w.write_all(&digest.algorithm.id().to_le_bytes())?;
        w.write_all(&digest.value)?;
    }
    w.write_all(&(event.data.len() as u32).to_le_bytes())?;
    w.write_all(&event.data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use measure_core::{AlgorithmSet, HashAlgorithm, MeasurementRecord, PcrIndex};

    fn sample_log() -> EventLog {
        let algs =
            AlgorithmSet::from_algorithms(&[HashAlgorithm::Sha1, HashAlgorithm::Sha256]).unwrap();
        let mut log = EventLog::new(&algs);
        log.append(
            PcrIndex::CONFIG,
            &MeasurementRecord {
                path: "/config/x".into(),
                payload: "file:/config/x exist:false".into(),
                digests: [
                    (HashAlgorithm::Sha1, vec![0xaa; 20]),
                    (HashAlgorithm::Sha256, vec![0xbb; 32]),
                ]
                .into_iter()
                .collect(),
            },
        );
        log
    }

    #[test]
    fn header_event_layout() {
        let bytes = sample_log().to_bytes();
        // pcr 0, EV_NO_ACTION, 20 zero bytes
        assert_eq!(&bytes[0..4], &[0, 0, 0, 0]);
        assert_eq!(&bytes[4..8], &[3, 0, 0, 0]);
        assert_eq!(&bytes[8..28], &[0; 20]);
        // Spec ID event with two algorithms is 16 + 4 + 4 + 4 + 8 + 1 bytes
        assert_eq!(&bytes[28..32], &37u32.to_le_bytes());
        assert_eq!(&bytes[32..48], b"Spec ID Event03\0");
    }

    #[test]
    fn measurement_event_layout() {
        let bytes = sample_log().to_bytes();
        let event = &bytes[32 + 37..];
        assert_eq!(&event[0..4], &14u32.to_le_bytes());
        assert_eq!(&event[4..8], &0x0Du32.to_le_bytes());
        assert_eq!(&event[8..12], &2u32.to_le_bytes());
        assert_eq!(&event[12..14], &[0x04, 0x00]);
        assert_eq!(&event[14..34], &[0xaa; 20]);
        assert_eq!(&event[34..36], &[0x0B, 0x00]);
        assert_eq!(&event[36..68], &[0xbb; 32]);

        let payload = b"file:/config/x exist:false\0";
        assert_eq!(&event[68..72], &(payload.len() as u32).to_le_bytes());
        assert_eq!(&event[72..], payload);
    }

    #[test]
    fn atomic_write_creates_directory_and_leaves_no_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("measurefs/tpm_log.bin");
        let log = sample_log();

        log.write_atomic(&path).unwrap();
        assert_eq!(fs::read(&path).unwrap(), log.to_bytes());

        let entries: Vec<_> = fs::read_dir(path.parent().unwrap()).unwrap().collect();
        assert_eq!(entries.len(), 1);

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(&path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o644);
        }
    }

    #[test]
    fn atomic_write_replaces_previous_log() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tpm_log.bin");
        fs::write(&path, b"stale").unwrap();

        sample_log().write_atomic(&path).unwrap();
        assert_eq!(fs::read(&path).unwrap(), sample_log().to_bytes());
    }

    #[test]
    fn atomic_write_fails_when_directory_is_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, b"").unwrap();

        let err = sample_log()
            .write_atomic(&blocker.join("tpm_log.bin"))
            .unwrap_err();
        assert!(matches!(err, MeasureError::Io { .. }));
    }
}
