use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Read, Write};
use std::path::Path;

use measure_core::{HashAlgorithm, MeasureError, PcrBank, PcrIndex, Result};
use tracing::debug;

use crate::command::{self, MAX_RESPONSE_SIZE};
use crate::driver::{check_event_size, Tpm};

/// Sends one marshalled command and returns the raw response.
pub trait Transport {
    /// Exchange one command/response pair with the TPM.
    fn transmit(&mut self, command: &[u8]) -> Result<Vec<u8>>;
}

/// Transport over a TPM character device such as `/dev/tpmrm0`.
///
/// The device is closed when the value is dropped.
#[derive(Debug)]
pub struct DeviceTransport {
    file: File,
    path: String,
}

impl DeviceTransport {
    /// Open the device node at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`MeasureError::TpmNotPresent`] when the node does not exist
    /// and [`MeasureError::Io`] when it exists but cannot be opened.
    pub fn open(path: &Path) -> Result<Self> {
        let path_str = path.display().to_string();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|e| {
                if e.kind() == ErrorKind::NotFound {
                    MeasureError::TpmNotPresent {
                        path: path_str.clone(),
                    }
                } else {
                    MeasureError::io(path, e)
                }
            })?;
        debug!(path = %path_str, "opened TPM device");
        Ok(Self {
            file,
            path: path_str,
        })
    }
}

impl Transport for DeviceTransport {
    fn transmit(&mut self, command: &[u8]) -> Result<Vec<u8>> {
        self.file
            .write_all(command)
            .map_err(|e| MeasureError::TpmTransport(format!("write to {}: {e}", self.path)))?;

        let mut buf = vec![0u8; MAX_RESPONSE_SIZE];
        let n = self
            .file
            .read(&mut buf)
            .map_err(|e| MeasureError::TpmTransport(format!("read from {}: {e}", self.path)))?;
        buf.truncate(n);
        Ok(buf)
    }
}

/// [`Tpm`] implementation that speaks the TPM 2.0 command protocol.
#[derive(Debug)]
pub struct CommandTpm<T> {
    transport: T,
}

/// A TPM reached through its kernel device node.
pub type DeviceTpm = CommandTpm<DeviceTransport>;

impl<T: Transport> CommandTpm<T> {
    /// Wrap a transport
    pub const fn new(transport: T) -> Self {
        Self { transport }
    }

    /// Give back the transport
    pub fn into_inner(self) -> T {
        self.transport
    }
}

impl<T: Transport> Tpm for CommandTpm<T> {
    fn allocated_banks(&mut self) -> Result<Vec<PcrBank>> {
        let response = self.transport.transmit(&command::get_pcr_capability())?;
        command::parse_pcr_capability(&response)
    }

    fn extend(&mut self, pcr: PcrIndex, data: &[u8]) -> Result<()> {
        check_event_size(data)?;
        let response = self.transport.transmit(&command::pcr_event(pcr, data))?;
        command::parse_pcr_event(&response)
    }

    fn read_pcr(&mut self, pcr: PcrIndex, algorithm: HashAlgorithm) -> Result<Vec<u8>> {
        let response = self
            .transport
            .transmit(&command::pcr_read(pcr, algorithm))?;
        command::parse_pcr_read(&response, pcr, algorithm)
    }
}

/// Open the TPM at `path`.
///
/// A missing device node is reported as [`MeasureError::TpmNotPresent`] so
/// callers can treat it as "nothing to measure".
pub fn open_device(path: &Path) -> Result<DeviceTpm> {
    DeviceTransport::open(path).map(CommandTpm::new)
}
