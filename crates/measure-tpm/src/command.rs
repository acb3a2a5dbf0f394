//! TPM 2.0 command marshalling for the PCR commands.
//!
//! All TPM wire integers are big-endian. Every command starts with a
//! 10-byte header (tag, total size, command code) and every response with
//! a 10-byte header (tag, total size, response code).

use measure_core::{HashAlgorithm, MeasureError, PcrBank, PcrIndex, Result};

/// Command tag without an authorization area
pub const TPM_ST_NO_SESSIONS: u16 = 0x8001;
/// Command tag with an authorization area
pub const TPM_ST_SESSIONS: u16 = 0x8002;
/// Password authorization session handle
pub const TPM_RS_PW: u32 = 0x4000_0009;

/// `TPM2_PCR_Event` command code
pub const TPM_CC_PCR_EVENT: u32 = 0x0000_013C;
/// `TPM2_GetCapability` command code
pub const TPM_CC_GET_CAPABILITY: u32 = 0x0000_017A;
/// `TPM2_PCR_Read` command code
pub const TPM_CC_PCR_READ: u32 = 0x0000_017E;

/// Capability group listing PCR bank allocation
pub const TPM_CAP_PCRS: u32 = 0x0000_0005;

/// `sizeofSelect` for a 24-PCR bank
pub const PCR_SELECT_SIZE: u8 = 3;

/// Largest response a TPM 2.0 device returns
pub const MAX_RESPONSE_SIZE: usize = 4096;

const HEADER_SIZE: usize = 10;

/// Growable big-endian command buffer.
struct CommandBuffer {
    data: Vec<u8>,
}

impl CommandBuffer {
    fn new(tag: u16, command_code: u32) -> Self {
        let mut buf = Self {
            data: Vec::with_capacity(64),
        };
        buf.write_u16(tag);
        // size, patched in finish()
        buf.write_u32(0);
        buf.write_u32(command_code);
        buf
    }

    fn write_u8(&mut self, value: u8) {
        self.data.push(value);
    }

    fn write_u16(&mut self, value: u16) {
        self.data.extend_from_slice(&value.to_be_bytes());
    }

    fn write_u32(&mut self, value: u32) {
        self.data.extend_from_slice(&value.to_be_bytes());
    }

    fn write_bytes(&mut self, bytes: &[u8]) {
        self.data.extend_from_slice(bytes);
    }

    /// Empty password session: handle, empty nonce, no attributes, empty hmac.
    fn write_password_auth(&mut self) {
        self.write_u32(9);
        self.write_u32(TPM_RS_PW);
        self.write_u16(0);
        self.write_u8(0);
        self.write_u16(0);
    }

    fn write_pcr_selection(&mut self, pcr: PcrIndex, algorithm: HashAlgorithm) {
        let mut select = [0u8; PCR_SELECT_SIZE as usize];
        let index = pcr.value() as usize;
        select[index / 8] |= 1 << (index % 8);

        self.write_u32(1);
        self.write_u16(algorithm.id());
        self.write_u8(PCR_SELECT_SIZE);
        self.write_bytes(&select);
    }

    #[allow(clippy::cast_possible_truncation)]
    fn finish(mut self) -> Vec<u8> {
        let size = (self.data.len() as u32).to_be_bytes();
        self.data[2..6].copy_from_slice(&size);
        self.data
    }
}

/// `TPM2_PCR_Event` for `pcr` with `data` as the event buffer.
///
/// The caller must have checked `data` against
/// [`MAX_EVENT_SIZE`](crate::MAX_EVENT_SIZE).
#[allow(clippy::cast_possible_truncation)]
pub fn pcr_event(pcr: PcrIndex, data: &[u8]) -> Vec<u8> {
    let mut buf = CommandBuffer::new(TPM_ST_SESSIONS, TPM_CC_PCR_EVENT);
    buf.write_u32(pcr.handle());
    buf.write_password_auth();
    buf.write_u16(data.len() as u16);
    buf.write_bytes(data);
    buf.finish()
}

/// `TPM2_PCR_Read` of a single register in a single bank.
pub fn pcr_read(pcr: PcrIndex, algorithm: HashAlgorithm) -> Vec<u8> {
    let mut buf = CommandBuffer::new(TPM_ST_NO_SESSIONS, TPM_CC_PCR_READ);
    buf.write_pcr_selection(pcr, algorithm);
    buf.finish()
}

/// `TPM2_GetCapability(TPM_CAP_PCRS)`.
pub fn get_pcr_capability() -> Vec<u8> {
    let mut buf = CommandBuffer::new(TPM_ST_NO_SESSIONS, TPM_CC_GET_CAPABILITY);
    buf.write_u32(TPM_CAP_PCRS);
    // property
    buf.write_u32(0);
    // propertyCount
    buf.write_u32(u32::MAX);
    buf.finish()
}

/// Cursor over a response body.
struct ResponseReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ResponseReader<'a> {
    const fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn read_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.data.len())
            .ok_or_else(|| MeasureError::Capability("truncated TPM response".into()))?;
        let bytes = &self.data[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    fn read_u8(&mut self) -> Result<u8> {
        Ok(self.read_bytes(1)?[0])
    }

    fn read_u16(&mut self) -> Result<u16> {
        let b = self.read_bytes(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    fn read_u32(&mut self) -> Result<u32> {
        let b = self.read_bytes(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// One `TPMS_PCR_SELECTION`: algorithm id and select bitmap.
    fn read_pcr_selection(&mut self) -> Result<(u16, &'a [u8])> {
        let alg = self.read_u16()?;
        let size = self.read_u8()?;
        let select = self.read_bytes(usize::from(size))?;
        Ok((alg, select))
    }
}

/// Validate the response header and return the body after it.
///
/// # Errors
///
/// Returns [`MeasureError::TpmResponse`] for a non-zero response code and
/// [`MeasureError::Capability`] for a malformed header.
pub fn check_response<'a>(command: &'static str, response: &'a [u8]) -> Result<&'a [u8]> {
    let mut reader = ResponseReader::new(response);
    let tag = reader.read_u16()?;
    let size = reader.read_u32()?;
    let code = reader.read_u32()?;

    if size as usize != response.len() {
        return Err(MeasureError::Capability(format!(
            "{command} response is {} bytes, header says {size}",
            response.len()
        )));
    }
    if code != 0 {
        return Err(MeasureError::TpmResponse { command, code });
    }
    if tag != TPM_ST_NO_SESSIONS && tag != TPM_ST_SESSIONS {
        return Err(MeasureError::Capability(format!(
            "{command} response has tag {tag:#06x}"
        )));
    }
    Ok(&response[HEADER_SIZE..])
}

/// Check a `TPM2_PCR_Event` response.
pub fn parse_pcr_event(response: &[u8]) -> Result<()> {
    let body = check_response("TPM2_PCR_Event", response)?;
    let mut reader = ResponseReader::new(body);
    let parameter_size = reader.read_u32()?;
    reader.read_bytes(parameter_size as usize)?;
    Ok(())
}

/// Extract the digest from a `TPM2_PCR_Read` response for one register.
pub fn parse_pcr_read(response: &[u8], pcr: PcrIndex, algorithm: HashAlgorithm) -> Result<Vec<u8>> {
    let body = check_response("TPM2_PCR_Read", response)?;
    let mut reader = ResponseReader::new(body);

    // pcrUpdateCounter
    reader.read_u32()?;

    let selections = reader.read_u32()?;
    if selections != 1 {
        return Err(MeasureError::Capability(format!(
            "PCR read returned {selections} selections"
        )));
    }
    let (alg, select) = reader.read_pcr_selection()?;
    let index = pcr.value() as usize;
    let selected = select
        .get(index / 8)
        .is_some_and(|byte| byte & (1 << (index % 8)) != 0);
    if alg != algorithm.id() || !selected {
        return Err(MeasureError::Capability(format!(
            "PCR read returned a selection other than PCR {pcr} in {algorithm}"
        )));
    }

    let count = reader.read_u32()?;
    if count != 1 {
        return Err(MeasureError::Capability(format!(
            "PCR read returned {count} digests"
        )));
    }
    let size = reader.read_u16()?;
    let digest = reader.read_bytes(usize::from(size))?;
    if digest.len() != algorithm.digest_size() {
        return Err(MeasureError::Capability(format!(
            "{algorithm} PCR value is {} bytes",
            digest.len()
        )));
    }
    Ok(digest.to_vec())
}

/// Extract the allocated banks from a `TPM2_GetCapability(TPM_CAP_PCRS)`
/// response, skipping banks with an empty selection.
pub fn parse_pcr_capability(response: &[u8]) -> Result<Vec<PcrBank>> {
    let body = check_response("TPM2_GetCapability", response)?;
    let mut reader = ResponseReader::new(body);

    let more_data = reader.read_u8()?;
    if more_data != 0 {
        return Err(MeasureError::Capability(
            "extra data from GetCapability".into(),
        ));
    }
    let capability = reader.read_u32()?;
    if capability != TPM_CAP_PCRS {
        return Err(MeasureError::Capability(format!(
            "unexpected data from GetCapability: capability {capability:#x}"
        )));
    }

    let count = reader.read_u32()?;
    let mut banks = Vec::new();
    for _ in 0..count {
        let (alg, select) = reader.read_pcr_selection()?;
        if select.iter().all(|b| *b == 0) {
            continue;
        }
        let algorithm =
            HashAlgorithm::from_id(alg).ok_or(MeasureError::UnsupportedAlgorithm(alg))?;
        banks.push(PcrBank::new(algorithm));
    }
    Ok(banks)
}
