use measure_core::{DigestMap, HashAlgorithm, MeasureError, Result};

use super::reader::LogReader;
use super::spec_id::SpecIdEvent;
use super::{EventLog, EventType, LogEvent};

/// Upper bound on the digests a single event may carry
const MAX_DIGESTS: u32 = 8;

impl EventLog {
    /// Decode a log written by [`EventLog::write_to`] or any crypto-agile
    /// TCG log with a Spec ID header.
    ///
    /// # Errors
    ///
    /// Returns `MeasureError::LogFormat` on truncation, a missing or
    /// malformed header, or digests for algorithms the header does not
    /// announce.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let mut reader = LogReader::new(bytes);
        let spec_id = parse_header(&mut reader)?;

        let mut events = Vec::new();
        while !reader.is_empty() {
            let offset = reader.position();
            let event = parse_event2(&mut reader, &spec_id).map_err(|e| match e {
                MeasureError::LogFormat(msg) => MeasureError::LogFormat(format!(
                    "event {} at offset {offset}: {msg}",
                    events.len() + 1
                )),
                other => other,
            })?;
            events.push(event);
        }

        Ok(Self { spec_id, events })
    }
}

fn parse_header(reader: &mut LogReader<'_>) -> Result<SpecIdEvent> {
    let _pcr_index = reader.read_u32()?;
    let event_type = EventType::from_value(reader.read_u32()?);
    if event_type != EventType::NoAction {
        return Err(MeasureError::LogFormat(format!(
            "first event has type {:#x}, expected EV_NO_ACTION",
            event_type.value()
        )));
    }
    let _sha1 = reader.read_bytes(HashAlgorithm::Sha1.digest_size())?;
    let size = reader.read_u32()?;
    let data = reader.read_bytes(size as usize)?;
    SpecIdEvent::parse(data)
}

fn parse_event2(reader: &mut LogReader<'_>, spec_id: &SpecIdEvent) -> Result<LogEvent> {
    let pcr_index = reader.read_u32()?;
    let event_type = EventType::from_value(reader.read_u32()?);

    let count = reader.read_u32()?;
    if count > MAX_DIGESTS {
        return Err(MeasureError::LogFormat(format!("{count} digests in one event")));
    }
    let mut digests = DigestMap::new();
    for _ in 0..count {
        let id = reader.read_u16()?;
        let size = spec_id.digest_size(id).ok_or_else(|| {
            MeasureError::LogFormat(format!("digest for algorithm {id:#06x} not in header"))
        })?;
        let algorithm = HashAlgorithm::from_id(id).ok_or(MeasureError::UnsupportedAlgorithm(id))?;
        if digests.get(algorithm).is_some() {
            return Err(MeasureError::LogFormat(format!("{algorithm} digest repeated")));
        }
        digests.insert(algorithm, reader.read_bytes(usize::from(size))?.to_vec());
    }

    let size = reader.read_u32()?;
    let data = reader.read_bytes(size as usize)?.to_vec();

    Ok(LogEvent {
        pcr_index,
        event_type,
        digests,
        data,
    })
}
