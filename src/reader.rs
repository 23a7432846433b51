//! Reading MARC records from ISO 2709 streams.
//!
//! [`MarcReader`] splits the stream on the record terminator (`0x1D`) instead
//! of trusting the leader's length, so one damaged record never desynchronises
//! the records after it. Each chunk is returned as a [`RawRecord`] holding the
//! original bytes next to the parse result; callers that cannot use a record
//! can still write it back unchanged.
//!
//! # Examples
//!
//! ```no_run
//! use oclc_resolver::MarcReader;
//! use std::fs::File;
//!
//! let file = File::open("records.mrc")?;
//! let mut reader = MarcReader::new(file);
//!
//! while let Some(raw) = reader.read_raw()? {
//!     match raw.parsed {
//!         Ok(record) => println!("Type: {}", record.leader.record_type),
//!         Err(e) => eprintln!("record {}: {e}", reader.records_read()),
//!     }
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use crate::error::{MarcError, MarcResult};
use crate::leader::{Leader, LEADER_LEN};
use crate::record::{Field, Record};
use std::io::{BufRead, BufReader, Read};

pub(crate) const FIELD_TERMINATOR: u8 = 0x1E;
pub(crate) const SUBFIELD_DELIMITER: u8 = 0x1F;
pub(crate) const RECORD_TERMINATOR: u8 = 0x1D;

/// One record-terminator delimited chunk of an ISO 2709 stream.
#[derive(Debug)]
pub struct RawRecord {
    /// The bytes exactly as read, including the record terminator if present
    pub bytes: Vec<u8>,
    /// The parsed record, or why it could not be parsed
    pub parsed: MarcResult<Record>,
}

/// Reader for ISO 2709 binary MARC format.
#[derive(Debug)]
pub struct MarcReader<R: Read> {
    reader: BufReader<R>,
    records_read: usize,
}

impl<R: Read> MarcReader<R> {
    /// Create a new MARC reader over any [`std::io::Read`] source.
    pub fn new(reader: R) -> Self {
        MarcReader {
            reader: BufReader::new(reader),
            records_read: 0,
        }
    }

    /// Read the next record chunk.
    ///
    /// Returns `Ok(None)` at end of stream. Whitespace between records (a
    /// trailing newline, for example) is skipped.
    ///
    /// # Errors
    ///
    /// Only I/O failures are returned as errors; malformed record data is
    /// reported through [`RawRecord::parsed`].
    pub fn read_raw(&mut self) -> MarcResult<Option<RawRecord>> {
        loop {
            let mut bytes = Vec::new();
            let n = self.reader.read_until(RECORD_TERMINATOR, &mut bytes)?;
            if n == 0 {
                return Ok(None);
            }
            if bytes.iter().all(u8::is_ascii_whitespace) {
                continue;
            }

            self.records_read += 1;
            let parsed = parse_record(&bytes);
            return Ok(Some(RawRecord { bytes, parsed }));
        }
    }

    /// Read the next record, failing on malformed data.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be parsed or an I/O error occurs.
    pub fn read_record(&mut self) -> MarcResult<Option<Record>> {
        match self.read_raw()? {
            Some(raw) => raw.parsed.map(Some),
            None => Ok(None),
        }
    }

    /// Number of record chunks read so far, including unparseable ones.
    #[must_use]
    pub fn records_read(&self) -> usize {
        self.records_read
    }
}

/// Parse a single ISO 2709 record from its bytes.
///
/// # Errors
///
/// Returns an error if the leader, directory or a data field is malformed.
pub fn parse_record(bytes: &[u8]) -> MarcResult<Record> {
    let leader = Leader::from_bytes(bytes)?;
    leader.validate_for_reading()?;

    let base_address = leader.data_base_address as usize;
    if base_address > bytes.len() {
        return Err(MarcError::InvalidRecord(format!(
            "Base address {base_address} lies beyond the {} bytes read",
            bytes.len()
        )));
    }

    let directory = &bytes[LEADER_LEN..base_address];
    let data = &bytes[base_address..];
    let mut record = Record::new(leader);

    // Directory entries are 12 bytes: tag(3) + length(4) + start position(5)
    let mut pos = 0;
    while pos < directory.len() && directory[pos] != FIELD_TERMINATOR {
        if pos + 12 > directory.len() {
            return Err(MarcError::InvalidRecord(
                "Incomplete directory entry".to_string(),
            ));
        }

        let entry = &directory[pos..pos + 12];
        let tag = String::from_utf8_lossy(&entry[0..3]).to_string();
        let field_length = parse_number(&entry[3..7])?;
        let start = parse_number(&entry[7..12])?;
        pos += 12;

        let end = start + field_length;
        if end > data.len() {
            return Err(MarcError::InvalidRecord(format!(
                "Field {tag} exceeds data area"
            )));
        }
        let field_data = &data[start..end];

        if is_control_tag(&tag) {
            let value = field_data
                .strip_suffix(&[FIELD_TERMINATOR])
                .unwrap_or(field_data);
            record.add_control_field(tag, String::from_utf8_lossy(value).to_string());
        } else {
            let field = parse_data_field(field_data, &tag)
                .map_err(|e| MarcError::InvalidField(format!("Tag {tag}: {e}")))?;
            record.add_field(field);
        }
    }

    Ok(record)
}

pub(crate) fn is_control_tag(tag: &str) -> bool {
    tag.len() == 3 && tag.starts_with("00") && tag.chars().all(|c| c.is_ascii_digit())
}

/// Parse a data field from raw bytes
fn parse_data_field(data: &[u8], tag: &str) -> MarcResult<Field> {
    if data.len() < 2 {
        return Err(MarcError::InvalidField(
            "Data field too short (needs indicators)".to_string(),
        ));
    }

    let mut field = Field::new(tag.to_string(), data[0] as char, data[1] as char);
    let subfield_data = &data[2..];
    let mut current = 0;

    while current < subfield_data.len() {
        match subfield_data[current] {
            FIELD_TERMINATOR => break,
            SUBFIELD_DELIMITER => {
                current += 1;
                if current >= subfield_data.len() {
                    break;
                }
                let code = subfield_data[current] as char;
                current += 1;

                let end = subfield_data[current..]
                    .iter()
                    .position(|&b| b == SUBFIELD_DELIMITER || b == FIELD_TERMINATOR)
                    .map_or(subfield_data.len(), |offset| current + offset);

                let value = String::from_utf8_lossy(&subfield_data[current..end]).to_string();
                field.add_subfield(code, value);
                current = end;
            },
            _ => {
                return Err(MarcError::InvalidField(
                    "Expected subfield delimiter".to_string(),
                ))
            },
        }
    }

    Ok(field)
}

/// Parse a fixed-width ASCII number from directory bytes
pub(crate) fn parse_number(bytes: &[u8]) -> MarcResult<usize> {
    let mut result = 0usize;
    for &byte in bytes {
        if !byte.is_ascii_digit() {
            return Err(MarcError::InvalidRecord(format!(
                "Invalid numeric field: expected digits, got byte {}",
                byte as char
            )));
        }
        result = result * 10 + (byte - b'0') as usize;
    }
    Ok(result)
}
