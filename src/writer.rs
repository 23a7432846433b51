//! Writing MARC records to ISO 2709 binary format.
//!
//! [`MarcWriter`] serializes [`Record`] values and can also copy a record's
//! original bytes straight through with [`MarcWriter::write_raw`].
//! [`append_fields`] adds fields to an already encoded record without
//! touching any of its existing bytes.

use crate::error::{MarcError, MarcResult};
use crate::leader::LEADER_LEN;
use crate::reader::{
    is_control_tag, parse_number, FIELD_TERMINATOR, RECORD_TERMINATOR, SUBFIELD_DELIMITER,
};
use crate::record::{Field, Record};
use std::io::Write;

/// Writer for ISO 2709 binary MARC format.
#[derive(Debug)]
pub struct MarcWriter<W: Write> {
    writer: W,
    records_written: usize,
    finished: bool,
}

impl<W: Write> MarcWriter<W> {
    /// Create a new MARC writer over any [`std::io::Write`] destination.
    pub fn new(writer: W) -> Self {
        MarcWriter {
            writer,
            records_written: 0,
            finished: false,
        }
    }

    /// Serialize one record.
    ///
    /// The leader's record length and base address are recomputed; every
    /// other leader position is written as-is.
    ///
    /// # Errors
    ///
    /// Returns an error if the writer is finished, the record is too large
    /// for ISO 2709, or an I/O error occurs.
    pub fn write_record(&mut self, record: &Record) -> MarcResult<()> {
        self.ensure_open()?;

        let mut data_area = Vec::new();
        let mut directory = Vec::new();

        for (tag, value) in &record.control_fields {
            if is_control_tag(tag) {
                let start = data_area.len();
                data_area.extend_from_slice(value.as_bytes());
                data_area.push(FIELD_TERMINATOR);
                push_entry(&mut directory, tag, data_area.len() - start, start)?;
            }
        }

        for (tag, fields) in &record.fields {
            for field in fields {
                let start = data_area.len();
                encode_data_field(field, &mut data_area);
                push_entry(&mut directory, tag, data_area.len() - start, start)?;
            }
        }

        directory.push(FIELD_TERMINATOR);

        let base_address = LEADER_LEN + directory.len();
        let record_length = base_address + data_area.len() + 1;

        let mut leader = record.leader.clone();
        leader.record_length = u32::try_from(record_length)
            .map_err(|_| MarcError::InvalidRecord("Record length overflow".to_string()))?;
        leader.data_base_address = u32::try_from(base_address)
            .map_err(|_| MarcError::InvalidRecord("Base address overflow".to_string()))?;

        self.writer.write_all(&leader.as_bytes()?)?;
        self.writer.write_all(&directory)?;
        self.writer.write_all(&data_area)?;
        self.writer.write_all(&[RECORD_TERMINATOR])?;

        self.records_written += 1;
        Ok(())
    }

    /// Copy a record's original bytes to the output unchanged.
    ///
    /// # Errors
    ///
    /// Returns an error if the writer is finished or an I/O error occurs.
    pub fn write_raw(&mut self, bytes: &[u8]) -> MarcResult<()> {
        self.ensure_open()?;
        self.writer.write_all(bytes)?;
        self.records_written += 1;
        Ok(())
    }

    /// Flush the writer and mark it as finished.
    ///
    /// # Errors
    ///
    /// Returns an error if flushing the underlying writer fails.
    pub fn finish(&mut self) -> MarcResult<()> {
        self.writer.flush()?;
        self.finished = true;
        Ok(())
    }

    /// Returns the number of records written so far.
    #[must_use]
    pub fn records_written(&self) -> usize {
        self.records_written
    }

    /// Unwrap the underlying destination.
    pub fn into_inner(self) -> W {
        self.writer
    }

    fn ensure_open(&self) -> MarcResult<()> {
        if self.finished {
            return Err(MarcError::InvalidRecord(
                "Cannot write to a finished writer".to_string(),
            ));
        }
        Ok(())
    }
}

/// Append data fields to an encoded record.
///
/// The new directory entries follow the existing ones and the new field data
/// follows the existing data area, so every existing field keeps its bytes,
/// its order and its offset. Only the record length (leader positions 0-4)
/// and base address (12-16) are rewritten.
///
/// # Errors
///
/// Returns an error if the record's leader or directory boundary is
/// malformed, or the result would exceed the ISO 2709 length limits.
pub fn append_fields(raw: &[u8], fields: &[Field]) -> MarcResult<Vec<u8>> {
    let body = raw.strip_suffix(&[RECORD_TERMINATOR]).unwrap_or(raw);
    if body.len() < LEADER_LEN {
        return Err(MarcError::InvalidRecord(format!(
            "Record of {} bytes is shorter than its leader",
            body.len()
        )));
    }

    let base = parse_number(&body[12..17])?;
    if base <= LEADER_LEN || base > body.len() || body[base - 1] != FIELD_TERMINATOR {
        return Err(MarcError::InvalidRecord(format!(
            "Directory does not end at base address {base}"
        )));
    }

    let mut directory = body[LEADER_LEN..base - 1].to_vec();
    let mut data_area = body[base..].to_vec();
    for field in fields {
        let start = data_area.len();
        encode_data_field(field, &mut data_area);
        push_entry(&mut directory, &field.tag, data_area.len() - start, start)?;
    }
    directory.push(FIELD_TERMINATOR);

    let base_address = LEADER_LEN + directory.len();
    let record_length = base_address + data_area.len() + 1;
    if record_length > 99_999 {
        return Err(MarcError::InvalidRecord(format!(
            "Record length {record_length} exceeds 99999"
        )));
    }

    let mut out = Vec::with_capacity(record_length);
    out.extend_from_slice(format!("{record_length:05}").as_bytes());
    out.extend_from_slice(&body[5..12]);
    out.extend_from_slice(format!("{base_address:05}").as_bytes());
    out.extend_from_slice(&body[17..LEADER_LEN]);
    out.extend_from_slice(&directory);
    out.extend_from_slice(&data_area);
    out.push(RECORD_TERMINATOR);
    Ok(out)
}

fn encode_data_field(field: &Field, out: &mut Vec<u8>) {
    out.push(field.indicator1 as u8);
    out.push(field.indicator2 as u8);
    for subfield in &field.subfields {
        out.push(SUBFIELD_DELIMITER);
        out.push(subfield.code as u8);
        out.extend_from_slice(subfield.value.as_bytes());
    }
    out.push(FIELD_TERMINATOR);
}

fn push_entry(directory: &mut Vec<u8>, tag: &str, length: usize, start: usize) -> MarcResult<()> {
    if tag.len() != 3 || length > 9999 || start > 99_999 {
        return Err(MarcError::InvalidField(format!(
            "Tag {tag} cannot be addressed (length {length}, start {start})"
        )));
    }
    directory.extend_from_slice(tag.as_bytes());
    directory.extend_from_slice(format!("{length:04}{start:05}").as_bytes());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::leader::Leader;
    use crate::reader::MarcReader;
    use std::io::Cursor;

    fn sample_record() -> Record {
        let mut record = Record::new(Leader::default());
        record.add_control_field_str("001", "ocm00012345");
        let mut isbn = Field::new("020".to_string(), ' ', ' ');
        isbn.add_subfield_str('a', "9780123456789 (pbk.)");
        record.add_field(isbn);
        let mut title = Field::new("245".to_string(), '1', '0');
        title.add_subfield_str('a', "Test title");
        record.add_field(title);
        record
    }

    #[test]
    fn test_write_then_read_back() {
        let record = sample_record();

        let mut buffer = Vec::new();
        let mut writer = MarcWriter::new(&mut buffer);
        writer.write_record(&record).unwrap();
        writer.finish().unwrap();
        assert_eq!(writer.records_written(), 1);

        let read = MarcReader::new(Cursor::new(buffer)).read_record().unwrap().unwrap();
        assert_eq!(read.get_control_field("001"), Some("ocm00012345"));
        assert_eq!(read.get_field("020"), record.get_field("020"));
        assert_eq!(read.get_field("245"), record.get_field("245"));
    }

    #[test]
    fn test_leader_lengths_are_recomputed() {
        let mut buffer = Vec::new();
        MarcWriter::new(&mut buffer).write_record(&sample_record()).unwrap();

        let leader = Leader::from_bytes(&buffer).unwrap();
        assert_eq!(leader.record_length as usize, buffer.len());
        // leader + 3 directory entries + directory terminator
        assert_eq!(leader.data_base_address as usize, 24 + 3 * 12 + 1);
        assert_eq!(*buffer.last().unwrap(), RECORD_TERMINATOR);
    }

    #[test]
    fn test_write_raw_is_verbatim() {
        let mut buffer = Vec::new();
        let mut writer = MarcWriter::new(&mut buffer);
        writer.write_raw(b"not really marc\x1d").unwrap();
        assert_eq!(writer.records_written(), 1);
        assert_eq!(buffer, b"not really marc\x1d".to_vec());
    }

    fn local_field(value: &str) -> Field {
        let mut field = Field::new("941".to_string(), ' ', ' ');
        field.add_subfield_str('f', value);
        field
    }

    #[test]
    fn test_append_keeps_existing_bytes() {
        let mut original = Vec::new();
        MarcWriter::new(&mut original).write_record(&sample_record()).unwrap();
        let old_base = Leader::from_bytes(&original).unwrap().data_base_address as usize;

        let updated = append_fields(&original, &[local_field("42")]).unwrap();
        let leader = Leader::from_bytes(&updated).unwrap();
        let new_base = leader.data_base_address as usize;

        assert_eq!(leader.record_length as usize, updated.len());
        assert_eq!(new_base, old_base + 12);
        // Leader positions other than length and base address
        assert_eq!(updated[5..12], original[5..12]);
        assert_eq!(updated[17..24], original[17..24]);
        // Old directory entries, then the new one
        assert_eq!(updated[24..old_base - 1], original[24..old_base - 1]);
        assert_eq!(&updated[old_base - 1..old_base + 2], b"941");
        // Old data area is a prefix of the new one
        let old_data = &original[old_base..original.len() - 1];
        assert_eq!(&updated[new_base..new_base + old_data.len()], old_data);

        let read = MarcReader::new(updated.as_slice()).read_record().unwrap().unwrap();
        assert_eq!(read.get_field("941").and_then(|f| f.get_subfield('f')), Some("42"));
        assert_eq!(read.get_field("245"), sample_record().get_field("245"));
    }

    #[test]
    fn test_append_accepts_record_without_terminator() {
        let mut original = Vec::new();
        MarcWriter::new(&mut original).write_record(&sample_record()).unwrap();
        original.pop();

        let updated = append_fields(&original, &[local_field("42")]).unwrap();
        assert_eq!(*updated.last().unwrap(), RECORD_TERMINATOR);
        assert!(MarcReader::new(updated.as_slice()).read_record().unwrap().is_some());
    }

    /// Encode a record padded with notes to exactly `target` bytes.
    fn record_of_length(target: usize) -> Vec<u8> {
        let encode = |filler: usize| {
            let mut record = sample_record();
            for _ in 0..10 {
                let mut note = Field::new("500".to_string(), ' ', ' ');
                note.add_subfield_str('a', &"x".repeat(9000));
                record.add_field(note);
            }
            let mut note = Field::new("590".to_string(), ' ', ' ');
            note.add_subfield_str('a', &"y".repeat(filler));
            record.add_field(note);
            let mut buffer = Vec::new();
            MarcWriter::new(&mut buffer).write_record(&record).unwrap();
            buffer
        };
        let unpadded = encode(0).len();
        encode(target - unpadded)
    }

    #[test]
    fn test_append_rejects_oversized_result() {
        let original = record_of_length(99_990);
        assert_eq!(original.len(), 99_990);

        let err = append_fields(&original, &[local_field("42")]).unwrap_err();
        assert!(err.to_string().contains("exceeds 99999"), "got: {err}");
    }

    #[test]
    fn test_append_rejects_garbage() {
        assert!(append_fields(b"short", &[local_field("1")]).is_err());
        assert!(append_fields(b"00030nam a2200099 a 4500xxxxx\x1d", &[local_field("1")]).is_err());
    }

    #[test]
    fn test_finished_writer_rejects_records() {
        let mut buffer = Vec::new();
        let mut writer = MarcWriter::new(&mut buffer);
        writer.finish().unwrap();
        assert!(writer.write_record(&sample_record()).is_err());
        assert!(writer.write_raw(b"x").is_err());
    }
}
