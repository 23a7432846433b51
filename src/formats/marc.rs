//! ISO 2709 MARC files: ISBN from `020`, OCLC number into `941 $f`.
//!
//! Records are only parsed to find the ISBN. Output is always built from the
//! original bytes: an untouched record is copied through, and a resolved one
//! gets the new field spliced onto the end with [`append_fields`].

use super::traits::{BatchFormat, Emitted, OpenSink};
use crate::error::{MarcError, ResolveError, Result};
use crate::identifier::{clean_isbn, Identifier};
use crate::interpret::LookupMode;
use crate::reader::{MarcReader, RawRecord};
use crate::record::{Field, Record};
use crate::writer::{append_fields, MarcWriter};
use std::fmt;
use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use tracing::warn;

/// Tag holding the ISBN.
pub const ISBN_TAG: &str = "020";
/// Local field receiving the OCLC number.
pub const OCLC_FIELD_TAG: &str = "941";
/// Subfield of [`OCLC_FIELD_TAG`] holding the OCLC number.
pub const OCLC_SUBFIELD_CODE: char = 'f';

/// Output path for a MARC input: `updated_<name>` next to the input.
///
/// ```
/// use oclc_resolver::formats::marc::derived_output_path;
/// use std::path::Path;
///
/// assert_eq!(
///     derived_output_path(Path::new("/data/batch.mrc")),
///     Path::new("/data/updated_batch.mrc")
/// );
/// ```
#[must_use]
pub fn derived_output_path(input: &Path) -> PathBuf {
    let name = input
        .file_name()
        .map_or_else(|| "records.mrc".into(), |n| n.to_string_lossy());
    input.with_file_name(format!("updated_{name}"))
}

/// One record of a MARC batch: its original bytes, the parsed view used for
/// lookups, and the fields waiting to be appended.
#[derive(Debug)]
pub struct MarcEntry {
    raw: Vec<u8>,
    record: Option<Record>,
    added: Vec<Field>,
}

impl MarcEntry {
    fn from_raw(raw: RawRecord, position: usize) -> Self {
        let record = match raw.parsed {
            Ok(record) => Some(record),
            Err(e) => {
                warn!(position, error = %e, "unparseable MARC record passed through unchanged");
                None
            },
        };
        MarcEntry {
            raw: raw.bytes,
            record,
            added: Vec::new(),
        }
    }

    /// The parsed record, if the bytes could be parsed.
    #[must_use]
    pub fn record(&self) -> Option<&Record> {
        self.record.as_ref()
    }
}

/// A MARC file resolved to OCLC numbers.
pub struct MarcBatch<R: Read, W: Write> {
    reader: MarcReader<R>,
    open: Option<OpenSink<W>>,
    writer: Option<MarcWriter<W>>,
    output: Option<PathBuf>,
}

impl MarcBatch<File, BufWriter<File>> {
    /// Open `input` for reading; `output` is created only when the batch
    /// begins.
    ///
    /// # Errors
    ///
    /// Returns an error if `input` cannot be opened, or if `output` names the
    /// same file (it would be truncated while still being read).
    pub fn open(input: &Path, output: &Path) -> Result<Self> {
        let file = File::open(input)?;
        if same_file(input, output) {
            return Err(ResolveError::Config(format!(
                "output {} would overwrite the MARC input",
                output.display()
            )));
        }
        let target = output.to_path_buf();
        let mut batch = Self::new(file, move || File::create(&target).map(BufWriter::new));
        batch.output = Some(output.to_path_buf());
        Ok(batch)
    }
}

impl<R: Read, W: Write> MarcBatch<R, W> {
    /// Create a batch over any reader, with a deferred sink constructor.
    pub fn new(input: R, open: impl FnOnce() -> std::io::Result<W> + 'static) -> Self {
        MarcBatch {
            reader: MarcReader::new(input),
            open: Some(Box::new(open)),
            writer: None,
            output: None,
        }
    }

    /// Take back the sink after [`finish`](BatchFormat::finish); `None` if
    /// the batch never began.
    #[must_use]
    pub fn into_sink(self) -> Option<W> {
        self.writer.map(MarcWriter::into_inner)
    }
}

/// Whether two paths name the same file; `output` need not exist yet.
fn same_file(input: &Path, output: &Path) -> bool {
    let Ok(input) = input.canonicalize() else {
        return false;
    };
    if let Ok(output) = output.canonicalize() {
        return input == output;
    }
    let parent = match output.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    match (parent.canonicalize(), output.file_name()) {
        (Ok(parent), Some(name)) => parent.join(name) == input,
        _ => false,
    }
}

impl<R: Read, W: Write> fmt::Debug for MarcBatch<R, W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MarcBatch")
            .field("records_read", &self.reader.records_read())
            .field("sink_open", &self.writer.is_some())
            .field("output", &self.output)
            .finish_non_exhaustive()
    }
}

impl<R: Read, W: Write> BatchFormat for MarcBatch<R, W> {
    type Item = MarcEntry;

    fn mode(&self) -> LookupMode {
        LookupMode::OclcNumber
    }

    fn output_path(&self) -> Option<&Path> {
        self.output.as_deref()
    }

    fn begin(&mut self) -> Result<()> {
        if let Some(open) = self.open.take() {
            self.writer = Some(MarcWriter::new(open()?));
        }
        Ok(())
    }

    fn next_record(&mut self) -> Result<Option<MarcEntry>> {
        let raw = self.reader.read_raw()?;
        let position = self.reader.records_read();
        Ok(raw.map(|raw| MarcEntry::from_raw(raw, position)))
    }

    fn extract(&self, item: &MarcEntry) -> Option<Identifier> {
        let field = item.record.as_ref()?.get_field(ISBN_TAG)?;
        Identifier::new(&clean_isbn(&field.to_string()))
    }

    fn apply(&self, item: &mut MarcEntry, value: &str) {
        let Some(record) = item.record.as_mut() else {
            return;
        };
        let present = record
            .fields_by_tag(OCLC_FIELD_TAG)
            .any(|f| f.get_subfield(OCLC_SUBFIELD_CODE) == Some(value));
        if present {
            return;
        }

        let mut field = Field::new(OCLC_FIELD_TAG.to_string(), ' ', ' ');
        field.add_subfield_str(OCLC_SUBFIELD_CODE, value);
        record.add_field(field.clone());
        item.added.push(field);
    }

    fn emit(&mut self, item: MarcEntry) -> Result<Emitted> {
        let Some(writer) = self.writer.as_mut() else {
            return Err(MarcError::InvalidRecord(
                "MARC sink used before the batch began".to_string(),
            )
            .into());
        };
        if item.added.is_empty() {
            writer.write_raw(&item.raw)?;
            return Ok(Emitted::Written);
        }

        match append_fields(&item.raw, &item.added) {
            Ok(updated) => {
                writer.write_raw(&updated)?;
                Ok(Emitted::Written)
            },
            Err(e) => {
                warn!(
                    position = writer.records_written() + 1,
                    error = %e,
                    "record cannot hold the new field; written unchanged"
                );
                writer.write_raw(&item.raw)?;
                Ok(Emitted::Reverted)
            },
        }
    }

    fn finish(&mut self) -> Result<()> {
        if let Some(writer) = self.writer.as_mut() {
            writer.finish()?;
        }
        Ok(())
    }
}
