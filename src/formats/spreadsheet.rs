//! Spreadsheets: EAN-13 from a named column, Work ID into a new column.
//!
//! CSV files and Excel workbooks (`.xlsx`, first worksheet) are supported.
//! The whole sheet is read when the batch is created, the `Work ID` column is
//! added (or cleared, if the sheet already has one) and the sheet is written
//! out again in one piece by [`finish`](BatchFormat::finish).

use super::traits::{BatchFormat, Emitted, OpenSink};
use crate::error::{ResolveError, Result};
use crate::identifier::Identifier;
use crate::interpret::LookupMode;
use calamine::{Data, Reader, Xlsx};
use csv::{ReaderBuilder, WriterBuilder};
use rust_xlsxwriter::Workbook;
use std::collections::HashSet;
use std::fmt;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Seek, Write};
use std::path::{Path, PathBuf};
use tracing::warn;

/// Header of the column holding the lookup key.
pub const EAN_COLUMN: &str = "EAN-13";
/// Header of the column receiving the Work ID.
pub const WORK_ID_COLUMN: &str = "Work ID";

/// On-disk layout of a sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SheetFormat {
    /// Comma-separated text (`.csv`)
    Csv,
    /// Office Open XML workbook (`.xlsx`)
    Xlsx,
}

impl SheetFormat {
    /// Detect the sheet layout from a file extension.
    #[must_use]
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "csv" => Some(Self::Csv),
            "xlsx" => Some(Self::Xlsx),
            _ => None,
        }
    }

    /// Detect the sheet layout from a path's extension.
    #[must_use]
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }

    /// Human-readable name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Csv => "CSV",
            Self::Xlsx => "Excel workbook",
        }
    }
}

/// One data row of the sheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetRow {
    /// Zero-based data row index (the header is not counted)
    pub index: usize,
    /// Cell values, padded to the header width
    pub cells: Vec<String>,
}

/// A sheet as read from disk, before the `Work ID` column is set up.
struct Table {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
    /// `(row, column)` of cells that were numbers in the workbook
    numeric: HashSet<(usize, usize)>,
    sheet_name: Option<String>,
}

/// A spreadsheet resolved to Work IDs.
pub struct SpreadsheetBatch<W: Write> {
    headers: Vec<String>,
    rows: std::vec::IntoIter<SheetRow>,
    total: usize,
    ean_index: Option<usize>,
    work_id_index: usize,
    numeric: HashSet<(usize, usize)>,
    sheet_name: Option<String>,
    format: SheetFormat,
    output_rows: Vec<SheetRow>,
    open: Option<OpenSink<W>>,
    sink: Option<W>,
    output: Option<PathBuf>,
}

impl SpreadsheetBatch<BufWriter<File>> {
    /// Read `input`; `output` (which may be the same path) is written only
    /// when the batch finishes.
    ///
    /// The input layout follows its extension. The output is written in the
    /// layout of its own extension, or in the input's layout if it has none.
    ///
    /// # Errors
    ///
    /// Returns an error if `input` is neither `.csv` nor `.xlsx`, or cannot
    /// be read as one.
    pub fn open(input: &Path, output: &Path) -> Result<Self> {
        let read_as = SheetFormat::from_path(input).ok_or_else(|| {
            ResolveError::Config(format!(
                "{} is not a .csv or .xlsx spreadsheet",
                input.display()
            ))
        })?;
        let write_as = SheetFormat::from_path(output).unwrap_or(read_as);

        let file = File::open(input)?;
        let target = output.to_path_buf();
        let open = move || File::create(&target).map(BufWriter::new);
        let batch = match read_as {
            SheetFormat::Csv => Self::from_csv(file, open)?,
            SheetFormat::Xlsx => Self::from_xlsx(BufReader::new(file), open)?,
        };

        let mut batch = batch.with_output_format(write_as);
        batch.output = Some(output.to_path_buf());
        Ok(batch)
    }
}

impl<W: Write> SpreadsheetBatch<W> {
    /// Read a CSV sheet from any reader, with a deferred sink constructor.
    ///
    /// # Errors
    ///
    /// Returns an error if the CSV cannot be parsed.
    pub fn from_csv<R: Read>(
        input: R,
        open: impl FnOnce() -> std::io::Result<W> + 'static,
    ) -> Result<Self> {
        let mut reader = ReaderBuilder::new().flexible(true).from_reader(input);

        let headers = reader
            .headers()?
            .iter()
            .map(|h| h.trim_start_matches('\u{feff}').to_string())
            .collect();

        let mut rows = Vec::new();
        for record in reader.records() {
            rows.push(record?.iter().map(str::to_string).collect());
        }

        let table = Table {
            headers,
            rows,
            numeric: HashSet::new(),
            sheet_name: None,
        };
        Ok(Self::from_table(table, Box::new(open), SheetFormat::Csv))
    }

    /// Read the first worksheet of an `.xlsx` workbook, with a deferred sink
    /// constructor.
    ///
    /// Numbers are read as their shortest decimal text, so an EAN-13 stored
    /// as a number looks up the same as one stored as text.
    ///
    /// # Errors
    ///
    /// Returns an error if the workbook cannot be parsed or has no worksheet.
    pub fn from_xlsx<R: Read + Seek>(
        input: R,
        open: impl FnOnce() -> std::io::Result<W> + 'static,
    ) -> Result<Self> {
        let mut workbook: Xlsx<R> = Xlsx::new(input)?;
        let sheet_name = workbook.sheet_names().first().cloned();
        let range = workbook
            .worksheet_range_at(0)
            .ok_or_else(|| ResolveError::Workbook("workbook has no worksheet".to_string()))??;

        let mut lines = range.rows();
        let headers = lines
            .next()
            .map(|line| line.iter().map(ToString::to_string).collect())
            .unwrap_or_default();

        let mut rows = Vec::new();
        let mut numeric = HashSet::new();
        for (index, line) in lines.enumerate() {
            let mut cells = Vec::with_capacity(line.len());
            for (column, cell) in line.iter().enumerate() {
                if matches!(cell, Data::Int(_) | Data::Float(_)) {
                    numeric.insert((index, column));
                }
                cells.push(cell.to_string());
            }
            rows.push(cells);
        }

        let table = Table {
            headers,
            rows,
            numeric,
            sheet_name,
        };
        Ok(Self::from_table(table, Box::new(open), SheetFormat::Xlsx))
    }

    fn from_table(table: Table, open: OpenSink<W>, format: SheetFormat) -> Self {
        let mut headers = table.headers;

        let ean_index = headers.iter().position(|h| h.trim() == EAN_COLUMN);
        if ean_index.is_none() {
            warn!(column = EAN_COLUMN, "required column not found; no row will be looked up");
        }

        let work_id_index = match headers.iter().position(|h| h.trim() == WORK_ID_COLUMN) {
            Some(index) => index,
            None => {
                headers.push(WORK_ID_COLUMN.to_string());
                headers.len() - 1
            },
        };

        let rows: Vec<SheetRow> = table
            .rows
            .into_iter()
            .enumerate()
            .map(|(index, cells)| SheetRow {
                index,
                cells: row_cells(cells, headers.len(), work_id_index),
            })
            .collect();

        let mut numeric = table.numeric;
        numeric.retain(|&(_, column)| column != work_id_index);

        SpreadsheetBatch {
            headers,
            total: rows.len(),
            rows: rows.into_iter(),
            ean_index,
            work_id_index,
            numeric,
            sheet_name: table.sheet_name,
            format,
            output_rows: Vec::new(),
            open: Some(open),
            sink: None,
            output: None,
        }
    }

    /// Write the finished sheet as `format` instead of the input's layout.
    #[must_use]
    pub fn with_output_format(mut self, format: SheetFormat) -> Self {
        self.format = format;
        self
    }

    /// Layout the sheet will be written in.
    #[must_use]
    pub fn output_format(&self) -> SheetFormat {
        self.format
    }

    /// Column headers, including the `Work ID` column.
    #[must_use]
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// Take back the sink after [`finish`](BatchFormat::finish); `None` if
    /// the batch never began.
    #[must_use]
    pub fn into_sink(self) -> Option<W> {
        self.sink
    }

    fn write_csv(&self, sink: W) -> Result<W> {
        let mut writer = WriterBuilder::new().flexible(true).from_writer(sink);
        writer.write_record(&self.headers)?;
        for row in &self.output_rows {
            writer.write_record(&row.cells)?;
        }
        writer.flush()?;
        writer
            .into_inner()
            .map_err(|e| std::io::Error::new(e.error().kind(), e.to_string()).into())
    }

    fn write_xlsx(&self, mut sink: W) -> Result<W> {
        let mut workbook = Workbook::new();
        let worksheet = workbook.add_worksheet();
        if let Some(name) = &self.sheet_name {
            worksheet.set_name(name)?;
        }

        for (column, header) in self.headers.iter().enumerate() {
            worksheet.write_string(0, sheet_column(column)?, header)?;
        }
        for (offset, row) in self.output_rows.iter().enumerate() {
            let line = u32::try_from(offset + 1)
                .map_err(|_| ResolveError::Workbook("too many rows for a worksheet".to_string()))?;
            for (column, cell) in row.cells.iter().enumerate() {
                if cell.is_empty() {
                    continue;
                }
                let at = sheet_column(column)?;
                match cell.parse::<f64>() {
                    Ok(number) if self.numeric.contains(&(row.index, column)) => {
                        worksheet.write_number(line, at, number)?
                    },
                    _ => worksheet.write_string(line, at, cell)?,
                };
            }
        }

        sink.write_all(&workbook.save_to_buffer()?)?;
        sink.flush()?;
        Ok(sink)
    }
}

fn sheet_column(column: usize) -> Result<u16> {
    u16::try_from(column)
        .map_err(|_| ResolveError::Workbook("too many columns for a worksheet".to_string()))
}

/// Pad a row to the header width and clear its Work ID cell.
fn row_cells(mut cells: Vec<String>, width: usize, work_id_index: usize) -> Vec<String> {
    if cells.len() < width {
        cells.resize(width, String::new());
    }
    cells[work_id_index].clear();
    cells
}

impl<W: Write> fmt::Debug for SpreadsheetBatch<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpreadsheetBatch")
            .field("format", &self.format)
            .field("headers", &self.headers)
            .field("total", &self.total)
            .field("ean_index", &self.ean_index)
            .field("work_id_index", &self.work_id_index)
            .field("output", &self.output)
            .finish_non_exhaustive()
    }
}

impl<W: Write> BatchFormat for SpreadsheetBatch<W> {
    type Item = SheetRow;

    fn mode(&self) -> LookupMode {
        LookupMode::WorkId
    }

    fn total(&self) -> Option<usize> {
        Some(self.total)
    }

    fn output_path(&self) -> Option<&Path> {
        self.output.as_deref()
    }

    fn begin(&mut self) -> Result<()> {
        self.output_rows.reserve(self.total);
        Ok(())
    }

    fn next_record(&mut self) -> Result<Option<SheetRow>> {
        Ok(self.rows.next())
    }

    fn extract(&self, item: &SheetRow) -> Option<Identifier> {
        let index = self.ean_index?;
        Identifier::new(item.cells.get(index)?)
    }

    fn apply(&self, item: &mut SheetRow, value: &str) {
        item.cells[self.work_id_index] = value.to_string();
    }

    fn emit(&mut self, item: SheetRow) -> Result<Emitted> {
        self.output_rows.push(item);
        Ok(Emitted::Written)
    }

    fn finish(&mut self) -> Result<()> {
        let Some(open) = self.open.take() else {
            return Ok(());
        };

        let sink = open()?;
        let sink = match self.format {
            SheetFormat::Csv => self.write_csv(sink)?,
            SheetFormat::Xlsx => self.write_xlsx(sink)?,
        };
        self.sink = Some(sink);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn sheet(text: &str) -> SpreadsheetBatch<Vec<u8>> {
        SpreadsheetBatch::from_csv(text.as_bytes(), || Ok(Vec::new())).unwrap()
    }

    fn drain(batch: &mut SpreadsheetBatch<Vec<u8>>) -> Vec<SheetRow> {
        std::iter::from_fn(|| batch.next_record().unwrap()).collect()
    }

    #[test]
    fn test_work_id_column_appended() {
        let batch = sheet("Title,EAN-13\nDune,9780441013593\n");
        assert_eq!(batch.headers(), ["Title", "EAN-13", "Work ID"]);
        assert_eq!(batch.total(), Some(1));
    }

    #[test]
    fn test_existing_work_id_column_reused_and_cleared() {
        let mut batch = sheet("EAN-13,Work ID\n9780441013593,stale\n");
        assert_eq!(batch.headers(), ["EAN-13", "Work ID"]);
        let rows = drain(&mut batch);
        assert_eq!(rows[0].cells, vec!["9780441013593", ""]);
    }

    #[test]
    fn test_extract_reads_column_verbatim() {
        let mut batch = sheet("EAN-13,Title\n9780441013593,Dune\n,Blank\n");
        let rows = drain(&mut batch);
        assert_eq!(batch.extract(&rows[0]).unwrap().as_str(), "9780441013593");
        assert!(batch.extract(&rows[1]).is_none());
    }

    #[test]
    fn test_missing_ean_column_extracts_nothing() {
        let mut batch = sheet("ISBN,Title\n9780441013593,Dune\n");
        let rows = drain(&mut batch);
        assert!(batch.extract(&rows[0]).is_none());
    }

    #[test]
    fn test_short_row_padded() {
        let mut batch = sheet("Title,Author,EAN-13\nDune\n");
        let rows = drain(&mut batch);
        assert_eq!(rows[0].cells.len(), 4);
        assert!(batch.extract(&rows[0]).is_none());
    }

    #[test]
    fn test_bom_on_first_header() {
        let batch = sheet("\u{feff}EAN-13,Title\n9780441013593,Dune\n");
        assert_eq!(batch.headers()[0], "EAN-13");
    }

    #[test]
    fn test_apply_is_idempotent() {
        let mut batch = sheet("EAN-13\n9780441013593\n");
        let mut row = batch.next_record().unwrap().unwrap();
        batch.apply(&mut row, "wid1");
        let once = row.clone();
        batch.apply(&mut row, "wid1");
        assert_eq!(row, once);
        assert_eq!(row.cells, vec!["9780441013593", "wid1"]);
    }

    #[test]
    fn test_finish_writes_rows_in_order() {
        let mut batch = sheet("EAN-13\n111\n222\n");
        batch.begin().unwrap();
        let mut first = batch.next_record().unwrap().unwrap();
        batch.apply(&mut first, "wid1");
        batch.emit(first).unwrap();
        let second = batch.next_record().unwrap().unwrap();
        batch.emit(second).unwrap();
        batch.finish().unwrap();

        let written = String::from_utf8(batch.into_sink().unwrap()).unwrap();
        assert_eq!(written, "EAN-13,Work ID\n111,wid1\n222,\n");
    }

    fn workbook_bytes(sheet_name: &str) -> Vec<u8> {
        let mut workbook = Workbook::new();
        let worksheet = workbook.add_worksheet();
        worksheet.set_name(sheet_name).unwrap();
        worksheet.write_string(0, 0, "Title").unwrap();
        worksheet.write_string(0, 1, "EAN-13").unwrap();
        worksheet.write_string(1, 0, "Dune").unwrap();
        worksheet.write_number(1, 1, 9_780_441_013_593.0).unwrap();
        worksheet.write_string(2, 0, "Untitled").unwrap();
        workbook.save_to_buffer().unwrap()
    }

    fn workbook(bytes: Vec<u8>) -> SpreadsheetBatch<Cursor<Vec<u8>>> {
        SpreadsheetBatch::from_xlsx(Cursor::new(bytes), || Ok(Cursor::new(Vec::new()))).unwrap()
    }

    fn read_back(bytes: Vec<u8>) -> (String, calamine::Range<Data>) {
        let mut workbook: Xlsx<_> = Xlsx::new(Cursor::new(bytes)).unwrap();
        let name = workbook.sheet_names()[0].clone();
        let range = workbook.worksheet_range_at(0).unwrap().unwrap();
        (name, range)
    }

    #[test]
    fn test_numeric_ean_read_from_workbook() {
        let mut batch = workbook(workbook_bytes("Bookstore"));
        assert_eq!(batch.headers(), ["Title", "EAN-13", "Work ID"]);
        assert_eq!(batch.output_format(), SheetFormat::Xlsx);

        let rows = std::iter::from_fn(|| batch.next_record().unwrap()).collect::<Vec<_>>();
        assert_eq!(rows.len(), 2);
        assert_eq!(batch.extract(&rows[0]).unwrap().as_str(), "9780441013593");
        assert!(batch.extract(&rows[1]).is_none());
    }

    #[test]
    fn test_workbook_written_back_with_work_id() {
        let mut batch = workbook(workbook_bytes("Bookstore"));
        batch.begin().unwrap();
        let mut first = batch.next_record().unwrap().unwrap();
        batch.apply(&mut first, "wid1");
        assert_eq!(batch.emit(first).unwrap(), Emitted::Written);
        let second = batch.next_record().unwrap().unwrap();
        batch.emit(second).unwrap();
        batch.finish().unwrap();

        let (name, range) = read_back(batch.into_sink().unwrap().into_inner());
        assert_eq!(name, "Bookstore");
        assert_eq!(range.get_value((0, 2)), Some(&Data::String("Work ID".to_string())));
        assert_eq!(range.get_value((1, 2)), Some(&Data::String("wid1".to_string())));
        assert_eq!(range.get_value((1, 1)), Some(&Data::Float(9_780_441_013_593.0)));
        assert_eq!(range.get_value((2, 0)), Some(&Data::String("Untitled".to_string())));
        assert!(matches!(range.get_value((2, 2)), None | Some(Data::Empty)));
    }

    #[test]
    fn test_csv_input_written_as_workbook() {
        let mut batch = SpreadsheetBatch::from_csv("EAN-13\n111\n".as_bytes(), || {
            Ok(Cursor::new(Vec::new()))
        })
        .unwrap()
        .with_output_format(SheetFormat::Xlsx);
        batch.begin().unwrap();
        let mut row = batch.next_record().unwrap().unwrap();
        batch.apply(&mut row, "wid1");
        batch.emit(row).unwrap();
        batch.finish().unwrap();

        let (name, range) = read_back(batch.into_sink().unwrap().into_inner());
        assert_eq!(name, "Sheet1");
        assert_eq!(range.get_value((1, 0)), Some(&Data::String("111".to_string())));
        assert_eq!(range.get_value((1, 1)), Some(&Data::String("wid1".to_string())));
    }

    #[test]
    fn test_garbage_workbook_rejected() {
        let result = SpreadsheetBatch::from_xlsx(Cursor::new(b"not a zip".to_vec()), || {
            Ok(Vec::<u8>::new())
        });
        assert!(matches!(result, Err(ResolveError::Workbook(_))));
    }

    #[test]
    fn test_sheet_format_from_path() {
        assert_eq!(SheetFormat::from_path(Path::new("a/b.XLSX")), Some(SheetFormat::Xlsx));
        assert_eq!(SheetFormat::from_path(Path::new("b.csv")), Some(SheetFormat::Csv));
        assert_eq!(SheetFormat::from_path(Path::new("b.xls")), None);
    }

    #[test]
    fn test_open_rejects_unknown_extension() {
        let dir = tempfile::TempDir::new().unwrap();
        let input = dir.path().join("bookstore.txt");
        std::fs::write(&input, "EAN-13\n111\n").unwrap();
        let err = SpreadsheetBatch::open(&input, &input).unwrap_err();
        assert!(matches!(err, ResolveError::Config(_)));
    }

    #[test]
    fn test_nothing_written_without_finish() {
        let mut batch = sheet("EAN-13\n111\n");
        batch.begin().unwrap();
        assert!(batch.into_sink().is_none());
    }
}
