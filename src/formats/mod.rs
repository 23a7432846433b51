//! Record sources and sinks for the resolution pipeline.
//!
//! Every input format implements [`BatchFormat`], so the batch driver runs a
//! single loop regardless of where the records come from.
//!
//! | Format | Module | Lookup key | Written back to |
//! |--------|--------|------------|-----------------|
//! | ISO 2709 | [`marc`] | first `020` field, cleaned | new `941 $f` |
//! | CSV, `.xlsx` | [`spreadsheet`] | `EAN-13` column, verbatim | `Work ID` column |
//!
//! # Example
//!
//! ```no_run
//! use oclc_resolver::formats::marc::{derived_output_path, MarcBatch};
//! use std::path::Path;
//!
//! let input = Path::new("records.mrc");
//! let batch = MarcBatch::open(input, &derived_output_path(input))?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod marc;
pub mod spreadsheet;
mod traits;

pub use spreadsheet::SheetFormat;
pub use traits::{BatchFormat, Emitted, OpenSink};

use crate::interpret::LookupMode;
use std::path::Path;

/// Supported input formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceFormat {
    /// ISO 2709 binary MARC (`.mrc`, `.marc`)
    Marc,
    /// Spreadsheet with an `EAN-13` column (`.csv`, `.xlsx`)
    Spreadsheet(SheetFormat),
}

impl SourceFormat {
    /// Detect format from file extension.
    ///
    /// ```
    /// use oclc_resolver::formats::{SheetFormat, SourceFormat};
    ///
    /// assert_eq!(SourceFormat::from_extension("MRC"), Some(SourceFormat::Marc));
    /// assert_eq!(
    ///     SourceFormat::from_extension("xlsx"),
    ///     Some(SourceFormat::Spreadsheet(SheetFormat::Xlsx))
    /// );
    /// assert_eq!(SourceFormat::from_extension("xls"), None);
    /// ```
    #[must_use]
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "mrc" | "marc" => Some(Self::Marc),
            other => SheetFormat::from_extension(other).map(Self::Spreadsheet),
        }
    }

    /// Detect format from a path's extension.
    #[must_use]
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }

    /// Which identifier this format stores.
    #[must_use]
    pub const fn mode(&self) -> LookupMode {
        match self {
            Self::Marc => LookupMode::OclcNumber,
            Self::Spreadsheet(_) => LookupMode::WorkId,
        }
    }

    /// Human-readable name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Marc => "ISO 2709",
            Self::Spreadsheet(sheet) => sheet.name(),
        }
    }
}

impl std::fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}
