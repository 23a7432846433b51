#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

//! # Pipeline
//!
//! ```text
//! BatchFormat::next_record ─► extract ─► MetadataClient::query ─► interpret
//!                                                                   │
//!            BatchFormat::emit ◄─ apply (Resolved only) ◄───────────┘
//! ```
//!
//! One bearer token is acquired per batch ([`auth::acquire`]); records are
//! processed sequentially and written in source order.
//!
//! ## Reading and writing MARC
//!
//! ```
//! use oclc_resolver::{Field, Leader, MarcReader, MarcWriter, Record};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut record = Record::new(Leader::default());
//! record.add_control_field_str("001", "ocm00001");
//! let mut isbn = Field::new("020".to_string(), ' ', ' ');
//! isbn.add_subfield_str('a', "9780441013593");
//! record.add_field(isbn);
//!
//! let mut buffer = Vec::new();
//! MarcWriter::new(&mut buffer).write_record(&record)?;
//!
//! let mut reader = MarcReader::new(buffer.as_slice());
//! let parsed = reader.read_record()?.expect("one record");
//! assert_eq!(parsed.get_field("020").and_then(|f| f.get_subfield('a')), Some("9780441013593"));
//! # Ok(())
//! # }
//! ```
//!
//! ## Interpreting a search response
//!
//! ```
//! use oclc_resolver::{interpret, LookupMode, LookupResult};
//!
//! let body = r#"{"numberOfRecords": 1, "bibRecords": [{"work": {"id": "wid1"}}]}"#;
//! assert_eq!(interpret(body, LookupMode::WorkId), LookupResult::Resolved("wid1".into()));
//! ```
//!
//! ## Modules
//!
//! - [`leader`], [`record`], [`reader`], [`writer`]: ISO 2709 records
//! - [`identifier`]: lookup key cleaning
//! - [`config`], [`auth`], [`client`]: service access
//! - [`interpret`]: search response decisions
//! - [`formats`]: MARC and spreadsheet batches
//! - [`driver`]: batch orchestration and progress
//! - [`telemetry`]: log output setup

pub mod auth;
pub mod client;
pub mod config;
pub mod driver;
pub mod error;
pub mod formats;
pub mod identifier;
pub mod interpret;
pub mod leader;
pub mod reader;
pub mod record;
pub mod telemetry;
pub mod writer;

pub use auth::{ClientCredentials, Credential};
pub use client::MetadataClient;
pub use config::ServiceConfig;
pub use driver::{BatchDriver, BatchOutcome, BatchState, LogProgress, NoProgress, ProgressReporter};
pub use error::{MarcError, ResolveError, Result};
pub use formats::marc::MarcBatch;
pub use formats::spreadsheet::SpreadsheetBatch;
pub use formats::{BatchFormat, Emitted, SheetFormat, SourceFormat};
pub use identifier::Identifier;
pub use interpret::{interpret, LookupErrorKind, LookupMode, LookupResult};
pub use leader::Leader;
pub use reader::MarcReader;
pub use record::{Field, Record, Subfield};
pub use writer::MarcWriter;
