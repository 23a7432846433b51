//! The record source/sink capability shared by every batch format.
//!
//! A batch format owns both ends of a run: it reads records from its source,
//! knows where the lookup key lives in a record, knows how to write the
//! resolved identifier back, and owns the output sink. The batch driver only
//! sequences these calls, so the MARC and spreadsheet paths share one loop.
//!
//! # Call order
//!
//! 1. [`begin`](BatchFormat::begin) once, after authentication succeeded
//! 2. [`next_record`](BatchFormat::next_record) until it returns `Ok(None)`,
//!    with [`extract`](BatchFormat::extract), optionally
//!    [`apply`](BatchFormat::apply), then [`emit`](BatchFormat::emit) for
//!    every record
//! 3. [`finish`](BatchFormat::finish) once
//!
//! Implementations must not create or touch their output before `begin`, so
//! that an aborted batch leaves nothing behind.

use crate::error::Result;
use crate::identifier::Identifier;
use crate::interpret::LookupMode;
use std::io;
use std::path::Path;

/// Deferred constructor for an output sink.
pub type OpenSink<W> = Box<dyn FnOnce() -> io::Result<W>>;

/// What [`BatchFormat::emit`] wrote for a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Emitted {
    /// The record as it stands, including any applied identifier
    Written,
    /// The applied identifier could not be stored; the original record was
    /// written instead
    Reverted,
}

/// A record source paired with its sink.
pub trait BatchFormat: std::fmt::Debug {
    /// One unit of work: a MARC record entry or a spreadsheet row.
    type Item;

    /// Which identifier this format stores.
    fn mode(&self) -> LookupMode;

    /// Number of records, when known up front (used for progress).
    fn total(&self) -> Option<usize> {
        None
    }

    /// Where the output is written, when it is a file.
    fn output_path(&self) -> Option<&Path> {
        None
    }

    /// Open the output sink.
    ///
    /// # Errors
    ///
    /// Returns an error if the sink cannot be created.
    fn begin(&mut self) -> Result<()>;

    /// Read the next record, or `Ok(None)` at the end of the source.
    ///
    /// # Errors
    ///
    /// Returns an error only if the source itself fails (I/O). A malformed
    /// record is returned as an item whose [`extract`](Self::extract) is
    /// `None`.
    fn next_record(&mut self) -> Result<Option<Self::Item>>;

    /// The lookup key of a record, or `None` if it has none.
    fn extract(&self, item: &Self::Item) -> Option<Identifier>;

    /// Store a resolved identifier in the record.
    ///
    /// Only adds or sets the identifier; applying the same value twice leaves
    /// the record as after the first call.
    fn apply(&self, item: &mut Self::Item, value: &str);

    /// Hand a record to the sink. Records are emitted in source order.
    ///
    /// A record that cannot hold its applied identifier is still written,
    /// unchanged, and reported as [`Emitted::Reverted`].
    ///
    /// # Errors
    ///
    /// Returns an error if the sink cannot be written.
    fn emit(&mut self, item: Self::Item) -> Result<Emitted>;

    /// Flush and persist the sink.
    ///
    /// # Errors
    ///
    /// Returns an error if the output cannot be written.
    fn finish(&mut self) -> Result<()>;
}
