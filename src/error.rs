//! Error types for record codec and resolution operations.
//!
//! This module provides [`MarcError`] for ISO 2709 parsing and writing,
//! [`ResolveError`] for everything the resolution pipeline can fail with, and
//! the [`Result`] convenience type.

use thiserror::Error;

/// Error type for MARC record parsing and serialization.
#[derive(Error, Debug)]
pub enum MarcError {
    /// Error indicating an invalid or malformed MARC record.
    #[error("Invalid MARC record: {0}")]
    InvalidRecord(String),

    /// Error indicating an invalid leader (24-byte header).
    #[error("Invalid leader: {0}")]
    InvalidLeader(String),

    /// Error indicating an invalid field structure.
    #[error("Invalid field: {0}")]
    InvalidField(String),

    /// IO error from the underlying source/destination.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Error type for the resolution pipeline.
///
/// Only [`ResolveError::Auth`] aborts a batch. The per-record kinds
/// ([`ResolveError::Network`], [`ResolveError::Http`]) are produced by the
/// service client and absorbed by the batch driver.
#[derive(Error, Debug)]
pub enum ResolveError {
    /// The client-credentials exchange failed.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Transport-level failure (connection refused, timeout, ...).
    #[error("Network error: {0}")]
    Network(String),

    /// The service answered with a non-2xx status.
    #[error("HTTP error: status {status}")]
    Http {
        /// Response status code
        status: u16,
    },

    /// Missing or invalid configuration value.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Record codec failure.
    #[error(transparent)]
    Marc(#[from] MarcError),

    /// Spreadsheet read/write failure.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Excel workbook read/write failure.
    #[error("Workbook error: {0}")]
    Workbook(String),

    /// IO error from the record source or sink.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<calamine::XlsxError> for ResolveError {
    fn from(e: calamine::XlsxError) -> Self {
        ResolveError::Workbook(e.to_string())
    }
}

impl From<rust_xlsxwriter::XlsxError> for ResolveError {
    fn from(e: rust_xlsxwriter::XlsxError) -> Self {
        ResolveError::Workbook(e.to_string())
    }
}

impl ResolveError {
    /// Returns `true` for errors that terminate the whole batch.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        !matches!(self, ResolveError::Network(_) | ResolveError::Http { .. })
    }
}

/// Convenience type alias for [`std::result::Result`] with [`ResolveError`].
pub type Result<T> = std::result::Result<T, ResolveError>;

/// Result type used by the ISO 2709 codec.
pub type MarcResult<T> = std::result::Result<T, MarcError>;
