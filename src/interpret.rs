//! Interpretation of search responses.
//!
//! A response resolves to the identifier found at a fixed JSON path of the
//! first entry in `bibRecords`:
//!
//! | Mode | Path |
//! |------|------|
//! | [`LookupMode::OclcNumber`] | `bibRecords[0].identifier.oclcNumber` |
//! | [`LookupMode::WorkId`] | `bibRecords[0].work.id` |
//!
//! `numberOfRecords: 0`, or a `bibRecords` array that is missing or empty,
//! is a [`LookupResult::NoMatch`].

use serde_json::Value;
use std::fmt;

/// Which identifier to take from a matching record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupMode {
    /// The OCLC control number
    OclcNumber,
    /// The Work ID grouping related manifestations
    WorkId,
}

impl LookupMode {
    /// JSON pointer into the first matching record.
    #[must_use]
    pub fn pointer(self) -> &'static str {
        match self {
            LookupMode::OclcNumber => "/identifier/oclcNumber",
            LookupMode::WorkId => "/work/id",
        }
    }
}

impl fmt::Display for LookupMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LookupMode::OclcNumber => f.write_str("OCLC number"),
            LookupMode::WorkId => f.write_str("Work ID"),
        }
    }
}

/// Why a response could not be used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupErrorKind {
    /// The body was not valid JSON
    ParseFailure,
    /// The first record has no value at the requested path
    MissingField,
}

impl fmt::Display for LookupErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LookupErrorKind::ParseFailure => f.write_str("parse failure"),
            LookupErrorKind::MissingField => f.write_str("missing field"),
        }
    }
}

/// Outcome of interpreting one response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupResult {
    /// The identifier found at the mode's path
    Resolved(String),
    /// The service found no matching record
    NoMatch,
    /// The response was unusable
    Error(LookupErrorKind, String),
}

/// Interpret a raw response body.
#[must_use]
pub fn interpret(raw: &str, mode: LookupMode) -> LookupResult {
    let parsed: Value = match serde_json::from_str(raw) {
        Ok(value) => value,
        Err(e) => return LookupResult::Error(LookupErrorKind::ParseFailure, e.to_string()),
    };

    if parsed.get("numberOfRecords").and_then(Value::as_u64) == Some(0) {
        return LookupResult::NoMatch;
    }

    let Some(first) = parsed
        .get("bibRecords")
        .and_then(Value::as_array)
        .and_then(|records| records.first())
    else {
        return LookupResult::NoMatch;
    };

    match first.pointer(mode.pointer()).and_then(scalar_text) {
        Some(value) => LookupResult::Resolved(value),
        None => LookupResult::Error(
            LookupErrorKind::MissingField,
            format!("bibRecords[0]{} not present", mode.pointer().replace('/', ".")),
        ),
    }
}

/// Strings are taken as-is, numbers rendered in decimal; anything else
/// (including an empty string) is treated as absent.
fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
