//! Lookup keys and the ISBN cleaning rule.
//!
//! MARC `020` fields are read through their mnemonic display form
//! (`=020  \\$a9780123456789 (pbk.)`). Keeping only the digit runs of that
//! line yields the tag followed by the ISBN, so the first
//! [`QUALIFIER_PREFIX_LEN`] digits are dropped to recover the bare number.

use lazy_static::lazy_static;
use regex::Regex;
use std::fmt;

/// Number of leading digits dropped from a cleaned MARC identifier.
pub const QUALIFIER_PREFIX_LEN: usize = 3;

lazy_static! {
    static ref DIGIT_RUN: Regex = Regex::new(r"[0-9]+").expect("static pattern");
}

/// A non-empty lookup key sent to the metadata service.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identifier(String);

impl Identifier {
    /// Wrap a key, returning `None` if it is empty after trimming.
    #[must_use]
    pub fn new(value: &str) -> Option<Self> {
        let value = value.trim();
        if value.is_empty() {
            None
        } else {
            Some(Identifier(value.to_string()))
        }
    }

    /// The key as sent in the `q` query parameter.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Identifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Concatenate every run of ASCII digits in `raw`.
#[must_use]
pub fn digits_only(raw: &str) -> String {
    DIGIT_RUN.find_iter(raw).map(|m| m.as_str()).collect()
}

/// Apply the MARC cleaning rule: digits only, then drop the first
/// [`QUALIFIER_PREFIX_LEN`] characters.
///
/// ```
/// use oclc_resolver::identifier::clean_isbn;
///
/// assert_eq!(clean_isbn("9780123456789 (pbk.)"), "0123456789");
/// assert_eq!(clean_isbn("=020  \\\\$a9780123456789 (pbk.)"), "9780123456789");
/// ```
#[must_use]
pub fn clean_isbn(raw: &str) -> String {
    digits_only(raw)
        .get(QUALIFIER_PREFIX_LEN..)
        .unwrap_or_default()
        .to_string()
}
