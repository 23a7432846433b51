//! MARC bibliographic record structures.
//!
//! - [`Record`]: leader, control fields and data fields
//! - [`Field`]: variable data fields (010+)
//! - [`Subfield`]: coded data elements within a field
//!
//! # Examples
//!
//! ```
//! use oclc_resolver::{Field, Leader, Record};
//!
//! let mut record = Record::new(Leader::default());
//! record.add_control_field_str("001", "ocm12345");
//!
//! let mut isbn = Field::new("020".to_string(), ' ', ' ');
//! isbn.add_subfield_str('a', "9780123456789 (pbk.)");
//! record.add_field(isbn);
//!
//! assert_eq!(record.get_field("020").unwrap().to_string(), "=020  \\\\$a9780123456789 (pbk.)");
//! ```

use crate::leader::Leader;
use indexmap::IndexMap;
use smallvec::SmallVec;
use std::fmt;

/// One bibliographic record as read from, or written to, ISO 2709.
///
/// Data fields are grouped by tag; within a tag they keep the order they
/// were added in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// Leader; length and base address are recomputed on write
    pub leader: Leader,
    /// `00X` fields by tag
    pub control_fields: IndexMap<String, String>,
    /// Variable data fields by tag
    pub fields: IndexMap<String, Vec<Field>>,
}

/// A variable data field: tag, two indicators, subfields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    /// Three-character tag, e.g. `020`
    pub tag: String,
    /// Indicator 1 (`' '` when blank)
    pub indicator1: char,
    /// Indicator 2 (`' '` when blank)
    pub indicator2: char,
    /// Subfields (inline for the typical field with 4 or fewer)
    pub subfields: SmallVec<[Subfield; 4]>,
}

/// One `$code value` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subfield {
    /// Code, e.g. `a`
    pub code: char,
    /// Content, without delimiter
    pub value: String,
}

impl Record {
    /// Empty record with `leader`.
    #[must_use]
    pub fn new(leader: Leader) -> Self {
        Record {
            leader,
            control_fields: IndexMap::new(),
            fields: IndexMap::new(),
        }
    }

    /// Set an `00X` field, replacing any previous value.
    pub fn add_control_field(&mut self, tag: String, value: String) {
        self.control_fields.insert(tag, value);
    }

    /// [`add_control_field`](Self::add_control_field) from borrowed strings.
    pub fn add_control_field_str(&mut self, tag: &str, value: &str) {
        self.add_control_field(tag.to_string(), value.to_string());
    }

    /// Value of an `00X` field.
    #[must_use]
    pub fn get_control_field(&self, tag: &str) -> Option<&str> {
        self.control_fields.get(tag).map(String::as_str)
    }

    /// Append a data field after any others with the same tag.
    pub fn add_field(&mut self, field: Field) {
        self.fields
            .entry(field.tag.clone())
            .or_default()
            .push(field);
    }

    /// First field with `tag`.
    #[must_use]
    pub fn get_field(&self, tag: &str) -> Option<&Field> {
        self.fields.get(tag).and_then(|v| v.first())
    }

    /// Every field with `tag`, in order.
    pub fn fields_by_tag(&self, tag: &str) -> impl Iterator<Item = &Field> {
        self.fields.get(tag).map(|v| v.iter()).into_iter().flatten()
    }
}

impl Field {
    /// Field with no subfields.
    #[must_use]
    pub fn new(tag: String, indicator1: char, indicator2: char) -> Self {
        Field {
            tag,
            indicator1,
            indicator2,
            subfields: SmallVec::new(),
        }
    }

    /// Append a subfield.
    pub fn add_subfield(&mut self, code: char, value: String) {
        self.subfields.push(Subfield { code, value });
    }

    /// [`add_subfield`](Self::add_subfield) from a borrowed value.
    pub fn add_subfield_str(&mut self, code: char, value: &str) {
        self.add_subfield(code, value.to_string());
    }

    /// Value of the first subfield with `code`.
    #[must_use]
    pub fn get_subfield(&self, code: char) -> Option<&str> {
        self.subfields
            .iter()
            .find(|sf| sf.code == code)
            .map(|sf| sf.value.as_str())
    }
}

/// Mnemonic (MARCMaker) line form: `=TAG  ii$aValue$bValue`, with blank
/// indicators shown as `\`.
impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ind = |c: char| if c == ' ' { '\\' } else { c };
        write!(
            f,
            "={}  {}{}",
            self.tag,
            ind(self.indicator1),
            ind(self.indicator2)
        )?;
        for subfield in &self.subfields {
            write!(f, "${}{}", subfield.code, subfield.value)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn isbn_field(value: &str) -> Field {
        let mut field = Field::new("020".to_string(), ' ', ' ');
        field.add_subfield_str('a', value);
        field
    }

    #[test]
    fn test_fields_keep_insertion_order_per_tag() {
        let mut record = Record::new(Leader::default());
        record.add_field(isbn_field("111"));
        record.add_field(isbn_field("222"));

        let values: Vec<_> = record
            .fields_by_tag("020")
            .filter_map(|f| f.get_subfield('a'))
            .collect();
        assert_eq!(values, vec!["111", "222"]);
        assert_eq!(record.get_field("020").unwrap().get_subfield('a'), Some("111"));
    }

    #[test]
    fn test_missing_tag() {
        let record = Record::new(Leader::default());
        assert!(record.get_field("020").is_none());
        assert_eq!(record.fields_by_tag("020").count(), 0);
    }

    #[test]
    fn test_display_blank_indicators() {
        let mut field = isbn_field("9780123456789");
        field.add_subfield_str('q', "(pbk.)");
        assert_eq!(field.to_string(), "=020  \\\\$a9780123456789$q(pbk.)");
    }

    #[test]
    fn test_display_coded_indicators() {
        let mut field = Field::new("245".to_string(), '1', '0');
        field.add_subfield_str('a', "Title");
        assert_eq!(field.to_string(), "=245  10$aTitle");
    }

    #[test]
    fn test_control_fields() {
        let mut record = Record::new(Leader::default());
        record.add_control_field_str("001", "ocm00012345");
        assert_eq!(record.get_control_field("001"), Some("ocm00012345"));
        assert_eq!(record.get_control_field("003"), None);
    }
}
