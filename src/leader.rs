//! MARC record leader.
//!
//! The leader is the 24-byte fixed-length header of every ISO 2709 record.
//! Positions 0-4 hold the record length and 12-16 the base address of data;
//! both are recomputed whenever a record is written or extended.

use crate::error::{MarcError, MarcResult};

/// Length of the leader in bytes.
pub const LEADER_LEN: usize = 24;

/// MARC Leader - 24 bytes at the start of every MARC record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Leader {
    /// Record length (5 digits) - positions 0-4
    pub record_length: u32,
    /// Record status (1 char) - position 5
    pub record_status: char,
    /// Type of record (1 char) - position 6
    pub record_type: char,
    /// Bibliographic level (1 char) - position 7
    pub bibliographic_level: char,
    /// Type of control record (1 char) - position 8
    pub control_record_type: char,
    /// Character coding scheme (1 char) - position 9
    pub character_coding: char,
    /// Indicator count (1 digit) - position 10 (usually 2)
    pub indicator_count: u8,
    /// Subfield code count (1 digit) - position 11 (usually 2)
    pub subfield_code_count: u8,
    /// Base address of data (5 digits) - positions 12-16
    pub data_base_address: u32,
    /// Encoding level (1 char) - position 17
    pub encoding_level: char,
    /// Cataloging form (1 char) - position 18
    pub cataloging_form: char,
    /// Multipart resource record level (1 char) - position 19
    pub multipart_level: char,
    /// Entry map (4 chars) - positions 20-23
    pub reserved: String,
}

impl Default for Leader {
    fn default() -> Self {
        Leader {
            record_length: 0,
            record_status: 'n',
            record_type: 'a',
            bibliographic_level: 'm',
            control_record_type: ' ',
            character_coding: 'a',
            indicator_count: 2,
            subfield_code_count: 2,
            data_base_address: 0,
            encoding_level: ' ',
            cataloging_form: 'a',
            multipart_level: ' ',
            reserved: "4500".to_string(),
        }
    }
}

impl Leader {
    /// Parse a leader from the first 24 bytes of a record.
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes are too short or a numeric position
    /// holds non-digits.
    pub fn from_bytes(bytes: &[u8]) -> MarcResult<Self> {
        if bytes.len() < LEADER_LEN {
            return Err(MarcError::InvalidLeader(format!(
                "Leader must be at least 24 bytes, got {}",
                bytes.len()
            )));
        }

        Ok(Leader {
            record_length: parse_digits(&bytes[0..5])?,
            record_status: bytes[5] as char,
            record_type: bytes[6] as char,
            bibliographic_level: bytes[7] as char,
            control_record_type: bytes[8] as char,
            character_coding: bytes[9] as char,
            indicator_count: parse_count(bytes[10], 10)?,
            subfield_code_count: parse_count(bytes[11], 11)?,
            data_base_address: parse_digits(&bytes[12..17])?,
            encoding_level: bytes[17] as char,
            cataloging_form: bytes[18] as char,
            multipart_level: bytes[19] as char,
            reserved: String::from_utf8_lossy(&bytes[20..24]).to_string(),
        })
    }

    /// Check that the length and base address are usable for slicing the
    /// directory and data area.
    ///
    /// # Errors
    ///
    /// Returns an error if `record_length` or `data_base_address` is less
    /// than 24, or the base address lies past the end of the record.
    pub fn validate_for_reading(&self) -> MarcResult<()> {
        if (self.record_length as usize) < LEADER_LEN {
            return Err(MarcError::InvalidLeader(format!(
                "Record length must be at least 24, got {}",
                self.record_length
            )));
        }
        if (self.data_base_address as usize) < LEADER_LEN {
            return Err(MarcError::InvalidLeader(format!(
                "Base address of data must be at least 24, got {}",
                self.data_base_address
            )));
        }
        if self.data_base_address > self.record_length {
            return Err(MarcError::InvalidLeader(format!(
                "Base address {} exceeds record length {}",
                self.data_base_address, self.record_length
            )));
        }
        Ok(())
    }

    /// Serialize leader to 24 bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if a numeric value does not fit its position or the
    /// entry map is not 4 characters.
    pub fn as_bytes(&self) -> MarcResult<Vec<u8>> {
        if self.record_length > 99_999 || self.data_base_address > 99_999 {
            return Err(MarcError::InvalidLeader(format!(
                "Record length {} or base address {} exceeds 5 digits",
                self.record_length, self.data_base_address
            )));
        }
        let reserved = self.reserved.as_bytes();
        if reserved.len() != 4 {
            return Err(MarcError::InvalidLeader(format!(
                "Reserved field must be 4 characters, got {}",
                reserved.len()
            )));
        }

        let mut bytes = Vec::with_capacity(LEADER_LEN);
        bytes.extend_from_slice(format!("{:05}", self.record_length).as_bytes());
        bytes.push(self.record_status as u8);
        bytes.push(self.record_type as u8);
        bytes.push(self.bibliographic_level as u8);
        bytes.push(self.control_record_type as u8);
        bytes.push(self.character_coding as u8);
        bytes.push(b'0' + self.indicator_count);
        bytes.push(b'0' + self.subfield_code_count);
        bytes.extend_from_slice(format!("{:05}", self.data_base_address).as_bytes());
        bytes.push(self.encoding_level as u8);
        bytes.push(self.cataloging_form as u8);
        bytes.push(self.multipart_level as u8);
        bytes.extend_from_slice(reserved);
        Ok(bytes)
    }
}

fn parse_count(byte: u8, position: usize) -> MarcResult<u8> {
    if byte.is_ascii_digit() {
        Ok(byte - b'0')
    } else {
        Err(MarcError::InvalidLeader(format!(
            "Invalid count at position {position}: {}",
            byte as char
        )))
    }
}

/// Parse 5-digit ASCII number from bytes
fn parse_digits(bytes: &[u8]) -> MarcResult<u32> {
    let s = String::from_utf8_lossy(bytes);
    s.parse::<u32>()
        .map_err(|_| MarcError::InvalidLeader(format!("Invalid numeric field: '{s}'")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_leader_from_bytes() {
        let leader = Leader::from_bytes(b"00714cam a2200205 a 4500").unwrap();

        assert_eq!(leader.record_length, 714);
        assert_eq!(leader.record_status, 'c');
        assert_eq!(leader.record_type, 'a');
        assert_eq!(leader.bibliographic_level, 'm');
        assert_eq!(leader.character_coding, 'a');
        assert_eq!(leader.indicator_count, 2);
        assert_eq!(leader.subfield_code_count, 2);
        assert_eq!(leader.data_base_address, 205);
        assert_eq!(leader.cataloging_form, 'a');
        assert_eq!(leader.reserved, "4500");
    }

    #[test]
    fn test_leader_bytes_are_stable() {
        let bytes = b"00714cam a2200205 a 4500";
        let leader = Leader::from_bytes(bytes).unwrap();
        assert_eq!(leader.as_bytes().unwrap(), bytes.to_vec());
    }

    #[test]
    fn test_leader_too_short() {
        assert!(Leader::from_bytes(b"0123456789012").is_err());
    }

    #[test]
    fn test_leader_invalid_indicator_count() {
        assert!(Leader::from_bytes(b"00714cam aX200205 a 4500").is_err());
    }

    #[test]
    fn test_validate_rejects_small_base_address() {
        let leader = Leader::from_bytes(b"00050nam a2200010 i 4500").unwrap();
        let err = leader.validate_for_reading().unwrap_err().to_string();
        assert!(err.contains("Base address of data must be at least 24"), "got: {err}");
    }

    #[test]
    fn test_as_bytes_rejects_oversized_length() {
        let leader = Leader {
            record_length: 100_000,
            ..Leader::default()
        };
        assert!(leader.as_bytes().is_err());
    }
}
