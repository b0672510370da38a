//! MARC record leader parsing and manipulation.
//!
//! The MARC leader is a 24-byte fixed-length field at the start of every MARC record.
//! It contains metadata describing the record's structure, content type, and encoding.
//!
//! # Structure
//!
//! - Positions 0-4: Record length (5 digits)
//! - Position 5: Record status
//! - Position 6: Record type (a = language material, z = authority, etc.)
//! - Position 7: Bibliographic level (m = monograph, s = serial, etc.)
//! - Position 8: Control record type
//! - Position 9: Character coding (space = MARC-8, a = UTF-8)
//! - Position 10: Indicator count (always 2)
//! - Position 11: Subfield code count (always 2)
//! - Positions 12-16: Base address of data (5 digits)
//! - Positions 17-19: Encoding level, cataloging form, multipart level
//! - Positions 20-23: Entry map (always "4500")

use crate::diagnostics::Diagnostics;
use crate::error::{MarcError, Result};
use serde::{Deserialize, Serialize};

/// Length of the leader in bytes.
pub const LEADER_LENGTH: usize = 24;

/// Largest value a 5-digit length or address field can hold.
pub const MAX_FIVE_DIGIT_VALUE: u32 = 99_999;

/// Coarse record classification derived from leader position 6.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordType {
    /// Bibliographic description of a resource
    Bibliographic,
    /// Authority record (name, subject heading, ...)
    Authority,
    /// Classification record
    Classification,
    /// Leader position 6 holds an unrecognised code
    Unknown,
}

/// MARC Leader - 24 bytes at the start of every MARC record.
///
/// Structural positions (10, 11, 20-22) are stored as read so that a leader
/// violating MARC 21 can still be carried through with a warning;
/// [`Leader::default`] always satisfies them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
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
    /// Indicator count - position 10 (must be '2')
    pub indicator_count: char,
    /// Subfield code count - position 11 (must be '2')
    pub subfield_code_count: char,
    /// Base address of data (5 digits) - positions 12-16
    pub data_base_address: u32,
    /// Encoding level (1 char) - position 17
    pub encoding_level: char,
    /// Cataloging form (1 char) - position 18
    pub cataloging_form: char,
    /// Multipart resource record level (1 char) - position 19
    pub multipart_level: char,
    /// Entry map (4 chars) - positions 20-23
    pub entry_map: String,
}

impl Default for Leader {
    /// A leader for a new UTF-8 language-material monograph.
    fn default() -> Self {
        Leader {
            record_length: 0,
            record_status: 'n',
            record_type: 'a',
            bibliographic_level: 'm',
            control_record_type: ' ',
            character_coding: 'a',
            indicator_count: '2',
            subfield_code_count: '2',
            data_base_address: 0,
            encoding_level: ' ',
            cataloging_form: 'i',
            multipart_level: ' ',
            entry_map: "4500".to_string(),
        }
    }
}

impl Leader {
    /// Parse a leader from 24 bytes
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes are too short or the record length and
    /// base address are not numeric.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < LEADER_LENGTH {
            return Err(MarcError::InvalidLeader(format!(
                "Leader must be at least 24 bytes, got {}",
                bytes.len()
            )));
        }

        let record_length = parse_digits(&bytes[0..5])?;
        let data_base_address = parse_digits(&bytes[12..17])?;

        Ok(Leader {
            record_length,
            record_status: bytes[5] as char,
            record_type: bytes[6] as char,
            bibliographic_level: bytes[7] as char,
            control_record_type: bytes[8] as char,
            character_coding: bytes[9] as char,
            indicator_count: bytes[10] as char,
            subfield_code_count: bytes[11] as char,
            data_base_address,
            encoding_level: bytes[17] as char,
            cataloging_form: bytes[18] as char,
            multipart_level: bytes[19] as char,
            entry_map: bytes[20..24].iter().map(|&b| b as char).collect(),
        })
    }

    /// Parse the text content of a MARC-XML `<leader>` element.
    ///
    /// Producers commonly leave the record length and base address blank; runs
    /// of five spaces at positions 0-4 and 12-16 are read as `00000`.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not 24 bytes long or the numeric
    /// positions hold anything other than digits or the blank placeholder.
    pub fn from_xml_text(text: &str) -> Result<Self> {
        let mut bytes = text.as_bytes().to_vec();
        if bytes.len() != LEADER_LENGTH {
            return Err(MarcError::InvalidLeader(format!(
                "Leader must be exactly 24 bytes, got {} ({text:?})",
                bytes.len()
            )));
        }
        for range in [0..5, 12..17] {
            if bytes[range.clone()].iter().all(|&b| b == b' ') {
                bytes[range].copy_from_slice(b"00000");
            }
        }
        Self::from_bytes(&bytes)
    }

    /// Validate that the leader is suitable for binary record reading.
    ///
    /// Checks that `record_length` and `data_base_address` are at least 24,
    /// which is required before performing arithmetic on these fields during
    /// binary ISO 2709 parsing.
    ///
    /// # Errors
    ///
    /// Returns an error if `record_length` or `data_base_address` is less than 24,
    /// or if the base address lies beyond the end of the record.
    pub fn validate_for_reading(&self) -> Result<()> {
        if self.record_length < 24 {
            return Err(MarcError::InvalidLeader(format!(
                "Record length must be at least 24, got {}",
                self.record_length
            )));
        }
        if self.data_base_address < 24 {
            return Err(MarcError::InvalidLeader(format!(
                "Base address of data must be at least 24, got {}",
                self.data_base_address
            )));
        }
        if self.data_base_address > self.record_length {
            return Err(MarcError::InvalidLeader(format!(
                "Base address of data ({}) lies beyond the record length ({})",
                self.data_base_address, self.record_length
            )));
        }
        Ok(())
    }

    /// Report violations of the MARC 21 structural invariants.
    ///
    /// Returns `true` when the leader is clean. Violations are not errors: each
    /// one is recorded as a warning in `diagnostics`.
    pub fn check_invariants(&self, diagnostics: &mut Diagnostics) -> bool {
        let mut ok = true;
        if self.indicator_count != '2' {
            diagnostics.warn(format!(
                "leader indicator count is '{}', expected '2'",
                self.indicator_count
            ));
            ok = false;
        }
        if self.subfield_code_count != '2' {
            diagnostics.warn(format!(
                "leader subfield code length is '{}', expected '2'",
                self.subfield_code_count
            ));
            ok = false;
        }
        if !self.entry_map.starts_with("450") {
            diagnostics.warn(format!(
                "leader entry map is {:?}, expected \"450\" at positions 20-22",
                self.entry_map
            ));
            ok = false;
        }
        ok
    }

    /// Classify the record by leader position 6.
    #[must_use]
    pub fn record_type(&self) -> RecordType {
        match self.record_type {
            'z' => RecordType::Authority,
            'w' => RecordType::Classification,
            'a' | 'c' | 'd' | 'e' | 'f' | 'g' | 'i' | 'j' | 'k' | 'm' | 'o' | 'p' | 'r' | 't' => {
                RecordType::Bibliographic
            },
            _ => RecordType::Unknown,
        }
    }

    /// Serialize leader to 24-byte array
    ///
    /// # Errors
    ///
    /// Returns an error if a length does not fit into five digits or the entry
    /// map is not four characters long.
    pub fn as_bytes(&self) -> Result<Vec<u8>> {
        if self.record_length > MAX_FIVE_DIGIT_VALUE {
            return Err(MarcError::InvalidLeader(format!(
                "Record length {} does not fit into 5 digits",
                self.record_length
            )));
        }
        if self.data_base_address > MAX_FIVE_DIGIT_VALUE {
            return Err(MarcError::InvalidLeader(format!(
                "Base address {} does not fit into 5 digits",
                self.data_base_address
            )));
        }

        let mut bytes = Vec::with_capacity(LEADER_LENGTH);

        // Record length (5 digits, zero-padded)
        bytes.extend_from_slice(format!("{:05}", self.record_length).as_bytes());
        for c in [
            self.record_status,
            self.record_type,
            self.bibliographic_level,
            self.control_record_type,
            self.character_coding,
            self.indicator_count,
            self.subfield_code_count,
        ] {
            bytes.push(char_to_byte(c));
        }

        // Base address of data (5 digits, zero-padded)
        bytes.extend_from_slice(format!("{:05}", self.data_base_address).as_bytes());
        bytes.push(char_to_byte(self.encoding_level));
        bytes.push(char_to_byte(self.cataloging_form));
        bytes.push(char_to_byte(self.multipart_level));

        if self.entry_map.chars().count() != 4 {
            return Err(MarcError::InvalidLeader(format!(
                "Entry map must be 4 characters, got {:?}",
                self.entry_map
            )));
        }
        bytes.extend(self.entry_map.chars().map(char_to_byte));

        Ok(bytes)
    }

    /// The leader as a 24-character string.
    ///
    /// # Errors
    ///
    /// Same conditions as [`Leader::as_bytes`].
    pub fn to_leader_string(&self) -> Result<String> {
        Ok(self.as_bytes()?.into_iter().map(char::from).collect())
    }
}

/// Leader positions hold single bytes; anything outside Latin-1 is written as a blank.
fn char_to_byte(c: char) -> u8 {
    u8::try_from(c).unwrap_or(b' ')
}

/// Parse 5-digit ASCII number from bytes
fn parse_digits(bytes: &[u8]) -> Result<u32> {
    if bytes.len() != 5 || !bytes.iter().all(u8::is_ascii_digit) {
        return Err(MarcError::InvalidLeader(format!(
            "Invalid numeric field: '{}'",
            String::from_utf8_lossy(bytes)
        )));
    }

    Ok(bytes
        .iter()
        .fold(0u32, |acc, &b| acc * 10 + u32::from(b - b'0')))
}
