//! Validation of MARC record structure.
//!
//! A record is structurally valid if it has at least one field, its first
//! field is the `001` control number, and every data field has well-formed
//! subfield wire syntax. Writers refuse to encode records that fail here.

use crate::diagnostics::Diagnostics;
use crate::error::{MarcError, Result};
use crate::field::Field;
use crate::record::Record;
use crate::subfields::SUBFIELD_DELIMITER;

/// Minimum length of a data field: two indicators, a delimiter, a code and
/// one value byte.
const MIN_DATA_FIELD_LENGTH: usize = 5;

/// Validator for MARC record structure
#[derive(Debug)]
pub struct RecordStructureValidator;

impl RecordStructureValidator {
    /// Validate the subfield wire structure of one data field.
    ///
    /// Control fields are opaque and always pass. Empty subfield values are
    /// reported to `diagnostics` but do not fail validation.
    ///
    /// # Errors
    ///
    /// Returns [`MarcError::InvalidField`] if the field is shorter than five
    /// bytes, does not start its subfields with a delimiter, or has a
    /// delimiter without a subfield code.
    pub fn validate_data_field(field: &Field, diagnostics: &mut Diagnostics) -> Result<()> {
        if field.is_control_field() {
            return Ok(());
        }
        let tag = field.tag();
        let bytes = field.contents().as_bytes();
        if bytes.len() < MIN_DATA_FIELD_LENGTH {
            return Err(MarcError::InvalidField(format!(
                "field {tag} is too short ({} bytes)",
                bytes.len()
            )));
        }
        if bytes[2] != SUBFIELD_DELIMITER as u8 {
            return Err(MarcError::InvalidField(format!(
                "field {tag} has no subfield delimiter after the indicators"
            )));
        }

        let body = &bytes[2..];
        let delimiters: Vec<usize> = memchr::memchr_iter(SUBFIELD_DELIMITER as u8, body).collect();
        for (i, &start) in delimiters.iter().enumerate() {
            let end = delimiters.get(i + 1).copied().unwrap_or(body.len());
            match end - start {
                1 => {
                    return Err(MarcError::InvalidField(format!(
                        "field {tag} has a subfield delimiter without a code"
                    )));
                },
                2 => diagnostics.warn(format!(
                    "field {tag} has an empty subfield ${}",
                    char::from(body[start + 1])
                )),
                _ => {},
            }
        }
        Ok(())
    }

    /// Validate a complete record.
    ///
    /// # Errors
    ///
    /// Returns [`MarcError::InvalidRecord`] for a record without fields or
    /// without a leading `001`, and [`MarcError::InvalidField`] for the first
    /// malformed data field.
    pub fn validate_record(record: &Record, diagnostics: &mut Diagnostics) -> Result<()> {
        let Some(first) = record.fields().first() else {
            return Err(MarcError::InvalidRecord("record has no fields".to_string()));
        };
        if *first.tag() != "001" {
            return Err(MarcError::InvalidRecord(format!(
                "first field is {} instead of 001",
                first.tag()
            )));
        }
        record.leader.check_invariants(diagnostics);

        for field in record.fields() {
            Self::validate_data_field(field, diagnostics).map_err(|e| match e {
                MarcError::InvalidField(message) => MarcError::InvalidField(format!(
                    "record {}: {message}",
                    first.contents()
                )),
                other => other,
            })?;
        }
        Ok(())
    }

    /// Whether the record passes [`RecordStructureValidator::validate_record`].
    #[must_use]
    pub fn is_valid(record: &Record) -> bool {
        Self::validate_record(record, &mut Diagnostics::new()).is_ok()
    }
}

impl Record {
    /// Validate the record's structure, reporting warnings to `diagnostics`.
    ///
    /// # Errors
    ///
    /// See [`RecordStructureValidator::validate_record`].
    pub fn validate(&self, diagnostics: &mut Diagnostics) -> Result<()> {
        RecordStructureValidator::validate_record(self, diagnostics)
    }

    /// Check the record's structure, returning a description of the first
    /// problem found.
    ///
    /// # Errors
    ///
    /// Returns the error message of [`Record::validate`].
    pub fn is_valid(&self) -> std::result::Result<(), String> {
        self.validate(&mut Diagnostics::new())
            .map_err(|e| e.to_string())
    }
}
