//! Error types for MARC operations.
//!
//! This module provides the [`MarcError`] type for all recoverable failures in
//! the record engine and the [`Result`] convenience type.
//!
//! Invariant violations that can only come from a programming mistake (appending
//! a field out of tag order, a second occurrence of a non-repeatable tag through
//! [`Record::append_field`](crate::Record::append_field), a standard tag missing
//! from the repeatability table) are not represented here; they panic.

use thiserror::Error;

/// Error type for all MARC library operations.
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

    /// A tag that is not exactly three ASCII characters.
    #[error("Invalid tag: {0:?}")]
    InvalidTag(String),

    /// A subfield selection string that cannot be interpreted.
    #[error("Invalid subfield specification: {0:?}")]
    InvalidSubfieldSpec(String),

    /// Error during parsing of MARC-XML data.
    #[error("Parse error at byte {position}: {message}")]
    ParseError {
        /// Byte offset in the XML input where the problem was detected.
        position: usize,
        /// Description of the problem.
        message: String,
    },

    /// Field contents that are not UTF-8, such as unconverted MARC-8 data.
    #[error("Field {tag} of record {control_number} is not valid UTF-8 (byte {offset} of the field)")]
    InvalidEncoding {
        /// Control number (001) of the offending record, or "unknown".
        control_number: String,
        /// Tag of the offending field.
        tag: String,
        /// Offset of the first invalid byte within the field contents.
        offset: usize,
    },

    /// Input read from a file failed; `source` is the underlying error.
    #[error("{path}: {source}")]
    InFile {
        /// Path of the input file.
        path: String,
        /// What went wrong.
        source: Box<MarcError>,
    },

    /// Error indicating a truncated or incomplete record.
    #[error("Truncated record: {0}")]
    TruncatedRecord(String),

    /// A single field is too long to be described by a directory entry.
    #[error("Field {tag} of record {control_number} is {length} bytes long, which exceeds the directory limit")]
    FieldTooLong {
        /// Control number (001) of the offending record, or "unknown".
        control_number: String,
        /// Tag of the offending field.
        tag: String,
        /// Field length including the field terminator.
        length: usize,
    },

    /// The file type could be neither sniffed nor derived from the file name.
    #[error("Cannot determine the MARC file type of {0}")]
    UnknownFormat(String),

    /// The advisory lock could not be acquired before the timeout expired.
    #[error("Timed out waiting for a lock on {0}")]
    LockTimeout(String),

    /// Waiting for the advisory lock was interrupted; nothing was written.
    #[error("Interrupted while waiting for a lock on {0}")]
    LockInterrupted(String),

    /// IO error from the underlying source/destination.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl MarcError {
    /// Attach the path of the file being read.
    #[must_use]
    pub fn in_file(self, path: impl Into<String>) -> Self {
        match self {
            already @ MarcError::InFile { .. } => already,
            other => MarcError::InFile {
                path: path.into(),
                source: Box::new(other),
            },
        }
    }

    /// The error without any file qualification.
    #[must_use]
    pub fn root(&self) -> &MarcError {
        match self {
            MarcError::InFile { source, .. } => source.root(),
            other => other,
        }
    }
}

/// Convenience type alias for [`std::result::Result`] with [`MarcError`].
pub type Result<T> = std::result::Result<T, MarcError>;
