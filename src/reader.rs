//! Reading MARC records from binary streams.
//!
//! This module provides [`MarcReader`] for reading ISO 2709 formatted MARC records
//! from any source that implements [`std::io::Read`].
//!
//! Oversized records are written as several physical records that repeat the
//! same 001. By default the reader looks one record ahead and merges such
//! continuations back into a single [`Record`].
//!
//! # Examples
//!
//! Reading records from a file:
//!
//! ```no_run
//! use marc_engine::MarcReader;
//!
//! let mut reader = MarcReader::open("records.mrc")?;
//!
//! while let Some(record) = reader.read_record()? {
//!     println!("{:?}: {:?}", record.control_number(), record.main_title());
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! Reading from a buffer:
//!
//! ```
//! use marc_engine::MarcReader;
//! use std::io::Cursor;
//!
//! let mut reader = MarcReader::new(Cursor::new(Vec::new()));
//! assert!(reader.read_record()?.is_none());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use crate::diagnostics::Diagnostics;
use crate::error::{MarcError, Result};
use crate::field::Field;
use crate::formats::FormatReader;
use crate::leader::{Leader, LEADER_LENGTH};
use crate::record::{Record, DIRECTORY_ENTRY_LENGTH};
use crate::source::ByteSource;
use crate::tag::Tag;
use log::debug;
use std::io::{ErrorKind, Read, Seek, SeekFrom};
use std::path::Path;

/// Terminates each field and the directory.
pub const FIELD_TERMINATOR: u8 = 0x1E;
/// Terminates a record.
pub const RECORD_TERMINATOR: u8 = 0x1D;

/// Decode one physical ISO 2709 record.
///
/// `bytes` must start with the leader and hold at least the record length the
/// leader announces. Fields are sorted by tag (stable) after decoding. Leader
/// invariant violations are reported to `diagnostics`.
///
/// Field contents must be UTF-8. Records in MARC-8 or another legacy encoding
/// are rejected rather than altered, so anything that decodes re-encodes to
/// the same bytes.
///
/// # Errors
///
/// Returns an error if the leader is malformed, the buffer is shorter than the
/// record length, or a directory entry is malformed or points outside the record.
/// Returns [`MarcError::InvalidEncoding`] for field contents that are not UTF-8.
pub fn decode_record(bytes: &[u8], diagnostics: &mut Diagnostics) -> Result<Record> {
    let leader = Leader::from_bytes(bytes)?;
    leader.validate_for_reading()?;
    leader.check_invariants(diagnostics);

    let record_length = leader.record_length as usize;
    let base_address = leader.data_base_address as usize;
    if bytes.len() < record_length {
        return Err(MarcError::TruncatedRecord(format!(
            "record announces {record_length} bytes but only {} are available",
            bytes.len()
        )));
    }
    let directory_end = base_address - 1;
    if bytes[directory_end] != FIELD_TERMINATOR {
        return Err(MarcError::InvalidRecord(format!(
            "no directory terminator at offset {directory_end}"
        )));
    }

    let mut raw_fields =
        Vec::with_capacity(directory_end.saturating_sub(LEADER_LENGTH) / DIRECTORY_ENTRY_LENGTH);
    let mut cursor = LEADER_LENGTH;
    while cursor < directory_end {
        if cursor + DIRECTORY_ENTRY_LENGTH > directory_end {
            return Err(MarcError::InvalidRecord(
                "incomplete directory entry".to_string(),
            ));
        }
        let entry = &bytes[cursor..cursor + DIRECTORY_ENTRY_LENGTH];
        let tag = Tag::from_bytes(&entry[0..3])?;
        let field_length = parse_number(&entry[3..7])?;
        let field_start = base_address + parse_number(&entry[7..12])?;
        let field_end = field_start + field_length;
        if field_length == 0 || field_end > record_length {
            return Err(MarcError::InvalidRecord(format!(
                "field {tag} lies outside the record (offset {field_start}, length {field_length})"
            )));
        }

        raw_fields.push((tag, &bytes[field_start..field_end - 1]));
        cursor += DIRECTORY_ENTRY_LENGTH;
    }

    let mut fields = Vec::with_capacity(raw_fields.len());
    for &(tag, raw) in &raw_fields {
        let contents = std::str::from_utf8(raw).map_err(|e| MarcError::InvalidEncoding {
            control_number: raw_control_number(&raw_fields),
            tag: tag.to_string(),
            offset: e.valid_up_to(),
        })?;
        fields.push(Field::new(tag, contents));
    }

    Ok(Record::from_fields(leader, fields))
}

fn raw_control_number(raw_fields: &[(Tag, &[u8])]) -> String {
    raw_fields
        .iter()
        .find(|(tag, _)| *tag == "001")
        .map_or_else(|| "unknown".to_string(), |(_, raw)| String::from_utf8_lossy(raw).into_owned())
}

/// Parse a fixed-width ASCII decimal number.
fn parse_number(bytes: &[u8]) -> Result<usize> {
    if !bytes.iter().all(u8::is_ascii_digit) {
        return Err(MarcError::InvalidRecord(format!(
            "invalid number in directory entry: '{}'",
            String::from_utf8_lossy(bytes)
        )));
    }
    Ok(bytes
        .iter()
        .fold(0usize, |acc, &b| acc * 10 + usize::from(b - b'0')))
}

/// Reader for ISO 2709 binary MARC format.
///
/// `MarcReader` reads one MARC record at a time from any source implementing [`std::io::Read`].
/// Records are fully parsed and returned as [`Record`] instances.
#[derive(Debug)]
pub struct MarcReader<R: Read> {
    reader: R,
    diagnostics: Diagnostics,
    merge_split_records: bool,
    /// A record read ahead while looking for continuations, and its offset.
    pending: Option<(Record, u64)>,
    /// File the records come from, prefixed to errors.
    path: Option<String>,
    position: u64,
    records_read: usize,
}

impl MarcReader<ByteSource> {
    /// Open a binary MARC file, memory-mapped when possible.
    ///
    /// # Errors
    ///
    /// Returns an error naming `path` if the file cannot be opened.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let name = path.as_ref().display().to_string();
        let source = ByteSource::open(path).map_err(|e| e.in_file(name.as_str()))?;
        let mut reader = MarcReader::new(source);
        reader.diagnostics = Diagnostics::with_context(name.as_str());
        reader.path = Some(name);
        Ok(reader)
    }
}

impl<R: Read> MarcReader<R> {
    /// Create a new MARC reader.
    ///
    /// # Examples
    ///
    /// ```
    /// use marc_engine::MarcReader;
    /// use std::io::Cursor;
    ///
    /// let reader = MarcReader::new(Cursor::new(Vec::new()));
    /// ```
    pub fn new(reader: R) -> Self {
        MarcReader {
            reader,
            diagnostics: Diagnostics::new(),
            merge_split_records: true,
            pending: None,
            path: None,
            position: 0,
            records_read: 0,
        }
    }

    /// Whether to merge consecutive records that share a control number
    /// (default `true`).
    #[must_use]
    pub fn with_merge_split_records(mut self, merge: bool) -> Self {
        self.merge_split_records = merge;
        self
    }

    /// Warnings collected so far.
    #[must_use]
    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// Mutable access to the collected warnings, e.g. to drain them.
    pub fn diagnostics_mut(&mut self) -> &mut Diagnostics {
        &mut self.diagnostics
    }

    /// Number of logical records returned so far.
    #[must_use]
    pub fn records_read(&self) -> usize {
        self.records_read
    }

    /// Offset of the next record that [`MarcReader::read_record`] will return.
    #[must_use]
    pub fn tell(&self) -> u64 {
        match &self.pending {
            Some((_, offset)) => *offset,
            None => self.position,
        }
    }

    /// The underlying source.
    pub fn get_ref(&self) -> &R {
        &self.reader
    }

    /// Consume the reader, returning the underlying source.
    pub fn into_inner(self) -> R {
        self.reader
    }

    /// Read a single MARC record.
    ///
    /// Returns `Ok(Some(record))` if a record was successfully read, `Ok(None)` if EOF
    /// was reached, or `Err` if a parsing error occurred.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The binary data is malformed
    /// - The stream ends in the middle of a record
    /// - An I/O error occurs
    ///
    /// Readers created with [`MarcReader::open`] wrap errors in
    /// [`MarcError::InFile`].
    pub fn read_record(&mut self) -> Result<Option<Record>> {
        let result = self.read_logical_record();
        self.qualify(result)
    }

    fn qualify<T>(&self, result: Result<T>) -> Result<T> {
        match &self.path {
            Some(path) => result.map_err(|e| e.in_file(path.as_str())),
            None => result,
        }
    }

    fn read_logical_record(&mut self) -> Result<Option<Record>> {
        let mut record = match self.pending.take() {
            Some((record, _)) => record,
            None => match self.read_physical_record()? {
                Some(record) => record,
                None => return Ok(None),
            },
        };

        if self.merge_split_records {
            loop {
                let offset = self.position;
                let Some(next) = self.read_physical_record()? else {
                    break;
                };
                let continues = match (record.control_number(), next.control_number()) {
                    (Some(current), Some(following)) => current == following,
                    _ => false,
                };
                if !continues {
                    self.pending = Some((next, offset));
                    break;
                }
                debug!(
                    "merging continuation of record {}",
                    record.control_number().unwrap_or_default()
                );
                record.merge(next);
            }
        }

        self.records_read += 1;
        Ok(Some(record))
    }

    /// Read and decode the next physical record without merging.
    fn read_physical_record(&mut self) -> Result<Option<Record>> {
        let mut leader_bytes = [0u8; LEADER_LENGTH];
        let got = read_fully(&mut self.reader, &mut leader_bytes)?;
        if got == 0 {
            return Ok(None);
        }
        if got < LEADER_LENGTH {
            return Err(MarcError::TruncatedRecord(format!(
                "stream ends inside a leader at offset {}",
                self.position
            )));
        }

        let leader = Leader::from_bytes(&leader_bytes)?;
        leader.validate_for_reading()?;
        let record_length = leader.record_length as usize;

        let mut bytes = vec![0u8; record_length];
        bytes[..LEADER_LENGTH].copy_from_slice(&leader_bytes);
        let got = read_fully(&mut self.reader, &mut bytes[LEADER_LENGTH..])?;
        if got < record_length - LEADER_LENGTH {
            return Err(MarcError::TruncatedRecord(format!(
                "record at offset {} announces {record_length} bytes, stream ends after {}",
                self.position,
                LEADER_LENGTH + got
            )));
        }

        let record = decode_record(&bytes, &mut self.diagnostics)?;
        if bytes[record_length - 1] != RECORD_TERMINATOR {
            self.diagnostics.warn(format!(
                "record {} does not end with a record terminator",
                record.control_number().unwrap_or("without 001")
            ));
        }
        self.position += record_length as u64;
        Ok(Some(record))
    }
}

impl<R: Read + Seek> MarcReader<R> {
    /// Position the reader at byte `offset`, which should be the start of a record.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying source cannot seek.
    pub fn seek(&mut self, offset: u64) -> Result<()> {
        let position = self.reader.seek(SeekFrom::Start(offset)).map_err(MarcError::from);
        self.position = self.qualify(position)?;
        self.pending = None;
        Ok(())
    }

    /// Go back to the first record.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying source cannot seek.
    pub fn rewind(&mut self) -> Result<()> {
        self.seek(0)
    }
}

/// Like `read_exact`, but reports how many bytes were read before EOF.
fn read_fully<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => {},
            Err(e) => return Err(MarcError::IoError(e)),
        }
    }
    Ok(filled)
}

impl<R: Read + std::fmt::Debug> FormatReader for MarcReader<R> {
    fn read_record(&mut self) -> Result<Option<Record>> {
        MarcReader::read_record(self)
    }

    fn records_read(&self) -> usize {
        self.records_read
    }

    fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    fn diagnostics_mut(&mut self) -> &mut Diagnostics {
        &mut self.diagnostics
    }
}
