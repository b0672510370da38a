//! Writing MARC records to binary format.
//!
//! This module provides [`MarcWriter`] for serializing [`Record`] instances
//! to ISO 2709 binary format that can be written to any destination implementing
//! [`std::io::Write`].
//!
//! The record length in the leader has five digits, so a record can take at
//! most 99999 bytes. Longer records are split into several physical records.
//! The first one starts with the record's own 001; every following one starts
//! with a copy of it so that [`crate::MarcReader`] can put them back together.
//!
//! # Examples
//!
//! ```
//! use marc_engine::{MarcWriter, Record, Subfields, Tag};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut record = Record::default();
//! record.insert_field(Tag::new("001")?, "12345");
//! record.insert_data_field(Tag::new("245")?, &Subfields::from_pairs('1', '0', [('a', "Title")]));
//!
//! let mut buffer = Vec::new();
//! let mut writer = MarcWriter::new(&mut buffer);
//! writer.write_record(&record)?;
//! assert_eq!(buffer.len(), record.record_size());
//! # Ok(())
//! # }
//! ```

use crate::diagnostics::Diagnostics;
use crate::error::{MarcError, Result};
use crate::field::Field;
use crate::formats::FormatWriter;
use crate::leader::{Leader, LEADER_LENGTH, MAX_FIVE_DIGIT_VALUE};
use crate::reader::{FIELD_TERMINATOR, RECORD_TERMINATOR};
use crate::record::{Record, DIRECTORY_ENTRY_LENGTH};
use log::debug;
use std::io::Write;

/// Largest encoded record the leader can describe.
pub const MAX_RECORD_LENGTH: usize = MAX_FIVE_DIGIT_VALUE as usize;

/// Largest field (contents plus terminator) a directory entry can describe.
pub const MAX_FIELD_LENGTH: usize = 9999;

/// Size of an encoded record without fields.
const EMPTY_RECORD_LENGTH: usize = LEADER_LENGTH + 2;

/// Encode `record` as one or more physical ISO 2709 records.
///
/// Physical records never exceed `max_record_length` bytes (capped at
/// [`MAX_RECORD_LENGTH`]). The record is not validated here; see
/// [`MarcWriter::write_record`].
///
/// # Errors
///
/// Returns [`MarcError::FieldTooLong`] if a field does not fit into a
/// directory entry, and [`MarcError::InvalidRecord`] if a field cannot be
/// placed in a physical record of the allowed size.
pub fn encode_record(record: &Record, max_record_length: usize) -> Result<Vec<u8>> {
    let max_record_length = max_record_length.min(MAX_RECORD_LENGTH);
    let control_number = record.control_number().unwrap_or("unknown");

    for field in record.fields() {
        let length = field.contents().len() + 1;
        if length > MAX_FIELD_LENGTH {
            return Err(MarcError::FieldTooLong {
                control_number: control_number.to_string(),
                tag: field.tag().to_string(),
                length,
            });
        }
    }

    if record.record_size() <= max_record_length {
        let fields: Vec<&Field> = record.fields().iter().collect();
        return encode_physical_record(&record.leader, &fields);
    }

    let chunks = split_fields(record, max_record_length)?;
    debug!(
        "record {control_number} is {} bytes long, writing it as {} physical records",
        record.record_size(),
        chunks.len()
    );
    let mut out = Vec::with_capacity(record.record_size() + chunks.len() * EMPTY_RECORD_LENGTH);
    for chunk in &chunks {
        out.extend(encode_physical_record(&record.leader, chunk)?);
    }
    Ok(out)
}

/// Distribute the fields over physical records of at most `max_record_length` bytes.
fn split_fields(record: &Record, max_record_length: usize) -> Result<Vec<Vec<&Field>>> {
    let control_field = record
        .fields()
        .first()
        .filter(|field| *field.tag() == "001");

    let mut chunks = Vec::new();
    let mut current: Vec<&Field> = Vec::new();
    let mut size = EMPTY_RECORD_LENGTH;
    for field in record.fields() {
        let needed = field.encoded_size();
        if !current.is_empty() && size + needed > max_record_length {
            chunks.push(std::mem::take(&mut current));
            size = EMPTY_RECORD_LENGTH;
            if let Some(control_field) = control_field {
                current.push(control_field);
                size += control_field.encoded_size();
            }
        }
        if size + needed > max_record_length {
            return Err(MarcError::InvalidRecord(format!(
                "field {} of record {} does not fit into a record of {max_record_length} bytes",
                field.tag(),
                record.control_number().unwrap_or("unknown")
            )));
        }
        current.push(field);
        size += needed;
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    Ok(chunks)
}

/// Encode one physical record: leader, directory, field data, terminator.
fn encode_physical_record(leader: &Leader, fields: &[&Field]) -> Result<Vec<u8>> {
    let base_address = LEADER_LENGTH + fields.len() * DIRECTORY_ENTRY_LENGTH + 1;
    let data_length: usize = fields.iter().map(|f| f.contents().len() + 1).sum();
    let record_length = base_address + data_length + 1;

    let mut leader = leader.clone();
    leader.record_length = u32::try_from(record_length).unwrap_or(u32::MAX);
    leader.data_base_address = u32::try_from(base_address).unwrap_or(u32::MAX);

    let mut out = Vec::with_capacity(record_length);
    out.extend(leader.as_bytes()?);

    let mut offset = 0;
    for field in fields {
        let length = field.contents().len() + 1;
        out.extend_from_slice(field.tag().as_bytes());
        out.extend_from_slice(format!("{length:04}{offset:05}").as_bytes());
        offset += length;
    }
    out.push(FIELD_TERMINATOR);

    for field in fields {
        out.extend_from_slice(field.contents().as_bytes());
        out.push(FIELD_TERMINATOR);
    }
    out.push(RECORD_TERMINATOR);
    Ok(out)
}

/// Writer for ISO 2709 binary MARC format.
///
/// Every record is validated before it is encoded; invalid records are
/// rejected and nothing is written for them. Each record is encoded in full
/// before the first byte reaches the destination.
#[derive(Debug)]
pub struct MarcWriter<W: Write> {
    writer: W,
    max_record_length: usize,
    diagnostics: Diagnostics,
    records_written: usize,
    finished: bool,
}

impl<W: Write> MarcWriter<W> {
    /// Create a new MARC writer.
    ///
    /// # Examples
    ///
    /// ```
    /// use marc_engine::MarcWriter;
    /// let buffer = Vec::new();
    /// let writer = MarcWriter::new(buffer);
    /// ```
    pub fn new(writer: W) -> Self {
        MarcWriter {
            writer,
            max_record_length: MAX_RECORD_LENGTH,
            diagnostics: Diagnostics::new(),
            records_written: 0,
            finished: false,
        }
    }

    /// Split records longer than `max_record_length` bytes.
    ///
    /// Values above [`MAX_RECORD_LENGTH`] are capped.
    #[must_use]
    pub fn with_max_record_length(mut self, max_record_length: usize) -> Self {
        self.max_record_length = max_record_length.min(MAX_RECORD_LENGTH);
        self
    }

    /// Warnings collected while validating records.
    #[must_use]
    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// Number of records written so far.
    #[must_use]
    pub fn records_written(&self) -> usize {
        self.records_written
    }

    /// Validate and encode `record` without writing it.
    fn encode(&mut self, record: &Record) -> Result<Vec<u8>> {
        if self.finished {
            return Err(MarcError::InvalidRecord(
                "Cannot write to a finished writer".to_string(),
            ));
        }
        record.validate(&mut self.diagnostics)?;
        encode_record(record, self.max_record_length)
    }

    /// Write a single MARC record.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The record structure is invalid (see [`Record::validate`])
    /// - A field is too long for the format
    /// - An I/O error occurs during writing
    pub fn write_record(&mut self, record: &Record) -> Result<()> {
        let bytes = self.encode(record)?;
        self.writer.write_all(&bytes)?;
        self.records_written += 1;
        Ok(())
    }

    /// Flush the destination. Further writes fail.
    ///
    /// # Errors
    ///
    /// Returns an error if flushing fails.
    pub fn finish(&mut self) -> Result<()> {
        self.writer.flush()?;
        self.finished = true;
        Ok(())
    }

    /// Consume the writer, returning the destination.
    pub fn into_inner(self) -> W {
        self.writer
    }
}

#[cfg(unix)]
impl MarcWriter<std::fs::File> {
    /// Append a record while holding an exclusive advisory lock on the file.
    ///
    /// The record is encoded first; then the lock is taken, the file
    /// positioned at its end and the bytes written and flushed. Other
    /// processes using this method on the same file never interleave with it.
    ///
    /// # Errors
    ///
    /// Returns [`MarcError::LockTimeout`] or [`MarcError::LockInterrupted`]
    /// if the lock is not obtained; nothing has been written in that case.
    /// Encoding and I/O errors are returned as for [`MarcWriter::write_record`].
    pub fn write_record_locked(
        &mut self,
        record: &Record,
        timeout: Option<std::time::Duration>,
    ) -> Result<()> {
        use crate::file_lock::{FileLock, LockMode};
        use std::io::{Seek, SeekFrom};

        let bytes = self.encode(record)?;
        let _lock = FileLock::acquire(&self.writer, LockMode::Exclusive, timeout)?;
        let mut file = &self.writer;
        file.seek(SeekFrom::End(0))?;
        file.write_all(&bytes)?;
        file.flush()?;
        self.records_written += 1;
        Ok(())
    }
}

impl<W: Write + std::fmt::Debug> FormatWriter for MarcWriter<W> {
    fn write_record(&mut self, record: &Record) -> Result<()> {
        MarcWriter::write_record(self, record)
    }

    fn finish(&mut self) -> Result<()> {
        MarcWriter::finish(self)
    }

    fn records_written(&self) -> usize {
        self.records_written
    }

    fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::MarcReader;
    use crate::subfields::Subfields;
    use crate::tag::Tag;
    use std::io::Cursor;

    fn tag(s: &str) -> Tag {
        Tag::new(s).unwrap()
    }

    fn sample_record() -> Record {
        let mut record = Record::default();
        record.insert_field(tag("001"), "12345");
        record.insert_data_field(
            tag("245"),
            &Subfields::from_pairs('1', '0', [('a', "Title")]),
        );
        record
    }

    #[test]
    fn test_encode_layout() {
        let bytes = encode_record(&sample_record(), MAX_RECORD_LENGTH).unwrap();
        let expected: &[u8] = b"00066nam a2200049 i 4500\
001000600000\
245001000006\x1E\
12345\x1E\
10\x1FaTitle\x1E\x1D";
        assert_eq!(bytes.len(), 66);
        assert_eq!(&bytes[..5], b"00066");
        assert_eq!(&bytes[12..17], b"00049");
        assert_eq!(&bytes[24..], &expected[24..]);
    }

    #[test]
    fn test_invalid_record_is_not_written() {
        let mut record = sample_record();
        record.insert_field(tag("500"), "  missing delimiter");
        let mut buffer = Vec::new();
        let mut writer = MarcWriter::new(&mut buffer);
        assert!(writer.write_record(&record).is_err());
        assert_eq!(writer.records_written(), 0);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_field_too_long() {
        let mut record = sample_record();
        let long = format!("  \x1Fa{}", "x".repeat(MAX_FIELD_LENGTH));
        record.insert_field(tag("500"), long);
        match encode_record(&record, MAX_RECORD_LENGTH) {
            Err(MarcError::FieldTooLong {
                control_number,
                tag,
                ..
            }) => {
                assert_eq!(control_number, "12345");
                assert_eq!(tag, "500");
            },
            other => panic!("expected FieldTooLong, got {other:?}"),
        }
    }

    #[test]
    fn test_oversized_record_is_split_and_merged_back() {
        let mut record = sample_record();
        for i in 0..40 {
            record.insert_field(tag("500"), format!("  \x1Fa{i:02} {}", "n".repeat(60)));
        }
        let bytes = encode_record(&record, 1000).unwrap();
        assert!(bytes.len() > record.record_size());

        let mut reader = MarcReader::new(Cursor::new(bytes.clone())).with_merge_split_records(false);
        let mut parts = 0;
        while let Some(part) = reader.read_record().unwrap() {
            assert!(part.record_size() <= 1000);
            assert_eq!(part.control_number(), Some("12345"));
            parts += 1;
        }
        assert!(parts > 1);

        let mut reader = MarcReader::new(Cursor::new(bytes));
        let merged = reader.read_record().unwrap().unwrap();
        assert!(reader.read_record().unwrap().is_none());
        assert_eq!(merged.fields(), record.fields());
    }

    #[test]
    fn test_cannot_write_after_finish() {
        let mut writer = MarcWriter::new(Vec::new());
        writer.finish().unwrap();
        assert!(writer.write_record(&sample_record()).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_write_record_locked_appends() {
        use std::fs::OpenOptions;

        let temp = tempfile::NamedTempFile::new().unwrap();
        for _ in 0..2 {
            let file = OpenOptions::new().append(true).open(temp.path()).unwrap();
            let mut writer = MarcWriter::new(file);
            writer
                .write_record_locked(&sample_record(), Some(std::time::Duration::from_secs(1)))
                .unwrap();
        }
        let mut reader = MarcReader::open(temp.path())
            .unwrap()
            .with_merge_split_records(false);
        assert_eq!(reader.read_record().unwrap().unwrap().control_number(), Some("12345"));
        assert!(reader.read_record().unwrap().is_some());
        assert!(reader.read_record().unwrap().is_none());
    }
}
