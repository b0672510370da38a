//! The interface shared by the ISO 2709 and MARC-XML codecs.
//!
//! [`open_reader`](super::open_reader) and [`create_writer`](super::create_writer)
//! hand out boxed trait objects, so code that copies, filters or counts
//! records never needs to know which serialization is on disk.
//!
//! ```
//! use marc_engine::formats::{FormatReader, FormatWriter};
//!
//! fn copy_records(
//!     reader: &mut dyn FormatReader,
//!     writer: &mut dyn FormatWriter,
//! ) -> marc_engine::Result<usize> {
//!     while let Some(record) = reader.read_record()? {
//!         writer.write_record(&record)?;
//!     }
//!     writer.finish()?;
//!     Ok(writer.records_written())
//! }
//! ```

use crate::diagnostics::Diagnostics;
use crate::error::Result;
use crate::record::Record;

/// A source of records in some serialization.
///
/// Records come back with their fields in tag order. Once the input is
/// exhausted `read_record` returns `Ok(None)`, and keeps doing so.
pub trait FormatReader: std::fmt::Debug {
    /// Read the next record, or `Ok(None)` at the end of the input.
    ///
    /// # Errors
    ///
    /// Returns an error for malformed input or a failing source. The reader
    /// should not be used after an error.
    fn read_record(&mut self) -> Result<Option<Record>>;

    /// Number of records returned so far.
    fn records_read(&self) -> usize;

    /// Warnings collected while reading.
    fn diagnostics(&self) -> &Diagnostics;

    /// Mutable access to the collected warnings, e.g. to drain them.
    fn diagnostics_mut(&mut self) -> &mut Diagnostics;

    /// Read every remaining record.
    ///
    /// # Errors
    ///
    /// Stops at the first failing record; records read before it are dropped.
    fn read_all(&mut self) -> Result<Vec<Record>> {
        let mut records = Vec::new();
        while let Some(record) = self.read_record()? {
            records.push(record);
        }
        Ok(records)
    }
}

/// A sink for records in some serialization.
///
/// [`finish`](Self::finish) must be called once all records are written: a
/// MARC-XML document is not closed before that.
pub trait FormatWriter: std::fmt::Debug {
    /// Validate and write one record. The length and base address in the
    /// leader are recomputed, every other leader position is kept.
    ///
    /// # Errors
    ///
    /// Returns an error if the record fails validation, cannot be encoded,
    /// or the destination fails. Nothing is written for a rejected record.
    fn write_record(&mut self, record: &Record) -> Result<()>;

    /// Flush and close the output.
    ///
    /// # Errors
    ///
    /// Returns an error if the closing bytes cannot be written or flushed.
    fn finish(&mut self) -> Result<()>;

    /// Number of records written so far.
    fn records_written(&self) -> usize;

    /// Warnings collected while writing.
    fn diagnostics(&self) -> &Diagnostics;

    /// Write `records` in order.
    ///
    /// # Errors
    ///
    /// Stops at the first record that cannot be written.
    fn write_batch(&mut self, records: &[Record]) -> Result<()> {
        records.iter().try_for_each(|record| self.write_record(record))
    }
}

impl<R: FormatReader + ?Sized> FormatReader for Box<R> {
    fn read_record(&mut self) -> Result<Option<Record>> {
        (**self).read_record()
    }

    fn records_read(&self) -> usize {
        (**self).records_read()
    }

    fn diagnostics(&self) -> &Diagnostics {
        (**self).diagnostics()
    }

    fn diagnostics_mut(&mut self) -> &mut Diagnostics {
        (**self).diagnostics_mut()
    }
}

impl<W: FormatWriter + ?Sized> FormatWriter for Box<W> {
    fn write_record(&mut self, record: &Record) -> Result<()> {
        (**self).write_record(record)
    }

    fn finish(&mut self) -> Result<()> {
        (**self).finish()
    }

    fn records_written(&self) -> usize {
        (**self).records_written()
    }

    fn diagnostics(&self) -> &Diagnostics {
        (**self).diagnostics()
    }
}

/// Iterator access for any [`FormatReader`].
pub trait FormatReaderExt: FormatReader {
    /// Iterate over the remaining records.
    ///
    /// The iterator ends after the first error, so a broken input cannot
    /// make it spin.
    ///
    /// ```
    /// use marc_engine::formats::FormatReaderExt;
    /// use marc_engine::MarcReader;
    ///
    /// let mut reader = MarcReader::new(&b""[..]);
    /// assert_eq!(reader.records().count(), 0);
    /// ```
    fn records(&mut self) -> RecordIterator<'_, Self>
    where
        Self: Sized,
    {
        RecordIterator {
            reader: self,
            failed: false,
        }
    }
}

impl<T: FormatReader> FormatReaderExt for T {}

/// Iterator returned by [`FormatReaderExt::records`].
#[derive(Debug)]
pub struct RecordIterator<'a, R: FormatReader> {
    reader: &'a mut R,
    failed: bool,
}

impl<R: FormatReader> Iterator for RecordIterator<'_, R> {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        match self.reader.read_record() {
            Ok(record) => record.map(Ok),
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            },
        }
    }
}

impl<R: FormatReader> std::iter::FusedIterator for RecordIterator<'_, R> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::{create_writer, open_reader, Format, WriteMode};
    use crate::tag::Tag;
    use crate::MarcError;
    use tempfile::TempDir;

    fn record(control_number: &str) -> Record {
        let mut record = Record::default();
        record.insert_field(Tag::new("001").unwrap(), control_number);
        record.insert_field(Tag::new("245").unwrap(), "10\x1FaA title");
        record
    }

    #[test]
    fn test_boxed_codecs_round_trip_both_formats() {
        let dir = TempDir::new().unwrap();
        let records = vec![record("1"), record("2")];

        for (name, format) in [("out.mrc", Format::Iso2709), ("out.xml", Format::MarcXml)] {
            let path = dir.path().join(name);
            let mut writer = create_writer(&path, None, WriteMode::Overwrite).unwrap();
            writer.write_batch(&records).unwrap();
            assert_eq!(writer.records_written(), 2);
            writer.finish().unwrap();
            assert!(!writer.diagnostics().has_warnings());
            drop(writer);

            assert_eq!(Format::detect(&path).unwrap(), format);
            let mut reader = open_reader(&path, None).unwrap();
            let read = reader.read_all().unwrap();
            assert_eq!(reader.records_read(), 2);
            assert_eq!(read.len(), 2);
            assert_eq!(read[1].fields(), records[1].fields());
            assert!(reader.read_record().unwrap().is_none());
        }
    }

    #[test]
    fn test_rejected_record_is_not_counted() {
        let dir = TempDir::new().unwrap();
        let mut writer =
            create_writer(dir.path().join("out.mrc"), None, WriteMode::Overwrite).unwrap();
        let mut no_control_number = Record::default();
        no_control_number.insert_field(Tag::new("245").unwrap(), "10\x1FaA title");

        assert!(writer.write_batch(&[record("1"), no_control_number, record("3")]).is_err());
        assert_eq!(writer.records_written(), 1);
    }

    #[test]
    fn test_records_iterator_stops_after_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.xml");
        std::fs::write(
            &path,
            r#"<?xml version="1.0"?>
<collection xmlns="http://www.loc.gov/MARC21/slim">
<record><leader>00000nam a2200000   4500</leader><controlfield tag="001">1</controlfield></record>
<record><leader>00000nam a2200000   4500</leader><note>?</note></record>
<record><leader>00000nam a2200000   4500</leader><controlfield tag="001">3</controlfield></record>
</collection>"#,
        )
        .unwrap();

        let mut reader = open_reader(&path, None).unwrap();
        let results: Vec<Result<Record>> = reader.records().collect();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].as_ref().unwrap().control_number(), Some("1"));
        assert!(matches!(
            results[1].as_ref().unwrap_err().root(),
            MarcError::ParseError { .. }
        ));
    }

    #[test]
    fn test_warnings_reach_the_caller_through_the_trait() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sparse.xml");
        std::fs::write(
            &path,
            r#"<collection xmlns="http://www.loc.gov/MARC21/slim"><record><leader>00000nam a2200000   4500</leader><controlfield tag="001">1</controlfield><controlfield tag="003"/></record></collection>"#,
        )
        .unwrap();

        let mut reader = open_reader(&path, Some(Format::MarcXml)).unwrap();
        assert_eq!(reader.read_all().unwrap().len(), 1);
        let warnings = reader.diagnostics_mut().take_warnings();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].starts_with(&path.display().to_string()), "{}", warnings[0]);
        assert!(!reader.diagnostics().has_warnings());
    }
}
