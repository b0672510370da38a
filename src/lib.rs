#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

//! # marc-engine
//!
//! Reading, writing and editing MARC 21 records in ISO 2709 and MARC-XML.
//!
//! ## Quick Start
//!
//! ### Building and encoding a record
//!
//! ```
//! use marc_engine::{Leader, MarcReader, MarcWriter, Record, Subfields, Tag};
//!
//! # fn main() -> marc_engine::Result<()> {
//! let mut record = Record::new(Leader::default());
//! record.insert_field(Tag::new("001")?, "ocm12345");
//!
//! let mut title = Subfields::new('1', '0');
//! title.append_subfield('a', "The Great Gatsby /");
//! title.append_subfield('c', "F. Scott Fitzgerald.");
//! record.insert_data_field(Tag::new("245")?, &title);
//!
//! let mut writer = MarcWriter::new(Vec::new());
//! writer.write_record(&record)?;
//! let bytes = writer.into_inner();
//!
//! let mut reader = MarcReader::new(bytes.as_slice());
//! let decoded = reader.read_record()?.expect("one record");
//! assert_eq!(decoded.complete_title(), Some("The Great Gatsby".to_string()));
//! # Ok(())
//! # }
//! ```
//!
//! ### Reading any supported file
//!
//! ```no_run
//! use marc_engine::formats::{self, FormatReader};
//!
//! # fn main() -> marc_engine::Result<()> {
//! let mut reader = formats::open_reader("records.mrc", None)?;
//! while let Some(record) = reader.read_record()? {
//!     println!("{:?}", record.control_number());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`record`] — the sorted field model and its editing and range queries
//! - [`local_blocks`] — holdings blocks embedded as `LOK` fields
//! - [`reader`] / [`writer`] — ISO 2709 codec, including oversized-record splitting
//! - [`marcxml`] — MARC-XML pull reader and writer
//! - [`formats`] — format detection and format-agnostic traits
//! - [`bibliographic_helpers`] — titles, identifiers and publication years
//! - [`checksum`] — order-independent record checksums

pub mod bibliographic_helpers;
pub mod checksum;
pub mod diagnostics;
pub mod error;
pub mod field;
pub mod field_table;
#[cfg(unix)]
pub mod file_lock;
/// Format detection and the unified reader/writer traits.
///
/// See the [`formats`] module documentation for details.
pub mod formats;
pub mod leader;
pub mod local_blocks;
pub mod marcxml;
pub mod reader;
/// Core MARC record structure (`Record`)
pub mod record;
pub mod record_validation;
pub mod source;
pub mod subfields;
pub mod tag;
pub mod writer;

pub use checksum::calc_checksum;
pub use diagnostics::Diagnostics;
pub use error::{MarcError, Result};
pub use field::Field;
#[cfg(unix)]
pub use file_lock::{FileLock, LockMode};
pub use formats::{Format, FormatReader, FormatWriter, WriteMode};
pub use leader::{Leader, RecordType};
pub use marcxml::{MarcXmlReader, MarcXmlWriter};
pub use reader::MarcReader;
pub use record::Record;
pub use record_validation::RecordStructureValidator;
pub use source::ByteSource;
pub use subfields::{Subfield, SubfieldSelector, Subfields};
pub use tag::Tag;
pub use writer::MarcWriter;
