//! Format detection and format-agnostic reading and writing.
//!
//! Both supported serializations implement the [`FormatReader`] and
//! [`FormatWriter`] traits, so callers can process files without knowing
//! which one they hold.
//!
//! # Supported Formats
//!
//! | Format | Reader | Writer | Extensions |
//! |--------|--------|--------|------------|
//! | ISO 2709 | [`MarcReader`] | [`MarcWriter`] | `.mrc`, `.marc`, `.raw` |
//! | MARC-XML | [`MarcXmlReader`] | [`MarcXmlWriter`] | `.xml` |
//!
//! # Detection
//!
//! [`Format::detect`] looks at the first bytes of a regular file: an XML
//! declaration means MARC-XML, a MARC 21 leader prefix (five digits, a record
//! status and a record type) means ISO 2709. Pipes and other special files
//! are not sniffed. When sniffing is inconclusive the file extension decides.
//!
//! # Example
//!
//! ```no_run
//! use marc_engine::formats::{self, FormatReader, FormatWriter, WriteMode};
//!
//! fn convert(from: &str, to: &str) -> marc_engine::Result<usize> {
//!     let mut reader = formats::open_reader(from, None)?;
//!     let mut writer = formats::create_writer(to, None, WriteMode::Overwrite)?;
//!     let mut count = 0;
//!     while let Some(record) = reader.read_record()? {
//!         writer.write_record(&record)?;
//!         count += 1;
//!     }
//!     writer.finish()?;
//!     Ok(count)
//! }
//! ```

mod traits;

pub use traits::{FormatReader, FormatReaderExt, FormatWriter, RecordIterator};

use crate::error::{MarcError, Result};
use crate::marcxml::{MarcXmlReader, MarcXmlWriter};
use crate::reader::MarcReader;
use crate::writer::MarcWriter;
use lazy_static::lazy_static;
use log::debug;
use regex::bytes::Regex;
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Read};
use std::path::Path;

/// Number of leading bytes inspected by [`Format::detect`].
pub const SNIFF_LENGTH: usize = 7;

lazy_static! {
    /// Record length, record status and record type of a MARC 21 leader.
    static ref BINARY_MAGIC: Option<Regex> =
        Regex::new(r"^\d{5}[acdnopsx][acdefgijkmoprtuvwxyz]").ok();
}

/// Supported serializations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    /// ISO 2709 binary MARC (`.mrc`, `.marc`, `.raw`)
    Iso2709,
    /// MARC-XML (`.xml`)
    MarcXml,
}

impl Format {
    /// Detect format from file extension.
    ///
    /// Returns `None` if the extension is not recognized.
    ///
    /// # Example
    ///
    /// ```
    /// use marc_engine::formats::Format;
    ///
    /// assert_eq!(Format::from_extension("mrc"), Some(Format::Iso2709));
    /// assert_eq!(Format::from_extension("XML"), Some(Format::MarcXml));
    /// assert_eq!(Format::from_extension("unknown"), None);
    /// ```
    #[must_use]
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "mrc" | "marc" | "raw" => Some(Self::Iso2709),
            "xml" => Some(Self::MarcXml),
            _ => None,
        }
    }

    /// Format implied by the extension of `path`.
    #[must_use]
    pub fn from_path(path: impl AsRef<Path>) -> Option<Self> {
        path.as_ref()
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }

    /// Classify the first bytes of a file.
    ///
    /// ```
    /// use marc_engine::formats::Format;
    ///
    /// assert_eq!(Format::sniff(b"<?xml v"), Some(Format::MarcXml));
    /// assert_eq!(Format::sniff(b"00714cam"), Some(Format::Iso2709));
    /// assert_eq!(Format::sniff(b"hello"), None);
    /// ```
    #[must_use]
    pub fn sniff(head: &[u8]) -> Option<Self> {
        if head.starts_with(b"<?xml") {
            return Some(Self::MarcXml);
        }
        match &*BINARY_MAGIC {
            Some(magic) if magic.is_match(head) => Some(Self::Iso2709),
            _ => None,
        }
    }

    /// Determine the format of the file at `path`.
    ///
    /// Regular files are sniffed first; the extension is the fallback.
    ///
    /// # Errors
    ///
    /// Returns [`MarcError::UnknownFormat`] if neither the contents nor the
    /// file name identify the format, or an I/O error if an existing file
    /// cannot be read.
    pub fn detect(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(format) = sniff_file(path)? {
            debug!("{} looks like {format}", path.display());
            return Ok(format);
        }
        Self::from_path(path).ok_or_else(|| MarcError::UnknownFormat(path.display().to_string()))
    }

    /// Get the canonical file extension for this format.
    ///
    /// # Example
    ///
    /// ```
    /// use marc_engine::formats::Format;
    ///
    /// assert_eq!(Format::Iso2709.extension(), "mrc");
    /// ```
    #[must_use]
    pub const fn extension(&self) -> &'static str {
        match self {
            Self::Iso2709 => "mrc",
            Self::MarcXml => "xml",
        }
    }

    /// Get the human-readable name for this format.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Iso2709 => "ISO 2709",
            Self::MarcXml => "MARC-XML",
        }
    }
}

impl std::fmt::Display for Format {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Sniff `path` if it is an existing regular file.
fn sniff_file(path: &Path) -> Result<Option<Format>> {
    let metadata = match fs::metadata(path) {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    if !metadata.is_file() {
        return Ok(None);
    }
    let mut head = Vec::with_capacity(SNIFF_LENGTH);
    File::open(path)?
        .take(SNIFF_LENGTH as u64)
        .read_to_end(&mut head)?;
    Ok(Format::sniff(&head))
}

/// How [`create_writer`] treats an existing file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WriteMode {
    /// Truncate the file
    #[default]
    Overwrite,
    /// Add records after the existing ones
    Append,
}

/// Open `path` for reading, detecting the format unless one is given.
///
/// Binary files are memory-mapped when possible (see
/// [`ByteSource`](crate::source::ByteSource)).
///
/// # Errors
///
/// Returns an error if the format cannot be determined or the file cannot
/// be opened.
pub fn open_reader(path: impl AsRef<Path>, format: Option<Format>) -> Result<Box<dyn FormatReader>> {
    let path = path.as_ref();
    let format = match format {
        Some(format) => format,
        None => Format::detect(path)?,
    };
    debug!("reading {} as {format}", path.display());
    match format {
        Format::Iso2709 => Ok(Box::new(MarcReader::open(path)?)),
        Format::MarcXml => Ok(Box::new(MarcXmlReader::open(path)?)),
    }
}

/// Create a writer for `path`.
///
/// Without an explicit format, an existing file opened for appending is
/// sniffed; otherwise the extension decides.
///
/// # Errors
///
/// Returns [`MarcError::UnknownFormat`] if the format cannot be determined,
/// [`MarcError::InvalidRecord`] when appending to a non-empty MARC-XML file
/// (a document has exactly one collection), or an I/O error.
pub fn create_writer(
    path: impl AsRef<Path>,
    format: Option<Format>,
    mode: WriteMode,
) -> Result<Box<dyn FormatWriter>> {
    let path = path.as_ref();
    let format = match (format, mode) {
        (Some(format), _) => format,
        (None, WriteMode::Append) => Format::detect(path)?,
        (None, WriteMode::Overwrite) => Format::from_path(path)
            .ok_or_else(|| MarcError::UnknownFormat(path.display().to_string()))?,
    };

    let file = match mode {
        WriteMode::Overwrite => File::create(path)?,
        WriteMode::Append => OpenOptions::new().append(true).create(true).open(path)?,
    };
    debug!("writing {} as {format} ({mode:?})", path.display());

    match format {
        Format::Iso2709 => Ok(Box::new(MarcWriter::new(file))),
        Format::MarcXml => {
            if mode == WriteMode::Append && file.metadata()?.len() > 0 {
                return Err(MarcError::InvalidRecord(format!(
                    "cannot append records to the existing MARC-XML document {}",
                    path.display()
                )));
            }
            Ok(Box::new(MarcXmlWriter::new(file)))
        },
    }
}
