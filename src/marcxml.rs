//! MARC-XML reading and writing.
//!
//! [`MarcXmlReader`] is a pull parser over a `<collection>` of `<record>`
//! elements in the `http://www.loc.gov/MARC21/slim` namespace. It returns one
//! record per call and keeps its position between calls, so arbitrarily large
//! collections are processed in constant memory.
//!
//! Elements may be unqualified (`<record>`) or use the prefix bound to the
//! MARC-XML namespace (`<marc:record xmlns:marc="...">`). Within a record the
//! leader comes first, then all control fields, then all data fields; a
//! control field after a data field is rejected.
//!
//! [`MarcXmlWriter`] produces the same shape under the `marc` prefix.
//!
//! # Example
//!
//! ```
//! use marc_engine::marcxml::{MarcXmlReader, MarcXmlWriter};
//! use marc_engine::{Record, Tag};
//!
//! let mut record = Record::default();
//! record.insert_field(Tag::new("001").unwrap(), "42");
//!
//! let mut writer = MarcXmlWriter::new(Vec::new());
//! writer.write_record(&record).unwrap();
//! writer.finish().unwrap();
//! let xml = writer.into_inner();
//!
//! let mut reader = MarcXmlReader::new(xml.as_slice());
//! let read = reader.read_record().unwrap().unwrap();
//! assert_eq!(read.control_number(), Some("42"));
//! assert!(reader.read_record().unwrap().is_none());
//! ```

use crate::diagnostics::Diagnostics;
use crate::error::{MarcError, Result};
use crate::field::Field;
use crate::formats::{FormatReader, FormatWriter};
use crate::leader::{Leader, LEADER_LENGTH, MAX_FIVE_DIGIT_VALUE};
use crate::record::{Record, DIRECTORY_ENTRY_LENGTH};
use crate::source::ByteSource;
use crate::subfields::Subfields;
use crate::tag::Tag;
use log::debug;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use std::fmt;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

/// MARC-XML namespace URI.
pub const MARCXML_NS: &str = "http://www.loc.gov/MARC21/slim";

/// Prefix used for elements written by [`MarcXmlWriter`].
const WRITER_PREFIX: &str = "marc";

/// Streaming MARC-XML reader.
pub struct MarcXmlReader<R: BufRead> {
    reader: Reader<R>,
    buf: Vec<u8>,
    prefix: Option<String>,
    diagnostics: Diagnostics,
    records_read: usize,
    exhausted: bool,
    path: Option<String>,
}

impl MarcXmlReader<BufReader<ByteSource>> {
    /// Open a MARC-XML file.
    ///
    /// # Errors
    ///
    /// Returns an error naming `path` if the file cannot be opened.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let name = path.as_ref().display().to_string();
        let source = ByteSource::open(path).map_err(|e| e.in_file(name.as_str()))?;
        let mut reader = MarcXmlReader::new(BufReader::new(source));
        reader.diagnostics = Diagnostics::with_context(name.as_str());
        reader.path = Some(name);
        Ok(reader)
    }
}

impl<R: BufRead> MarcXmlReader<R> {
    /// Create a reader over `source`.
    pub fn new(source: R) -> Self {
        MarcXmlReader {
            reader: Reader::from_reader(source),
            buf: Vec::new(),
            prefix: None,
            diagnostics: Diagnostics::with_context("MARC-XML"),
            records_read: 0,
            exhausted: false,
            path: None,
        }
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

    /// Number of records returned so far.
    #[must_use]
    pub fn records_read(&self) -> usize {
        self.records_read
    }

    /// Byte offset of the parser in the input.
    #[must_use]
    pub fn position(&self) -> usize {
        self.reader.buffer_position()
    }

    /// Read the next `<record>`.
    ///
    /// Returns `Ok(None)` once the closing `</collection>` tag or the end of
    /// input is reached; later calls keep returning `Ok(None)`.
    ///
    /// # Errors
    ///
    /// Returns [`MarcError::ParseError`] for malformed XML or unexpected
    /// elements, [`MarcError::TruncatedRecord`] if the input ends inside a
    /// record, and [`MarcError::InvalidLeader`] for an unusable leader.
    /// Readers created with [`MarcXmlReader::open`] wrap these in
    /// [`MarcError::InFile`].
    pub fn read_record(&mut self) -> Result<Option<Record>> {
        let result = self.read_next_record();
        match &self.path {
            Some(path) => result.map_err(|e| e.in_file(path.as_str())),
            None => result,
        }
    }

    fn read_next_record(&mut self) -> Result<Option<Record>> {
        if self.exhausted {
            return Ok(None);
        }
        if !self.seek_record_start()? {
            self.exhausted = true;
            return Ok(None);
        }

        let mut leader: Option<Leader> = None;
        let mut fields = Vec::new();
        let mut seen_data_field = false;

        loop {
            match self.next_event()? {
                Event::Start(e) => {
                    self.adopt_prefix(&e);
                    let name = e.name();
                    if self.is_element(name.as_ref(), "leader") {
                        if leader.is_some() {
                            return Err(self.parse_error("second <leader> in record"));
                        }
                        let text = self.read_text("leader")?;
                        let parsed = Leader::from_xml_text(&text)?;
                        parsed.check_invariants(&mut self.diagnostics);
                        leader = Some(parsed);
                    } else if self.is_element(name.as_ref(), "controlfield") {
                        self.expect_leader(leader.as_ref(), "controlfield")?;
                        if seen_data_field {
                            return Err(
                                self.parse_error("<controlfield> after a <datafield>")
                            );
                        }
                        let tag = self.tag_attribute(&e)?;
                        let text = self.read_text("controlfield")?;
                        if text.is_empty() {
                            self.diagnostics
                                .warn(format!("dropping empty control field {tag}"));
                        } else {
                            fields.push(Field::new(tag, text));
                        }
                    } else if self.is_element(name.as_ref(), "datafield") {
                        self.expect_leader(leader.as_ref(), "datafield")?;
                        seen_data_field = true;
                        let tag = self.tag_attribute(&e)?;
                        let ind1 = self.indicator_attribute(&e, "ind1")?;
                        let ind2 = self.indicator_attribute(&e, "ind2")?;
                        let subfields = self.read_subfields(ind1, ind2)?;
                        if subfields.is_empty() {
                            self.diagnostics
                                .warn(format!("dropping empty data field {tag}"));
                        } else {
                            fields.push(Field::from_subfields(tag, &subfields));
                        }
                    } else {
                        return Err(self.unexpected_element(name.as_ref()));
                    }
                },
                Event::Empty(e) => {
                    self.adopt_prefix(&e);
                    let name = e.name();
                    if self.is_element(name.as_ref(), "controlfield") {
                        self.expect_leader(leader.as_ref(), "controlfield")?;
                        if seen_data_field {
                            return Err(
                                self.parse_error("<controlfield> after a <datafield>")
                            );
                        }
                        let tag = self.tag_attribute(&e)?;
                        self.diagnostics
                            .warn(format!("dropping empty control field {tag}"));
                    } else if self.is_element(name.as_ref(), "datafield") {
                        self.expect_leader(leader.as_ref(), "datafield")?;
                        seen_data_field = true;
                        let tag = self.tag_attribute(&e)?;
                        self.diagnostics
                            .warn(format!("dropping empty data field {tag}"));
                    } else {
                        return Err(self.unexpected_element(name.as_ref()));
                    }
                },
                Event::End(e) => {
                    if self.is_element(e.name().as_ref(), "record") {
                        break;
                    }
                    return Err(self.unexpected_element(e.name().as_ref()));
                },
                Event::Text(t) => {
                    if !t.iter().all(u8::is_ascii_whitespace) {
                        return Err(self.parse_error("unexpected text inside <record>"));
                    }
                },
                Event::Eof => {
                    return Err(MarcError::TruncatedRecord(format!(
                        "MARC-XML input ends inside a <record> at byte {}",
                        self.position()
                    )));
                },
                _ => {},
            }
        }

        let leader = leader.ok_or_else(|| self.parse_error("<record> without a <leader>"))?;
        // Records are assembled in document order; from_fields restores tag order.
        let record = Record::from_fields(leader, fields);
        self.records_read += 1;
        Ok(Some(record))
    }

    /// Skip to the next `<record>` start tag. Returns `false` at the end of
    /// the collection.
    fn seek_record_start(&mut self) -> Result<bool> {
        loop {
            match self.next_event()? {
                Event::Start(e) => {
                    self.adopt_prefix(&e);
                    let name = e.name();
                    if self.is_element(name.as_ref(), "record") {
                        return Ok(true);
                    }
                    if !self.is_element(name.as_ref(), "collection") {
                        return Err(self.unexpected_element(name.as_ref()));
                    }
                },
                Event::Empty(e) => {
                    self.adopt_prefix(&e);
                    let name = e.name();
                    if self.is_element(name.as_ref(), "collection") {
                        return Ok(false);
                    }
                    if self.is_element(name.as_ref(), "record") {
                        return Err(self.parse_error("empty <record> element"));
                    }
                    return Err(self.unexpected_element(name.as_ref()));
                },
                Event::End(e) => {
                    if self.is_element(e.name().as_ref(), "collection") {
                        return Ok(false);
                    }
                    return Err(self.unexpected_element(e.name().as_ref()));
                },
                Event::Text(t) => {
                    if !t.iter().all(u8::is_ascii_whitespace) {
                        return Err(self.parse_error("unexpected text between records"));
                    }
                },
                Event::Eof => return Ok(false),
                _ => {},
            }
        }
    }

    /// Read `<subfield>` children up to the closing `</datafield>`.
    fn read_subfields(&mut self, ind1: char, ind2: char) -> Result<Subfields> {
        let mut subfields = Subfields::new(ind1, ind2);
        loop {
            match self.next_event()? {
                Event::Start(e) => {
                    if !self.is_element(e.name().as_ref(), "subfield") {
                        return Err(self.unexpected_element(e.name().as_ref()));
                    }
                    let code = self.code_attribute(&e)?;
                    let value = self.read_text("subfield")?;
                    subfields.append_subfield(code, value);
                },
                Event::Empty(e) => {
                    if !self.is_element(e.name().as_ref(), "subfield") {
                        return Err(self.unexpected_element(e.name().as_ref()));
                    }
                    let code = self.code_attribute(&e)?;
                    subfields.append_subfield(code, "");
                },
                Event::End(e) => {
                    if self.is_element(e.name().as_ref(), "datafield") {
                        return Ok(subfields);
                    }
                    return Err(self.unexpected_element(e.name().as_ref()));
                },
                Event::Text(t) => {
                    if !t.iter().all(u8::is_ascii_whitespace) {
                        return Err(self.parse_error("unexpected text inside <datafield>"));
                    }
                },
                Event::Eof => {
                    return Err(MarcError::TruncatedRecord(format!(
                        "MARC-XML input ends inside a <datafield> at byte {}",
                        self.position()
                    )));
                },
                _ => {},
            }
        }
    }

    /// Collect the text content of the current element up to its end tag.
    fn read_text(&mut self, element: &str) -> Result<String> {
        let mut text = String::new();
        loop {
            match self.next_event()? {
                Event::Text(t) => {
                    let unescaped = t.unescape().map_err(|e| self.xml_error(&e))?;
                    text.push_str(&unescaped);
                },
                Event::CData(c) => text.push_str(&String::from_utf8_lossy(&c.into_inner())),
                Event::End(e) => {
                    if self.is_element(e.name().as_ref(), element) {
                        return Ok(text);
                    }
                    return Err(self.unexpected_element(e.name().as_ref()));
                },
                Event::Start(e) | Event::Empty(e) => {
                    return Err(self.unexpected_element(e.name().as_ref()));
                },
                Event::Eof => {
                    return Err(MarcError::TruncatedRecord(format!(
                        "MARC-XML input ends inside <{element}> at byte {}",
                        self.position()
                    )));
                },
                _ => {},
            }
        }
    }

    fn next_event(&mut self) -> Result<Event<'static>> {
        self.buf.clear();
        match self.reader.read_event_into(&mut self.buf) {
            Ok(event) => Ok(event.into_owned()),
            Err(e) => Err(self.xml_error(&e)),
        }
    }

    /// Remember the prefix bound to the MARC-XML namespace, if `e` declares one.
    fn adopt_prefix(&mut self, e: &BytesStart<'_>) {
        for attr in e.attributes().flatten() {
            let Some(prefix) = attr.key.as_ref().strip_prefix(b"xmlns:") else {
                continue;
            };
            if attr.value.as_ref() == MARCXML_NS.as_bytes() {
                let prefix = String::from_utf8_lossy(prefix).into_owned();
                if self.prefix.as_deref() != Some(prefix.as_str()) {
                    debug!("MARC-XML namespace bound to prefix {prefix:?}");
                    self.prefix = Some(prefix);
                }
            }
        }
    }

    /// Whether the qualified name `qname` is the MARC-XML element `local`.
    fn is_element(&self, qname: &[u8], local: &str) -> bool {
        if qname == local.as_bytes() {
            return true;
        }
        match &self.prefix {
            Some(prefix) => {
                qname.len() == prefix.len() + 1 + local.len()
                    && qname.starts_with(prefix.as_bytes())
                    && qname[prefix.len()] == b':'
                    && qname.ends_with(local.as_bytes())
            },
            None => false,
        }
    }

    fn attribute(&self, e: &BytesStart<'_>, name: &str) -> Result<Option<String>> {
        for attr in e.attributes() {
            let attr = attr.map_err(|err| self.parse_error(&err.to_string()))?;
            if attr.key.as_ref() == name.as_bytes() {
                let value = attr.unescape_value().map_err(|err| self.xml_error(&err))?;
                return Ok(Some(value.into_owned()));
            }
        }
        Ok(None)
    }

    fn tag_attribute(&self, e: &BytesStart<'_>) -> Result<Tag> {
        let value = self
            .attribute(e, "tag")?
            .ok_or_else(|| self.parse_error("field without a tag attribute"))?;
        Tag::new(&value)
    }

    fn indicator_attribute(&self, e: &BytesStart<'_>, name: &str) -> Result<char> {
        let value = self.attribute(e, name)?.unwrap_or_default();
        let mut chars = value.chars();
        match (chars.next(), chars.next()) {
            (None, _) => Ok(' '),
            (Some(c), None) => Ok(c),
            _ => Err(self.parse_error(&format!("{name}={value:?} is not a single character"))),
        }
    }

    fn code_attribute(&self, e: &BytesStart<'_>) -> Result<char> {
        let value = self
            .attribute(e, "code")?
            .ok_or_else(|| self.parse_error("subfield without a code attribute"))?;
        let mut chars = value.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Ok(c),
            _ => Err(self.parse_error(&format!("code={value:?} is not a single character"))),
        }
    }

    fn expect_leader(&self, leader: Option<&Leader>, element: &str) -> Result<()> {
        if leader.is_none() {
            return Err(self.parse_error(&format!("<{element}> before <leader>")));
        }
        Ok(())
    }

    fn unexpected_element(&self, qname: &[u8]) -> MarcError {
        self.parse_error(&format!(
            "unexpected element <{}>",
            String::from_utf8_lossy(qname)
        ))
    }

    fn parse_error(&self, message: &str) -> MarcError {
        MarcError::ParseError {
            position: self.position(),
            message: message.to_string(),
        }
    }

    fn xml_error(&self, e: &quick_xml::Error) -> MarcError {
        self.parse_error(&e.to_string())
    }
}

impl<R: BufRead> fmt::Debug for MarcXmlReader<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MarcXmlReader")
            .field("position", &self.position())
            .field("prefix", &self.prefix)
            .field("records_read", &self.records_read)
            .field("exhausted", &self.exhausted)
            .finish_non_exhaustive()
    }
}

impl<R: BufRead + fmt::Debug> FormatReader for MarcXmlReader<R> {
    fn read_record(&mut self) -> Result<Option<Record>> {
        MarcXmlReader::read_record(self)
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

/// MARC-XML writer producing a `<marc:collection>` document.
///
/// The XML declaration and the opening collection tag are written with the
/// first record; [`finish`](Self::finish) closes the collection. A writer
/// that is finished without any records still produces an empty collection.
pub struct MarcXmlWriter<W: Write> {
    writer: Writer<W>,
    indent: bool,
    diagnostics: Diagnostics,
    started: bool,
    finished: bool,
    records_written: usize,
}

impl<W: Write> MarcXmlWriter<W> {
    /// Create a writer that indents its output.
    pub fn new(inner: W) -> Self {
        MarcXmlWriter {
            writer: Writer::new_with_indent(inner, b' ', 2),
            indent: true,
            diagnostics: Diagnostics::with_context("MARC-XML"),
            started: false,
            finished: false,
            records_written: 0,
        }
    }

    /// Turn indentation on or off. Has no effect once writing has started.
    #[must_use]
    pub fn with_indent(self, indent: bool) -> Self {
        if self.started || indent == self.indent {
            return self;
        }
        let inner = self.writer.into_inner();
        MarcXmlWriter {
            writer: if indent {
                Writer::new_with_indent(inner, b' ', 2)
            } else {
                Writer::new(inner)
            },
            indent,
            ..self
        }
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

    /// Write one `<marc:record>`.
    ///
    /// # Errors
    ///
    /// Returns an error if the record is invalid (see [`Record::validate`]),
    /// the writer is finished, or the destination fails.
    pub fn write_record(&mut self, record: &Record) -> Result<()> {
        if self.finished {
            return Err(MarcError::InvalidRecord(
                "Cannot write to a finished writer".to_string(),
            ));
        }
        record.validate(&mut self.diagnostics)?;
        self.start_collection()?;

        let record_name = qualified("record");
        self.emit(Event::Start(BytesStart::new(record_name.as_str())))?;

        let leader = xml_leader(record)?;
        self.writer
            .create_element(qualified("leader").as_str())
            .write_text_content(BytesText::new(&leader))
            .map_err(write_error)?;

        for field in record.fields() {
            if field.is_control_field() {
                self.writer
                    .create_element(qualified("controlfield").as_str())
                    .with_attribute(("tag", field.tag().as_str()))
                    .write_text_content(BytesText::new(field.contents()))
                    .map_err(write_error)?;
                continue;
            }

            let ind1 = field.indicator1().to_string();
            let ind2 = field.indicator2().to_string();
            let datafield = qualified("datafield");
            self.emit(Event::Start(BytesStart::new(datafield.as_str()).with_attributes([
                ("tag", field.tag().as_str()),
                ("ind1", ind1.as_str()),
                ("ind2", ind2.as_str()),
            ])))?;
            for subfield in field.subfields().iter() {
                let code = subfield.code.to_string();
                self.writer
                    .create_element(qualified("subfield").as_str())
                    .with_attribute(("code", code.as_str()))
                    .write_text_content(BytesText::new(&subfield.value))
                    .map_err(write_error)?;
            }
            self.emit(Event::End(BytesEnd::new(datafield.as_str())))?;
        }

        self.emit(Event::End(BytesEnd::new(record_name.as_str())))?;
        self.records_written += 1;
        Ok(())
    }

    /// Close the collection and flush. Further writes fail.
    ///
    /// # Errors
    ///
    /// Returns an error if writing or flushing fails.
    pub fn finish(&mut self) -> Result<()> {
        if self.finished {
            return Ok(());
        }
        self.start_collection()?;
        self.emit(Event::End(BytesEnd::new(qualified("collection").as_str())))?;
        let inner = self.writer.get_mut();
        inner.write_all(b"\n")?;
        inner.flush()?;
        self.finished = true;
        Ok(())
    }

    /// Consume the writer, returning the destination.
    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }

    fn start_collection(&mut self) -> Result<()> {
        if self.started {
            return Ok(());
        }
        self.emit(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
        let xmlns = format!("xmlns:{WRITER_PREFIX}");
        let collection = qualified("collection");
        self.emit(Event::Start(
            BytesStart::new(collection.as_str()).with_attributes([(xmlns.as_str(), MARCXML_NS)]),
        ))?;
        self.started = true;
        Ok(())
    }

    fn emit(&mut self, event: Event<'_>) -> Result<()> {
        self.writer.write_event(event).map_err(write_error)
    }
}

impl<W: Write> fmt::Debug for MarcXmlWriter<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MarcXmlWriter")
            .field("indent", &self.indent)
            .field("started", &self.started)
            .field("finished", &self.finished)
            .field("records_written", &self.records_written)
            .finish_non_exhaustive()
    }
}

impl<W: Write + fmt::Debug> FormatWriter for MarcXmlWriter<W> {
    fn write_record(&mut self, record: &Record) -> Result<()> {
        MarcXmlWriter::write_record(self, record)
    }

    fn finish(&mut self) -> Result<()> {
        MarcXmlWriter::finish(self)
    }

    fn records_written(&self) -> usize {
        self.records_written
    }

    fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }
}

fn qualified(local: &str) -> String {
    format!("{WRITER_PREFIX}:{local}")
}

/// Leader text with the length and base address the binary encoding would
/// have. Records too long for five digits get zeros there.
fn xml_leader(record: &Record) -> Result<String> {
    let mut leader = record.leader.clone();
    let base = LEADER_LENGTH + DIRECTORY_ENTRY_LENGTH * record.len() + 1;
    let fits = |n: usize| u32::try_from(n).ok().filter(|&n| n <= MAX_FIVE_DIGIT_VALUE);
    leader.record_length = fits(record.record_size()).unwrap_or(0);
    leader.data_base_address = fits(base).unwrap_or(0);
    leader.to_leader_string()
}

fn write_error(e: quick_xml::Error) -> MarcError {
    match e {
        quick_xml::Error::Io(io) => MarcError::IoError(std::io::Error::new(io.kind(), io.to_string())),
        other => MarcError::InvalidRecord(other.to_string()),
    }
}
