//! MARC fields.
//!
//! A [`Field`] is a tag plus its raw contents. For control fields (`00X`) the
//! contents are opaque. For data fields they are two indicators followed by the
//! subfield groups described in [`crate::subfields`].
//!
//! Fields tagged `LOK` belong to a local data block: their first subfield is
//! `$0`, holding a three-character pseudo-tag optionally followed by two local
//! indicators, e.g. `"  \x1F0852 1\x1Fa..."`.

use crate::field_table;
use crate::subfields::{Subfields, SUBFIELD_DELIMITER};
use crate::tag::Tag;
use serde::{Deserialize, Serialize};

/// Tag of fields that belong to a local data block.
pub const LOCAL_BLOCK_TAG: &str = "LOK";

/// Prefix of a local field's contents in front of the pseudo-tag: two blank
/// indicators, a delimiter and subfield code `0`.
const LOCAL_TAG_PREFIX_LEN: usize = 4;

/// A field in a MARC record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    tag: Tag,
    contents: String,
}

impl Field {
    /// Create a field from a tag and raw contents.
    pub fn new(tag: Tag, contents: impl Into<String>) -> Self {
        Field {
            tag,
            contents: contents.into(),
        }
    }

    /// Create a data field from its subfields.
    #[must_use]
    pub fn from_subfields(tag: Tag, subfields: &Subfields) -> Self {
        Field::new(tag, subfields.to_contents())
    }

    /// Create a `LOK` field carrying `local_tag` in its `$0`.
    ///
    /// # Examples
    ///
    /// ```
    /// use marc_engine::{Field, Tag};
    ///
    /// let field = Field::local(Tag::new("852").unwrap(), ' ', '1', &[('a', "DE-21")]);
    /// assert_eq!(field.local_tag().unwrap().as_str(), "852");
    /// assert_eq!(field.local_indicator2(), Some('1'));
    /// ```
    #[must_use]
    pub fn local(
        local_tag: Tag,
        local_indicator1: char,
        local_indicator2: char,
        subfields: &[(char, &str)],
    ) -> Self {
        let mut contents = String::from("  ");
        contents.push(SUBFIELD_DELIMITER);
        contents.push('0');
        contents.push_str(local_tag.as_str());
        contents.push(local_indicator1);
        contents.push(local_indicator2);
        for (code, value) in subfields {
            contents.push(SUBFIELD_DELIMITER);
            contents.push(*code);
            contents.push_str(value);
        }
        Field {
            tag: Tag::from_ascii(*b"LOK"),
            contents,
        }
    }

    /// Field tag
    #[must_use]
    pub fn tag(&self) -> &Tag {
        &self.tag
    }

    /// Raw field contents (without the field terminator).
    #[must_use]
    pub fn contents(&self) -> &str {
        &self.contents
    }

    /// Replace the raw contents, returning the previous contents.
    pub(crate) fn replace_contents(&mut self, contents: String) -> String {
        std::mem::replace(&mut self.contents, contents)
    }

    /// Whether this is a control field (tag `00X`).
    #[must_use]
    pub fn is_control_field(&self) -> bool {
        self.tag.is_control_tag()
    }

    /// Whether this is a data field.
    #[must_use]
    pub fn is_data_field(&self) -> bool {
        !self.is_control_field()
    }

    /// Whether the field may be repeated within a record.
    ///
    /// # Panics
    ///
    /// Panics if the tag is a standard tag unknown to the repeatability table.
    #[must_use]
    pub fn is_repeatable(&self) -> bool {
        field_table::is_repeatable(&self.tag)
    }

    /// First indicator, or a blank for control fields.
    #[must_use]
    pub fn indicator1(&self) -> char {
        if self.is_control_field() {
            return ' ';
        }
        self.contents.chars().next().unwrap_or(' ')
    }

    /// Second indicator, or a blank for control fields.
    #[must_use]
    pub fn indicator2(&self) -> char {
        if self.is_control_field() {
            return ' ';
        }
        self.contents.chars().nth(1).unwrap_or(' ')
    }

    /// Parse the subfields of a data field (wire order).
    #[must_use]
    pub fn subfields(&self) -> Subfields {
        Subfields::parse(&self.contents)
    }

    /// Replace the contents of a data field with `subfields`.
    pub fn set_subfields(&mut self, subfields: &Subfields) {
        self.contents = subfields.to_contents();
    }

    /// First value of subfield `code`.
    #[must_use]
    pub fn first_subfield_with_code(&self, code: char) -> Option<String> {
        self.subfields()
            .first_subfield_with_code(code)
            .map(ToString::to_string)
    }

    /// Whether the field has a subfield with `code`.
    #[must_use]
    pub fn has_subfield(&self, code: char) -> bool {
        self.subfields().has_subfield(code)
    }

    /// Whether this field belongs to a local data block.
    #[must_use]
    pub fn is_local_block_field(&self) -> bool {
        self.tag == LOCAL_BLOCK_TAG
    }

    /// The pseudo-tag a `LOK` field carries in its `$0`.
    ///
    /// Returns `None` for other fields and for `LOK` fields whose contents do
    /// not start with `$0` followed by three characters.
    #[must_use]
    pub fn local_tag(&self) -> Option<Tag> {
        if !self.is_local_block_field() {
            return None;
        }
        let bytes = self.contents.as_bytes();
        if bytes.len() < LOCAL_TAG_PREFIX_LEN + 3
            || bytes[2] != SUBFIELD_DELIMITER as u8
            || bytes[3] != b'0'
        {
            return None;
        }
        Tag::from_bytes(&bytes[LOCAL_TAG_PREFIX_LEN..LOCAL_TAG_PREFIX_LEN + 3]).ok()
    }

    /// First local indicator of a `LOK` field (blank if absent).
    #[must_use]
    pub fn local_indicator1(&self) -> Option<char> {
        self.local_indicator(0)
    }

    /// Second local indicator of a `LOK` field (blank if absent).
    #[must_use]
    pub fn local_indicator2(&self) -> Option<char> {
        self.local_indicator(1)
    }

    fn local_indicator(&self, index: usize) -> Option<char> {
        self.local_tag()?;
        let after_tag = &self.contents[LOCAL_TAG_PREFIX_LEN + 3..];
        let local_zero = after_tag
            .split(SUBFIELD_DELIMITER)
            .next()
            .unwrap_or_default();
        Some(local_zero.chars().nth(index).unwrap_or(' '))
    }

    /// Number of bytes this field adds to an encoded record: a 12-byte
    /// directory entry, the contents and the field terminator.
    #[must_use]
    pub fn encoded_size(&self) -> usize {
        crate::record::DIRECTORY_ENTRY_LENGTH + self.contents.len() + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tag(s: &str) -> Tag {
        Tag::new(s).unwrap()
    }

    #[test]
    fn test_control_field_has_no_indicators() {
        let field = Field::new(tag("008"), "850101s1984    gw            000 0 ger d");
        assert!(field.is_control_field());
        assert_eq!(field.indicator1(), ' ');
        assert_eq!(field.indicator2(), ' ');
    }

    #[test]
    fn test_data_field_indicators_and_subfields() {
        let field = Field::new(tag("245"), "14\x1FaThe title\x1FcAuthor");
        assert!(field.is_data_field());
        assert_eq!(field.indicator1(), '1');
        assert_eq!(field.indicator2(), '4');
        assert_eq!(field.first_subfield_with_code('c').as_deref(), Some("Author"));
        assert!(!field.has_subfield('b'));
    }

    #[test]
    fn test_from_subfields() {
        let subfields = Subfields::from_pairs('0', '7', [('a', "Topic"), ('2', "gnd")]);
        let field = Field::from_subfields(tag("650"), &subfields);
        assert_eq!(field.contents(), "07\x1F2gnd\x1FaTopic");
    }

    #[test]
    fn test_local_tag_extraction() {
        let field = Field::new(tag("LOK"), "  \x1F0852  \x1FaDE-21");
        assert_eq!(field.local_tag(), Some(tag("852")));
        assert_eq!(field.local_indicator1(), Some(' '));
        assert_eq!(field.local_indicator2(), Some(' '));
    }

    #[test]
    fn test_local_tag_without_indicators() {
        let field = Field::new(tag("LOK"), "  \x1F0001");
        assert_eq!(field.local_tag(), Some(tag("001")));
        assert_eq!(field.local_indicator1(), Some(' '));
    }

    #[test]
    fn test_local_tag_only_for_lok_fields() {
        let field = Field::new(tag("852"), "  \x1F0852");
        assert_eq!(field.local_tag(), None);
        let broken = Field::new(tag("LOK"), "  \x1Fa852");
        assert_eq!(broken.local_tag(), None);
    }

    #[test]
    fn test_local_constructor() {
        let field = Field::local(tag("866"), '3', '0', &[('a', "1.1990 -")]);
        assert_eq!(field.tag().as_str(), "LOK");
        assert_eq!(field.contents(), "  \x1F086630\x1Fa1.1990 -");
        assert_eq!(field.local_indicator1(), Some('3'));
        assert_eq!(field.local_indicator2(), Some('0'));
    }

    #[test]
    fn test_set_subfields() {
        let mut field = Field::new(tag("245"), "10\x1FaOld");
        let mut subfields = field.subfields();
        subfields.replace_first_subfield('a', "New");
        subfields.append_subfield('c', "Someone");
        field.set_subfields(&subfields);
        assert_eq!(field.contents(), "10\x1FaNew\x1FcSomeone");
    }

    #[test]
    fn test_encoded_size() {
        let field = Field::new(tag("001"), "12345");
        assert_eq!(field.encoded_size(), 12 + 5 + 1);
    }
}
