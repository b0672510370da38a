//! MARC record structures and field mutation.
//!
//! A [`Record`] is a [`Leader`] plus a list of [`Field`]s kept sorted by tag.
//! The sort is stable: fields with equal tags stay in insertion order. Every
//! public mutation preserves the ordering, so range queries such as
//! [`Record::get_tag_range`] always describe one contiguous slice.
//!
//! Positions into the field list are plain indices and ranges of indices.
//! They are only valid until the next mutation.
//!
//! # Examples
//!
//! ```
//! use marc_engine::{Leader, Record, Subfields, Tag};
//!
//! let mut record = Record::new(Leader::default());
//! record.insert_field(Tag::new("001").unwrap(), "12345");
//!
//! let title = Subfields::from_pairs('1', '0', [('a', "The title")]);
//! assert!(record.insert_data_field(Tag::new("245").unwrap(), &title));
//!
//! // 245 is not repeatable
//! assert!(!record.insert_data_field(Tag::new("245").unwrap(), &title));
//!
//! for field in record.fields_with_tag(&Tag::new("245").unwrap()) {
//!     println!("{}", field.contents());
//! }
//! ```

use crate::field::Field;
use crate::field_table;
use crate::leader::{Leader, LEADER_LENGTH};
use crate::subfields::Subfields;
use crate::tag::Tag;
use serde::{Deserialize, Serialize};
use std::ops::{Index, Range};

/// Length of one directory entry: tag (3), field length (4), start offset (5).
pub const DIRECTORY_ENTRY_LENGTH: usize = 12;

/// Encoded size of a record without fields: the leader plus the directory and
/// record terminators.
const EMPTY_RECORD_SIZE: usize = LEADER_LENGTH + 2;

/// A MARC record
///
/// Besides the fields, the record tracks the number of bytes its ISO 2709
/// encoding would take, updated incrementally on every mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RecordData", into = "RecordData")]
pub struct Record {
    /// Record leader (24 bytes)
    pub leader: Leader,
    fields: Vec<Field>,
    record_size: usize,
}

/// Serialized form of a [`Record`]; deserializing re-sorts the fields.
#[derive(Serialize, Deserialize)]
struct RecordData {
    leader: Leader,
    fields: Vec<Field>,
}

impl From<RecordData> for Record {
    fn from(data: RecordData) -> Self {
        Record::from_fields(data.leader, data.fields)
    }
}

impl From<Record> for RecordData {
    fn from(record: Record) -> Self {
        RecordData {
            leader: record.leader,
            fields: record.fields,
        }
    }
}

impl Default for Record {
    fn default() -> Self {
        Record::new(Leader::default())
    }
}

impl Record {
    /// Create a new MARC record with the given leader and no fields
    #[must_use]
    pub fn new(leader: Leader) -> Self {
        Record {
            leader,
            fields: Vec::new(),
            record_size: EMPTY_RECORD_SIZE,
        }
    }

    /// Create a record from fields in arbitrary order.
    ///
    /// The fields are stably sorted by tag, so repeated tags keep their
    /// relative order. No repeatability check is made; decoders use this to
    /// carry over whatever the input contains.
    #[must_use]
    pub fn from_fields(leader: Leader, mut fields: Vec<Field>) -> Self {
        fields.sort_by(|a, b| a.tag().cmp(b.tag()));
        let record_size = EMPTY_RECORD_SIZE + fields.iter().map(Field::encoded_size).sum::<usize>();
        Record {
            leader,
            fields,
            record_size,
        }
    }

    /// The leader.
    #[must_use]
    pub fn leader(&self) -> &Leader {
        &self.leader
    }

    /// Mutable access to the leader.
    pub fn leader_mut(&mut self) -> &mut Leader {
        &mut self.leader
    }

    /// All fields in tag order.
    #[must_use]
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Consume the record, returning its fields.
    #[must_use]
    pub fn into_fields(self) -> Vec<Field> {
        self.fields
    }

    /// Number of fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the record has no fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Size in bytes of the record's ISO 2709 encoding as a single physical record.
    #[must_use]
    pub fn record_size(&self) -> usize {
        self.record_size
    }

    /// Contents of the 001 control field.
    #[must_use]
    pub fn control_number(&self) -> Option<&str> {
        self.fields
            .first()
            .filter(|field| *field.tag() == "001")
            .map(Field::contents)
    }

    // ============================================================================
    // Range queries
    // ============================================================================

    /// The contiguous range of fields tagged `tag`.
    ///
    /// Returns an empty range when the tag does not occur.
    ///
    /// # Examples
    ///
    /// ```
    /// use marc_engine::{Record, Tag};
    ///
    /// let mut record = Record::default();
    /// let subject = Tag::new("650").unwrap();
    /// record.insert_field(Tag::new("001").unwrap(), "1");
    /// record.insert_field(subject, " 0\x1FaCats");
    /// record.insert_field(subject, " 0\x1FaDogs");
    /// assert_eq!(record.get_tag_range(&subject), 1..3);
    /// assert!(record.get_tag_range(&Tag::new("651").unwrap()).is_empty());
    /// ```
    #[must_use]
    pub fn get_tag_range(&self, tag: &Tag) -> Range<usize> {
        let start = self.fields.partition_point(|field| field.tag() < tag);
        let end = start + self.fields[start..].partition_point(|field| field.tag() == tag);
        start..end
    }

    /// The run of fields whose tags are all in `tags`, starting at the first
    /// field tagged with any of them.
    ///
    /// Only one run is returned. Tags that belong together must be adjacent in
    /// the sort order (e.g. `150`/`151`) for the result to cover all of them;
    /// use [`Record::get_tag_range`] per tag otherwise.
    #[must_use]
    pub fn get_tag_range_any(&self, tags: &[Tag]) -> Range<usize> {
        let Some(start) = self
            .fields
            .iter()
            .position(|field| tags.contains(field.tag()))
        else {
            return self.fields.len()..self.fields.len();
        };
        let end = start
            + self.fields[start..]
                .iter()
                .take_while(|field| tags.contains(field.tag()))
                .count();
        start..end
    }

    /// All fields tagged `tag`.
    #[must_use]
    pub fn fields_with_tag(&self, tag: &Tag) -> &[Field] {
        &self.fields[self.get_tag_range(tag)]
    }

    /// Index of the first field tagged `tag`.
    #[must_use]
    pub fn find_tag(&self, tag: &Tag) -> Option<usize> {
        let range = self.get_tag_range(tag);
        (!range.is_empty()).then_some(range.start)
    }

    /// Whether a field tagged `tag` exists.
    #[must_use]
    pub fn has_tag(&self, tag: &Tag) -> bool {
        self.find_tag(tag).is_some()
    }

    /// The first field tagged `tag`.
    #[must_use]
    pub fn first_field(&self, tag: &Tag) -> Option<&Field> {
        self.find_tag(tag).map(|index| &self.fields[index])
    }

    /// Iterate over fields whose tag lies in `start..=end`.
    pub fn fields_in_range<'a>(
        &'a self,
        start: &'a Tag,
        end: &'a Tag,
    ) -> impl Iterator<Item = &'a Field> + 'a {
        let first = self.fields.partition_point(|field| field.tag() < start);
        self.fields[first..]
            .iter()
            .take_while(move |field| field.tag() <= end)
    }

    // ============================================================================
    // Mutation
    // ============================================================================

    /// Insert a field after all fields with a tag less than or equal to `tag`.
    ///
    /// Returns `false`, leaving the record unchanged, if `tag` is not
    /// repeatable and already present.
    ///
    /// # Panics
    ///
    /// Panics if `tag` is already present and is a standard tag unknown to the
    /// repeatability table.
    pub fn insert_field(&mut self, tag: Tag, contents: impl Into<String>) -> bool {
        let position = self.fields.partition_point(|field| *field.tag() <= tag);
        if position > 0
            && *self.fields[position - 1].tag() == tag
            && !field_table::is_repeatable(&tag)
        {
            return false;
        }
        let field = Field::new(tag, contents);
        self.record_size += field.encoded_size();
        self.fields.insert(position, field);
        true
    }

    /// Insert a data field built from `subfields`. See [`Record::insert_field`].
    pub fn insert_data_field(&mut self, tag: Tag, subfields: &Subfields) -> bool {
        self.insert_field(tag, subfields.to_contents())
    }

    /// Append a field at the end of the record.
    ///
    /// This is the fast path for producers that emit fields in tag order.
    ///
    /// # Panics
    ///
    /// Panics if `tag` sorts before the last field's tag, or if it equals the
    /// last field's tag and is not repeatable. Both are caller bugs.
    pub fn append_field(&mut self, tag: Tag, contents: impl Into<String>) {
        if let Some(last) = self.fields.last() {
            assert!(
                *last.tag() <= tag,
                "appending field {tag} after field {} breaks the tag order",
                last.tag()
            );
            assert!(
                *last.tag() != tag || field_table::is_repeatable(&tag),
                "appending a second occurrence of non-repeatable field {tag}"
            );
        }
        let field = Field::new(tag, contents);
        self.record_size += field.encoded_size();
        self.fields.push(field);
    }

    /// Replace the contents of the first field tagged `tag`, or insert a new
    /// field if there is none.
    pub fn replace_field(&mut self, tag: Tag, contents: impl Into<String>) {
        let contents = contents.into();
        match self.find_tag(&tag) {
            Some(index) => {
                self.set_field_contents(index, contents);
            },
            None => {
                let inserted = self.insert_field(tag, contents);
                debug_assert!(inserted, "insert of absent tag {tag} failed");
            },
        }
    }

    /// Replace or insert a data field built from `subfields`.
    pub fn replace_data_field(&mut self, tag: Tag, subfields: &Subfields) {
        self.replace_field(tag, subfields.to_contents());
    }

    /// Replace the raw contents of the field at `index`, returning the old contents.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of bounds.
    pub fn set_field_contents(&mut self, index: usize, contents: impl Into<String>) -> String {
        let contents = contents.into();
        let new_len = contents.len();
        let old = self.fields[index].replace_contents(contents);
        self.record_size = self.record_size - old.len() + new_len;
        old
    }

    /// Append a subfield to the first field tagged `tag`.
    ///
    /// Returns `false` if there is no such data field.
    pub fn add_subfield(&mut self, tag: &Tag, code: char, value: &str) -> bool {
        let Some(index) = self.find_tag(tag) else {
            return false;
        };
        if self.fields[index].is_control_field() {
            return false;
        }
        let mut subfields = self.fields[index].subfields();
        subfields.append_subfield(code, value);
        self.set_field_contents(index, subfields.to_contents());
        true
    }

    /// Make sure the first field tagged `tag` has subfield `code` with `value`
    /// exactly once, creating the field with blank indicators if needed.
    pub fn add_subfield_create_field_unique(&mut self, tag: Tag, code: char, value: &str) {
        let Some(index) = self.find_tag(&tag) else {
            let subfields = Subfields::from_pairs(' ', ' ', [(code, value)]);
            self.insert_data_field(tag, &subfields);
            return;
        };

        let mut subfields = self.fields[index].subfields();
        let mut seen = false;
        let before = subfields.len();
        subfields.retain(|subfield| {
            if subfield.code == code && subfield.value == value {
                if seen {
                    return false;
                }
                seen = true;
            }
            true
        });
        if !seen {
            subfields.add_subfield(code, value);
        } else if subfields.len() == before {
            return;
        }
        self.set_field_contents(index, subfields.to_contents());
    }

    /// Remove the field at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of bounds.
    pub fn delete_field(&mut self, index: usize) -> Field {
        let field = self.fields.remove(index);
        self.record_size -= field.encoded_size();
        field
    }

    /// Remove all fields tagged `tag`, returning how many were removed.
    pub fn delete_fields(&mut self, tag: &Tag) -> usize {
        let range = self.get_tag_range(tag);
        self.delete_ranges(vec![range])
    }

    /// Remove several ranges of fields at once.
    ///
    /// Ranges are sorted and overlapping or touching ranges coalesced, then
    /// erased back to front so earlier indices stay valid. Returns the number
    /// of removed fields.
    pub fn delete_ranges(&mut self, mut ranges: Vec<Range<usize>>) -> usize {
        ranges.retain(|range| !range.is_empty());
        ranges.sort_by_key(|range| range.start);

        let mut coalesced: Vec<Range<usize>> = Vec::with_capacity(ranges.len());
        for range in ranges {
            match coalesced.last_mut() {
                Some(last) if range.start <= last.end => last.end = last.end.max(range.end),
                _ => coalesced.push(range),
            }
        }

        let mut removed = 0;
        for range in coalesced.into_iter().rev() {
            for field in self.fields.drain(range) {
                self.record_size -= field.encoded_size();
                removed += 1;
            }
        }
        removed
    }

    /// Merge the fields of a continuation record into this one.
    ///
    /// The continuation's 001 is dropped when it repeats this record's
    /// control number; all other fields are added and the list re-sorted
    /// (stable, so this record's fields precede equal-tagged incoming ones).
    pub fn merge(&mut self, other: Record) {
        let control_number = self.control_number().map(ToString::to_string);
        for field in other.fields {
            if *field.tag() == "001" && control_number.as_deref() == Some(field.contents()) {
                continue;
            }
            self.record_size += field.encoded_size();
            self.fields.push(field);
        }
        self.fields.sort_by(|a, b| a.tag().cmp(b.tag()));
    }
}

impl Index<usize> for Record {
    type Output = Field;

    fn index(&self, index: usize) -> &Self::Output {
        &self.fields[index]
    }
}

impl<'a> IntoIterator for &'a Record {
    type Item = &'a Field;
    type IntoIter = std::slice::Iter<'a, Field>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tag(s: &str) -> Tag {
        Tag::new(s).unwrap()
    }

    fn tags(record: &Record) -> Vec<&str> {
        record.fields().iter().map(|f| f.tag().as_str()).collect()
    }

    fn encoded_len(record: &Record) -> usize {
        LEADER_LENGTH
            + 1
            + 1
            + record
                .fields()
                .iter()
                .map(|f| DIRECTORY_ENTRY_LENGTH + f.contents().len() + 1)
                .sum::<usize>()
    }

    #[test]
    fn test_record_creation() {
        let record = Record::new(Leader::default());
        assert!(record.is_empty());
        assert_eq!(record.record_size(), 26);
        assert_eq!(record.control_number(), None);
    }

    #[test]
    fn test_insert_keeps_tag_order() {
        let mut record = Record::default();
        assert!(record.insert_field(tag("245"), "10\x1FaTitle"));
        assert!(record.insert_field(tag("001"), "123"));
        assert!(record.insert_field(tag("650"), " 0\x1FaB"));
        assert!(record.insert_field(tag("100"), "1 \x1FaName"));
        assert!(record.insert_field(tag("650"), " 0\x1FaA"));
        assert_eq!(tags(&record), vec!["001", "100", "245", "650", "650"]);
        // Equal tags keep insertion order.
        assert_eq!(record[3].contents(), " 0\x1FaB");
        assert_eq!(record[4].contents(), " 0\x1FaA");
        assert_eq!(record.control_number(), Some("123"));
    }

    #[test]
    fn test_insert_non_repeatable_fails() {
        let mut record = Record::default();
        assert!(record.insert_field(tag("001"), "1"));
        let size = record.record_size();
        assert!(!record.insert_field(tag("001"), "2"));
        assert_eq!(record.len(), 1);
        assert_eq!(record.record_size(), size);

        assert!(record.insert_field(tag("650"), " 0\x1FaA"));
        assert!(record.insert_field(tag("650"), " 0\x1FaB"));
        assert_eq!(record.len(), 3);
    }

    #[test]
    fn test_record_size_tracks_mutations() {
        let mut record = Record::default();
        record.insert_field(tag("001"), "abc");
        record.append_field(tag("245"), "10\x1FaTitle");
        assert_eq!(record.record_size(), encoded_len(&record));

        record.replace_field(tag("245"), "00\x1FaA much longer title");
        assert_eq!(record.record_size(), encoded_len(&record));

        record.add_subfield(&tag("245"), 'c', "someone");
        assert_eq!(record.record_size(), encoded_len(&record));

        record.delete_field(1);
        assert_eq!(record.record_size(), encoded_len(&record));
    }

    #[test]
    fn test_append_field() {
        let mut record = Record::default();
        record.append_field(tag("001"), "1");
        record.append_field(tag("650"), " 0\x1FaA");
        record.append_field(tag("650"), " 0\x1FaB");
        assert_eq!(tags(&record), vec!["001", "650", "650"]);
    }

    #[test]
    #[should_panic(expected = "breaks the tag order")]
    fn test_append_out_of_order_panics() {
        let mut record = Record::default();
        record.append_field(tag("245"), "10\x1FaTitle");
        record.append_field(tag("100"), "1 \x1FaName");
    }

    #[test]
    #[should_panic(expected = "non-repeatable")]
    fn test_append_non_repeatable_twice_panics() {
        let mut record = Record::default();
        record.append_field(tag("245"), "10\x1FaTitle");
        record.append_field(tag("245"), "10\x1FaTitle");
    }

    #[test]
    fn test_replace_field_find_or_insert() {
        let mut record = Record::default();
        record.insert_field(tag("001"), "1");
        record.replace_field(tag("005"), "20240101000000.0");
        assert_eq!(tags(&record), vec!["001", "005"]);
        record.replace_field(tag("005"), "20250101000000.0");
        assert_eq!(record.len(), 2);
        assert_eq!(record[1].contents(), "20250101000000.0");
    }

    #[test]
    fn test_get_tag_range() {
        let mut record = Record::default();
        for (t, c) in [("001", "1"), ("650", " 0\x1FaA"), ("650", " 0\x1FaB"), ("700", "1 \x1FaX")] {
            record.insert_field(tag(t), c);
        }
        assert_eq!(record.get_tag_range(&tag("650")), 1..3);
        assert_eq!(record.get_tag_range(&tag("001")), 0..1);
        let missing = record.get_tag_range(&tag("600"));
        assert!(missing.is_empty());
        assert_eq!(record.fields_with_tag(&tag("650")).len(), 2);
        assert!(record.fields_with_tag(&tag("999")).is_empty());
    }

    #[test]
    fn test_get_tag_range_any_is_one_run() {
        let mut record = Record::default();
        for (t, c) in [
            ("001", "1"),
            ("100", "1 \x1FaA"),
            ("110", "2 \x1FaB"),
            ("245", "10\x1FaT"),
            ("700", "1 \x1FaC"),
        ] {
            record.insert_field(tag(t), c);
        }
        assert_eq!(record.get_tag_range_any(&[tag("100"), tag("110")]), 1..3);
        // Non-adjacent tags: only the first run is reported.
        assert_eq!(record.get_tag_range_any(&[tag("100"), tag("700")]), 1..2);
        assert!(record.get_tag_range_any(&[tag("500")]).is_empty());
    }

    #[test]
    fn test_fields_in_range() {
        let mut record = Record::default();
        for (t, c) in [("001", "1"), ("600", "10\x1FaA"), ("650", " 0\x1FaB"), ("700", "1 \x1FaC")] {
            record.insert_field(tag(t), c);
        }
        let (start, end) = (tag("600"), tag("699"));
        let subjects: Vec<&str> = record
            .fields_in_range(&start, &end)
            .map(|f| f.tag().as_str())
            .collect();
        assert_eq!(subjects, vec!["600", "650"]);
    }

    #[test]
    fn test_add_subfield() {
        let mut record = Record::default();
        record.insert_field(tag("001"), "1");
        record.insert_field(tag("245"), "10\x1FaTitle");
        assert!(record.add_subfield(&tag("245"), 'c', "Author"));
        assert_eq!(record[1].contents(), "10\x1FaTitle\x1FcAuthor");
        assert!(!record.add_subfield(&tag("100"), 'a', "missing"));
        assert!(!record.add_subfield(&tag("001"), 'a', "control"));
    }

    #[test]
    fn test_add_subfield_create_field_unique() {
        let mut record = Record::default();
        record.insert_field(tag("001"), "1");
        record.add_subfield_create_field_unique(tag("935"), 'a', "mteo");
        assert_eq!(record[1].contents(), "  \x1Famteo");

        record.add_subfield_create_field_unique(tag("935"), 'a', "mteo");
        assert_eq!(record[1].contents(), "  \x1Famteo");

        record.add_subfield_create_field_unique(tag("935"), 'a', "krim");
        assert_eq!(record[1].contents(), "  \x1Famteo\x1Fakrim");

        record.set_field_contents(1, "  \x1Fakrim\x1Fakrim\x1Fbx");
        record.add_subfield_create_field_unique(tag("935"), 'a', "krim");
        assert_eq!(record[1].contents(), "  \x1Fakrim\x1Fbx");
        assert_eq!(record.record_size(), encoded_len(&record));
    }

    #[test]
    fn test_delete_fields_and_ranges() {
        let mut record = Record::default();
        for (t, c) in [
            ("001", "1"),
            ("020", "  \x1Fa1"),
            ("020", "  \x1Fa2"),
            ("245", "10\x1FaT"),
            ("650", " 0\x1FaA"),
            ("700", "1 \x1FaC"),
        ] {
            record.insert_field(tag(t), c);
        }
        assert_eq!(record.delete_fields(&tag("020")), 2);
        assert_eq!(tags(&record), vec!["001", "245", "650", "700"]);
        assert_eq!(record.delete_fields(&tag("500")), 0);

        assert_eq!(record.delete_ranges(vec![2..3, 1..2, 3..4]), 3);
        assert_eq!(tags(&record), vec!["001"]);
        assert_eq!(record.record_size(), encoded_len(&record));
    }

    #[test]
    fn test_from_fields_sorts_stably() {
        let fields = vec![
            Field::new(tag("650"), " 0\x1FaB"),
            Field::new(tag("001"), "1"),
            Field::new(tag("650"), " 0\x1FaA"),
        ];
        let record = Record::from_fields(Leader::default(), fields);
        assert_eq!(tags(&record), vec!["001", "650", "650"]);
        assert_eq!(record[1].contents(), " 0\x1FaB");
        assert_eq!(record.record_size(), encoded_len(&record));
    }

    #[test]
    fn test_merge_drops_duplicate_control_number() {
        let mut first = Record::default();
        first.insert_field(tag("001"), "42");
        first.insert_field(tag("650"), " 0\x1FaA");
        first.insert_field(tag("LOK"), "  \x1F0852");

        let mut second = Record::default();
        second.insert_field(tag("001"), "42");
        second.insert_field(tag("650"), " 0\x1FaB");
        second.insert_field(tag("700"), "1 \x1FaC");

        first.merge(second);
        assert_eq!(tags(&first), vec!["001", "650", "650", "700", "LOK"]);
        assert_eq!(first[2].contents(), " 0\x1FaB");
        assert_eq!(first.record_size(), encoded_len(&first));
    }
}
