//! Order-independent record checksums.
//!
//! The checksum covers the leader positions that describe the record's content
//! (5-11 and 17-19, so not the lengths) and every (tag, contents) pair in
//! sorted order. Two records that differ only in the order of their fields
//! hash the same.

use crate::record::Record;
use crate::tag::Tag;
use sha1::{Digest, Sha1};

/// SHA-1 checksum of `record` as 40 lowercase hex digits.
///
/// Fields whose tag is in `excluded_tags` are skipped, as are all local
/// fields (see [`Tag::is_local`]) when `suppress_local_fields` is set.
///
/// # Examples
///
/// ```
/// use marc_engine::{calc_checksum, Record, Tag};
///
/// let mut record = Record::default();
/// record.insert_field(Tag::new("001").unwrap(), "1");
/// record.insert_field(Tag::new("005").unwrap(), "20240101120000.0");
///
/// let without_005 = calc_checksum(&record, &[Tag::new("005").unwrap()], false);
/// record.replace_field(Tag::new("005").unwrap(), "20250101120000.0");
/// assert_eq!(without_005, calc_checksum(&record, &[Tag::new("005").unwrap()], false));
/// ```
#[must_use]
pub fn calc_checksum(record: &Record, excluded_tags: &[Tag], suppress_local_fields: bool) -> String {
    let leader = &record.leader;
    let mut blob = String::new();
    for c in [
        leader.record_status,
        leader.record_type,
        leader.bibliographic_level,
        leader.control_record_type,
        leader.character_coding,
        leader.indicator_count,
        leader.subfield_code_count,
        leader.encoding_level,
        leader.cataloging_form,
        leader.multipart_level,
    ] {
        blob.push(c);
    }

    let mut pairs: Vec<(&Tag, &str)> = record
        .fields()
        .iter()
        .filter(|field| !excluded_tags.contains(field.tag()))
        .filter(|field| !(suppress_local_fields && field.tag().is_local()))
        .map(|field| (field.tag(), field.contents()))
        .collect();
    pairs.sort_unstable();

    for (tag, contents) in pairs {
        blob.push_str(tag.as_str());
        blob.push_str(contents);
    }

    hex::encode(Sha1::digest(blob.as_bytes()))
}

impl Record {
    /// See [`calc_checksum`].
    #[must_use]
    pub fn checksum(&self, excluded_tags: &[Tag], suppress_local_fields: bool) -> String {
        calc_checksum(self, excluded_tags, suppress_local_fields)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::Field;
    use crate::leader::Leader;

    fn tag(s: &str) -> Tag {
        Tag::new(s).unwrap()
    }

    fn fields() -> Vec<Field> {
        vec![
            Field::new(tag("001"), "123"),
            Field::new(tag("245"), "10\x1FaTitle"),
            Field::new(tag("650"), " 0\x1FaCats"),
            Field::new(tag("650"), " 0\x1FaDogs"),
            Field::new(tag("935"), "  \x1Falocal"),
        ]
    }

    #[test]
    fn test_checksum_is_hex_sha1() {
        let record = Record::from_fields(Leader::default(), fields());
        let checksum = calc_checksum(&record, &[], false);
        assert_eq!(checksum.len(), 40);
        assert!(checksum.bytes().all(|b| b.is_ascii_hexdigit()));
    }

    #[test]
    fn test_field_order_does_not_matter() {
        let first = Record::from_fields(Leader::default(), fields());
        let mut reordered = fields();
        reordered.swap(2, 3);
        let second = Record::from_fields(Leader::default(), reordered);
        assert_ne!(first.fields(), second.fields());
        assert_eq!(first.checksum(&[], false), second.checksum(&[], false));
    }

    #[test]
    fn test_subfield_change_changes_checksum() {
        let record = Record::from_fields(Leader::default(), fields());
        let mut changed = record.clone();
        changed.set_field_contents(2, " 0\x1FaBirds");
        assert_ne!(record.checksum(&[], false), changed.checksum(&[], false));
    }

    #[test]
    fn test_record_length_is_ignored() {
        let record = Record::from_fields(Leader::default(), fields());
        let mut other = record.clone();
        other.leader.record_length = 4711;
        other.leader.data_base_address = 99;
        assert_eq!(record.checksum(&[], false), other.checksum(&[], false));

        other.leader.record_status = 'c';
        assert_ne!(record.checksum(&[], false), other.checksum(&[], false));
    }

    #[test]
    fn test_local_fields_can_be_suppressed() {
        let record = Record::from_fields(Leader::default(), fields());
        let mut changed = record.clone();
        changed.set_field_contents(4, "  \x1Faother");
        assert_ne!(record.checksum(&[], false), changed.checksum(&[], false));
        assert_eq!(record.checksum(&[], true), changed.checksum(&[], true));
        assert_eq!(
            record.checksum(&[tag("935")], false),
            changed.checksum(&[tag("935")], false)
        );
    }
}
