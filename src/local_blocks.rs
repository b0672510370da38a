//! Local data blocks.
//!
//! Holdings data is embedded in a bibliographic record as runs of `LOK`
//! fields, each carrying a pseudo-tag in its `$0`. Within one block the
//! pseudo-tags ascend; a pseudo-tag lower than its predecessor starts the
//! next block:
//!
//! ```text
//! LOK  $0001 ...   <- block 1
//! LOK  $0852 ...
//! LOK  $0001 ...   <- block 2 (001 < 852)
//! LOK  $0852 ...
//! LOK  $0866 ...
//! ```

use crate::record::Record;
use crate::tag::Tag;
use std::ops::Range;

/// Indicator value that matches any local indicator.
pub const INDICATOR_WILDCARD: char = '?';

fn indicator_matches(wanted: char, actual: Option<char>) -> bool {
    wanted == INDICATOR_WILDCARD || actual == Some(wanted)
}

impl Record {
    /// Range of all `LOK` fields.
    #[must_use]
    pub fn local_fields_range(&self) -> Range<usize> {
        self.get_tag_range(&Tag::from_ascii(*b"LOK"))
    }

    /// Indices of the first field of each local data block.
    ///
    /// One pass over the `LOK` fields. The first `LOK` field always starts a
    /// block; after that a block starts wherever the pseudo-tag drops below
    /// the previous one. A `LOK` field without a readable pseudo-tag compares
    /// lower than any pseudo-tag, so it starts a block unless it is the first.
    ///
    /// # Examples
    ///
    /// ```
    /// use marc_engine::{Field, Record, Tag};
    ///
    /// let mut record = Record::default();
    /// record.insert_field(Tag::new("001").unwrap(), "1");
    /// for pseudo in ["001", "852", "001", "852", "866"] {
    ///     let field = Field::local(Tag::new(pseudo).unwrap(), ' ', ' ', &[('a', "x")]);
    ///     record.insert_field(*field.tag(), field.contents());
    /// }
    /// assert_eq!(record.find_start_of_all_local_data_blocks(), vec![1, 3]);
    /// ```
    #[must_use]
    pub fn find_start_of_all_local_data_blocks(&self) -> Vec<usize> {
        let mut starts = Vec::new();
        let mut previous: Option<Tag> = None;
        for index in self.local_fields_range() {
            let pseudo_tag = self[index].local_tag();
            if starts.is_empty() || pseudo_tag < previous {
                starts.push(index);
            }
            previous = pseudo_tag;
        }
        starts
    }

    /// Range of the whole local block starting at `block_start`.
    ///
    /// Returns an empty range if `block_start` is not a `LOK` field.
    #[must_use]
    pub fn local_block_range(&self, block_start: usize) -> Range<usize> {
        let mut previous: Option<Tag> = None;
        let mut end = block_start;
        while end < self.len() && self[end].is_local_block_field() {
            let pseudo_tag = self[end].local_tag();
            if end > block_start && pseudo_tag < previous {
                break;
            }
            previous = pseudo_tag;
            end += 1;
        }
        block_start..end
    }

    /// Fields of the block starting at `block_start` whose pseudo-tag is
    /// `local_tag` and whose local indicators match.
    ///
    /// `indicator1`/`indicator2` may be [`INDICATOR_WILDCARD`]. The search
    /// never leaves the block: it stops at the first pseudo-tag lower than its
    /// predecessor. The result is the first contiguous run of matches, which
    /// is all of them in a block sorted by pseudo-tag. Returns an empty range
    /// if nothing matches.
    #[must_use]
    pub fn find_fields_in_local_block(
        &self,
        local_tag: &Tag,
        block_start: usize,
        indicator1: char,
        indicator2: char,
    ) -> Range<usize> {
        let block = self.local_block_range(block_start);
        let mut matches: Option<Range<usize>> = None;
        for index in block {
            let field = &self[index];
            let is_match = field.local_tag().as_ref() == Some(local_tag)
                && indicator_matches(indicator1, field.local_indicator1())
                && indicator_matches(indicator2, field.local_indicator2());
            if is_match {
                let start = matches.as_ref().map_or(index, |range| range.start);
                matches = Some(start..index + 1);
            } else if matches.is_some() {
                break;
            }
        }
        matches.unwrap_or(self.len()..self.len())
    }

    /// Delete the local blocks starting at the given indices.
    ///
    /// Each start is expanded to its whole block; the resulting ranges are
    /// coalesced and erased back to front. Returns the number of removed fields.
    pub fn delete_local_blocks(&mut self, block_starts: Vec<usize>) -> usize {
        let ranges: Vec<Range<usize>> = block_starts
            .into_iter()
            .map(|start| self.local_block_range(start))
            .collect();
        self.delete_ranges(ranges)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::Field;

    fn tag(s: &str) -> Tag {
        Tag::new(s).unwrap()
    }

    fn push_local(record: &mut Record, pseudo: &str, ind1: char, ind2: char, value: &str) {
        let field = Field::local(tag(pseudo), ind1, ind2, &[('a', value)]);
        assert!(record.insert_field(*field.tag(), field.contents()));
    }

    fn two_block_record() -> Record {
        let mut record = Record::default();
        record.insert_field(tag("001"), "123");
        record.insert_field(tag("245"), "10\x1FaTitle");
        push_local(&mut record, "001", ' ', ' ', "b1");
        push_local(&mut record, "852", ' ', ' ', "DE-21");
        push_local(&mut record, "001", ' ', ' ', "b2");
        push_local(&mut record, "852", '1', ' ', "DE-Tue120");
        push_local(&mut record, "866", '3', '0', "1990-");
        record
    }

    #[test]
    fn test_two_blocks_are_found() {
        let record = two_block_record();
        assert_eq!(record.find_start_of_all_local_data_blocks(), vec![2, 4]);
    }

    #[test]
    fn test_no_local_blocks() {
        let mut record = Record::default();
        record.insert_field(tag("001"), "1");
        assert!(record.find_start_of_all_local_data_blocks().is_empty());
    }

    #[test]
    fn test_equal_pseudo_tags_stay_in_block() {
        let mut record = Record::default();
        record.insert_field(tag("001"), "1");
        push_local(&mut record, "001", ' ', ' ', "x");
        push_local(&mut record, "852", ' ', ' ', "a");
        push_local(&mut record, "852", ' ', ' ', "b");
        assert_eq!(record.find_start_of_all_local_data_blocks(), vec![1]);
        assert_eq!(record.local_block_range(1), 1..4);
    }

    #[test]
    fn test_field_without_pseudo_tag_starts_a_block() {
        let mut record = Record::default();
        record.insert_field(tag("001"), "1");
        push_local(&mut record, "001", ' ', ' ', "x");
        push_local(&mut record, "852", ' ', ' ', "a");
        // No $0 at all.
        record.insert_field(tag("LOK"), "  \x1Faloose");
        push_local(&mut record, "866", ' ', ' ', "b");

        assert_eq!(record.find_start_of_all_local_data_blocks(), vec![1, 3]);
        assert_eq!(record.local_block_range(1), 1..3);
        assert_eq!(record.local_block_range(3), 3..5);
    }

    #[test]
    fn test_find_fields_in_local_block() {
        let record = two_block_record();
        let starts = record.find_start_of_all_local_data_blocks();

        assert_eq!(record.find_fields_in_local_block(&tag("852"), starts[0], '?', '?'), 3..4);
        assert_eq!(record.find_fields_in_local_block(&tag("852"), starts[1], '1', '?'), 5..6);
        assert!(record
            .find_fields_in_local_block(&tag("852"), starts[1], ' ', '?')
            .is_empty());
        // Block 1 has no 866 and the search stops at block 2.
        assert!(record
            .find_fields_in_local_block(&tag("866"), starts[0], '?', '?')
            .is_empty());
        assert_eq!(record.find_fields_in_local_block(&tag("866"), starts[1], '3', '0'), 6..7);
    }

    #[test]
    fn test_delete_local_blocks() {
        let mut record = two_block_record();
        let starts = record.find_start_of_all_local_data_blocks();
        assert_eq!(record.delete_local_blocks(vec![starts[1]]), 3);
        assert_eq!(record.find_start_of_all_local_data_blocks(), vec![2]);
        assert_eq!(record.len(), 4);

        let mut record = two_block_record();
        let starts = record.find_start_of_all_local_data_blocks();
        // Order and duplicates do not matter.
        assert_eq!(record.delete_local_blocks(vec![starts[1], starts[0], starts[1]]), 5);
        assert_eq!(record.len(), 2);
        assert!(record.find_start_of_all_local_data_blocks().is_empty());
    }
}
