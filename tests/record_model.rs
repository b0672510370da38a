//! Record editing, range queries, local blocks and derived values.

mod common;

use common::{create_realistic_record, create_record_with_local_blocks, data_field, tag};
use marc_engine::local_blocks::INDICATOR_WILDCARD;
use marc_engine::writer::{encode_record, MAX_RECORD_LENGTH};
use marc_engine::{calc_checksum, Field, Leader, Record, Subfields, Tag};
use proptest::prelude::*;

#[test]
fn test_repeatability_enforcement() {
    let mut record = create_realistic_record();
    let before = record.len();

    assert!(!record.insert_field(tag("001"), "another"));
    assert_eq!(record.len(), before);
    assert_eq!(record.control_number(), Some("ocm00012345"));

    assert!(record.insert_field(tag("650"), " 0\x1FaJazz Age"));
    assert_eq!(record.len(), before + 1);
    assert_eq!(record.fields_with_tag(&tag("650")).len(), 3);
}

#[test]
#[should_panic(expected = "non-repeatable")]
fn test_append_of_second_control_number_panics() {
    let mut record = Record::default();
    record.append_field(tag("001"), "1");
    record.append_field(tag("001"), "2");
}

#[test]
fn test_tag_range_contiguity() {
    let record = create_realistic_record();
    for t in ["001", "245", "650", "700"] {
        let range = record.get_tag_range(&tag(t));
        assert!(!range.is_empty());
        assert!(record.fields()[range].iter().all(|f| *f.tag() == t));
    }
    assert!(record.get_tag_range(&tag("651")).is_empty());
    assert!(record.get_tag_range(&tag("999")).is_empty());

    let subjects = record.get_tag_range_any(&[tag("650"), tag("651")]);
    assert_eq!(subjects, record.get_tag_range(&tag("650")));
}

#[test]
fn test_local_block_segmentation() {
    let record = create_record_with_local_blocks();
    let starts = record.find_start_of_all_local_data_blocks();
    assert_eq!(starts.len(), 2);
    assert_eq!(record[starts[0]].local_tag(), Some(tag("001")));
    assert_eq!(record[starts[1]].local_tag(), Some(tag("001")));
    assert_eq!(record.local_block_range(starts[0]).len(), 2);
    assert_eq!(record.local_block_range(starts[1]).len(), 3);

    let holdings = record.find_fields_in_local_block(&tag("866"), starts[1], ' ', INDICATOR_WILDCARD);
    assert_eq!(holdings.len(), 1);
    assert_eq!(record[holdings.start].first_subfield_with_code('a').as_deref(), Some("1.1984-"));
    assert!(record
        .find_fields_in_local_block(&tag("866"), starts[0], INDICATOR_WILDCARD, INDICATOR_WILDCARD)
        .is_empty());
}

#[test]
fn test_delete_one_local_block() {
    let mut record = create_record_with_local_blocks();
    let size_before = record.record_size();
    let starts = record.find_start_of_all_local_data_blocks();

    assert_eq!(record.delete_local_blocks(vec![starts[0]]), 2);
    let remaining = record.find_start_of_all_local_data_blocks();
    assert_eq!(remaining.len(), 1);
    let block = record.local_block_range(remaining[0]);
    assert_eq!(block.len(), 3);
    assert!(record.record_size() < size_before);
    assert_eq!(encode_record(&record, MAX_RECORD_LENGTH).unwrap().len(), record.record_size());
}

#[test]
fn test_publication_year_cascade() {
    let mut record = Record::default();
    record.insert_field(tag("001"), "1");
    record.insert_field(tag("008"), "840101s1984    gw            000 0 ger d");
    // Date 2 (positions 11-14) is blank here, Date 1 applies.
    assert_eq!(record.most_recent_publication_year_as_of("????", 2024), "1984");

    let mut serial = Record::default();
    serial.leader.bibliographic_level = 's';
    serial.insert_field(tag("001"), "2");
    serial.insert_field(tag("008"), "840101c19849999gw            000 0 ger d");
    serial.insert_data_field(tag("363"), &Subfields::from_pairs('0', '1', [('i', "1990")]));
    assert_eq!(serial.most_recent_publication_year_as_of("????", 1980), "1990");
    assert_eq!(serial.most_recent_publication_year_as_of("????", 2024), "2024");

    serial.insert_data_field(tag("363"), &Subfields::from_pairs('1', '0', [('i', "2001")]));
    assert_eq!(serial.most_recent_publication_year_as_of("????", 2024), "2001");

    assert_eq!(Record::default().most_recent_publication_year_as_of("????", 2024), "????");
}

#[test]
fn test_checksum_stability() {
    let record = create_realistic_record();
    let mut fields = record.clone().into_fields();
    fields.reverse();
    // 650s are reversed too, so the field order differs.
    let reordered = Record::from_fields(record.leader.clone(), fields);
    assert_ne!(reordered.fields(), record.fields());
    assert_eq!(calc_checksum(&record, &[], false), calc_checksum(&reordered, &[], false));

    let mut changed = record.clone();
    let index = changed.find_tag(&tag("700")).unwrap();
    let mut subfields = changed[index].subfields();
    subfields.replace_first_subfield('a', "Perkins, Max");
    changed.set_field_contents(index, subfields.to_contents());
    assert_ne!(calc_checksum(&record, &[], false), calc_checksum(&changed, &[], false));
}

#[test]
fn test_validation_messages() {
    let record = create_realistic_record();
    assert!(record.is_valid().is_ok());

    let mut broken = record.clone();
    broken.insert_field(tag("500"), "  no delimiter");
    let message = broken.is_valid().unwrap_err();
    assert!(message.contains("500"), "{message}");

    let no_control_number = Record::from_fields(
        Leader::default(),
        vec![data_field("245", '0', '0', &[('a', "Untitled")])],
    );
    assert!(no_control_number.is_valid().is_err());
}

#[test]
fn test_bibliographic_accessors() {
    let record = create_realistic_record();
    assert_eq!(record.complete_title().as_deref(), Some("The great Gatsby"));
    assert_eq!(record.isbns(), ["9780743273565"]);
    assert_eq!(record.authors(), ["Fitzgerald, F. Scott,", "Perkins, Maxwell E."]);
    assert_eq!(record.languages(), ["eng"]);
    assert!(record.is_monograph());
    assert!(!record.is_serial());
}

fn tag_strategy() -> impl Strategy<Value = Tag> {
    prop::sample::select(vec!["001", "005", "008", "020", "245", "500", "650", "700", "LOK"])
        .prop_map(|t| Tag::new(t).unwrap())
}

fn field_strategy() -> impl Strategy<Value = (Tag, String)> {
    (tag_strategy(), "[a-z ]{1,12}").prop_map(|(tag, text)| {
        let contents = if tag.is_control_tag() {
            text
        } else {
            format!("  \x1Fa{text}")
        };
        (tag, contents)
    })
}

proptest! {
    #[test]
    fn prop_fields_stay_sorted(inserts in prop::collection::vec(field_strategy(), 0..40),
                               deletions in prop::collection::vec(0usize..40, 0..5)) {
        let mut record = Record::default();
        for (tag, contents) in &inserts {
            record.insert_field(*tag, contents.clone());
        }
        for index in deletions {
            if index < record.len() {
                record.delete_field(index);
            }
        }
        record.add_subfield_create_field_unique(Tag::new("035").unwrap(), 'a', "(x)1");

        let tags: Vec<&Tag> = record.fields().iter().map(Field::tag).collect();
        prop_assert!(tags.windows(2).all(|w| w[0] <= w[1]));

        let expected_size = 26 + record
            .fields()
            .iter()
            .map(|f| 12 + f.contents().len() + 1)
            .sum::<usize>();
        prop_assert_eq!(record.record_size(), expected_size);
        prop_assert_eq!(encode_record(&record, MAX_RECORD_LENGTH).unwrap().len(), expected_size);
    }
}
