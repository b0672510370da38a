//! Common test helpers shared across the integration test suite.

#![allow(dead_code)]

use marc_engine::{Field, Leader, Record, Subfields, Tag};

/// Shorthand for a tag that is known to be valid.
pub fn tag(s: &str) -> Tag {
    Tag::new(s).unwrap()
}

/// Leader of a monograph, with the lengths left for the writer to fill in.
pub fn create_test_leader() -> Leader {
    Leader::from_bytes(b"00000nam a2200000 i 4500").unwrap()
}

/// A data field built from `(code, value)` pairs.
pub fn data_field(t: &str, ind1: char, ind2: char, pairs: &[(char, &str)]) -> Field {
    let subfields = Subfields::from_pairs(ind1, ind2, pairs.iter().copied());
    Field::from_subfields(tag(t), &subfields)
}

/// A realistic book record with control fields, a title and subjects.
pub fn create_realistic_record() -> Record {
    Record::from_fields(
        create_test_leader(),
        vec![
            Field::new(tag("001"), "ocm00012345"),
            Field::new(tag("005"), "20240101120000.0"),
            Field::new(tag("008"), "840101s1984    nyu           000 1 eng d"),
            data_field("020", ' ', ' ', &[('a', "9780743273565")]),
            data_field("100", '1', ' ', &[('a', "Fitzgerald, F. Scott,"), ('d', "1896-1940.")]),
            data_field(
                "245",
                '1',
                '4',
                &[('a', "The great Gatsby /"), ('c', "F. Scott Fitzgerald.")],
            ),
            data_field("650", ' ', '0', &[('a', "Rich people"), ('v', "Fiction.")]),
            data_field("650", ' ', '0', &[('a', "Long Island (N.Y.)"), ('v', "Fiction.")]),
            data_field("700", '1', ' ', &[('a', "Perkins, Maxwell E.")]),
        ],
    )
}

/// A record carrying two local holdings blocks.
///
/// Block one has the pseudo-tags 001 and 852, block two 001, 852 and 866.
pub fn create_record_with_local_blocks() -> Record {
    let mut record = create_realistic_record();
    for (pseudo, value) in [
        ("001", "1001"),
        ("852", "DE-21"),
        ("001", "1002"),
        ("852", "DE-21-24"),
        ("866", "1.1984-"),
    ] {
        let field = Field::local(tag(pseudo), ' ', ' ', &[('a', value)]);
        assert!(record.insert_field(*field.tag(), field.contents()));
    }
    record
}
