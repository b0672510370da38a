//! Repeatability of MARC 21 bibliographic fields.
//!
//! The table covers every standard (non-local) tag that may appear in a
//! bibliographic or embedded holdings record. Local tags (see
//! [`Tag::is_local`]) are always repeatable. A standard tag missing from the
//! table is a table-maintenance bug and panics on lookup.

use crate::tag::Tag;
use lazy_static::lazy_static;
use std::collections::HashMap;

/// (tag, repeatable) pairs for MARC 21 bibliographic and holdings fields.
const FIELD_REPEATABILITY: &[(&str, bool)] = &[
    // Control fields
    ("001", false),
    ("003", false),
    ("004", false),
    ("005", false),
    ("006", true),
    ("007", true),
    ("008", false),
    // Numbers and codes
    ("010", false),
    ("013", true),
    ("015", true),
    ("016", true),
    ("017", true),
    ("018", false),
    ("020", true),
    ("022", true),
    ("023", true),
    ("024", true),
    ("025", true),
    ("026", true),
    ("027", true),
    ("028", true),
    ("030", true),
    ("031", true),
    ("032", true),
    ("033", true),
    ("034", true),
    ("035", true),
    ("036", false),
    ("037", true),
    ("038", false),
    ("040", false),
    ("041", true),
    ("042", false),
    ("043", false),
    ("044", false),
    ("045", false),
    ("046", true),
    ("047", true),
    ("048", true),
    ("050", true),
    ("051", true),
    ("052", true),
    ("055", true),
    ("060", true),
    ("061", true),
    ("066", false),
    ("070", true),
    ("071", true),
    ("072", true),
    ("074", true),
    ("080", true),
    ("082", true),
    ("083", true),
    ("084", true),
    ("085", true),
    ("086", true),
    ("088", true),
    // Main entries
    ("100", false),
    ("110", false),
    ("111", false),
    ("130", false),
    // Titles, edition, imprint
    ("210", true),
    ("222", true),
    ("240", false),
    ("242", true),
    ("243", false),
    ("245", false),
    ("246", true),
    ("247", true),
    ("250", true),
    ("251", true),
    ("254", false),
    ("255", true),
    ("256", false),
    ("257", true),
    ("258", true),
    ("260", true),
    ("261", false),
    ("262", false),
    ("263", false),
    ("264", true),
    ("270", true),
    // Physical description
    ("300", true),
    ("306", false),
    ("307", true),
    ("310", false),
    ("321", true),
    ("334", true),
    ("335", true),
    ("336", true),
    ("337", true),
    ("338", true),
    ("340", true),
    ("341", true),
    ("342", true),
    ("343", true),
    ("344", true),
    ("345", true),
    ("346", true),
    ("347", true),
    ("348", true),
    ("351", true),
    ("352", true),
    ("353", true),
    ("355", true),
    ("357", false),
    ("361", true),
    ("362", true),
    ("363", true),
    ("365", true),
    ("366", true),
    ("370", true),
    ("377", true),
    ("380", true),
    ("381", true),
    ("382", true),
    ("383", true),
    ("384", true),
    ("385", true),
    ("386", true),
    ("387", true),
    ("388", true),
    // Series statements
    ("400", true),
    ("410", true),
    ("411", true),
    ("440", true),
    // Notes
    ("500", true),
    ("501", true),
    ("502", true),
    ("504", true),
    ("505", true),
    ("506", true),
    ("507", false),
    ("508", true),
    ("510", true),
    ("511", true),
    ("513", true),
    ("514", true),
    ("515", true),
    ("516", true),
    ("518", true),
    ("520", true),
    ("521", true),
    ("522", true),
    ("524", true),
    ("525", true),
    ("526", true),
    ("530", true),
    ("532", true),
    ("533", true),
    ("534", true),
    ("535", true),
    ("536", true),
    ("538", true),
    ("540", true),
    ("541", true),
    ("542", true),
    ("544", true),
    ("545", true),
    ("546", true),
    ("547", true),
    ("550", true),
    ("552", true),
    ("555", true),
    ("556", true),
    ("561", true),
    ("562", true),
    ("563", true),
    ("565", true),
    ("567", true),
    ("580", true),
    ("581", true),
    ("583", true),
    ("584", true),
    ("585", true),
    ("586", true),
    ("587", true),
    ("588", true),
    // Subject access
    ("600", true),
    ("610", true),
    ("611", true),
    ("630", true),
    ("647", true),
    ("648", true),
    ("650", true),
    ("651", true),
    ("653", true),
    ("654", true),
    ("655", true),
    ("656", true),
    ("657", true),
    ("658", true),
    ("662", true),
    ("688", true),
    // Added entries and linking entries
    ("700", true),
    ("710", true),
    ("711", true),
    ("720", true),
    ("730", true),
    ("740", true),
    ("751", true),
    ("752", true),
    ("753", true),
    ("754", true),
    ("758", true),
    ("760", true),
    ("762", true),
    ("765", true),
    ("767", true),
    ("770", true),
    ("772", true),
    ("773", true),
    ("774", true),
    ("775", true),
    ("776", true),
    ("777", true),
    ("780", true),
    ("785", true),
    ("786", true),
    ("787", true),
    ("788", true),
    // Series added entries, holdings, locations
    ("800", true),
    ("810", true),
    ("811", true),
    ("830", true),
    ("841", false),
    ("842", false),
    ("843", true),
    ("844", false),
    ("845", true),
    ("850", true),
    ("852", true),
    ("853", true),
    ("854", true),
    ("855", true),
    ("856", true),
    ("863", true),
    ("864", true),
    ("865", true),
    ("866", true),
    ("867", true),
    ("868", true),
    ("876", true),
    ("877", true),
    ("878", true),
    ("880", true),
    ("881", true),
    ("882", false),
    ("883", true),
    ("884", true),
    ("885", true),
    ("886", true),
    ("887", true),
];

lazy_static! {
    static ref REPEATABLE_FIELDS: HashMap<Tag, bool> = FIELD_REPEATABILITY
        .iter()
        .filter_map(|(tag, repeatable)| Tag::new(tag).ok().map(|tag| (tag, *repeatable)))
        .collect();
}

/// Whether a field with `tag` may occur more than once in a record.
///
/// # Panics
///
/// Panics if `tag` is a standard tag that is not listed in the repeatability table.
#[must_use]
pub fn is_repeatable(tag: &Tag) -> bool {
    if tag.is_local() {
        return true;
    }
    match REPEATABLE_FIELDS.get(tag) {
        Some(&repeatable) => repeatable,
        None => panic!("tag {tag} is missing from the field repeatability table"),
    }
}

/// Whether `tag` is listed in the repeatability table or is a local tag.
#[must_use]
pub fn is_known(tag: &Tag) -> bool {
    tag.is_local() || REPEATABLE_FIELDS.contains_key(tag)
}
