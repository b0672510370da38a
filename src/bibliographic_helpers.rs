//! Derived bibliographic accessors for MARC records.
//!
//! These read commonly needed values (titles, identifiers, languages, the
//! publication year) out of the standard fields and the leader.

use crate::record::Record;
use crate::tag::Tag;
use chrono::Datelike;

/// 008/06 date types whose Date 2 is the end of a range of years.
const RANGE_DATE_TYPES: &[u8] = b"cdikmqu";

/// Date value in 008 meaning "still ongoing".
const OPEN_DATE: &str = "9999";

fn tag(literal: &[u8; 3]) -> Tag {
    Tag::from_ascii(*literal)
}

/// First run of four ASCII digits in `text`.
fn first_four_digit_run(text: &str) -> Option<&str> {
    text.as_bytes()
        .windows(4)
        .position(|window| window.iter().all(u8::is_ascii_digit))
        .map(|start| &text[start..start + 4])
}

fn is_four_digits(text: &str) -> bool {
    text.len() == 4 && text.bytes().all(|b| b.is_ascii_digit())
}

/// The current calendar year in local time.
#[must_use]
pub fn current_year() -> u32 {
    u32::try_from(chrono::Local::now().year()).unwrap_or(0)
}

impl Record {
    /// Values of subfield `code` across all fields tagged with one of `tags`.
    fn subfield_values(&self, tags: &[&[u8; 3]], code: char) -> Vec<String> {
        tags.iter()
            .flat_map(|t| self.fields_with_tag(&tag(t)))
            .flat_map(|field| {
                field
                    .subfields()
                    .iter()
                    .filter(|sf| sf.code == code && !sf.value.is_empty())
                    .map(|sf| sf.value.clone())
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    fn first_subfield(&self, t: &[u8; 3], code: char) -> Option<String> {
        self.first_field(&tag(t))
            .and_then(|field| field.first_subfield_with_code(code))
    }

    /// Title proper (245 $a).
    #[must_use]
    pub fn main_title(&self) -> Option<String> {
        self.first_subfield(b"245", 'a')
    }

    /// Title proper plus remainder of title (245 $a and $b).
    ///
    /// Trailing ISBD punctuation on $a is replaced with a single `" : "`.
    #[must_use]
    pub fn complete_title(&self) -> Option<String> {
        let title = self.main_title()?;
        match self.first_subfield(b"245", 'b') {
            Some(remainder) => {
                let title = title.trim_end_matches([' ', ':', '/', ';']);
                let remainder = remainder.trim_end_matches([' ', '/']);
                Some(format!("{title} : {remainder}"))
            },
            None => Some(title.trim_end_matches([' ', '/']).to_string()),
        }
    }

    /// Personal and corporate names (100, 110, 700, 710 $a).
    #[must_use]
    pub fn authors(&self) -> Vec<String> {
        self.subfield_values(&[b"100", b"110", b"700", b"710"], 'a')
    }

    /// ISBNs (020 $a).
    #[must_use]
    pub fn isbns(&self) -> Vec<String> {
        self.subfield_values(&[b"020"], 'a')
    }

    /// ISSNs (022 $a).
    #[must_use]
    pub fn issns(&self) -> Vec<String> {
        self.subfield_values(&[b"022"], 'a')
    }

    /// DOIs (024 with first indicator `7` and $2 `doi`).
    #[must_use]
    pub fn dois(&self) -> Vec<String> {
        self.fields_with_tag(&tag(b"024"))
            .iter()
            .filter(|field| field.indicator1() == '7')
            .map(crate::field::Field::subfields)
            .filter(|subfields| subfields.has_subfield_with_value('2', "doi"))
            .filter_map(|subfields| subfields.first_subfield_with_code('a').map(ToString::to_string))
            .collect()
    }

    /// Language codes from 041 $a, or from 008 positions 35-37 if there is no 041.
    #[must_use]
    pub fn languages(&self) -> Vec<String> {
        let languages = self.subfield_values(&[b"041"], 'a');
        if !languages.is_empty() {
            return languages;
        }
        self.first_field(&tag(b"008"))
            .and_then(|field| field.contents().get(35..38))
            .filter(|code| code.chars().all(|c| c.is_ascii_alphabetic()))
            .map(|code| vec![code.to_string()])
            .unwrap_or_default()
    }

    /// Control numbers of parent records (773, 800, 810, 830 $w).
    ///
    /// A leading `(ISIL)` prefix is stripped.
    #[must_use]
    pub fn parent_control_numbers(&self) -> Vec<String> {
        self.subfield_values(&[b"773", b"800", b"810", b"830"], 'w')
            .into_iter()
            .map(|value| match value.strip_prefix('(').and_then(|v| v.split_once(')')) {
                Some((_, number)) => number.to_string(),
                None => value,
            })
            .collect()
    }

    /// Whether the leader marks a serial (bibliographic level `s`).
    #[must_use]
    pub fn is_serial(&self) -> bool {
        self.leader.bibliographic_level == 's'
    }

    /// Whether the leader marks a monograph (bibliographic level `m`).
    #[must_use]
    pub fn is_monograph(&self) -> bool {
        self.leader.bibliographic_level == 'm'
    }

    /// Whether the leader marks a component part (bibliographic level `a` or `b`).
    #[must_use]
    pub fn is_article(&self) -> bool {
        matches!(self.leader.bibliographic_level, 'a' | 'b')
    }

    /// Whether this is an article that reviews another work.
    ///
    /// Reviews carry a 655 genre term starting with "Rezension" or a 935 $c of "uwre".
    #[must_use]
    pub fn is_review_article(&self) -> bool {
        if !self.is_article() {
            return false;
        }
        self.subfield_values(&[b"655"], 'a')
            .iter()
            .any(|genre| genre.starts_with("Rezension"))
            || self
                .subfield_values(&[b"935"], 'c')
                .iter()
                .any(|code| code == "uwre")
    }

    /// Whether the record describes a reproduction (has a 534 original version note).
    #[must_use]
    pub fn is_reproduction(&self) -> bool {
        self.has_tag(&tag(b"534"))
    }

    /// The most recent year of publication, or `fallback` if none is found.
    ///
    /// See [`Record::most_recent_publication_year_as_of`].
    #[must_use]
    pub fn most_recent_publication_year(&self, fallback: &str) -> String {
        self.most_recent_publication_year_as_of(fallback, current_year())
    }

    /// The most recent year of publication relative to `current_year`.
    ///
    /// Sources are tried in this order, the first hit wins:
    ///
    /// 1. `ZWI $y`
    /// 2. serials: 363 $i of the last end-date field (indicators `10`), else of the
    ///    last start-date field (indicators `01`) or `current_year`, whichever is later
    /// 3. reproductions: the first four-digit run of 534 $c
    /// 4. articles and reviews that are not monographs: the first four-digit run of 936 $j
    /// 5. `190 $j`
    /// 6. 008: Date 2 (positions 11-14) when the date type (position 6) describes a
    ///    range, Date 1 (positions 7-10) otherwise or when Date 2 is not a year;
    ///    `9999` means `current_year`
    ///
    /// # Examples
    ///
    /// ```
    /// use marc_engine::{Record, Tag};
    ///
    /// let mut record = Record::default();
    /// record.insert_field(Tag::new("001").unwrap(), "1");
    /// record.insert_field(Tag::new("008").unwrap(), "850101d19701984gw            000 0 ger d");
    /// assert_eq!(record.most_recent_publication_year_as_of("", 2024), "1984");
    /// ```
    #[must_use]
    pub fn most_recent_publication_year_as_of(&self, fallback: &str, current_year: u32) -> String {
        if let Some(year) = self.first_subfield(b"ZWI", 'y') {
            return year;
        }

        if self.is_serial() {
            if let Some(year) = self.serial_publication_year(current_year) {
                return year;
            }
        }

        if self.is_reproduction() {
            let years = self.subfield_values(&[b"534"], 'c');
            if let Some(year) = years.iter().find_map(|c| first_four_digit_run(c)) {
                return year.to_string();
            }
        }

        if (self.is_article() || self.is_review_article()) && !self.is_monograph() {
            let years = self.subfield_values(&[b"936"], 'j');
            if let Some(year) = years.iter().find_map(|j| first_four_digit_run(j)) {
                return year.to_string();
            }
        }

        if let Some(year) = self.first_subfield(b"190", 'j') {
            return year;
        }

        if let Some(contents) = self.first_field(&tag(b"008")).map(crate::field::Field::contents) {
            let date1 = contents.get(7..11).filter(|date| is_four_digits(date));
            let date2 = contents.get(11..15).filter(|date| is_four_digits(date));
            let date_type = contents.as_bytes().get(6).copied().unwrap_or(b' ');
            let year = if RANGE_DATE_TYPES.contains(&date_type) {
                date2.or(date1)
            } else {
                date1
            };
            if let Some(year) = year {
                if year == OPEN_DATE {
                    return current_year.to_string();
                }
                return year.to_string();
            }
        }

        fallback.to_string()
    }

    fn serial_publication_year(&self, current_year: u32) -> Option<String> {
        let mut start_year = None;
        let mut end_year = None;
        for field in self.fields_with_tag(&tag(b"363")) {
            let slot = match (field.indicator1(), field.indicator2()) {
                ('0', '1') => &mut start_year,
                ('1', '0') => &mut end_year,
                _ => continue,
            };
            if let Some(year) = field.first_subfield_with_code('i') {
                *slot = Some(year);
            }
        }

        if end_year.is_some() {
            return end_year;
        }
        let start_year = start_year?;
        match start_year.trim().parse::<u32>() {
            Ok(year) if year < current_year => Some(current_year.to_string()),
            _ => Some(start_year),
        }
    }
}
