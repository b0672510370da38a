//! Subfield lists and the MARC subfield wire syntax.
//!
//! A data field's raw contents are two indicator characters followed by zero or
//! more groups of `0x1F`, a one-character subfield code and the value bytes:
//!
//! ```text
//! 1 0 \x1F a The title \x1F c Author
//! ```
//!
//! [`Subfields::parse`] keeps the wire order. Subfields added with
//! [`Subfields::add_subfield`] are inserted in ascending code order instead.

use crate::error::{MarcError, Result};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// Subfield delimiter byte.
pub const SUBFIELD_DELIMITER: char = '\x1F';

/// A subfield within a field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subfield {
    /// Subfield code (single character)
    pub code: char,
    /// Subfield value
    pub value: String,
}

impl Subfield {
    /// Create a subfield.
    pub fn new(code: char, value: impl Into<String>) -> Self {
        Subfield {
            code,
            value: value.into(),
        }
    }
}

/// One element of a subfield selection such as `"abc9v"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubfieldSelector {
    /// Every value of the subfield with this code.
    Literal(char),
    /// Values of the digit subfield `code` that start with `"<selector>:"`,
    /// returned without that prefix.
    Numeric {
        /// The digit subfield code
        code: char,
        /// The type character in front of the colon
        selector: char,
    },
}

impl SubfieldSelector {
    /// Parse a selection string.
    ///
    /// Letters stand for themselves. A digit always starts a two-character
    /// numeric token: `"a9vx"` selects `$a`, `$9` values starting with `v:`,
    /// and `$x`.
    ///
    /// # Errors
    ///
    /// Returns [`MarcError::InvalidSubfieldSpec`] if a digit has no type character after it.
    ///
    /// # Examples
    ///
    /// ```
    /// use marc_engine::SubfieldSelector;
    ///
    /// let selectors = SubfieldSelector::parse_spec("a9v").unwrap();
    /// assert_eq!(selectors, vec![
    ///     SubfieldSelector::Literal('a'),
    ///     SubfieldSelector::Numeric { code: '9', selector: 'v' },
    /// ]);
    /// ```
    pub fn parse_spec(spec: &str) -> Result<Vec<SubfieldSelector>> {
        let mut selectors = Vec::new();
        let mut chars = spec.chars();
        while let Some(c) = chars.next() {
            if c.is_ascii_digit() {
                let selector = chars
                    .next()
                    .ok_or_else(|| MarcError::InvalidSubfieldSpec(spec.to_string()))?;
                selectors.push(SubfieldSelector::Numeric { code: c, selector });
            } else {
                selectors.push(SubfieldSelector::Literal(c));
            }
        }
        Ok(selectors)
    }

    /// If `subfield` is selected, the part of its value to return.
    fn select<'a>(&self, subfield: &'a Subfield) -> Option<&'a str> {
        match *self {
            SubfieldSelector::Literal(code) => {
                (subfield.code == code).then_some(subfield.value.as_str())
            },
            SubfieldSelector::Numeric { code, selector } => {
                if subfield.code != code {
                    return None;
                }
                let mut chars = subfield.value.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), Some(':')) if c == selector => Some(chars.as_str()),
                    _ => None,
                }
            },
        }
    }
}

/// Indicators plus an ordered list of subfields of one data field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subfields {
    /// First indicator
    pub indicator1: char,
    /// Second indicator
    pub indicator2: char,
    subfields: SmallVec<[Subfield; 4]>,
}

impl Default for Subfields {
    fn default() -> Self {
        Subfields::new(' ', ' ')
    }
}

impl Subfields {
    /// Create an empty list with the given indicators.
    #[must_use]
    pub fn new(indicator1: char, indicator2: char) -> Self {
        Subfields {
            indicator1,
            indicator2,
            subfields: SmallVec::new(),
        }
    }

    /// Create a list from (code, value) pairs, sorted by code.
    ///
    /// The sort is stable: pairs with equal codes keep their relative order.
    #[must_use]
    pub fn from_pairs<I, S>(indicator1: char, indicator2: char, pairs: I) -> Self
    where
        I: IntoIterator<Item = (char, S)>,
        S: Into<String>,
    {
        let mut subfields: SmallVec<[Subfield; 4]> = pairs
            .into_iter()
            .map(|(code, value)| Subfield::new(code, value))
            .collect();
        subfields.sort_by_key(|sf| sf.code);
        Subfields {
            indicator1,
            indicator2,
            subfields,
        }
    }

    /// Parse a data field's raw contents, keeping wire order.
    ///
    /// Contents shorter than five bytes (two indicators, a delimiter, a code
    /// and at least one value byte) yield an empty list. Bytes between the
    /// indicators and the first delimiter are skipped; [`crate::Record::validate`]
    /// reports them.
    #[must_use]
    pub fn parse(contents: &str) -> Self {
        let mut chars = contents.chars();
        let indicator1 = chars.next().unwrap_or(' ');
        let indicator2 = chars.next().unwrap_or(' ');
        let mut parsed = Subfields::new(indicator1, indicator2);
        if contents.len() < 5 {
            return parsed;
        }

        let body = chars.as_str();
        let bytes = body.as_bytes();
        let delimiters: Vec<usize> = memchr::memchr_iter(SUBFIELD_DELIMITER as u8, bytes).collect();
        for (i, &start) in delimiters.iter().enumerate() {
            let end = delimiters.get(i + 1).copied().unwrap_or(bytes.len());
            // Delimiters are ASCII, so these offsets are char boundaries.
            let group = &body[start + 1..end];
            let mut group_chars = group.chars();
            if let Some(code) = group_chars.next() {
                parsed
                    .subfields
                    .push(Subfield::new(code, group_chars.as_str()));
            }
        }
        parsed
    }

    /// Number of subfields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.subfields.len()
    }

    /// Whether there are no subfields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.subfields.is_empty()
    }

    /// Iterate over subfields in storage order.
    pub fn iter(&self) -> impl Iterator<Item = &Subfield> {
        self.subfields.iter()
    }

    /// Insert a subfield in ascending code order.
    ///
    /// A new subfield goes after existing subfields with the same code and
    /// before the first subfield with a greater code.
    pub fn add_subfield(&mut self, code: char, value: impl Into<String>) {
        let position = self.subfields.partition_point(|sf| sf.code <= code);
        self.subfields.insert(position, Subfield::new(code, value));
    }

    /// Append a subfield at the end, regardless of code order.
    pub fn append_subfield(&mut self, code: char, value: impl Into<String>) {
        self.subfields.push(Subfield::new(code, value));
    }

    /// Whether a subfield with `code` exists.
    #[must_use]
    pub fn has_subfield(&self, code: char) -> bool {
        self.subfields.iter().any(|sf| sf.code == code)
    }

    /// Whether a subfield with `code` and exactly `value` exists.
    #[must_use]
    pub fn has_subfield_with_value(&self, code: char, value: &str) -> bool {
        self.subfields
            .iter()
            .any(|sf| sf.code == code && sf.value == value)
    }

    /// First value of the subfield with `code`.
    #[must_use]
    pub fn first_subfield_with_code(&self, code: char) -> Option<&str> {
        self.subfields
            .iter()
            .find(|sf| sf.code == code)
            .map(|sf| sf.value.as_str())
    }

    /// All values whose code is one of `codes`, in storage order.
    ///
    /// # Examples
    ///
    /// ```
    /// use marc_engine::Subfields;
    ///
    /// let subfields = Subfields::parse("10\x1Fbsub\x1Famain\x1Fcresp");
    /// assert_eq!(subfields.extract_subfields("ab"), vec!["sub", "main"]);
    /// ```
    #[must_use]
    pub fn extract_subfields(&self, codes: &str) -> Vec<&str> {
        self.subfields
            .iter()
            .filter(|sf| codes.contains(sf.code))
            .map(|sf| sf.value.as_str())
            .collect()
    }

    /// Values selected by a mixed literal/numeric selection string.
    ///
    /// See [`SubfieldSelector::parse_spec`] for the syntax. Values are
    /// returned in storage order; numeric selections lose their `"x:"` prefix.
    ///
    /// # Errors
    ///
    /// Returns an error if `spec` ends in a digit without a type character.
    ///
    /// # Examples
    ///
    /// ```
    /// use marc_engine::Subfields;
    ///
    /// let subfields = Subfields::parse("  \x1FaText\x1F9v:Volume\x1F9g:Other");
    /// assert_eq!(
    ///     subfields.extract_subfields_and_numeric_subfields("a9v").unwrap(),
    ///     vec!["Text", "Volume"]
    /// );
    /// ```
    pub fn extract_subfields_and_numeric_subfields(&self, spec: &str) -> Result<Vec<&str>> {
        let selectors = SubfieldSelector::parse_spec(spec)?;
        Ok(self
            .subfields
            .iter()
            .filter_map(|sf| selectors.iter().find_map(|selector| selector.select(sf)))
            .collect())
    }

    /// Replace the value of the first subfield with `code`.
    ///
    /// Returns `false` if there is no such subfield.
    pub fn replace_first_subfield(&mut self, code: char, new_value: impl Into<String>) -> bool {
        match self.subfields.iter_mut().find(|sf| sf.code == code) {
            Some(subfield) => {
                subfield.value = new_value.into();
                true
            },
            None => false,
        }
    }

    /// Replace every subfield with `code` and value `old_value` by `new_value`.
    ///
    /// Returns the number of replaced values.
    pub fn replace_all_subfields(&mut self, code: char, old_value: &str, new_value: &str) -> usize {
        let mut replaced = 0;
        for subfield in self
            .subfields
            .iter_mut()
            .filter(|sf| sf.code == code && sf.value == old_value)
        {
            subfield.value = new_value.to_string();
            replaced += 1;
        }
        replaced
    }

    /// Remove the first subfield with `code`, returning its value.
    pub fn delete_first_subfield_with_code(&mut self, code: char) -> Option<String> {
        let position = self.subfields.iter().position(|sf| sf.code == code)?;
        Some(self.subfields.remove(position).value)
    }

    /// Remove all subfields with `code`, returning how many were removed.
    pub fn delete_all_subfields_with_code(&mut self, code: char) -> usize {
        let before = self.subfields.len();
        self.subfields.retain(|sf| sf.code != code);
        before - self.subfields.len()
    }

    /// Keep only the subfields for which `keep` returns `true`, in order.
    pub fn retain<F>(&mut self, mut keep: F)
    where
        F: FnMut(&Subfield) -> bool,
    {
        self.subfields.retain(|sf| keep(sf));
    }

    /// Move every value of subfield `from` to subfield `to`.
    ///
    /// The list is re-sorted by code afterwards (stable).
    pub fn move_subfield(&mut self, from: char, to: char) {
        let mut moved = false;
        for subfield in self.subfields.iter_mut().filter(|sf| sf.code == from) {
            subfield.code = to;
            moved = true;
        }
        if moved {
            self.subfields.sort_by_key(|sf| sf.code);
        }
    }

    /// Serialize to raw field contents: indicators, then each delimited group.
    #[must_use]
    pub fn to_contents(&self) -> String {
        let mut contents = String::with_capacity(
            2 + self
                .subfields
                .iter()
                .map(|sf| 2 + sf.value.len())
                .sum::<usize>(),
        );
        contents.push(self.indicator1);
        contents.push(self.indicator2);
        for subfield in &self.subfields {
            contents.push(SUBFIELD_DELIMITER);
            contents.push(subfield.code);
            contents.push_str(&subfield.value);
        }
        contents
    }
}

impl<'a> IntoIterator for &'a Subfields {
    type Item = &'a Subfield;
    type IntoIter = std::slice::Iter<'a, Subfield>;

    fn into_iter(self) -> Self::IntoIter {
        self.subfields.iter()
    }
}
