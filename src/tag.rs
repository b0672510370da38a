//! MARC field tags.
//!
//! A [`Tag`] is exactly three ASCII characters. Tags order lexicographically by
//! byte value, which is the sort key of a record's field list.

use crate::error::{MarcError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Three-character MARC field identifier (e.g. `"245"`, `"LOK"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Tag(pub(crate) [u8; 3]);

impl Tag {
    /// Create a tag from a three-character string.
    ///
    /// # Errors
    ///
    /// Returns [`MarcError::InvalidTag`] unless `tag` is exactly three ASCII bytes.
    ///
    /// # Examples
    ///
    /// ```
    /// use marc_engine::Tag;
    ///
    /// let tag = Tag::new("245").unwrap();
    /// assert_eq!(tag.as_str(), "245");
    /// assert!(Tag::new("24").is_err());
    /// ```
    pub fn new(tag: &str) -> Result<Self> {
        Self::from_bytes(tag.as_bytes())
    }

    /// Create a tag from three raw bytes, as found in a directory entry.
    ///
    /// # Errors
    ///
    /// Returns [`MarcError::InvalidTag`] unless `bytes` holds exactly three ASCII bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        match bytes {
            [a, b, c] if bytes.is_ascii() => Ok(Tag([*a, *b, *c])),
            _ => Err(MarcError::InvalidTag(
                String::from_utf8_lossy(bytes).into_owned(),
            )),
        }
    }

    /// Tag from a byte literal that is known to be ASCII.
    pub(crate) const fn from_ascii(bytes: [u8; 3]) -> Self {
        Tag(bytes)
    }

    /// The tag as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        // Construction guarantees three ASCII bytes.
        std::str::from_utf8(&self.0).unwrap_or("???")
    }

    /// The tag's raw bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 3] {
        &self.0
    }

    /// Whether this is a local (non-standard) tag.
    ///
    /// A tag is local if any of its characters is a non-digit or the digit `9`,
    /// so `"LOK"`, `"ZWI"`, `"935"` and `"590"` are local while `"245"` is not.
    #[must_use]
    pub fn is_local(&self) -> bool {
        self.0.iter().any(|&b| !b.is_ascii_digit() || b == b'9')
    }

    /// Whether fields with this tag are control fields (tags `00X`).
    #[must_use]
    pub fn is_control_tag(&self) -> bool {
        self.0[0] == b'0' && self.0[1] == b'0'
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for Tag {
    type Error = MarcError;

    fn try_from(value: &str) -> Result<Self> {
        Tag::new(value)
    }
}

impl TryFrom<String> for Tag {
    type Error = MarcError;

    fn try_from(value: String) -> Result<Self> {
        Tag::new(&value)
    }
}

impl From<Tag> for String {
    fn from(tag: Tag) -> Self {
        tag.as_str().to_string()
    }
}

impl PartialEq<str> for Tag {
    fn eq(&self, other: &str) -> bool {
        self.0.as_slice() == other.as_bytes()
    }
}

impl PartialEq<&str> for Tag {
    fn eq(&self, other: &&str) -> bool {
        self.0.as_slice() == other.as_bytes()
    }
}
