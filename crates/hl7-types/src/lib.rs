//! Validated primitive types shared by the HL7 gateway crates.

use std::fmt;
use std::str::FromStr;

/// Errors that can occur when creating validated primitive types.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TypeError {
    /// The input text was empty or contained only whitespace
    #[error("Text cannot be empty")]
    Empty,

    /// The input was not a valid three character segment identifier
    #[error("Invalid segment name: '{0}' (expected 3 uppercase letters or digits)")]
    InvalidSegmentName(String),
}

/// A string type that guarantees non-empty content.
///
/// The input is trimmed of leading and trailing whitespace during construction.
/// Used for configuration identifiers such as rule and lookup table names.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NonEmptyText(String);

impl NonEmptyText {
    /// Creates a new `NonEmptyText` from the given input.
    ///
    /// # Errors
    ///
    /// Returns [`TypeError::Empty`] if the trimmed input is empty.
    pub fn new(input: impl AsRef<str>) -> Result<Self, TypeError> {
        let trimmed = input.as_ref().trim();
        if trimmed.is_empty() {
            return Err(TypeError::Empty);
        }
        Ok(Self(trimmed.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NonEmptyText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for NonEmptyText {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl serde::Serialize for NonEmptyText {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> serde::Deserialize<'de> for NonEmptyText {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        NonEmptyText::new(&s).map_err(serde::de::Error::custom)
    }
}

/// An HL7v2 segment identifier such as `MSH`, `PID` or `OBX`.
///
/// Segment identifiers are exactly three ASCII characters: an uppercase letter followed by two
/// uppercase letters or digits (`ZPI`, `OBX`, `PV1`). Lowercase input is rejected rather than
/// normalised so that name comparisons on the segment tree stay exact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SegmentName([u8; 3]);

impl SegmentName {
    pub const MSH: SegmentName = SegmentName(*b"MSH");
    pub const PID: SegmentName = SegmentName(*b"PID");
    pub const MSA: SegmentName = SegmentName(*b"MSA");

    /// Validates and wraps a segment identifier.
    ///
    /// # Errors
    ///
    /// Returns [`TypeError::InvalidSegmentName`] when `input` is not three characters of the
    /// form `[A-Z][A-Z0-9]{2}`.
    pub fn parse(input: &str) -> Result<Self, TypeError> {
        if Self::is_valid(input) {
            let bytes = input.as_bytes();
            return Ok(Self([bytes[0], bytes[1], bytes[2]]));
        }
        Err(TypeError::InvalidSegmentName(input.to_owned()))
    }

    /// Returns true if `input` is a syntactically valid segment identifier.
    pub fn is_valid(input: &str) -> bool {
        let bytes = input.as_bytes();
        bytes.len() == 3
            && bytes[0].is_ascii_uppercase()
            && bytes[1..]
                .iter()
                .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit())
    }

    pub fn as_str(&self) -> &str {
        // Constructed only from validated ASCII.
        std::str::from_utf8(&self.0).unwrap_or("???")
    }
}

impl FromStr for SegmentName {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for SegmentName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl PartialEq<str> for SegmentName {
    fn eq(&self, other: &str) -> bool {
        self.as_str() == other
    }
}

impl PartialEq<&str> for SegmentName {
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == *other
    }
}

impl serde::Serialize for SegmentName {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> serde::Deserialize<'de> for SegmentName {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        SegmentName::parse(&s).map_err(serde::de::Error::custom)
    }
}
