//! Location-spec access to individual values.
//!
//! A [`TerserPath`] addresses one primitive value:
//!
//! ```text
//! SEG[(occurrence)]-field[(repetition)][-component[-subcomponent]]
//! ```
//!
//! Segment occurrences and field repetitions are zero-based; field, component and
//! subcomponent numbers are one-based, as written in interface specifications
//! (`PID-3(1)-5`, `OBX(2)-5-1`). A leading `/` or `/.` is accepted and ignored. Omitted
//! component and subcomponent default to 1.

use crate::message::Hl7Message;
use crate::{Hl7Error, Hl7Result};
use hl7_types::SegmentName;
use std::fmt;
use std::str::FromStr;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TerserPath {
    pub segment: SegmentName,
    pub segment_occurrence: usize,
    pub field: usize,
    pub repetition: usize,
    pub component: usize,
    pub subcomponent: usize,
}

impl TerserPath {
    pub fn parse(spec: &str) -> Hl7Result<Self> {
        let invalid = |reason: &str| Hl7Error::InvalidPath {
            path: spec.to_owned(),
            reason: reason.to_owned(),
        };

        let trimmed = spec.trim();
        let body = trimmed
            .strip_prefix("/.")
            .or_else(|| trimmed.strip_prefix('/'))
            .unwrap_or(trimmed);

        let mut parts = body.split('-');
        let (segment_text, segment_occurrence) =
            split_index(parts.next().unwrap_or_default()).map_err(|r| invalid(&r))?;
        let segment = SegmentName::parse(segment_text).map_err(|e| invalid(&e.to_string()))?;

        let (field_text, repetition) = split_index(
            parts
                .next()
                .ok_or_else(|| invalid("missing field number"))?,
        )
        .map_err(|r| invalid(&r))?;
        let field = parse_number(field_text, "field").map_err(|r| invalid(&r))?;

        let component = match parts.next() {
            Some(text) => parse_number(text, "component").map_err(|r| invalid(&r))?,
            None => 1,
        };
        let subcomponent = match parts.next() {
            Some(text) => parse_number(text, "subcomponent").map_err(|r| invalid(&r))?,
            None => 1,
        };
        if parts.next().is_some() {
            return Err(invalid("too many path elements"));
        }

        Ok(Self {
            segment,
            segment_occurrence: segment_occurrence.unwrap_or(0),
            field,
            repetition: repetition.unwrap_or(0),
            component,
            subcomponent,
        })
    }
}

/// Splits `NAME(3)` into `("NAME", Some(3))`.
fn split_index(text: &str) -> Result<(&str, Option<usize>), String> {
    let Some(open) = text.find('(') else {
        return Ok((text, None));
    };
    let inner = text[open + 1..]
        .strip_suffix(')')
        .ok_or_else(|| format!("unterminated index in '{text}'"))?;
    let index = inner
        .parse::<usize>()
        .map_err(|_| format!("invalid index '{inner}'"))?;
    Ok((&text[..open], Some(index)))
}

fn parse_number(text: &str, what: &str) -> Result<usize, String> {
    match text.parse::<usize>() {
        Ok(0) => Err(format!("{what} numbers start at 1")),
        Ok(n) => Ok(n),
        Err(_) => Err(format!("invalid {what} number '{text}'")),
    }
}

impl FromStr for TerserPath {
    type Err = Hl7Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for TerserPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segment)?;
        if self.segment_occurrence > 0 {
            write!(f, "({})", self.segment_occurrence)?;
        }
        write!(f, "-{}", self.field)?;
        if self.repetition > 0 {
            write!(f, "({})", self.repetition)?;
        }
        write!(f, "-{}-{}", self.component, self.subcomponent)
    }
}

/// Get/set/clear of single values by [`TerserPath`].
///
/// Values are exchanged as decoded text: `set` escapes delimiters, `get` unescapes them.
pub struct Terser;

impl Terser {
    /// Reads the value at `path`, or `None` if any level of the path does not exist.
    pub fn get(message: &Hl7Message, path: &TerserPath) -> Option<String> {
        message
            .segment_named(path.segment.as_str(), path.segment_occurrence)?
            .field(path.field)?
            .repetition(path.repetition)?
            .subfield(path.component - 1)?
            .sub_subfield(path.subcomponent - 1)
            .map(|leaf| leaf.text())
    }

    pub fn get_str(message: &Hl7Message, path: &str) -> Hl7Result<Option<String>> {
        Ok(Self::get(message, &TerserPath::parse(path)?))
    }

    /// Writes `value` at `path`, creating missing fields, repetitions and components.
    ///
    /// # Errors
    ///
    /// Returns [`Hl7Error::SegmentNotFound`] if the addressed segment occurrence does not
    /// exist, or [`Hl7Error::ReservedField`] for the segment name and MSH delimiter fields.
    pub fn set(message: &mut Hl7Message, path: &TerserPath, value: &str) -> Hl7Result<()> {
        let index = message
            .segment_index(path.segment.as_str(), path.segment_occurrence)
            .ok_or_else(|| Hl7Error::SegmentNotFound(path.to_string()))?;
        if let Some(segment) = message.segment(index) {
            segment.ensure_content_field(path.field)?;
        }
        let segment = message
            .segment_mut(index)
            .ok_or_else(|| Hl7Error::SegmentNotFound(path.to_string()))?;
        segment
            .field_mut_or_insert(path.field)?
            .repetition_mut_or_insert(path.repetition)
            .subfield_mut_or_insert(path.component - 1)
            .sub_subfield_mut_or_insert(path.subcomponent - 1)
            .set_text(value);
        Ok(())
    }

    pub fn set_str(message: &mut Hl7Message, path: &str, value: &str) -> Hl7Result<()> {
        Self::set(message, &TerserPath::parse(path)?, value)
    }

    /// Empties the value at `path`. Returns `false` if nothing existed there.
    pub fn clear(message: &mut Hl7Message, path: &TerserPath) -> Hl7Result<bool> {
        if Self::get(message, path).is_none() {
            return Ok(false);
        }
        Self::set(message, path, "")?;
        Ok(true)
    }
}
