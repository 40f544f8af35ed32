//! A single `\r`-terminated segment, split on `|` into fields.

use crate::field::Field;
use crate::{out_of_range, Hl7Error, Hl7Result, ENCODING_CHARACTERS, FIELD_SEPARATOR};
use hl7_types::SegmentName;
use std::fmt;

/// Number of leading MSH fields that hold the name and delimiters rather than content.
const MSH_RESERVED_FIELDS: usize = 3;

/// An HL7v2 segment.
///
/// Field 0 is always the segment name. For MSH, field 1 holds the field separator and field 2
/// the encoding characters, both as raw fields, so that content fields keep their standard
/// numbers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Segment {
    name: SegmentName,
    fields: Vec<Field>,
}

impl Segment {
    /// Parses one segment of encoded text.
    ///
    /// # Errors
    ///
    /// Returns [`Hl7Error::Parse`] if the segment name is not a valid identifier, or if an MSH
    /// segment does not use `|` as its field separator.
    pub fn parse(text: &str) -> Hl7Result<Self> {
        if let Some(rest) = text.strip_prefix("MSH") {
            if !rest.starts_with(|c: char| c.is_ascii_alphanumeric()) {
                return Self::parse_msh(rest);
            }
        }

        let mut parts = text.split(FIELD_SEPARATOR);
        let name_text = parts.next().unwrap_or_default();
        let name = SegmentName::parse(name_text)
            .map_err(|e| Hl7Error::Parse(format!("segment '{}': {e}", truncate(text))))?;

        let mut fields = vec![Field::raw(name_text)];
        fields.extend(parts.map(Field::parse));
        Ok(Self { name, fields })
    }

    /// Parses the text following the `MSH` name.
    fn parse_msh(rest: &str) -> Hl7Result<Self> {
        let mut fields = vec![Field::raw("MSH"), Field::raw("|")];

        if rest.is_empty() {
            fields.push(Field::raw(""));
            return Ok(Self {
                name: SegmentName::MSH,
                fields,
            });
        }

        let Some(rest) = rest.strip_prefix(FIELD_SEPARATOR) else {
            return Err(Hl7Error::Parse(format!(
                "MSH field separator must be '{FIELD_SEPARATOR}', found '{}'",
                rest.chars().next().unwrap_or_default()
            )));
        };

        let mut parts = rest.split(FIELD_SEPARATOR);
        fields.push(Field::raw(parts.next().unwrap_or_default()));
        fields.extend(parts.map(Field::parse));
        Ok(Self {
            name: SegmentName::MSH,
            fields,
        })
    }

    /// Creates a segment holding only its name.
    pub fn new(name: SegmentName) -> Self {
        let mut fields = vec![Field::raw(name.as_str())];
        if name == SegmentName::MSH {
            fields.push(Field::raw("|"));
            fields.push(Field::raw(ENCODING_CHARACTERS));
        }
        Self { name, fields }
    }

    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    pub fn segment_name(&self) -> SegmentName {
        self.name
    }

    pub fn is_msh(&self) -> bool {
        self.name == SegmentName::MSH
    }

    /// Index of the first field that carries message content.
    pub fn first_content_field(&self) -> usize {
        if self.is_msh() {
            MSH_RESERVED_FIELDS
        } else {
            1
        }
    }

    pub(crate) fn ensure_content_field(&self, index: usize) -> Hl7Result<()> {
        if index < self.first_content_field() {
            return Err(Hl7Error::ReservedField {
                segment: self.name().to_owned(),
                index,
            });
        }
        Ok(())
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    pub fn field(&self, index: usize) -> Option<&Field> {
        self.fields.get(index)
    }

    /// Mutable access to a content field. Returns `None` for reserved fields.
    pub fn field_mut(&mut self, index: usize) -> Option<&mut Field> {
        if index < self.first_content_field() {
            return None;
        }
        self.fields.get_mut(index)
    }

    /// Encoded text of field `index`, if present.
    pub fn field_value(&self, index: usize) -> Option<String> {
        self.fields.get(index).map(Field::value)
    }

    /// Returns content field `index`, padding with empty fields when needed.
    pub fn field_mut_or_insert(&mut self, index: usize) -> Hl7Result<&mut Field> {
        self.ensure_content_field(index)?;
        self.pad_to(index);
        Ok(&mut self.fields[index])
    }

    fn pad_to(&mut self, index: usize) {
        if index >= self.fields.len() {
            self.fields.resize_with(index + 1, Field::default);
        }
    }

    /// Inserts `field` at `index`, shifting later fields right.
    ///
    /// When `index` is past the end the gap is filled with empty fields first.
    pub fn add_field(&mut self, field: Field, index: usize) -> Hl7Result<()> {
        self.ensure_content_field(index)?;
        if index > self.fields.len() {
            self.fields.resize_with(index, Field::default);
        }
        self.fields.insert(index, field);
        Ok(())
    }

    /// Replaces field `index`, padding with empty fields when needed.
    pub fn set_field(&mut self, field: Field, index: usize) -> Hl7Result<()> {
        *self.field_mut_or_insert(index)? = field;
        Ok(())
    }

    /// Replaces field `index` with encoded `value`, padding when needed.
    pub fn set_field_value(&mut self, index: usize, value: &str) -> Hl7Result<()> {
        self.field_mut_or_insert(index)?.set_value(value);
        Ok(())
    }

    pub fn clear_field(&mut self, index: usize) -> Hl7Result<()> {
        self.ensure_content_field(index)?;
        let len = self.fields.len();
        self.fields
            .get_mut(index)
            .map(Field::clear)
            .ok_or_else(|| out_of_range("field", index, len))
    }

    pub fn clear_field_repetition(&mut self, index: usize, repetition: usize) -> Hl7Result<()> {
        self.ensure_content_field(index)?;
        let len = self.fields.len();
        self.fields
            .get_mut(index)
            .ok_or_else(|| out_of_range("field", index, len))?
            .clear_repetition(repetition)
    }

    /// True when no content field carries a value.
    pub fn is_empty(&self) -> bool {
        self.fields
            .iter()
            .skip(self.first_content_field())
            .all(Field::is_empty)
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_msh() {
            write!(f, "MSH{FIELD_SEPARATOR}{ENCODING_CHARACTERS}")?;
            for field in self.fields.iter().skip(MSH_RESERVED_FIELDS) {
                write!(f, "{FIELD_SEPARATOR}{field}")?;
            }
            return Ok(());
        }

        for (i, field) in self.fields.iter().enumerate() {
            if i > 0 {
                write!(f, "{FIELD_SEPARATOR}")?;
            }
            write!(f, "{field}")?;
        }
        Ok(())
    }
}

fn truncate(text: &str) -> &str {
    match text.char_indices().nth(20) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MSH: &str = "MSH|^~\\&|A|B|C|D|20240101||ADT^A01|1|P|2.3";

    #[test]
    fn non_msh_segments_round_trip() {
        for text in [
            "PID|1||123^^^^MRN~456^^^^SSN||DOE^JOHN",
            "EVN|A01",
            "OBX|1|ST|||",
            "NTE",
            "ZPI|a&b^c~d|",
        ] {
            let segment = Segment::parse(text).expect("parse segment");
            assert_eq!(segment.to_string(), text);
        }
    }

    #[test]
    fn msh_keeps_standard_field_numbers() {
        let msh = Segment::parse(MSH).expect("parse MSH");
        assert_eq!(msh.name(), "MSH");
        assert_eq!(msh.field_value(1).as_deref(), Some("|"));
        assert_eq!(msh.field_value(2).as_deref(), Some("^~\\&"));
        assert_eq!(msh.field_value(3).as_deref(), Some("A"));
        assert_eq!(msh.field_value(9).as_deref(), Some("ADT^A01"));
        assert_eq!(msh.field_value(12).as_deref(), Some("2.3"));
        assert!(msh.field(1).is_some_and(Field::is_raw));
        assert!(msh.field(2).is_some_and(Field::is_raw));
        assert_eq!(msh.to_string(), MSH);
    }

    #[test]
    fn msh_always_emits_default_encoding_characters() {
        let alternate = "MSH|$*#@|A|B|C|D|20240101||ADT$A01|1|P|2.3";
        let msh = Segment::parse(alternate).expect("parse MSH");
        assert_eq!(msh.field_value(2).as_deref(), Some("$*#@"));
        let text = msh.to_string();
        assert!(text.starts_with("MSH|^~\\&|"), "got {text}");
        assert!(text.ends_with("|A|B|C|D|20240101||ADT$A01|1|P|2.3"));
    }

    #[test]
    fn msh_with_other_field_separator_is_rejected() {
        match Segment::parse("MSH#^~\\&#A") {
            Err(Hl7Error::Parse(msg)) => assert!(msg.contains("field separator")),
            other => panic!("expected Parse error, got {other:?}"),
        }
    }

    #[test]
    fn invalid_segment_name_is_rejected() {
        assert!(matches!(Segment::parse("pid|1"), Err(Hl7Error::Parse(_))));
        assert!(matches!(Segment::parse(""), Err(Hl7Error::Parse(_))));
        assert!(matches!(Segment::parse("PIDX|1"), Err(Hl7Error::Parse(_))));
    }

    #[test]
    fn field_access_boundaries() {
        let segment = Segment::parse("EVN|A01|20240101").expect("parse");
        assert_eq!(segment.field_count(), 3);
        assert!(segment.field(2).is_some());
        assert!(segment.field(3).is_none());
    }

    #[test]
    fn add_field_pads_and_inserts() {
        let mut segment = Segment::parse("EVN|A01").expect("parse");
        segment.add_field(Field::parse("X"), 4).expect("add field");
        assert_eq!(segment.to_string(), "EVN|A01|||X");

        segment.add_field(Field::parse("Y"), 1).expect("insert field");
        assert_eq!(segment.to_string(), "EVN|Y|A01|||X");
    }

    #[test]
    fn reserved_fields_cannot_be_changed() {
        let mut msh = Segment::parse(MSH).expect("parse");
        for index in 0..3 {
            match msh.clear_field(index) {
                Err(Hl7Error::ReservedField { index: got, .. }) => assert_eq!(got, index),
                other => panic!("expected ReservedField, got {other:?}"),
            }
            assert!(msh.field_mut(index).is_none());
        }
        assert!(msh.field_mut(3).is_some());

        let mut pid = Segment::parse("PID|1").expect("parse");
        assert!(pid.set_field_value(0, "XXX").is_err());
        assert_eq!(pid.name(), "PID");
    }

    #[test]
    fn clear_field_and_repetition() {
        let mut segment = Segment::parse("PID|1||A~B").expect("parse");
        segment.clear_field_repetition(3, 1).expect("clear repetition");
        assert_eq!(segment.to_string(), "PID|1||A~");
        segment.clear_field(3).expect("clear field");
        assert_eq!(segment.to_string(), "PID|1||");
        assert!(segment.clear_field(4).is_err());
    }

    #[test]
    fn is_empty_after_all_content_cleared() {
        let mut segment = Segment::parse("NTE|1|L|comment").expect("parse");
        assert!(!segment.is_empty());
        for index in 1..segment.field_count() {
            segment.clear_field(index).expect("clear");
        }
        assert!(segment.is_empty());
        assert!(Segment::parse("NTE").expect("parse").is_empty());
    }

    #[test]
    fn new_segment_is_named_and_empty() {
        let msh = Segment::new(SegmentName::MSH);
        assert_eq!(msh.to_string(), "MSH|^~\\&");
        let obx = Segment::new(SegmentName::parse("OBX").expect("valid"));
        assert_eq!(obx.to_string(), "OBX");
        assert!(obx.is_empty());
    }
}
