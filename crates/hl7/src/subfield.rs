//! A `^`-delimited component, itself split on `&` into sub-subfields.

use crate::sub_subfield::SubSubfield;
use crate::{escape, out_of_range, Hl7Result, SUBCOMPONENT_SEPARATOR};
use std::fmt;

/// One component of a field repetition.
///
/// Always holds at least one [`SubSubfield`], so an empty component serialises as `""`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Subfield {
    sub_subfields: Vec<SubSubfield>,
}

impl Default for Subfield {
    fn default() -> Self {
        Self {
            sub_subfields: vec![SubSubfield::default()],
        }
    }
}

impl Subfield {
    /// Parses encoded component text, splitting on `&`.
    pub fn parse(text: &str) -> Self {
        Self {
            sub_subfields: text.split(SUBCOMPONENT_SEPARATOR).map(SubSubfield::new).collect(),
        }
    }

    /// Wraps `text` as a single sub-subfield without splitting.
    pub(crate) fn raw(text: &str) -> Self {
        Self {
            sub_subfields: vec![SubSubfield::new(text)],
        }
    }

    /// Encoded value including any `&` separators.
    pub fn value(&self) -> String {
        self.to_string()
    }

    /// Decoded value of the whole component.
    pub fn text(&self) -> String {
        escape::unescape(&self.value()).into_owned()
    }

    /// Replaces the component with encoded `value`, re-splitting on `&`.
    pub fn set_value(&mut self, value: &str) {
        *self = Self::parse(value);
    }

    /// Replaces the component with literal `text`, escaping delimiters.
    pub fn set_text(&mut self, text: &str) {
        *self = Self::raw(&escape::escape(text));
    }

    pub fn sub_subfields(&self) -> &[SubSubfield] {
        &self.sub_subfields
    }

    pub fn sub_subfield(&self, index: usize) -> Option<&SubSubfield> {
        self.sub_subfields.get(index)
    }

    pub fn sub_subfield_mut(&mut self, index: usize) -> Option<&mut SubSubfield> {
        self.sub_subfields.get_mut(index)
    }

    /// Returns the sub-subfield at `index`, padding with empty ones when needed.
    pub fn sub_subfield_mut_or_insert(&mut self, index: usize) -> &mut SubSubfield {
        if index >= self.sub_subfields.len() {
            self.sub_subfields.resize_with(index + 1, SubSubfield::default);
        }
        &mut self.sub_subfields[index]
    }

    /// Sets the encoded value of the sub-subfield at `index`, padding when needed.
    pub fn set_sub_subfield(&mut self, index: usize, value: &str) {
        self.sub_subfield_mut_or_insert(index).set_value(value);
    }

    pub fn clear_sub_subfield(&mut self, index: usize) -> Hl7Result<()> {
        let len = self.sub_subfields.len();
        self.sub_subfields
            .get_mut(index)
            .map(SubSubfield::clear)
            .ok_or_else(|| out_of_range("sub-subfield", index, len))
    }

    /// Resets the component to a single empty value.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn is_empty(&self) -> bool {
        self.sub_subfields.iter().all(SubSubfield::is_empty)
    }
}

impl fmt::Display for Subfield {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, sub) in self.sub_subfields.iter().enumerate() {
            if i > 0 {
                write!(f, "{SUBCOMPONENT_SEPARATOR}")?;
            }
            write!(f, "{sub}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Hl7Error;

    #[test]
    fn splits_on_subcomponent_separator() {
        let sub = Subfield::parse("HOSP&1.2.3&ISO");
        assert_eq!(sub.sub_subfields().len(), 3);
        assert_eq!(sub.sub_subfield(1).map(SubSubfield::value), Some("1.2.3"));
        assert_eq!(sub.to_string(), "HOSP&1.2.3&ISO");
    }

    #[test]
    fn set_sub_subfield_pads() {
        let mut sub = Subfield::parse("A");
        sub.set_sub_subfield(2, "C");
        assert_eq!(sub.to_string(), "A&&C");
    }

    #[test]
    fn clear_resets_to_single_empty_value() {
        let mut sub = Subfield::parse("A&B");
        sub.clear();
        assert!(sub.is_empty());
        assert_eq!(sub.sub_subfields().len(), 1);
    }

    #[test]
    fn clear_sub_subfield_reports_out_of_range() {
        let mut sub = Subfield::parse("A&B");
        sub.clear_sub_subfield(1).expect("in range");
        assert_eq!(sub.to_string(), "A&");
        match sub.clear_sub_subfield(2) {
            Err(Hl7Error::IndexOutOfRange { index: 2, len: 2, .. }) => {}
            other => panic!("expected IndexOutOfRange, got {other:?}"),
        }
    }

    #[test]
    fn set_text_escapes_delimiters() {
        let mut sub = Subfield::default();
        sub.set_text("R&D");
        assert_eq!(sub.value(), "R\\T\\D");
        assert_eq!(sub.sub_subfields().len(), 1);
        assert_eq!(sub.text(), "R&D");
    }
}
