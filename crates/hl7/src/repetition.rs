//! One `~`-delimited repetition of a field, split on `^` into subfields.

use crate::subfield::Subfield;
use crate::{out_of_range, Hl7Result, COMPONENT_SEPARATOR};
use std::fmt;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldRepetition {
    subfields: Vec<Subfield>,
}

impl Default for FieldRepetition {
    fn default() -> Self {
        Self {
            subfields: vec![Subfield::default()],
        }
    }
}

impl FieldRepetition {
    /// Parses encoded repetition text, splitting on `^`.
    pub fn parse(text: &str) -> Self {
        Self {
            subfields: text.split(COMPONENT_SEPARATOR).map(Subfield::parse).collect(),
        }
    }

    /// A repetition holding `text` verbatim, used for fields that must not be split.
    pub(crate) fn raw(text: &str) -> Self {
        Self {
            subfields: vec![Subfield::raw(text)],
        }
    }

    pub fn value(&self) -> String {
        self.to_string()
    }

    pub fn subfields(&self) -> &[Subfield] {
        &self.subfields
    }

    pub fn subfield_count(&self) -> usize {
        self.subfields.len()
    }

    pub fn subfield(&self, index: usize) -> Option<&Subfield> {
        self.subfields.get(index)
    }

    pub fn subfield_mut(&mut self, index: usize) -> Option<&mut Subfield> {
        self.subfields.get_mut(index)
    }

    /// Encoded value of the subfield at `index`, if present.
    pub fn subfield_value(&self, index: usize) -> Option<String> {
        self.subfields.get(index).map(Subfield::value)
    }

    /// Returns the subfield at `index`, padding with empty subfields when needed.
    pub fn subfield_mut_or_insert(&mut self, index: usize) -> &mut Subfield {
        if index >= self.subfields.len() {
            self.subfields.resize_with(index + 1, Subfield::default);
        }
        &mut self.subfields[index]
    }

    /// Sets the encoded value of the subfield at `index`, padding when needed.
    pub fn set_subfield(&mut self, index: usize, value: &str) {
        self.subfield_mut_or_insert(index).set_value(value);
    }

    /// Overwrites the leading subfields with those parsed from `value`, keeping any trailing
    /// subfields beyond the ones `value` supplies.
    pub fn merge_value(&mut self, value: &str) {
        for (index, subfield) in Self::parse(value).subfields.into_iter().enumerate() {
            *self.subfield_mut_or_insert(index) = subfield;
        }
    }

    pub fn clear_subfield(&mut self, index: usize) -> Hl7Result<()> {
        let len = self.subfields.len();
        self.subfields
            .get_mut(index)
            .map(Subfield::clear)
            .ok_or_else(|| out_of_range("subfield", index, len))
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn is_empty(&self) -> bool {
        self.subfields.iter().all(Subfield::is_empty)
    }
}

impl fmt::Display for FieldRepetition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, sub) in self.subfields.iter().enumerate() {
            if i > 0 {
                write!(f, "{COMPONENT_SEPARATOR}")?;
            }
            write!(f, "{sub}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_components_and_round_trips() {
        let rep = FieldRepetition::parse("123^^^HOSP&1.2&ISO^MRN");
        assert_eq!(rep.subfield_count(), 5);
        assert_eq!(rep.subfield_value(0).as_deref(), Some("123"));
        assert_eq!(rep.subfield_value(3).as_deref(), Some("HOSP&1.2&ISO"));
        assert_eq!(rep.subfield_value(5), None);
        assert_eq!(rep.to_string(), "123^^^HOSP&1.2&ISO^MRN");
    }

    #[test]
    fn merge_value_keeps_trailing_components() {
        let mut rep = FieldRepetition::parse("123^^^^MRN");
        rep.merge_value("456");
        assert_eq!(rep.to_string(), "456^^^^MRN");
    }

    #[test]
    fn set_subfield_pads_with_empty_components() {
        let mut rep = FieldRepetition::parse("A");
        rep.set_subfield(3, "D");
        assert_eq!(rep.to_string(), "A^^^D");
    }

    #[test]
    fn boundary_indexes() {
        let mut rep = FieldRepetition::parse("A^B");
        assert!(rep.subfield(1).is_some());
        assert!(rep.subfield(2).is_none());
        assert!(rep.clear_subfield(1).is_ok());
        assert!(rep.clear_subfield(2).is_err());
        assert_eq!(rep.to_string(), "A^");
    }

    #[test]
    fn is_empty_requires_every_component_blank() {
        assert!(FieldRepetition::parse("^^&").is_empty());
        assert!(!FieldRepetition::parse("^^&x").is_empty());
    }
}
