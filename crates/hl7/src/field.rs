//! A `|`-delimited field, split on `~` into repetitions.

use crate::repetition::FieldRepetition;
use crate::{out_of_range, Hl7Result, REPETITION_SEPARATOR};
use std::fmt;

/// One field of a segment.
///
/// Most fields are split into repetitions, components and subcomponents. Raw fields (the
/// segment name, MSH-1 and MSH-2) are held verbatim because their text contains delimiter
/// characters that are data, not structure.
///
/// A field always holds at least one repetition.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Field {
    repetitions: Vec<FieldRepetition>,
    raw: bool,
}

impl Default for Field {
    fn default() -> Self {
        Self {
            repetitions: vec![FieldRepetition::default()],
            raw: false,
        }
    }
}

impl Field {
    /// Parses encoded field text, splitting on `~`, `^` and `&`.
    pub fn parse(text: &str) -> Self {
        Self {
            repetitions: text.split(REPETITION_SEPARATOR).map(FieldRepetition::parse).collect(),
            raw: false,
        }
    }

    /// A field holding `text` verbatim, with no delimiter splitting.
    pub fn raw(text: &str) -> Self {
        Self {
            repetitions: vec![FieldRepetition::raw(text)],
            raw: true,
        }
    }

    pub fn is_raw(&self) -> bool {
        self.raw
    }

    /// Encoded text of the whole field.
    pub fn value(&self) -> String {
        self.to_string()
    }

    pub fn repetitions(&self) -> &[FieldRepetition] {
        &self.repetitions
    }

    pub fn repetition_count(&self) -> usize {
        self.repetitions.len()
    }

    pub fn repetition(&self, index: usize) -> Option<&FieldRepetition> {
        self.repetitions.get(index)
    }

    pub fn repetition_mut(&mut self, index: usize) -> Option<&mut FieldRepetition> {
        self.repetitions.get_mut(index)
    }

    /// Returns the repetition at `index`, padding with empty repetitions when needed.
    pub fn repetition_mut_or_insert(&mut self, index: usize) -> &mut FieldRepetition {
        if index >= self.repetitions.len() {
            self.repetitions.resize_with(index + 1, FieldRepetition::default);
        }
        &mut self.repetitions[index]
    }

    pub fn add_repetition(&mut self, repetition: FieldRepetition) {
        self.repetitions.push(repetition);
    }

    /// Replaces the whole field with `value`, discarding every existing repetition.
    pub fn set_value(&mut self, value: &str) {
        *self = if self.raw {
            Self::raw(value)
        } else {
            Self::parse(value)
        };
    }

    /// Sets one repetition, creating it (and any gap before it) when absent.
    ///
    /// With `clear_existing` the repetition is replaced by `value`. Without it, only the
    /// leading components supplied by `value` are overwritten and the remaining components of
    /// that repetition are kept.
    pub fn set_repetition_value(&mut self, value: &str, repetition: usize, clear_existing: bool) {
        if self.raw {
            self.set_value(value);
            return;
        }
        let target = self.repetition_mut_or_insert(repetition);
        if clear_existing {
            *target = FieldRepetition::parse(value);
        } else {
            target.merge_value(value);
        }
    }

    /// Keeps only the repetitions matching `keep`, returning how many were removed.
    ///
    /// If every repetition is removed the field is left holding one empty repetition.
    pub fn retain_repetitions<F>(&mut self, mut keep: F) -> usize
    where
        F: FnMut(&FieldRepetition) -> bool,
    {
        let before = self.repetitions.len();
        self.repetitions.retain(|rep| keep(rep));
        let removed = before - self.repetitions.len();
        if self.repetitions.is_empty() {
            self.repetitions.push(FieldRepetition::default());
        }
        removed
    }

    pub fn clear(&mut self) {
        self.repetitions = vec![FieldRepetition::default()];
    }

    pub fn clear_repetition(&mut self, repetition: usize) -> Hl7Result<()> {
        let len = self.repetitions.len();
        self.repetitions
            .get_mut(repetition)
            .map(FieldRepetition::clear)
            .ok_or_else(|| out_of_range("repetition", repetition, len))
    }

    pub fn clear_subfield(&mut self, index: usize, repetition: usize) -> Hl7Result<()> {
        let len = self.repetitions.len();
        self.repetitions
            .get_mut(repetition)
            .ok_or_else(|| out_of_range("repetition", repetition, len))?
            .clear_subfield(index)
    }

    /// True if every repetition and every subfield beneath it is blank.
    pub fn is_empty(&self) -> bool {
        self.repetitions.iter().all(FieldRepetition::is_empty)
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, rep) in self.repetitions.iter().enumerate() {
            if i > 0 {
                write!(f, "{REPETITION_SEPARATOR}")?;
            }
            write!(f, "{rep}")?;
        }
        Ok(())
    }
}
