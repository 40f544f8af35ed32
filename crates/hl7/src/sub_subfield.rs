//! Leaf node of the tree: one `&`-delimited subcomponent.

use crate::escape;
use std::fmt;

/// A single subcomponent value, stored in its encoded (escaped) form.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SubSubfield {
    value: String,
}

impl SubSubfield {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
        }
    }

    /// Encoded value exactly as it appears in the message text.
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Value with delimiter escape sequences decoded.
    pub fn text(&self) -> String {
        escape::unescape(&self.value).into_owned()
    }

    /// Replaces the encoded value. The caller is responsible for escaping delimiters.
    pub fn set_value(&mut self, value: impl Into<String>) {
        self.value = value.into();
    }

    /// Stores `text` as literal data, escaping any delimiter characters.
    pub fn set_text(&mut self, text: &str) {
        self.value = escape::escape(text).into_owned();
    }

    pub fn clear(&mut self) {
        self.value.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }
}

impl fmt::Display for SubSubfield {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}
