//! Code lookup tables used to translate coded values between systems.

use crate::{TransformError, TransformResult};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Maps a source code to a target code.
pub trait LookupTable: fmt::Debug + Send + Sync {
    /// Returns the mapped code, or `None` if the table has no entry and no default.
    fn lookup(&self, code: &str) -> Option<String>;
}

/// A lookup table backed by an in-memory map with an optional fallback value.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MapLookupTable {
    entries: BTreeMap<String, String>,
    default: Option<String>,
}

impl MapLookupTable {
    pub fn new(entries: BTreeMap<String, String>, default: Option<String>) -> Self {
        Self { entries, default }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(String, String)> for MapLookupTable {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
            default: None,
        }
    }
}

impl LookupTable for MapLookupTable {
    fn lookup(&self, code: &str) -> Option<String> {
        self.entries
            .get(code)
            .or(self.default.as_ref())
            .cloned()
    }
}

/// Named lookup tables available to rules.
#[derive(Clone, Debug, Default)]
pub struct LookupTables {
    tables: BTreeMap<String, Arc<dyn LookupTable>>,
}

impl LookupTables {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, table: Arc<dyn LookupTable>) {
        self.tables.insert(name.into(), table);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn LookupTable>> {
        self.tables.get(name).cloned()
    }

    /// Like [`LookupTables::get`] but fails with [`TransformError::UnknownLookupTable`].
    pub fn require(&self, name: &str) -> TransformResult<Arc<dyn LookupTable>> {
        self.get(name)
            .ok_or_else(|| TransformError::UnknownLookupTable(name.to_owned()))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}
