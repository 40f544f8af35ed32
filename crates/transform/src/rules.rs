//! Transformation rules file: wire model, validation and translation to domain types.
//!
//! Rules are authored as YAML:
//!
//! ```yaml
//! lookup_tables:
//!   sending-facility:
//!     default: UNKNOWN
//!     entries:
//!       HOSP: GENERAL
//! rules:
//!   - name: map-facility
//!     kind: field
//!     strategy: lookup
//!     path: MSH-4
//!     table: sending-facility
//!   - name: drop-evn
//!     kind: segment
//!     strategy: remove
//!     segment: EVN
//!     when:
//!       message_type: ADT
//! ```
//!
//! Parsing is strict: unknown keys are rejected and errors carry the path of the offending
//! key (for example `rules[1].segment`).

use crate::lookup::{LookupTables, MapLookupTable};
use crate::{TransformError, TransformResult};
use hl7::{Hl7Message, Terser, TerserPath};
use hl7_types::{NonEmptyText, SegmentName};
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::Arc;

// ============================================================================
// Public domain-level types
// ============================================================================

/// Which strategy family a rule draws from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleKind {
    /// Maps the coded value at `path` to a new value.
    Field,
    /// Edits the message as a whole.
    Message,
    /// Acts on every segment of one type.
    Segment,
}

impl RuleKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Field => "field",
            Self::Message => "message",
            Self::Segment => "segment",
        }
    }
}

/// Gate deciding whether a rule applies to a message.
///
/// An empty condition matches every message.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RuleCondition {
    /// Prefix that MSH-9 must start with, for example `ADT` or `ORU^R01`.
    pub message_type: Option<String>,
    /// Value that must be present at `path`, paired with `equals`.
    pub path: Option<TerserPath>,
    pub equals: Option<String>,
}

impl RuleCondition {
    pub fn matches(&self, message: &Hl7Message) -> bool {
        if let Some(prefix) = &self.message_type {
            if !message
                .message_type()
                .is_some_and(|t| t.starts_with(prefix.as_str()))
            {
                return false;
            }
        }
        match (&self.path, &self.equals) {
            (Some(path), Some(expected)) => {
                Terser::get(message, path).as_deref() == Some(expected.as_str())
            }
            _ => true,
        }
    }
}

/// A validated rule, with paths and segment names already parsed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RuleSpec {
    pub name: NonEmptyText,
    pub kind: RuleKind,
    pub strategy: NonEmptyText,
    pub path: Option<TerserPath>,
    pub segment: Option<SegmentName>,
    pub table: Option<NonEmptyText>,
    pub value: Option<String>,
    pub from: Option<TerserPath>,
    pub to: Option<TerserPath>,
    pub sources: Vec<TerserPath>,
    pub separator: Option<String>,
    pub type_code: Option<String>,
    pub condition: RuleCondition,
}

impl RuleSpec {
    fn missing(&self, key: &str) -> TransformError {
        TransformError::InvalidConfig(format!(
            "rule '{}' ({} strategy '{}') requires '{key}'",
            self.name,
            self.kind.as_str(),
            self.strategy
        ))
    }

    pub fn require_path(&self) -> TransformResult<&TerserPath> {
        self.path.as_ref().ok_or_else(|| self.missing("path"))
    }

    pub fn require_segment(&self) -> TransformResult<SegmentName> {
        self.segment.ok_or_else(|| self.missing("segment"))
    }

    pub fn require_table(&self) -> TransformResult<&str> {
        self.table
            .as_ref()
            .map(NonEmptyText::as_str)
            .ok_or_else(|| self.missing("table"))
    }

    pub fn require_value(&self) -> TransformResult<&str> {
        self.value.as_deref().ok_or_else(|| self.missing("value"))
    }

    pub fn require_from(&self) -> TransformResult<&TerserPath> {
        self.from.as_ref().ok_or_else(|| self.missing("from"))
    }

    pub fn require_to(&self) -> TransformResult<&TerserPath> {
        self.to.as_ref().ok_or_else(|| self.missing("to"))
    }

    pub fn require_sources(&self) -> TransformResult<&[TerserPath]> {
        if self.sources.is_empty() {
            return Err(self.missing("sources"));
        }
        Ok(&self.sources)
    }

    pub fn require_type_code(&self) -> TransformResult<&str> {
        self.type_code
            .as_deref()
            .filter(|c| !c.is_empty())
            .ok_or_else(|| self.missing("type_code"))
    }
}

/// Parsed content of a rules file.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RulesConfig {
    pub lookup_tables: BTreeMap<String, MapLookupTable>,
    pub rules: Vec<RuleSpec>,
}

impl RulesConfig {
    /// Parses rules from YAML text.
    ///
    /// # Errors
    ///
    /// Returns [`TransformError::Translation`] when the YAML does not match the schema (the
    /// message includes the failing key path), and [`TransformError::InvalidConfig`] when a
    /// path, segment name or condition is invalid or a rule name is repeated.
    pub fn parse(yaml_text: &str) -> TransformResult<Self> {
        let deserializer = serde_yaml::Deserializer::from_str(yaml_text);
        let wire = match serde_path_to_error::deserialize::<_, RulesFile>(deserializer) {
            Ok(parsed) => parsed,
            Err(err) => {
                let path = err.path().to_string();
                let source = err.into_inner();
                let path = if path.is_empty() || path == "." {
                    "<root>"
                } else {
                    path.as_str()
                };
                return Err(TransformError::Translation(format!(
                    "rules schema mismatch at {path}: {source}"
                )));
            }
        };
        wire_to_domain(wire)
    }

    /// Reads and parses a rules file.
    pub fn load(path: &Path) -> TransformResult<Self> {
        let text = std::fs::read_to_string(path)?;
        let config = Self::parse(&text)?;
        tracing::info!(
            path = %path.display(),
            rules = config.rules.len(),
            tables = config.lookup_tables.len(),
            "loaded transformation rules"
        );
        Ok(config)
    }

    /// The declared lookup tables, keyed by name.
    pub fn tables(&self) -> LookupTables {
        let mut tables = LookupTables::new();
        for (name, table) in &self.lookup_tables {
            tables.insert(name.clone(), Arc::new(table.clone()));
        }
        tables
    }
}

// ============================================================================
// Wire types (internal)
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RulesFile {
    #[serde(default)]
    lookup_tables: BTreeMap<String, TableWire>,
    #[serde(default)]
    rules: Vec<RuleWire>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct TableWire {
    #[serde(default)]
    default: Option<String>,
    entries: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RuleWire {
    name: String,
    kind: RuleKind,
    strategy: String,
    #[serde(default)]
    path: Option<String>,
    #[serde(default)]
    segment: Option<String>,
    #[serde(default)]
    table: Option<String>,
    #[serde(default)]
    value: Option<String>,
    #[serde(default)]
    from: Option<String>,
    #[serde(default)]
    to: Option<String>,
    #[serde(default)]
    sources: Vec<String>,
    #[serde(default)]
    separator: Option<String>,
    #[serde(default)]
    type_code: Option<String>,
    #[serde(default)]
    when: Option<WhenWire>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct WhenWire {
    #[serde(default)]
    message_type: Option<String>,
    #[serde(default)]
    path: Option<String>,
    #[serde(default)]
    equals: Option<String>,
}

// ============================================================================
// Helper functions (internal)
// ============================================================================

fn wire_to_domain(wire: RulesFile) -> TransformResult<RulesConfig> {
    let lookup_tables = wire
        .lookup_tables
        .into_iter()
        .map(|(name, table)| (name, MapLookupTable::new(table.entries, table.default)))
        .collect();

    let mut seen = BTreeSet::new();
    let mut rules = Vec::with_capacity(wire.rules.len());
    for (idx, rule) in wire.rules.into_iter().enumerate() {
        let spec = rule_to_domain(idx, rule)?;
        if !seen.insert(spec.name.clone()) {
            return Err(TransformError::InvalidConfig(format!(
                "rules[{idx}].name: duplicate rule name '{}'",
                spec.name
            )));
        }
        rules.push(spec);
    }

    Ok(RulesConfig {
        lookup_tables,
        rules,
    })
}

fn rule_to_domain(idx: usize, rule: RuleWire) -> TransformResult<RuleSpec> {
    let invalid = |key: &str, reason: String| {
        TransformError::InvalidConfig(format!("rules[{idx}].{key}: {reason}"))
    };
    let parse_path = |key: &str, text: Option<String>| -> TransformResult<Option<TerserPath>> {
        text.map(|t| TerserPath::parse(&t).map_err(|e| invalid(key, e.to_string())))
            .transpose()
    };

    let name = NonEmptyText::new(&rule.name).map_err(|e| invalid("name", e.to_string()))?;
    let strategy =
        NonEmptyText::new(&rule.strategy).map_err(|e| invalid("strategy", e.to_string()))?;
    let segment = rule
        .segment
        .map(|s| SegmentName::parse(&s).map_err(|e| invalid("segment", e.to_string())))
        .transpose()?;
    let table = rule
        .table
        .map(|t| NonEmptyText::new(&t).map_err(|e| invalid("table", e.to_string())))
        .transpose()?;

    let mut sources = Vec::with_capacity(rule.sources.len());
    for (i, source) in rule.sources.into_iter().enumerate() {
        let key = format!("sources[{i}]");
        sources.push(TerserPath::parse(&source).map_err(|e| invalid(&key, e.to_string()))?);
    }

    let condition = match rule.when {
        Some(when) => {
            if when.path.is_some() != when.equals.is_some() {
                return Err(invalid(
                    "when",
                    "'path' and 'equals' must be given together".into(),
                ));
            }
            RuleCondition {
                message_type: when.message_type.filter(|t| !t.is_empty()),
                path: parse_path("when.path", when.path)?,
                equals: when.equals,
            }
        }
        None => RuleCondition::default(),
    };

    Ok(RuleSpec {
        name,
        kind: rule.kind,
        strategy,
        path: parse_path("path", rule.path)?,
        segment,
        table,
        value: rule.value,
        from: parse_path("from", rule.from)?,
        to: parse_path("to", rule.to)?,
        sources,
        separator: rule.separator,
        type_code: rule.type_code,
        condition,
    })
}
