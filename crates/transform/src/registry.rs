//! Name-to-factory registry used to resolve rules into pipeline steps.
//!
//! Each [`RuleKind`] has its own namespace of strategy names. The default registry carries
//! the built-in strategies; callers may register more before building a pipeline.

use crate::lookup::LookupTables;
use crate::pipeline::Step;
use crate::rules::{RuleKind, RuleSpec};
use crate::strategies::{
    ChangeVersion, ClearValue, ConcatenateValues, CopyValue, DefaultIfEmpty, DuplicateSegment,
    FieldCodeTransformation, KeepFirstSegment, KeepPatientIdentifier, LookupCode, Lowercase,
    MessageCodeTransformation, RemoveSegments, SegmentAction, SetValue, Trim, Uppercase,
};
use crate::{TransformError, TransformResult};
use hl7_types::SegmentName;
use std::collections::HashMap;

pub type FieldFactory =
    fn(&RuleSpec, &LookupTables) -> TransformResult<Box<dyn FieldCodeTransformation>>;
pub type MessageFactory =
    fn(&RuleSpec, &LookupTables) -> TransformResult<Box<dyn MessageCodeTransformation>>;
pub type SegmentFactory = fn(&RuleSpec, &LookupTables) -> TransformResult<Box<dyn SegmentAction>>;

/// Strategy factories keyed by kind and name.
#[derive(Clone)]
pub struct StrategyRegistry {
    field: HashMap<String, FieldFactory>,
    message: HashMap<String, MessageFactory>,
    segment: HashMap<String, SegmentFactory>,
}

impl Default for StrategyRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl StrategyRegistry {
    /// A registry with no strategies.
    pub fn empty() -> Self {
        Self {
            field: HashMap::new(),
            message: HashMap::new(),
            segment: HashMap::new(),
        }
    }

    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();

        registry.register_field("lookup", |rule, tables| {
            let table = tables.require(rule.require_table()?)?;
            Ok(Box::new(LookupCode::new(table)))
        });
        registry.register_field("uppercase", |_, _| Ok(Box::new(Uppercase)));
        registry.register_field("lowercase", |_, _| Ok(Box::new(Lowercase)));
        registry.register_field("trim", |_, _| Ok(Box::new(Trim)));
        registry.register_field("default-if-empty", |rule, _| {
            Ok(Box::new(DefaultIfEmpty::new(rule.require_value()?)))
        });

        registry.register_message("set", |rule, _| {
            Ok(Box::new(SetValue::new(
                rule.require_path()?.clone(),
                rule.require_value()?,
            )))
        });
        registry.register_message("copy", |rule, _| {
            Ok(Box::new(CopyValue::new(
                rule.require_from()?.clone(),
                rule.require_to()?.clone(),
            )))
        });
        registry.register_message("clear", |rule, _| {
            Ok(Box::new(ClearValue::new(rule.require_path()?.clone())))
        });
        registry.register_message("concatenate", |rule, _| {
            Ok(Box::new(ConcatenateValues::new(
                rule.require_path()?.clone(),
                rule.require_sources()?.to_vec(),
                rule.separator.clone().unwrap_or_else(|| " ".to_owned()),
            )))
        });
        registry.register_message("change-version", |rule, _| {
            Ok(Box::new(ChangeVersion::new(rule.require_value()?)))
        });

        registry.register_segment("remove", |_, _| Ok(Box::new(RemoveSegments)));
        registry.register_segment("keep-first", |_, _| Ok(Box::new(KeepFirstSegment)));
        registry.register_segment("duplicate", |_, _| Ok(Box::new(DuplicateSegment)));
        registry.register_segment("keep-patient-identifier", |rule, _| {
            if rule.segment != Some(SegmentName::PID) {
                return Err(TransformError::InvalidConfig(format!(
                    "rule '{}': keep-patient-identifier applies to PID only",
                    rule.name
                )));
            }
            Ok(Box::new(KeepPatientIdentifier::new(rule.require_type_code()?)))
        });

        registry
    }

    pub fn register_field(&mut self, name: impl Into<String>, factory: FieldFactory) {
        self.field.insert(name.into(), factory);
    }

    pub fn register_message(&mut self, name: impl Into<String>, factory: MessageFactory) {
        self.message.insert(name.into(), factory);
    }

    pub fn register_segment(&mut self, name: impl Into<String>, factory: SegmentFactory) {
        self.segment.insert(name.into(), factory);
    }

    /// Registered strategy names of one kind, sorted.
    pub fn names(&self, kind: RuleKind) -> Vec<&str> {
        let mut names: Vec<&str> = match kind {
            RuleKind::Field => self.field.keys().map(String::as_str).collect(),
            RuleKind::Message => self.message.keys().map(String::as_str).collect(),
            RuleKind::Segment => self.segment.keys().map(String::as_str).collect(),
        };
        names.sort_unstable();
        names
    }

    /// Builds the step for `rule`.
    ///
    /// # Errors
    ///
    /// Returns [`TransformError::UnknownStrategy`] when no strategy of the rule's kind has the
    /// rule's name, [`TransformError::UnknownLookupTable`] when a referenced table is missing,
    /// and [`TransformError::InvalidConfig`] when a required rule argument is absent.
    pub fn resolve(&self, rule: &RuleSpec, tables: &LookupTables) -> TransformResult<Step> {
        let name = rule.strategy.as_str();
        let unknown = || TransformError::UnknownStrategy {
            kind: rule.kind.as_str(),
            name: name.to_owned(),
        };

        match rule.kind {
            RuleKind::Field => {
                let factory = self.field.get(name).ok_or_else(unknown)?;
                let path = rule.require_path()?.clone();
                Ok(Step::Field {
                    path,
                    transformation: factory(rule, tables)?,
                })
            }
            RuleKind::Message => {
                let factory = self.message.get(name).ok_or_else(unknown)?;
                Ok(Step::Message(factory(rule, tables)?))
            }
            RuleKind::Segment => {
                let factory = self.segment.get(name).ok_or_else(unknown)?;
                let segment = rule.require_segment()?;
                Ok(Step::Segment {
                    segment,
                    action: factory(rule, tables)?,
                })
            }
        }
    }
}

impl std::fmt::Debug for StrategyRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StrategyRegistry")
            .field("field", &self.names(RuleKind::Field))
            .field("message", &self.names(RuleKind::Message))
            .field("segment", &self.names(RuleKind::Segment))
            .finish()
    }
}
