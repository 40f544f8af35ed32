//! Ordered application of resolved rules to messages.

use crate::registry::StrategyRegistry;
use crate::rules::{RuleCondition, RulesConfig};
use crate::strategies::{FieldCodeTransformation, MessageCodeTransformation, SegmentAction};
use crate::TransformResult;
use hl7::{Hl7Message, Terser, TerserPath};
use hl7_types::SegmentName;
use std::path::Path;

/// One resolved rule body.
#[derive(Debug)]
pub enum Step {
    /// Rewrites the value at `path` through a field transformation.
    Field {
        path: TerserPath,
        transformation: Box<dyn FieldCodeTransformation>,
    },
    Message(Box<dyn MessageCodeTransformation>),
    Segment {
        segment: SegmentName,
        action: Box<dyn SegmentAction>,
    },
}

impl Step {
    pub fn strategy_name(&self) -> &str {
        match self {
            Self::Field { transformation, .. } => transformation.name(),
            Self::Message(transformation) => transformation.name(),
            Self::Segment { action, .. } => action.name(),
        }
    }

    /// Applies the step, returning whether the message changed.
    ///
    /// A field step whose segment is absent from the message does nothing.
    pub fn apply(&self, message: &mut Hl7Message) -> TransformResult<bool> {
        match self {
            Self::Field {
                path,
                transformation,
            } => {
                if message
                    .segment_named(path.segment.as_str(), path.segment_occurrence)
                    .is_none()
                {
                    return Ok(false);
                }
                let current = Terser::get(message, path).unwrap_or_default();
                match transformation.transform(&current) {
                    Some(updated) if updated != current => {
                        Terser::set(message, path, &updated)?;
                        Ok(true)
                    }
                    _ => Ok(false),
                }
            }
            Self::Message(transformation) => transformation.apply(message),
            Self::Segment { segment, action } => action.apply(message, *segment),
        }
    }
}

#[derive(Debug)]
struct ResolvedRule {
    name: String,
    condition: RuleCondition,
    step: Step,
}

/// Counts of what happened to each rule while processing one message.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ProcessReport {
    /// Rules that changed the message.
    pub applied: usize,
    /// Rules that ran without changing anything.
    pub unchanged: usize,
    /// Rules whose condition did not match.
    pub skipped: usize,
}

impl ProcessReport {
    pub fn changed(&self) -> bool {
        self.applied > 0
    }
}

/// An ordered list of resolved rules.
///
/// Every strategy and lookup table is resolved when the pipeline is built, so processing a
/// message can only fail on the message itself.
#[derive(Debug, Default)]
pub struct Pipeline {
    rules: Vec<ResolvedRule>,
}

impl Pipeline {
    /// A pipeline with no rules; processing leaves messages unchanged.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Resolves every rule in `config` against `registry`.
    pub fn build(config: &RulesConfig, registry: &StrategyRegistry) -> TransformResult<Self> {
        let tables = config.tables();
        let rules = config
            .rules
            .iter()
            .map(|rule| {
                Ok(ResolvedRule {
                    name: rule.name.to_string(),
                    condition: rule.condition.clone(),
                    step: registry.resolve(rule, &tables)?,
                })
            })
            .collect::<TransformResult<Vec<_>>>()?;
        Ok(Self { rules })
    }

    /// Builds a pipeline from `config` using the built-in strategies.
    pub fn from_config(config: &RulesConfig) -> TransformResult<Self> {
        Self::build(config, &StrategyRegistry::default())
    }

    /// Loads a rules file and builds a pipeline with the built-in strategies.
    pub fn load(path: &Path) -> TransformResult<Self> {
        Self::from_config(&RulesConfig::load(path)?)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn rule_names(&self) -> impl Iterator<Item = &str> {
        self.rules.iter().map(|r| r.name.as_str())
    }

    /// Applies every rule, in order, to `message`.
    ///
    /// The message is left dirty when anything changed; encoding it back to text is up to
    /// the caller.
    pub fn process(&self, message: &mut Hl7Message) -> TransformResult<ProcessReport> {
        let mut report = ProcessReport::default();
        for rule in &self.rules {
            if !rule.condition.matches(message) {
                tracing::debug!(rule = %rule.name, "rule condition not met");
                report.skipped += 1;
                continue;
            }
            let changed = rule.step.apply(message).map_err(|err| {
                tracing::warn!(rule = %rule.name, error = %err, "rule failed");
                err
            })?;
            if changed {
                tracing::debug!(rule = %rule.name, strategy = rule.step.strategy_name(), "rule applied");
                report.applied += 1;
            } else {
                report.unchanged += 1;
            }
        }
        tracing::info!(
            applied = report.applied,
            unchanged = report.unchanged,
            skipped = report.skipped,
            "processed message"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TransformError;
    use std::io::Write;

    const ADT: &str = "MSH|^~\\&|ADT|HOSP|EHR|CLINIC|20240101||ADT^A01|7|P|2.3\r\
EVN|A01|20240101\r\
PID|1||123^^^^MRN~456^^^^SSN||doe^john||19800101|\r\
NK1|1|DOE^JANE";

    const RULES: &str = r#"lookup_tables:
  facilities:
    entries:
      HOSP: GENERAL
rules:
  - name: map-facility
    kind: field
    strategy: lookup
    path: MSH-4
    table: facilities
  - name: upper-family-name
    kind: field
    strategy: uppercase
    path: PID-5-1
  - name: default-sex
    kind: field
    strategy: default-if-empty
    path: PID-8
    value: U
  - name: drop-evn
    kind: segment
    strategy: remove
    segment: EVN
    when:
      message_type: ADT
  - name: mrn-only
    kind: segment
    strategy: keep-patient-identifier
    segment: PID
    type_code: MRN
  - name: lab-only
    kind: message
    strategy: set
    path: MSH-5
    value: LIS
    when:
      path: MSH-3
      equals: LAB
  - name: version
    kind: message
    strategy: change-version
    value: "2.3"
"#;

    #[test]
    fn processes_rules_in_order() {
        let pipeline =
            Pipeline::from_config(&RulesConfig::parse(RULES).expect("parse")).expect("build");
        assert_eq!(pipeline.len(), 7);

        let mut msg = Hl7Message::parse(ADT).expect("parse message");
        let report = pipeline.process(&mut msg).expect("process");
        assert_eq!(
            report,
            ProcessReport {
                applied: 5,
                unchanged: 1,
                skipped: 1,
            }
        );
        assert!(report.changed());
        assert!(msg.is_dirty());
        assert_eq!(
            msg.to_string(),
            "MSH|^~\\&|ADT|GENERAL|EHR|CLINIC|20240101||ADT^A01|7|P|2.3\r\
PID|1||123^^^^MRN||DOE^john||19800101|U\r\
NK1|1|DOE^JANE"
        );
    }

    #[test]
    fn empty_pipeline_leaves_message_untouched() {
        let mut msg = Hl7Message::parse(ADT).expect("parse message");
        let report = Pipeline::empty().process(&mut msg).expect("process");
        assert_eq!(report, ProcessReport::default());
        assert!(!msg.is_dirty());
        assert_eq!(msg.to_string(), ADT);
    }

    #[test]
    fn field_rules_skip_absent_segments() {
        let config = RulesConfig::parse(
            "rules:\n  - name: obx\n    kind: field\n    strategy: trim\n    path: OBX-5\n",
        )
        .expect("parse");
        let pipeline = Pipeline::from_config(&config).expect("build");
        let mut msg = Hl7Message::parse(ADT).expect("parse message");
        let report = pipeline.process(&mut msg).expect("process");
        assert_eq!(report.unchanged, 1);
    }

    #[test]
    fn load_reads_rules_file() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        file.write_all(RULES.as_bytes()).expect("write rules");
        let pipeline = Pipeline::load(file.path()).expect("load");
        assert_eq!(pipeline.rule_names().next(), Some("map-facility"));
    }

    #[test]
    fn load_fails_for_unknown_strategy() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        file.write_all(b"rules:\n  - name: a\n    kind: message\n    strategy: nope\n")
            .expect("write rules");
        match Pipeline::load(file.path()) {
            Err(TransformError::UnknownStrategy { kind, name }) => {
                assert_eq!(kind, "message");
                assert_eq!(name, "nope");
            }
            other => panic!("expected UnknownStrategy, got {other:?}"),
        }
    }
}
