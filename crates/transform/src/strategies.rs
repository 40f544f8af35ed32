//! Strategy traits and the built-in strategies.
//!
//! There are three strategy families, matching [`RuleKind`](crate::RuleKind):
//! - [`FieldCodeTransformation`] maps one coded value to another
//! - [`MessageCodeTransformation`] edits the message as a whole
//! - [`SegmentAction`] acts on the segments of one type
//!
//! Strategies are constructed once, when the rules are loaded, and are then shared across
//! every message the pipeline processes.

use crate::lookup::LookupTable;
use crate::TransformResult;
use hl7::{Hl7Message, Terser, TerserPath};
use hl7_types::SegmentName;
use std::fmt;
use std::sync::Arc;

/// Maps a coded value to a new value.
pub trait FieldCodeTransformation: fmt::Debug + Send + Sync {
    fn name(&self) -> &str;

    /// Returns the replacement for `code`, or `None` to leave the value as it is.
    fn transform(&self, code: &str) -> Option<String>;
}

/// Edits a whole message.
pub trait MessageCodeTransformation: fmt::Debug + Send + Sync {
    fn name(&self) -> &str;

    /// Applies the edit, returning whether the message changed.
    fn apply(&self, message: &mut Hl7Message) -> TransformResult<bool>;
}

/// Acts on every segment of one type.
pub trait SegmentAction: fmt::Debug + Send + Sync {
    fn name(&self) -> &str;

    /// Applies the action to segments named `segment`, returning whether the message changed.
    fn apply(&self, message: &mut Hl7Message, segment: SegmentName) -> TransformResult<bool>;
}

// ----------------------------------------------------------------------------
// Field strategies
// ----------------------------------------------------------------------------

/// Translates codes through a named lookup table.
#[derive(Debug, Clone)]
pub struct LookupCode {
    table: Arc<dyn LookupTable>,
}

impl LookupCode {
    pub fn new(table: Arc<dyn LookupTable>) -> Self {
        Self { table }
    }
}

impl FieldCodeTransformation for LookupCode {
    fn name(&self) -> &str {
        "lookup"
    }

    fn transform(&self, code: &str) -> Option<String> {
        if code.is_empty() {
            return None;
        }
        let mapped = self.table.lookup(code);
        if mapped.is_none() {
            tracing::warn!(code, "no lookup mapping for code");
        }
        mapped
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Uppercase;

impl FieldCodeTransformation for Uppercase {
    fn name(&self) -> &str {
        "uppercase"
    }

    fn transform(&self, code: &str) -> Option<String> {
        Some(code.to_uppercase())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Lowercase;

impl FieldCodeTransformation for Lowercase {
    fn name(&self) -> &str {
        "lowercase"
    }

    fn transform(&self, code: &str) -> Option<String> {
        Some(code.to_lowercase())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Trim;

impl FieldCodeTransformation for Trim {
    fn name(&self) -> &str {
        "trim"
    }

    fn transform(&self, code: &str) -> Option<String> {
        Some(code.trim().to_owned())
    }
}

/// Fills an empty value with a fixed one.
#[derive(Debug, Clone)]
pub struct DefaultIfEmpty {
    value: String,
}

impl DefaultIfEmpty {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
        }
    }
}

impl FieldCodeTransformation for DefaultIfEmpty {
    fn name(&self) -> &str {
        "default-if-empty"
    }

    fn transform(&self, code: &str) -> Option<String> {
        code.is_empty().then(|| self.value.clone())
    }
}

// ----------------------------------------------------------------------------
// Message strategies
// ----------------------------------------------------------------------------

/// Writes a fixed value at a path.
#[derive(Debug, Clone)]
pub struct SetValue {
    path: TerserPath,
    value: String,
}

impl SetValue {
    pub fn new(path: TerserPath, value: impl Into<String>) -> Self {
        Self {
            path,
            value: value.into(),
        }
    }
}

impl MessageCodeTransformation for SetValue {
    fn name(&self) -> &str {
        "set"
    }

    fn apply(&self, message: &mut Hl7Message) -> TransformResult<bool> {
        if Terser::get(message, &self.path).as_deref() == Some(self.value.as_str()) {
            return Ok(false);
        }
        Terser::set(message, &self.path, &self.value)?;
        Ok(true)
    }
}

/// Copies the value at one path to another.
#[derive(Debug, Clone)]
pub struct CopyValue {
    from: TerserPath,
    to: TerserPath,
}

impl CopyValue {
    pub fn new(from: TerserPath, to: TerserPath) -> Self {
        Self { from, to }
    }
}

impl MessageCodeTransformation for CopyValue {
    fn name(&self) -> &str {
        "copy"
    }

    fn apply(&self, message: &mut Hl7Message) -> TransformResult<bool> {
        let Some(value) = Terser::get(message, &self.from) else {
            return Ok(false);
        };
        if Terser::get(message, &self.to).as_deref() == Some(value.as_str()) {
            return Ok(false);
        }
        Terser::set(message, &self.to, &value)?;
        Ok(true)
    }
}

#[derive(Debug, Clone)]
pub struct ClearValue {
    path: TerserPath,
}

impl ClearValue {
    pub fn new(path: TerserPath) -> Self {
        Self { path }
    }
}

impl MessageCodeTransformation for ClearValue {
    fn name(&self) -> &str {
        "clear"
    }

    fn apply(&self, message: &mut Hl7Message) -> TransformResult<bool> {
        Ok(Terser::clear(message, &self.path)?)
    }
}

/// Joins the non-empty values at several paths into a target path.
#[derive(Debug, Clone)]
pub struct ConcatenateValues {
    target: TerserPath,
    sources: Vec<TerserPath>,
    separator: String,
}

impl ConcatenateValues {
    pub fn new(target: TerserPath, sources: Vec<TerserPath>, separator: impl Into<String>) -> Self {
        Self {
            target,
            sources,
            separator: separator.into(),
        }
    }
}

impl MessageCodeTransformation for ConcatenateValues {
    fn name(&self) -> &str {
        "concatenate"
    }

    fn apply(&self, message: &mut Hl7Message) -> TransformResult<bool> {
        let joined = self
            .sources
            .iter()
            .filter_map(|source| Terser::get(message, source))
            .filter(|value| !value.is_empty())
            .collect::<Vec<_>>()
            .join(&self.separator);
        if Terser::get(message, &self.target).as_deref() == Some(joined.as_str()) {
            return Ok(false);
        }
        Terser::set(message, &self.target, &joined)?;
        Ok(true)
    }
}

/// Rewrites MSH-12.
#[derive(Debug, Clone)]
pub struct ChangeVersion {
    version: String,
}

impl ChangeVersion {
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
        }
    }
}

impl MessageCodeTransformation for ChangeVersion {
    fn name(&self) -> &str {
        "change-version"
    }

    fn apply(&self, message: &mut Hl7Message) -> TransformResult<bool> {
        if message.version().as_deref() == Some(self.version.as_str()) {
            return Ok(false);
        }
        match message.msh_mut(|msh| msh.change_message_version(&self.version)) {
            Some(result) => {
                result?;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

// ----------------------------------------------------------------------------
// Segment actions
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default)]
pub struct RemoveSegments;

impl SegmentAction for RemoveSegments {
    fn name(&self) -> &str {
        "remove"
    }

    fn apply(&self, message: &mut Hl7Message, segment: SegmentName) -> TransformResult<bool> {
        Ok(message.remove_all_matching_segments(segment.as_str()) > 0)
    }
}

/// Keeps the first occurrence of a segment type and removes the rest.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeepFirstSegment;

impl SegmentAction for KeepFirstSegment {
    fn name(&self) -> &str {
        "keep-first"
    }

    fn apply(&self, message: &mut Hl7Message, segment: SegmentName) -> TransformResult<bool> {
        Ok(message.keep_only_occurrence(segment.as_str(), 0) > 0)
    }
}

/// Inserts a copy of the first occurrence directly after it.
#[derive(Debug, Clone, Copy, Default)]
pub struct DuplicateSegment;

impl SegmentAction for DuplicateSegment {
    fn name(&self) -> &str {
        "duplicate"
    }

    fn apply(&self, message: &mut Hl7Message, segment: SegmentName) -> TransformResult<bool> {
        let Some(index) = message.first_segment_index(segment.as_str()) else {
            return Ok(false);
        };
        message.duplicate_segment(index)?;
        Ok(true)
    }
}

/// Reduces PID-3 to the identifiers of one type.
#[derive(Debug, Clone)]
pub struct KeepPatientIdentifier {
    type_code: String,
}

impl KeepPatientIdentifier {
    pub fn new(type_code: impl Into<String>) -> Self {
        Self {
            type_code: type_code.into(),
        }
    }
}

impl SegmentAction for KeepPatientIdentifier {
    fn name(&self) -> &str {
        "keep-patient-identifier"
    }

    fn apply(&self, message: &mut Hl7Message, segment: SegmentName) -> TransformResult<bool> {
        if segment != SegmentName::PID {
            return Ok(false);
        }
        let removed = message
            .pid_mut(|pid| pid.remove_other_patient_identifier_fields(&self.type_code))
            .unwrap_or_default();
        Ok(removed > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lookup::MapLookupTable;

    const ADT: &str = "MSH|^~\\&|ADT|HOSP|EHR|CLINIC|20240101||ADT^A01|7|P|2.3\r\
EVN|A01|20240101\r\
PID|1||123^^^^MRN~456^^^^SSN||DOE^JOHN\r\
NK1|1|DOE^JANE\r\
NK1|2|DOE^JIM";

    fn message() -> Hl7Message {
        Hl7Message::parse(ADT).expect("parse")
    }

    fn path(text: &str) -> TerserPath {
        TerserPath::parse(text).expect("path")
    }

    #[test]
    fn field_strategies_transform_codes() {
        let table: MapLookupTable = [("HOSP".to_owned(), "GENERAL".to_owned())]
            .into_iter()
            .collect();
        let lookup = LookupCode::new(Arc::new(table));
        assert_eq!(lookup.transform("HOSP").as_deref(), Some("GENERAL"));
        assert_eq!(lookup.transform("OTHER"), None);
        assert_eq!(lookup.transform(""), None);

        assert_eq!(Uppercase.transform("abc").as_deref(), Some("ABC"));
        assert_eq!(Lowercase.transform("ABC").as_deref(), Some("abc"));
        assert_eq!(Trim.transform("  x ").as_deref(), Some("x"));

        let default = DefaultIfEmpty::new("U");
        assert_eq!(default.transform("").as_deref(), Some("U"));
        assert_eq!(default.transform("F"), None);
    }

    #[test]
    fn set_and_copy_report_changes() {
        let mut msg = message();
        let set = SetValue::new(path("PID-8"), "M");
        assert!(set.apply(&mut msg).expect("set"));
        assert!(!set.apply(&mut msg).expect("set again"));

        let copy = CopyValue::new(path("MSH-4"), path("PID-18"));
        assert!(copy.apply(&mut msg).expect("copy"));
        assert_eq!(Terser::get(&msg, &path("PID-18")).as_deref(), Some("HOSP"));

        let missing = CopyValue::new(path("PID-30"), path("PID-19"));
        assert!(!missing.apply(&mut msg).expect("copy"));
    }

    #[test]
    fn concatenate_skips_empty_sources() {
        let mut msg = message();
        let concat = ConcatenateValues::new(
            path("NK1-3"),
            vec![path("PID-5-2"), path("PID-7"), path("PID-5-1")],
            " ",
        );
        assert!(concat.apply(&mut msg).expect("concatenate"));
        assert_eq!(Terser::get(&msg, &path("NK1-3")).as_deref(), Some("JOHN DOE"));
    }

    #[test]
    fn clear_and_change_version() {
        let mut msg = message();
        assert!(ClearValue::new(path("PID-5-2")).apply(&mut msg).expect("clear"));
        assert_eq!(Terser::get(&msg, &path("PID-5-2")).as_deref(), Some(""));

        let change = ChangeVersion::new("2.5");
        assert!(change.apply(&mut msg).expect("change"));
        assert_eq!(msg.version().as_deref(), Some("2.5"));
        assert!(!change.apply(&mut msg).expect("change again"));
    }

    #[test]
    fn segment_actions() {
        let mut msg = message();
        assert!(RemoveSegments.apply(&mut msg, SegmentName::parse("EVN").expect("name")).expect("remove"));
        assert_eq!(msg.segment_names(), vec!["MSH", "PID", "NK1", "NK1"]);

        let nk1 = SegmentName::parse("NK1").expect("name");
        assert!(DuplicateSegment.apply(&mut msg, nk1).expect("duplicate"));
        assert_eq!(msg.segment_count("NK1"), 3);
        assert!(KeepFirstSegment.apply(&mut msg, nk1).expect("keep first"));
        assert_eq!(msg.segment_count("NK1"), 1);
        assert!(!KeepFirstSegment.apply(&mut msg, nk1).expect("keep first again"));
        assert!(!RemoveSegments.apply(&mut msg, SegmentName::parse("ZZZ").expect("name")).expect("remove"));
    }

    #[test]
    fn keep_patient_identifier_collapses_pid3() {
        let mut msg = message();
        let keep = KeepPatientIdentifier::new("MRN");
        assert!(keep.apply(&mut msg, SegmentName::PID).expect("keep"));
        assert_eq!(
            msg.segment_named("PID", 0).map(ToString::to_string).as_deref(),
            Some("PID|1||123^^^^MRN||DOE^JOHN")
        );
        let mut unchanged = Hl7Message::parse(&msg.to_string()).expect("parse");
        assert!(!keep.apply(&mut unchanged, SegmentName::PID).expect("keep again"));
        assert!(!unchanged.is_dirty());
    }
}
