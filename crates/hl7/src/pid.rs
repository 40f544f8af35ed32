//! Patient identifier helpers over the PID segment.
//!
//! PID-3 (patient identifier list) repeats one CX value per identifier. Each repetition is
//! matched on its identifier type code, component 5 (index 4), for example `MRN` in
//! `123^^^HOSP^MRN`.

use crate::field::Field;
use crate::repetition::FieldRepetition;
use crate::segment::Segment;
use crate::{Hl7Error, Hl7Result};
use hl7_types::SegmentName;
use std::ops::{Deref, DerefMut};

pub const PATIENT_IDENTIFIER_LIST: usize = 3;
/// Component index of the identifier type code within a CX repetition.
pub const IDENTIFIER_TYPE_CODE: usize = 4;
/// Component index of the identifier value within a CX repetition.
pub const IDENTIFIER_VALUE: usize = 0;

#[derive(Debug)]
pub struct PidSegment<S> {
    segment: S,
}

fn has_type_code(repetition: &FieldRepetition, type_code: &str) -> bool {
    repetition
        .subfield(IDENTIFIER_TYPE_CODE)
        .is_some_and(|s| s.value() == type_code)
}

impl<S: Deref<Target = Segment>> PidSegment<S> {
    pub fn new(segment: S) -> Hl7Result<Self> {
        if segment.segment_name() != SegmentName::PID {
            return Err(Hl7Error::InvalidStructure(format!(
                "expected PID segment, found {}",
                segment.name()
            )));
        }
        Ok(Self { segment })
    }

    pub fn segment(&self) -> &Segment {
        &self.segment
    }

    /// All PID-3 repetitions, or an empty slice if the field is absent.
    pub fn patient_identifiers(&self) -> &[FieldRepetition] {
        self.segment
            .field(PATIENT_IDENTIFIER_LIST)
            .map(Field::repetitions)
            .unwrap_or_default()
    }

    /// The first identifier whose type code equals `type_code`.
    pub fn patient_identifier(&self, type_code: &str) -> Option<&FieldRepetition> {
        self.patient_identifiers()
            .iter()
            .find(|rep| has_type_code(rep, type_code))
    }

    /// The identifier value (CX.1) of the first identifier of type `type_code`.
    pub fn patient_identifier_value(&self, type_code: &str) -> Option<String> {
        self.patient_identifier(type_code)
            .and_then(|rep| rep.subfield_value(IDENTIFIER_VALUE))
    }
}

impl<S: DerefMut<Target = Segment>> PidSegment<S> {
    /// Removes every identifier of type `type_code`, returning how many were removed.
    pub fn remove_patient_identifier(&mut self, type_code: &str) -> usize {
        match self.segment.field_mut(PATIENT_IDENTIFIER_LIST) {
            Some(field) => field.retain_repetitions(|rep| !has_type_code(rep, type_code)),
            None => 0,
        }
    }

    /// Keeps only identifiers of type `type_code`, returning how many others were removed.
    pub fn remove_other_patient_identifier_fields(&mut self, type_code: &str) -> usize {
        match self.segment.field_mut(PATIENT_IDENTIFIER_LIST) {
            Some(field) => field.retain_repetitions(|rep| has_type_code(rep, type_code)),
            None => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PID: &str = "PID|1||123^^^^MRN~456^^^^SSN~789^^^^MRN||DOE^JOHN";

    #[test]
    fn finds_identifier_by_type_code() {
        let segment = Segment::parse("PID|1||123^^^^MRN~456^^^^SSN").expect("parse");
        let pid = PidSegment::new(&segment).expect("PID view");
        assert_eq!(pid.patient_identifier_value("MRN").as_deref(), Some("123"));
        assert_eq!(pid.patient_identifier_value("SSN").as_deref(), Some("456"));
        assert_eq!(pid.patient_identifier_value("NHS"), None);
        assert_eq!(pid.patient_identifiers().len(), 2);
    }

    #[test]
    fn remove_other_identifiers_keeps_only_matching_type() {
        let mut segment = Segment::parse("PID|1||123^^^^MRN~456^^^^SSN").expect("parse");
        let removed = PidSegment::new(&mut segment)
            .expect("PID view")
            .remove_other_patient_identifier_fields("MRN");
        assert_eq!(removed, 1);
        assert_eq!(segment.to_string(), "PID|1||123^^^^MRN");
    }

    #[test]
    fn remove_identifier_drops_all_matching_repetitions() {
        let mut segment = Segment::parse(PID).expect("parse");
        let removed = PidSegment::new(&mut segment)
            .expect("PID view")
            .remove_patient_identifier("MRN");
        assert_eq!(removed, 2);
        assert_eq!(segment.to_string(), "PID|1||456^^^^SSN||DOE^JOHN");
    }

    #[test]
    fn removing_every_identifier_leaves_empty_field() {
        let mut segment = Segment::parse("PID|1||456^^^^SSN|").expect("parse");
        PidSegment::new(&mut segment)
            .expect("PID view")
            .remove_other_patient_identifier_fields("MRN");
        assert_eq!(segment.to_string(), "PID|1|||");
    }

    #[test]
    fn missing_identifier_field_is_not_an_error() {
        let mut segment = Segment::parse("PID|1").expect("parse");
        let mut pid = PidSegment::new(&mut segment).expect("PID view");
        assert!(pid.patient_identifiers().is_empty());
        assert_eq!(pid.remove_patient_identifier("MRN"), 0);
    }

    #[test]
    fn rejects_non_pid_segment() {
        let segment = Segment::parse("PV1|1").expect("parse");
        assert!(PidSegment::new(&segment).is_err());
    }
}
