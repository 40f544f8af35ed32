//! Typed view over the MSH (message header) segment.

use crate::field::Field;
use crate::segment::Segment;
use crate::{Hl7Error, Hl7Result};
use std::ops::{Deref, DerefMut};

pub const ENCODING_CHARACTERS_FIELD: usize = 2;
pub const SENDING_APPLICATION: usize = 3;
pub const SENDING_FACILITY: usize = 4;
pub const RECEIVING_APPLICATION: usize = 5;
pub const RECEIVING_FACILITY: usize = 6;
pub const DATE_TIME_OF_MESSAGE: usize = 7;
pub const MESSAGE_TYPE: usize = 9;
pub const MESSAGE_CONTROL_ID: usize = 10;
pub const PROCESSING_ID: usize = 11;
pub const VERSION_ID: usize = 12;

/// Header accessors over a borrowed MSH segment.
///
/// `S` is `&Segment` for read-only access or `&mut Segment` when the header is edited.
#[derive(Debug)]
pub struct MshSegment<S> {
    segment: S,
}

impl<S: Deref<Target = Segment>> MshSegment<S> {
    /// Wraps `segment`, which must be an MSH segment.
    pub fn new(segment: S) -> Hl7Result<Self> {
        if !segment.is_msh() {
            return Err(Hl7Error::InvalidStructure(format!(
                "expected MSH segment, found {}",
                segment.name()
            )));
        }
        Ok(Self { segment })
    }

    pub fn segment(&self) -> &Segment {
        &self.segment
    }

    fn component(&self, field: usize, component: usize) -> Option<String> {
        self.segment
            .field(field)
            .and_then(|f| f.repetition(0))
            .and_then(|r| r.subfield_value(component))
            .filter(|v| !v.is_empty())
    }

    fn value(&self, field: usize) -> Option<String> {
        self.segment.field_value(field).filter(|v| !v.is_empty())
    }

    /// Encoding characters as declared by the inbound message (MSH-2).
    pub fn encoding_characters(&self) -> Option<String> {
        self.value(ENCODING_CHARACTERS_FIELD)
    }

    pub fn sending_application(&self) -> Option<String> {
        self.value(SENDING_APPLICATION)
    }

    pub fn sending_facility(&self) -> Option<String> {
        self.value(SENDING_FACILITY)
    }

    pub fn receiving_application(&self) -> Option<String> {
        self.value(RECEIVING_APPLICATION)
    }

    pub fn receiving_facility(&self) -> Option<String> {
        self.value(RECEIVING_FACILITY)
    }

    pub fn date_time(&self) -> Option<String> {
        self.value(DATE_TIME_OF_MESSAGE)
    }

    /// The message type field (MSH-9), for example `ADT^A01^ADT_A01`.
    pub fn message_type_field(&self) -> Option<&Field> {
        self.segment.field(MESSAGE_TYPE)
    }

    pub fn message_type(&self) -> Option<String> {
        self.value(MESSAGE_TYPE)
    }

    /// MSH-9.1, for example `ADT`.
    pub fn message_code(&self) -> Option<String> {
        self.component(MESSAGE_TYPE, 0)
    }

    /// MSH-9.2, for example `A01`.
    pub fn trigger_event(&self) -> Option<String> {
        self.component(MESSAGE_TYPE, 1)
    }

    pub fn control_id(&self) -> Option<String> {
        self.value(MESSAGE_CONTROL_ID)
    }

    pub fn processing_id(&self) -> Option<String> {
        self.value(PROCESSING_ID)
    }

    pub fn version(&self) -> Option<String> {
        self.value(VERSION_ID)
    }
}

impl<S: DerefMut<Target = Segment>> MshSegment<S> {
    pub fn segment_mut(&mut self) -> &mut Segment {
        &mut self.segment
    }

    /// Sets MSH-12 to `version`.
    pub fn change_message_version(&mut self, version: &str) -> Hl7Result<()> {
        self.segment.set_field_value(VERSION_ID, version)
    }

    pub fn set_message_type(&mut self, message_type: &str) -> Hl7Result<()> {
        self.segment.set_field_value(MESSAGE_TYPE, message_type)
    }

    pub fn set_control_id(&mut self, control_id: &str) -> Hl7Result<()> {
        self.segment.set_field_value(MESSAGE_CONTROL_ID, control_id)
    }

    pub fn set_date_time(&mut self, timestamp: &str) -> Hl7Result<()> {
        self.segment.set_field_value(DATE_TIME_OF_MESSAGE, timestamp)
    }
}
