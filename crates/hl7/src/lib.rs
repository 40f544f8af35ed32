//! Mutable HL7v2 text model.
//!
//! This crate parses pipe-delimited HL7v2 text into an owned tree and serialises it back:
//!
//! ```text
//! Hl7Message ─ Segment ─ Field ─ FieldRepetition ─ Subfield ─ SubSubfield
//!    (\r)        (|)      (~)          (^)            (&)
//! ```
//!
//! The tree is a working copy of a [`SourceMessage`]. Mutations only touch the tree and mark
//! the message dirty; [`Hl7Message::commit`] writes the reassembled text back into the source
//! in one step.
//!
//! Field numbering follows the HL7 standard: field 0 is the segment name, so `PID-3` is
//! `segment.field(3)`. For MSH the field separator is held as field 1 and the encoding
//! characters as field 2, keeping `MSH-9` at index 9.
//!
//! Delimiters are always the defaults `|^~\&`. MSH is re-emitted with the default header even
//! when the inbound message declared other encoding characters.

pub mod ack;
pub mod escape;
pub mod field;
pub mod message;
pub mod msh;
pub mod pid;
pub mod repetition;
pub mod segment;
pub mod source;
pub mod sub_subfield;
pub mod subfield;
pub mod terser;

pub use ack::AckCode;
pub use field::Field;
pub use message::Hl7Message;
pub use msh::MshSegment;
pub use pid::PidSegment;
pub use repetition::FieldRepetition;
pub use segment::Segment;
pub use source::{RawMessage, SourceMessage};
pub use sub_subfield::SubSubfield;
pub use subfield::Subfield;
pub use terser::{Terser, TerserPath};

pub use hl7_types::SegmentName;

/// Segment terminator used when serialising a message.
pub const SEGMENT_SEPARATOR: char = '\r';
pub const FIELD_SEPARATOR: char = '|';
pub const REPETITION_SEPARATOR: char = '~';
pub const COMPONENT_SEPARATOR: char = '^';
pub const SUBCOMPONENT_SEPARATOR: char = '&';
/// Default MSH-2 value.
pub const ENCODING_CHARACTERS: &str = "^~\\&";

/// Errors returned by the HL7 text model.
#[derive(Debug, thiserror::Error)]
pub enum Hl7Error {
    #[error("failed to parse HL7 message: {0}")]
    Parse(String),

    #[error("invalid message structure: {0}")]
    InvalidStructure(String),

    #[error("{kind} index {index} out of range (length {len})")]
    IndexOutOfRange {
        kind: &'static str,
        index: usize,
        len: usize,
    },

    #[error("invalid path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("segment not found: {0}")]
    SegmentNotFound(String),

    #[error("{segment}-{index} is reserved and cannot be modified")]
    ReservedField { segment: String, index: usize },

    #[error(transparent)]
    Type(#[from] hl7_types::TypeError),
}

/// Type alias for Results that can fail with an [`Hl7Error`].
pub type Hl7Result<T> = Result<T, Hl7Error>;

pub(crate) fn out_of_range(kind: &'static str, index: usize, len: usize) -> Hl7Error {
    Hl7Error::IndexOutOfRange { kind, index, len }
}
