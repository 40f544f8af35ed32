//! Acknowledgement (ACK) message construction.

use crate::message::Hl7Message;
use crate::msh::MshSegment;
use crate::segment::Segment;
use crate::{escape, Hl7Error, Hl7Result};
use chrono::{DateTime, Utc};
use std::fmt;
use std::str::FromStr;

/// MSH-10 is limited to 20 characters in v2.3 and later.
const MAX_CONTROL_ID_LEN: usize = 20;

/// Acknowledgement code carried in MSA-1.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AckCode {
    /// Original mode: application accept.
    AA,
    /// Original mode: application error.
    AE,
    /// Original mode: application reject.
    AR,
    /// Enhanced mode: commit accept.
    CA,
    /// Enhanced mode: commit error.
    CE,
    /// Enhanced mode: commit reject.
    CR,
}

impl AckCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AA => "AA",
            Self::AE => "AE",
            Self::AR => "AR",
            Self::CA => "CA",
            Self::CE => "CE",
            Self::CR => "CR",
        }
    }

    pub fn is_accept(&self) -> bool {
        matches!(self, Self::AA | Self::CA)
    }
}

impl fmt::Display for AckCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AckCode {
    type Err = Hl7Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "AA" => Ok(Self::AA),
            "AE" => Ok(Self::AE),
            "AR" => Ok(Self::AR),
            "CA" => Ok(Self::CA),
            "CE" => Ok(Self::CE),
            "CR" => Ok(Self::CR),
            _ => Err(Hl7Error::Parse(format!("invalid acknowledgement code: {s}"))),
        }
    }
}

/// Builds an acknowledgement for `message` using the current time and a fresh control id.
pub fn build_ack(message: &Hl7Message, code: AckCode, text: Option<&str>) -> Hl7Result<Hl7Message> {
    let control_id: String = uuid::Uuid::new_v4()
        .simple()
        .to_string()
        .chars()
        .take(MAX_CONTROL_ID_LEN)
        .collect();
    build_ack_at(message, code, text, Utc::now(), &control_id)
}

/// Builds an acknowledgement with an explicit timestamp and control id.
///
/// Sending and receiving application/facility are swapped, processing id and version are
/// copied from the original header, and MSA-2 echoes the original control id.
///
/// # Errors
///
/// Returns [`Hl7Error::InvalidStructure`] if `message` has no MSH segment.
pub fn build_ack_at(
    message: &Hl7Message,
    code: AckCode,
    text: Option<&str>,
    timestamp: DateTime<Utc>,
    control_id: &str,
) -> Hl7Result<Hl7Message> {
    let original = message
        .msh()
        .ok_or_else(|| Hl7Error::InvalidStructure("cannot acknowledge a message without MSH".into()))?;

    let message_type = match original.trigger_event() {
        Some(trigger) => format!("ACK^{trigger}^ACK"),
        None => "ACK".to_owned(),
    };

    let mut header = Segment::new(hl7_types::SegmentName::MSH);
    let mut msh = MshSegment::new(&mut header)?;
    let seg = msh.segment_mut();
    seg.set_field_value(3, &original.receiving_application().unwrap_or_default())?;
    seg.set_field_value(4, &original.receiving_facility().unwrap_or_default())?;
    seg.set_field_value(5, &original.sending_application().unwrap_or_default())?;
    seg.set_field_value(6, &original.sending_facility().unwrap_or_default())?;
    msh.set_date_time(&timestamp.format("%Y%m%d%H%M%S%z").to_string())?;
    msh.set_message_type(&message_type)?;
    msh.set_control_id(control_id)?;
    msh.segment_mut()
        .set_field_value(11, &original.processing_id().unwrap_or_else(|| "P".into()))?;
    msh.change_message_version(&original.version().unwrap_or_else(|| "2.3".into()))?;

    let mut msa = Segment::new(hl7_types::SegmentName::MSA);
    msa.set_field_value(1, code.as_str())?;
    msa.set_field_value(2, &original.control_id().unwrap_or_default())?;
    if let Some(text) = text.filter(|t| !t.is_empty()) {
        msa.set_field_value(3, &escape::escape(text))?;
    }

    tracing::debug!(
        code = code.as_str(),
        acknowledged = original.control_id().as_deref().unwrap_or(""),
        "built acknowledgement"
    );
    Hl7Message::from_segments(vec![header, msa])
}
