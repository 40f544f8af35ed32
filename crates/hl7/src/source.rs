//! The parsed message the segment tree is built from and committed back to.
//!
//! [`SourceMessage`] is the seam to a structure-aware HL7 parser. The tree never creates a
//! source message itself; it reads the encoded text out of one and writes the reassembled
//! text back into the same instance on commit.

use crate::{Hl7Error, Hl7Result};
use hl7_types::SegmentName;

/// A mutable, already-parsed message that can be re-populated from encoded text.
pub trait SourceMessage {
    /// Encoded ER7 text of the message.
    fn encode(&self) -> String;

    /// Replaces the message content by parsing `text`.
    ///
    /// Implementations must leave the message unchanged when parsing fails.
    fn parse(&mut self, text: &str) -> Hl7Result<()>;
}

/// A structurally validated ER7 message.
///
/// Validation checks that the message starts with an MSH segment using `|` as field
/// separator and that every segment has a valid identifier. Segment terminators are
/// normalised to `\r`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawMessage {
    text: String,
}

impl RawMessage {
    pub fn parse(text: &str) -> Hl7Result<Self> {
        Ok(Self {
            text: validate(text)?,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn into_string(self) -> String {
        self.text
    }
}

impl SourceMessage for RawMessage {
    fn encode(&self) -> String {
        self.text.clone()
    }

    fn parse(&mut self, text: &str) -> Hl7Result<()> {
        self.text = validate(text)?;
        Ok(())
    }
}

impl std::str::FromStr for RawMessage {
    type Err = Hl7Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RawMessage::parse(s)
    }
}

/// Splits encoded text into segment lines, accepting `\r`, `\n` and `\r\n` terminators and
/// skipping blank lines.
pub(crate) fn segment_lines(text: &str) -> impl Iterator<Item = &str> {
    text.split(['\r', '\n']).filter(|line| !line.trim().is_empty())
}

fn validate(text: &str) -> Hl7Result<String> {
    let lines: Vec<&str> = segment_lines(text).collect();
    let Some(first) = lines.first() else {
        return Err(Hl7Error::Parse("message is empty".into()));
    };

    if !first.starts_with("MSH|") {
        return Err(Hl7Error::Parse(
            "message must start with an MSH segment using '|' as field separator".into(),
        ));
    }

    for (idx, line) in lines.iter().enumerate() {
        let name = line.split('|').next().unwrap_or_default();
        if !SegmentName::is_valid(name) {
            return Err(Hl7Error::Parse(format!(
                "segment {} has an invalid identifier '{name}'",
                idx + 1
            )));
        }
    }

    Ok(lines.join("\r"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalises_terminators() {
        let raw = RawMessage::parse("MSH|^~\\&|A\r\nPID|1\nEVN|A01\r").expect("valid");
        assert_eq!(raw.as_str(), "MSH|^~\\&|A\rPID|1\rEVN|A01");
    }

    #[test]
    fn rejects_missing_msh() {
        match RawMessage::parse("PID|1\rEVN|A01") {
            Err(Hl7Error::Parse(msg)) => assert!(msg.contains("MSH")),
            other => panic!("expected Parse error, got {other:?}"),
        }
    }

    #[test]
    fn rejects_empty_message() {
        assert!(RawMessage::parse("\r\n\r").is_err());
    }

    #[test]
    fn rejects_invalid_segment_identifier() {
        match RawMessage::parse("MSH|^~\\&|A\rpid|1") {
            Err(Hl7Error::Parse(msg)) => assert!(msg.contains("segment 2")),
            other => panic!("expected Parse error, got {other:?}"),
        }
    }

    #[test]
    fn failed_reparse_leaves_message_unchanged() {
        let mut raw = RawMessage::parse("MSH|^~\\&|A").expect("valid");
        assert!(SourceMessage::parse(&mut raw, "garbage").is_err());
        assert_eq!(raw.encode(), "MSH|^~\\&|A");
    }
}
