//! FHIR `Communication` wire model and HL7v2 translation helpers.
//!
//! Responsibilities:
//! - Define the public domain-level type [`CommunicationData`]
//! - Define a strict JSON wire model for serialisation/deserialisation
//! - Convert between HL7v2 messages and communications
//!
//! Only the subset of `Communication` the gateway produces is accepted on read:
//!
//! ```json
//! {
//!   "resourceType": "Communication",
//!   "id": "0b0f3d0e-3c55-4f5e-9d1b-2f7b1c0c9a11",
//!   "status": "completed",
//!   "sent": "2024-03-05T14:30:00Z",
//!   "identifier": [{ "value": "CTRL1" }],
//!   "topic": { "text": "ADT^A01" },
//!   "payload": [
//!     { "contentAttachment": { "contentType": "x-application/hl7-v2+er7", "data": "TVNIfF5+XCZ8..." } }
//!   ]
//! }
//! ```

use crate::{FhirError, FhirResult};
use base64::{engine::general_purpose, Engine as _};
use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone, Utc};
use hl7::{Hl7Message, RawMessage};
use hl7_types::NonEmptyText;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// MIME type of an ER7-encoded HL7v2 attachment.
pub const HL7_V2_CONTENT_TYPE: &str = "x-application/hl7-v2+er7";

const RESOURCE_TYPE: &str = "Communication";

// ============================================================================
// Public domain-level types
// ============================================================================

/// FHIR `Communication.status`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CommunicationStatus {
    Preparation,
    InProgress,
    NotDone,
    OnHold,
    Stopped,
    Completed,
    EnteredInError,
    Unknown,
}

/// A communication carrying one HL7v2 message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommunicationData {
    /// Resource id.
    pub id: Uuid,

    pub status: CommunicationStatus,

    /// When the message was sent, from MSH-7.
    pub sent: Option<DateTime<Utc>>,

    /// Message control id, from MSH-10.
    pub identifier: Option<NonEmptyText>,

    /// Message type, from MSH-9 (for example `ADT^A01`).
    pub topic: Option<NonEmptyText>,

    /// The ER7 message, structurally validated.
    pub payload: RawMessage,
}

// ============================================================================
// Public operations
// ============================================================================

/// JSON operations for `Communication` resources.
///
/// This is a zero-sized type used for namespacing. All methods are associated functions.
pub struct Communication;

impl Communication {
    /// Parse a `Communication` from JSON text.
    ///
    /// # Errors
    ///
    /// Returns [`FhirError::Translation`] if the JSON does not match the wire schema (the
    /// message names the failing key, for example `payload[0].contentAttachment.data`), and
    /// [`FhirError::InvalidInput`] if the resource type, id, content type or attachment data
    /// is invalid.
    pub fn parse(json_text: &str) -> FhirResult<CommunicationData> {
        let mut deserializer = serde_json::Deserializer::from_str(json_text);

        let wire = match serde_path_to_error::deserialize::<_, CommunicationWire>(&mut deserializer)
        {
            Ok(parsed) => parsed,
            Err(err) => {
                let path = err.path().to_string();
                let source = err.into_inner();
                let path = if path.is_empty() || path == "." {
                    "<root>"
                } else {
                    path.as_str()
                };
                return Err(FhirError::Translation(format!(
                    "Communication schema mismatch at {path}: {source}"
                )));
            }
        };
        deserializer.end()?;

        wire_to_domain(wire)
    }

    /// Render a communication as JSON text.
    pub fn render(data: &CommunicationData) -> FhirResult<String> {
        Ok(serde_json::to_string_pretty(&domain_to_wire(data))?)
    }
}

/// Conversion between HL7v2 messages and communications.
pub struct CommunicationConverter;

impl CommunicationConverter {
    /// Wraps `message` in a new communication with a random id.
    pub fn from_hl7(message: &Hl7Message) -> FhirResult<CommunicationData> {
        Self::from_hl7_with_id(message, Uuid::new_v4())
    }

    pub fn from_hl7_with_id(message: &Hl7Message, id: Uuid) -> FhirResult<CommunicationData> {
        let payload = RawMessage::parse(&message.to_string())?;
        let msh = message
            .msh()
            .ok_or_else(|| FhirError::InvalidInput("message has no MSH segment".into()))?;

        Ok(CommunicationData {
            id,
            status: CommunicationStatus::Completed,
            sent: msh.date_time().as_deref().and_then(parse_hl7_timestamp),
            identifier: msh.control_id().and_then(|v| NonEmptyText::new(v).ok()),
            topic: msh.message_type().and_then(|v| NonEmptyText::new(v).ok()),
            payload,
        })
    }

    /// Parses the carried ER7 message.
    pub fn to_hl7(data: &CommunicationData) -> FhirResult<Hl7Message> {
        Ok(Hl7Message::from_source(&data.payload)?)
    }
}

// ============================================================================
// Wire types (internal)
// ============================================================================

#[derive(Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
struct CommunicationWire {
    resource_type: String,
    id: String,
    status: CommunicationStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    sent: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    identifier: Vec<IdentifierWire>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    topic: Option<CodeableConceptWire>,
    payload: Vec<PayloadWire>,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
struct IdentifierWire {
    value: String,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
struct CodeableConceptWire {
    text: String,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
struct PayloadWire {
    content_attachment: AttachmentWire,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
struct AttachmentWire {
    content_type: String,
    data: String,
}

// ============================================================================
// Helper functions (internal)
// ============================================================================

fn wire_to_domain(wire: CommunicationWire) -> FhirResult<CommunicationData> {
    if wire.resource_type != RESOURCE_TYPE {
        return Err(FhirError::InvalidInput(format!(
            "expected resourceType {RESOURCE_TYPE}, got {}",
            wire.resource_type
        )));
    }

    let id = Uuid::parse_str(&wire.id)
        .map_err(|_| FhirError::InvalidInput(format!("invalid id: {}", wire.id)))?;

    let [payload] = <[PayloadWire; 1]>::try_from(wire.payload).map_err(|p| {
        FhirError::InvalidInput(format!("expected exactly one payload, got {}", p.len()))
    })?;
    let attachment = payload.content_attachment;
    if attachment.content_type != HL7_V2_CONTENT_TYPE {
        return Err(FhirError::InvalidInput(format!(
            "unsupported payload contentType: {}",
            attachment.content_type
        )));
    }
    let bytes = general_purpose::STANDARD
        .decode(attachment.data.as_bytes())
        .map_err(|e| FhirError::InvalidInput(format!("payload data is not base64: {e}")))?;
    let text = String::from_utf8(bytes)
        .map_err(|_| FhirError::InvalidInput("payload data is not UTF-8".into()))?;

    let identifier = match wire.identifier.as_slice() {
        [] => None,
        [first, ..] => Some(NonEmptyText::new(&first.value).map_err(|_| {
            FhirError::Translation("empty value in identifier[0]".into())
        })?),
    };
    let topic = wire
        .topic
        .map(|t| {
            NonEmptyText::new(&t.text)
                .map_err(|_| FhirError::Translation("empty topic.text".into()))
        })
        .transpose()?;

    Ok(CommunicationData {
        id,
        status: wire.status,
        sent: wire.sent,
        identifier,
        topic,
        payload: RawMessage::parse(&text)?,
    })
}

fn domain_to_wire(data: &CommunicationData) -> CommunicationWire {
    CommunicationWire {
        resource_type: RESOURCE_TYPE.to_owned(),
        id: data.id.to_string(),
        status: data.status,
        sent: data.sent,
        identifier: data
            .identifier
            .iter()
            .map(|v| IdentifierWire {
                value: v.to_string(),
            })
            .collect(),
        topic: data.topic.as_ref().map(|t| CodeableConceptWire {
            text: t.to_string(),
        }),
        payload: vec![PayloadWire {
            content_attachment: AttachmentWire {
                content_type: HL7_V2_CONTENT_TYPE.to_owned(),
                data: general_purpose::STANDARD.encode(data.payload.as_str()),
            },
        }],
    }
}

/// Parses an HL7 `DTM` value (`YYYYMMDD[HH[MM[SS[.S+]]]][+/-ZZZZ]`).
///
/// Values without an offset are taken as UTC. Returns `None` for anything shorter than a
/// full date or with a partial date/time pair.
fn parse_hl7_timestamp(text: &str) -> Option<DateTime<Utc>> {
    let digits_end = text
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(text.len());
    let digits = &text[..digits_end];
    if digits.len() < 8 || digits.len() > 14 || digits.len() % 2 != 0 {
        return None;
    }
    let mut base = digits.to_owned();
    while base.len() < 14 {
        base.push('0');
    }
    let naive = NaiveDateTime::parse_from_str(&base, "%Y%m%d%H%M%S").ok()?;

    let mut rest = &text[digits_end..];
    if let Some(fraction) = rest.strip_prefix('.') {
        let end = fraction
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(fraction.len());
        rest = &fraction[end..];
    }

    if rest.is_empty() {
        return Some(Utc.from_utc_datetime(&naive));
    }
    let mut chars = rest.chars();
    let sign = match chars.next() {
        Some('+') => 1,
        Some('-') => -1,
        _ => return None,
    };
    let zone = chars.as_str();
    if zone.len() != 4 || !zone.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let hours: i32 = zone[..2].parse().ok()?;
    let minutes: i32 = zone[2..].parse().ok()?;
    let offset = FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))?;
    offset
        .from_local_datetime(&naive)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;

    const ADT: &str = "MSH|^~\\&|ADT|HOSP|EHR|CLINIC|20240305143000+0100||ADT^A01|CTRL1|P|2.4\r\
PID|1||123^^^^MRN||DOE^JOHN";

    fn message() -> Hl7Message {
        Hl7Message::parse(ADT).expect("parse")
    }

    fn id() -> Uuid {
        Uuid::parse_str("0b0f3d0e-3c55-4f5e-9d1b-2f7b1c0c9a11").expect("uuid")
    }

    #[test]
    fn lifts_header_values() {
        let data = CommunicationConverter::from_hl7_with_id(&message(), id()).expect("convert");
        assert_eq!(data.status, CommunicationStatus::Completed);
        assert_eq!(data.identifier.as_ref().map(|v| v.as_str()), Some("CTRL1"));
        assert_eq!(data.topic.as_ref().map(|v| v.as_str()), Some("ADT^A01"));
        assert_eq!(
            data.sent.map(|s| s.to_rfc3339()).as_deref(),
            Some("2024-03-05T13:30:00+00:00")
        );
        assert_eq!(data.payload.as_str(), ADT);
    }

    #[test]
    fn json_carries_message_unchanged() {
        let data = CommunicationConverter::from_hl7_with_id(&message(), id()).expect("convert");
        let json = Communication::render(&data).expect("render");
        assert!(json.contains("\"resourceType\": \"Communication\""));
        assert!(json.contains(HL7_V2_CONTENT_TYPE));

        let parsed = Communication::parse(&json).expect("parse");
        assert_eq!(parsed, data);
        let msg = CommunicationConverter::to_hl7(&parsed).expect("to hl7");
        assert_eq!(msg.to_string(), ADT);
    }

    fn json_with(payload: &str, resource_type: &str) -> String {
        format!(
            r#"{{"resourceType":"{resource_type}","id":"0b0f3d0e-3c55-4f5e-9d1b-2f7b1c0c9a11","status":"completed","payload":[{payload}]}}"#
        )
    }

    #[test]
    fn rejects_wrong_resource_type() {
        let data = general_purpose::STANDARD.encode(ADT);
        let json = json_with(
            &format!(r#"{{"contentAttachment":{{"contentType":"{HL7_V2_CONTENT_TYPE}","data":"{data}"}}}}"#),
            "Patient",
        );
        match Communication::parse(&json) {
            Err(FhirError::InvalidInput(msg)) => assert!(msg.contains("Patient")),
            other => panic!("expected InvalidInput, got {other:?}"),
        }
    }

    #[test]
    fn rejects_unsupported_content() {
        let json = json_with(
            r#"{"contentAttachment":{"contentType":"text/plain","data":"aGVsbG8="}}"#,
            "Communication",
        );
        assert!(matches!(Communication::parse(&json), Err(FhirError::InvalidInput(_))));

        let json = json_with(
            &format!(r#"{{"contentAttachment":{{"contentType":"{HL7_V2_CONTENT_TYPE}","data":"not base64!"}}}}"#),
            "Communication",
        );
        assert!(matches!(Communication::parse(&json), Err(FhirError::InvalidInput(_))));

        let not_hl7 = general_purpose::STANDARD.encode("PID|1");
        let json = json_with(
            &format!(r#"{{"contentAttachment":{{"contentType":"{HL7_V2_CONTENT_TYPE}","data":"{not_hl7}"}}}}"#),
            "Communication",
        );
        assert!(matches!(Communication::parse(&json), Err(FhirError::Hl7(_))));
    }

    #[test]
    fn rejects_unknown_keys_with_path() {
        let json = json_with(
            r#"{"contentAttachment":{"contentType":"x","data":"","url":"http://x"}}"#,
            "Communication",
        );
        match Communication::parse(&json) {
            Err(FhirError::Translation(msg)) => {
                assert!(msg.contains("payload[0].contentAttachment"), "got {msg}")
            }
            other => panic!("expected Translation error, got {other:?}"),
        }
    }

    #[test]
    fn parses_partial_timestamps() {
        assert_eq!(
            parse_hl7_timestamp("20240305").map(|t| t.to_rfc3339()).as_deref(),
            Some("2024-03-05T00:00:00+00:00")
        );
        assert_eq!(
            parse_hl7_timestamp("202403051430.1234-0500")
                .map(|t| t.to_rfc3339())
                .as_deref(),
            Some("2024-03-05T19:30:00+00:00")
        );
        assert_eq!(parse_hl7_timestamp("2024"), None);
        assert_eq!(parse_hl7_timestamp("20240305+01"), None);
        assert_eq!(parse_hl7_timestamp("202403051"), None);
        assert_eq!(parse_hl7_timestamp("2024030514301"), None);
        assert_eq!(parse_hl7_timestamp("20240305é"), None);
        assert_eq!(parse_hl7_timestamp("20240305.12é"), None);
    }

    #[test]
    fn unparseable_timestamp_leaves_sent_empty() {
        for timestamp in ["yesterday", "20240305é", "202403051"] {
            let text = format!("MSH|^~\\&|A|B|C|D|{timestamp}||ADT^A01|1|P|2.3");
            let msg = Hl7Message::parse(&text).expect("parse");
            let data = CommunicationConverter::from_hl7(&msg).expect("convert");
            assert_eq!(data.sent, None, "timestamp {timestamp}");
            assert_eq!(data.identifier.as_ref().map(|v| v.as_str()), Some("1"));
        }
    }
}
