//! FHIR wire/boundary support for the HL7v2 gateway.
//!
//! This crate provides a **wire model** and **translation helpers** for carrying HL7v2
//! messages inside FHIR `Communication` resources:
//! - JSON parse/render of the `Communication` subset the gateway exchanges
//! - conversion between [`hl7::Hl7Message`] and the domain-level [`CommunicationData`]
//!
//! The ER7 text travels unchanged as a base64 attachment; header values (control id,
//! message type, timestamp) are lifted into FHIR elements for indexing only.

pub mod communication;

// Re-export facades
pub use communication::{Communication, CommunicationConverter};

// Re-export public domain-level types
pub use communication::{CommunicationData, CommunicationStatus, HL7_V2_CONTENT_TYPE};

/// Errors returned by the `fhir` boundary crate.
#[derive(Debug, thiserror::Error)]
pub enum FhirError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("translation error: {0}")]
    Translation(String),

    #[error(transparent)]
    Hl7(#[from] hl7::Hl7Error),
}

/// Type alias for Results that can fail with a [`FhirError`].
pub type FhirResult<T> = Result<T, FhirError>;
