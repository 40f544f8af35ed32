//! Transformation steps applied to HL7v2 messages.
//!
//! This crate provides:
//! - [`Hl7MessageUtils`], a facade of path-based and segment-based message operations
//! - the strategy traits implemented by transformation steps and a [`StrategyRegistry`]
//!   that resolves strategies by name
//! - a YAML rules file format and the [`Pipeline`] built from it
//! - [`GatewayConfig`], resolved once at startup
//!
//! Strategy and lookup-table names are resolved when the rules are loaded. A rules file that
//! names an unknown strategy or table fails to load; it never reaches message processing.

pub mod config;
pub mod lookup;
pub mod pipeline;
pub mod registry;
pub mod rules;
pub mod strategies;
pub mod utils;

pub use config::GatewayConfig;
pub use lookup::{LookupTable, LookupTables, MapLookupTable};
pub use pipeline::{Pipeline, ProcessReport};
pub use registry::StrategyRegistry;
pub use rules::{RuleKind, RuleSpec, RulesConfig};
pub use strategies::{FieldCodeTransformation, MessageCodeTransformation, SegmentAction};
pub use utils::Hl7MessageUtils;

/// Errors returned by the transformation layer.
#[derive(Debug, thiserror::Error)]
pub enum TransformError {
    #[error(transparent)]
    Hl7(#[from] hl7::Hl7Error),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("unknown {kind} strategy '{name}'")]
    UnknownStrategy { kind: &'static str, name: String },

    #[error("unknown lookup table '{0}'")]
    UnknownLookupTable(String),

    #[error("invalid YAML: {0}")]
    InvalidYaml(#[from] serde_yaml::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("translation error: {0}")]
    Translation(String),
}

/// Type alias for Results that can fail with a [`TransformError`].
pub type TransformResult<T> = Result<T, TransformError>;
