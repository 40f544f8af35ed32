//! Gateway runtime configuration.
//!
//! Configuration is resolved once at process startup and then passed into the pipeline and
//! output stages. Library code never reads environment variables; binaries read them and hand
//! the raw values to the `*_from_env_value` helpers below.

use crate::{TransformError, TransformResult};
use hl7_types::SegmentName;
use std::path::{Path, PathBuf};

/// Gateway configuration resolved at startup.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GatewayConfig {
    rules_file: Option<PathBuf>,
    output_version: Option<String>,
    fan_out_segment: Option<SegmentName>,
    acknowledge: bool,
}

impl GatewayConfig {
    /// Create a new `GatewayConfig`.
    ///
    /// # Errors
    ///
    /// Returns [`TransformError::InvalidConfig`] if `rules_file` is given but is not a file,
    /// or if `output_version` is blank.
    pub fn new(
        rules_file: Option<PathBuf>,
        output_version: Option<String>,
        fan_out_segment: Option<SegmentName>,
        acknowledge: bool,
    ) -> TransformResult<Self> {
        if let Some(path) = &rules_file {
            if !path.is_file() {
                return Err(TransformError::InvalidConfig(format!(
                    "rules file {} does not exist or is not a file",
                    path.display()
                )));
            }
        }
        if output_version.as_deref().is_some_and(|v| v.trim().is_empty()) {
            return Err(TransformError::InvalidConfig(
                "output version cannot be blank".into(),
            ));
        }
        if fan_out_segment == Some(SegmentName::MSH) {
            return Err(TransformError::InvalidConfig(
                "messages cannot be fanned out on MSH".into(),
            ));
        }

        Ok(Self {
            rules_file,
            output_version,
            fan_out_segment,
            acknowledge,
        })
    }

    pub fn rules_file(&self) -> Option<&Path> {
        self.rules_file.as_deref()
    }

    /// MSH-12 value written to every outgoing message, if any.
    pub fn output_version(&self) -> Option<&str> {
        self.output_version.as_deref()
    }

    pub fn fan_out_segment(&self) -> Option<SegmentName> {
        self.fan_out_segment
    }

    pub fn acknowledge(&self) -> bool {
        self.acknowledge
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Parse a boolean flag such as `HL7_ACK`.
///
/// Missing or blank values are `false`.
pub fn flag_from_env_value(value: Option<String>) -> TransformResult<bool> {
    match non_blank(value).map(|v| v.to_ascii_lowercase()).as_deref() {
        None | Some("0" | "false" | "no" | "off") => Ok(false),
        Some("1" | "true" | "yes" | "on") => Ok(true),
        Some(other) => Err(TransformError::InvalidConfig(format!(
            "expected a boolean flag, got '{other}'"
        ))),
    }
}

/// Parse a segment name such as `HL7_FAN_OUT_SEGMENT`.
pub fn segment_from_env_value(value: Option<String>) -> TransformResult<Option<SegmentName>> {
    non_blank(value)
        .map(|v| {
            SegmentName::parse(&v).map_err(|e| TransformError::InvalidConfig(e.to_string()))
        })
        .transpose()
}

/// Parse an optional path such as `HL7_RULES_FILE`.
pub fn path_from_env_value(value: Option<String>) -> Option<PathBuf> {
    non_blank(value).map(PathBuf::from)
}

/// Parse an optional free-text value such as `HL7_OUTPUT_VERSION`.
pub fn text_from_env_value(value: Option<String>) -> Option<String> {
    non_blank(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_existing_rules_file() {
        let file = tempfile::NamedTempFile::new().expect("temp file");
        let cfg = GatewayConfig::new(
            Some(file.path().to_path_buf()),
            Some("2.5".into()),
            Some(SegmentName::parse("OBX").expect("name")),
            true,
        )
        .expect("GatewayConfig::new should succeed");
        assert_eq!(cfg.rules_file(), Some(file.path()));
        assert_eq!(cfg.output_version(), Some("2.5"));
        assert_eq!(cfg.fan_out_segment().map(|s| s.to_string()).as_deref(), Some("OBX"));
        assert!(cfg.acknowledge());
    }

    #[test]
    fn rejects_missing_rules_file() {
        let dir = tempfile::tempdir().expect("temp dir");
        let missing = dir.path().join("rules.yaml");
        match GatewayConfig::new(Some(missing), None, None, false) {
            Err(TransformError::InvalidConfig(msg)) => assert!(msg.contains("rules.yaml")),
            other => panic!("expected InvalidConfig, got {other:?}"),
        }

        // A directory is not a rules file either.
        assert!(GatewayConfig::new(Some(dir.path().to_path_buf()), None, None, false).is_err());
    }

    #[test]
    fn rejects_blank_version_and_msh_fan_out() {
        assert!(GatewayConfig::new(None, Some("  ".into()), None, false).is_err());
        assert!(GatewayConfig::new(None, None, Some(SegmentName::MSH), false).is_err());
        assert!(GatewayConfig::new(None, None, None, false).is_ok());
    }

    #[test]
    fn parses_env_values() {
        assert!(!flag_from_env_value(None).expect("flag"));
        assert!(!flag_from_env_value(Some(" ".into())).expect("flag"));
        assert!(flag_from_env_value(Some("TRUE".into())).expect("flag"));
        assert!(flag_from_env_value(Some("1".into())).expect("flag"));
        assert!(flag_from_env_value(Some("maybe".into())).is_err());

        assert_eq!(segment_from_env_value(None).expect("segment"), None);
        assert_eq!(
            segment_from_env_value(Some(" PID ".into())).expect("segment"),
            Some(SegmentName::PID)
        );
        assert!(segment_from_env_value(Some("pid".into())).is_err());

        assert_eq!(path_from_env_value(Some("".into())), None);
        assert_eq!(
            path_from_env_value(Some("rules.yaml".into())),
            Some(PathBuf::from("rules.yaml"))
        );
        assert_eq!(text_from_env_value(Some(" 2.5 ".into())).as_deref(), Some("2.5"));
    }
}
