use anyhow::Context;
use std::io::{Read, Write};
use std::path::Path;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use hl7::{ack, AckCode, Hl7Message, RawMessage};
use hl7_transform::config::{
    flag_from_env_value, path_from_env_value, segment_from_env_value, text_from_env_value,
};
use hl7_transform::{GatewayConfig, Hl7MessageUtils, Pipeline};

/// Result of passing one inbound message through the gateway.
#[derive(Debug)]
struct GatewayOutput {
    messages: Vec<RawMessage>,
    ack: Option<Hl7Message>,
}

/// Main entry point for the HL7v2 gateway
///
/// Reads one message, applies the configured transformation rules, optionally fans it out
/// into one message per occurrence of a segment, and writes the results. When
/// acknowledgements are enabled an ACK is written as well: `AA` on success, `AE` when the
/// message parsed but could not be processed.
///
/// # Environment Variables
/// - `HL7_INPUT`: message file (default: stdin)
/// - `HL7_OUTPUT_DIR`: directory for output files (default: stdout)
/// - `HL7_RULES_FILE`: YAML transformation rules (default: no rules)
/// - `HL7_OUTPUT_VERSION`: MSH-12 written to every output message
/// - `HL7_FAN_OUT_SEGMENT`: segment to fan out on, for example `OBX`
/// - `HL7_ACK`: `true` to write an acknowledgement
fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("hl7_gateway_run=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = config_from_env()?;
    let pipeline = match config.rules_file() {
        Some(path) => Pipeline::load(path)
            .with_context(|| format!("loading rules from {}", path.display()))?,
        None => Pipeline::empty(),
    };
    tracing::info!(rules = pipeline.len(), "++ Starting HL7 gateway");

    let input = path_from_env_value(std::env::var("HL7_INPUT").ok());
    let output_dir = path_from_env_value(std::env::var("HL7_OUTPUT_DIR").ok());
    let text = read_input(input.as_deref())?;

    let output = run(&config, &pipeline, &text)?;
    write_output(&output, output_dir.as_deref())?;

    Ok(())
}

fn config_from_env() -> anyhow::Result<GatewayConfig> {
    let config = GatewayConfig::new(
        path_from_env_value(std::env::var("HL7_RULES_FILE").ok()),
        text_from_env_value(std::env::var("HL7_OUTPUT_VERSION").ok()),
        segment_from_env_value(std::env::var("HL7_FAN_OUT_SEGMENT").ok())?,
        flag_from_env_value(std::env::var("HL7_ACK").ok())?,
    )?;
    Ok(config)
}

/// Processes one inbound message.
///
/// Text that is not an HL7 message at all fails outright. Once the message has parsed, a
/// processing failure is reported through an `AE` acknowledgement when acknowledgements are
/// enabled, and as an error otherwise.
fn run(config: &GatewayConfig, pipeline: &Pipeline, text: &str) -> anyhow::Result<GatewayOutput> {
    let mut source = RawMessage::parse(text).context("inbound message is not valid HL7v2")?;
    let mut message = Hl7Message::from_source(&source)?;
    let original = message.clone();

    match transform(config, pipeline, &mut message, &mut source) {
        Ok(messages) => {
            let ack = config
                .acknowledge()
                .then(|| ack::build_ack(&original, AckCode::AA, None))
                .transpose()?;
            Ok(GatewayOutput { messages, ack })
        }
        Err(err) if config.acknowledge() => {
            tracing::warn!(error = %err, "message processing failed");
            let reason = err.to_string();
            let ack = ack::build_ack(&original, AckCode::AE, Some(&reason))?;
            Ok(GatewayOutput {
                messages: Vec::new(),
                ack: Some(ack),
            })
        }
        Err(err) => Err(err),
    }
}

fn transform(
    config: &GatewayConfig,
    pipeline: &Pipeline,
    message: &mut Hl7Message,
    source: &mut RawMessage,
) -> anyhow::Result<Vec<RawMessage>> {
    pipeline.process(message)?;
    if let Some(version) = config.output_version() {
        message
            .msh_mut(|msh| msh.change_message_version(version))
            .transpose()?;
    }
    if message.commit(source)? {
        tracing::debug!("message updated");
    }

    let Some(segment) = config.fan_out_segment() else {
        return Ok(vec![source.clone()]);
    };
    let copies = Hl7MessageUtils::duplicate_message(message, segment.as_str())
        .iter()
        .map(|copy| RawMessage::parse(&copy.to_string()))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(copies)
}

fn read_input(path: Option<&Path>) -> anyhow::Result<String> {
    match path {
        Some(path) => {
            std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
        }
        None => {
            let mut text = String::new();
            std::io::stdin()
                .read_to_string(&mut text)
                .context("reading stdin")?;
            Ok(text)
        }
    }
}

fn write_output(output: &GatewayOutput, output_dir: Option<&Path>) -> anyhow::Result<()> {
    match output_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("creating {}", dir.display()))?;
            for (i, message) in output.messages.iter().enumerate() {
                let path = dir.join(format!("message-{:03}.hl7", i + 1));
                write_file(&path, message.as_str())?;
            }
            if let Some(ack) = &output.ack {
                write_file(&dir.join("ack.hl7"), &ack.to_string())?;
            }
            tracing::info!(
                dir = %dir.display(),
                messages = output.messages.len(),
                ack = output.ack.is_some(),
                "wrote output"
            );
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            for message in &output.messages {
                writeln!(stdout, "{}", message.as_str().replace('\r', "\n"))?;
            }
            if let Some(ack) = &output.ack {
                writeln!(stdout, "{}", ack.to_string().replace('\r', "\n"))?;
            }
        }
    }
    Ok(())
}

fn write_file(path: &Path, text: &str) -> anyhow::Result<()> {
    std::fs::write(path, text).with_context(|| format!("writing {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use hl7_transform::RulesConfig;
    use hl7_types::SegmentName;

    const ORU: &str = "MSH|^~\\&|LAB|HOSP|EHR|CLINIC|20240101||ORU^R01|42|P|2.3\r\
PID|1||123^^^^MRN\r\
OBR|1|ORD1\r\
OBX|1|NM|GLU||5.4\r\
OBX|2|NM|NA||140";

    fn pipeline(yaml: &str) -> Pipeline {
        Pipeline::from_config(&RulesConfig::parse(yaml).expect("parse rules")).expect("build")
    }

    #[test]
    fn passes_message_through_without_rules() {
        let config = GatewayConfig::new(None, None, None, false).expect("config");
        let output = run(&config, &Pipeline::empty(), ORU).expect("run");
        assert_eq!(output.messages.len(), 1);
        assert_eq!(output.messages[0].as_str(), ORU);
        assert!(output.ack.is_none());
    }

    #[test]
    fn transforms_and_fans_out() {
        let config = GatewayConfig::new(
            None,
            Some("2.5".into()),
            Some(SegmentName::parse("OBX").expect("name")),
            true,
        )
        .expect("config");
        let rules = pipeline(
            "rules:\n  - name: receiver\n    kind: message\n    strategy: set\n    path: MSH-5\n    value: ARCHIVE\n",
        );
        let output = run(&config, &rules, ORU).expect("run");

        assert_eq!(output.messages.len(), 2);
        for (i, raw) in output.messages.iter().enumerate() {
            let message = Hl7Message::parse(raw.as_str()).expect("parse output");
            assert_eq!(message.version().as_deref(), Some("2.5"));
            assert_eq!(message.segment_count("OBX"), 1);
            assert_eq!(
                message
                    .segment_named("OBX", 0)
                    .and_then(|s| s.field_value(1))
                    .as_deref(),
                Some(["1", "2"][i])
            );
            assert!(raw.as_str().contains("|ARCHIVE|"));
        }

        let ack = output.ack.expect("ack");
        assert_eq!(
            ack.segment_named("MSA", 0).map(ToString::to_string).as_deref(),
            Some("MSA|AA|42")
        );
    }

    #[test]
    fn processing_failure_is_acknowledged() {
        let config = GatewayConfig::new(None, None, None, true).expect("config");
        let rules = pipeline(
            "rules:\n  - name: bad\n    kind: message\n    strategy: set\n    path: ZZZ-1\n    value: x\n",
        );
        let output = run(&config, &rules, ORU).expect("run");
        assert!(output.messages.is_empty());
        let ack = output.ack.expect("ack");
        let msa = ack.segment_named("MSA", 0).expect("MSA");
        assert_eq!(msa.field_value(1).as_deref(), Some("AE"));
        assert_eq!(msa.field_value(2).as_deref(), Some("42"));

        let no_ack = GatewayConfig::new(None, None, None, false).expect("config");
        assert!(run(&no_ack, &rules, ORU).is_err());
    }

    #[test]
    fn rejects_text_that_is_not_hl7() {
        let config = GatewayConfig::new(None, None, None, true).expect("config");
        assert!(run(&config, &Pipeline::empty(), "hello").is_err());
    }

    #[test]
    fn writes_output_files() {
        let dir = tempfile::tempdir().expect("temp dir");
        let config = GatewayConfig::new(None, None, None, true).expect("config");
        let output = run(&config, &Pipeline::empty(), ORU).expect("run");
        write_output(&output, Some(dir.path())).expect("write");

        let written = std::fs::read_to_string(dir.path().join("message-001.hl7")).expect("read");
        assert_eq!(written, ORU);
        assert!(dir.path().join("ack.hl7").is_file());
    }
}
