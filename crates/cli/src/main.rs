use anyhow::Context;
use clap::{Parser, Subcommand};
use fhir::{Communication, CommunicationConverter};
use hl7::{ack, AckCode, Hl7Message, Terser};
use hl7_transform::{Hl7MessageUtils, Pipeline};
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "hl7")]
#[command(about = "Inspect and edit HL7v2 messages")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// List segment names in order
    Segments {
        /// Message file (reads stdin when omitted)
        input: Option<PathBuf>,
    },
    /// Print the value at a path such as PID-5-1
    Get {
        path: String,
        input: Option<PathBuf>,
    },
    /// Write a value at a path and print the message
    Set {
        path: String,
        value: String,
        input: Option<PathBuf>,
    },
    /// Remove segments and print the message
    Remove {
        /// Segment name
        segment: String,
        /// Only remove this occurrence (zero-based)
        #[arg(long)]
        occurrence: Option<usize>,
        input: Option<PathBuf>,
    },
    /// Split a message into one message per segment group
    Split {
        /// Segment name heading each group
        segment: String,
        /// Keep every other segment and exactly one occurrence per output instead
        #[arg(long)]
        duplicate: bool,
        input: Option<PathBuf>,
    },
    /// Apply a rules file and print the message
    Transform {
        /// YAML rules file
        #[arg(long)]
        rules: PathBuf,
        input: Option<PathBuf>,
    },
    /// Build an acknowledgement for a message
    Ack {
        /// Acknowledgement code (AA, AE, AR, CA, CE, CR)
        #[arg(long, default_value = "AA")]
        code: AckCode,
        /// Text message for MSA-3
        #[arg(long)]
        text: Option<String>,
        input: Option<PathBuf>,
    },
    /// Wrap a message in a FHIR Communication (JSON)
    ToFhir { input: Option<PathBuf> },
    /// Extract the message from a FHIR Communication (JSON)
    FromFhir { input: Option<PathBuf> },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env().add_directive("hl7=warn".parse()?))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Segments { input }) => {
            let message = read_message(input.as_deref())?;
            for name in message.segment_names() {
                println!("{name}");
            }
        }
        Some(Commands::Get { path, input }) => {
            let message = read_message(input.as_deref())?;
            match Terser::get_str(&message, &path)? {
                Some(value) => println!("{value}"),
                None => anyhow::bail!("nothing at {path}"),
            }
        }
        Some(Commands::Set { path, value, input }) => {
            let mut message = read_message(input.as_deref())?;
            Terser::set_str(&mut message, &path, &value)?;
            print_message(&message);
        }
        Some(Commands::Remove {
            segment,
            occurrence,
            input,
        }) => {
            let mut message = read_message(input.as_deref())?;
            let removed = match occurrence {
                Some(occurrence) => usize::from(message.remove_segment(&segment, occurrence).is_some()),
                None => Hl7MessageUtils::remove_segment(&mut message, &segment),
            };
            tracing::info!(segment = %segment, removed, "removed segments");
            print_message(&message);
        }
        Some(Commands::Split {
            segment,
            duplicate,
            input,
        }) => {
            let message = read_message(input.as_deref())?;
            let parts = if duplicate {
                Hl7MessageUtils::duplicate_message(&message, &segment)
            } else {
                Hl7MessageUtils::split_message(&message, &segment)?
            };
            print_messages(&parts);
        }
        Some(Commands::Transform { rules, input }) => {
            let pipeline = Pipeline::load(&rules)
                .with_context(|| format!("loading rules from {}", rules.display()))?;
            let mut message = read_message(input.as_deref())?;
            let report = pipeline.process(&mut message)?;
            eprintln!(
                "applied {}, unchanged {}, skipped {}",
                report.applied, report.unchanged, report.skipped
            );
            print_message(&message);
        }
        Some(Commands::Ack { code, text, input }) => {
            let message = read_message(input.as_deref())?;
            let ack = ack::build_ack(&message, code, text.as_deref())?;
            print_message(&ack);
        }
        Some(Commands::ToFhir { input }) => {
            let message = read_message(input.as_deref())?;
            let communication = CommunicationConverter::from_hl7(&message)?;
            println!("{}", Communication::render(&communication)?);
        }
        Some(Commands::FromFhir { input }) => {
            let json = read_input(input.as_deref())?;
            let communication = Communication::parse(&json)?;
            print_message(&CommunicationConverter::to_hl7(&communication)?);
        }
        None => {
            println!("Use 'hl7 --help' for commands");
        }
    }

    Ok(())
}

fn read_input(path: Option<&Path>) -> anyhow::Result<String> {
    match path {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display())),
        None => {
            let mut text = String::new();
            std::io::stdin()
                .read_to_string(&mut text)
                .context("reading stdin")?;
            Ok(text)
        }
    }
}

fn read_message(path: Option<&Path>) -> anyhow::Result<Hl7Message> {
    let text = read_input(path)?;
    Ok(Hl7Message::parse(&text)?)
}

/// Segments on separate lines, for terminals.
fn display_text(message: &Hl7Message) -> String {
    message.to_string().replace('\r', "\n")
}

fn print_message(message: &Hl7Message) {
    println!("{}", display_text(message));
}

fn print_messages(messages: &[Hl7Message]) {
    for (i, message) in messages.iter().enumerate() {
        if i > 0 {
            println!();
        }
        print_message(message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use std::io::Write;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_ack_code() {
        let cli = Cli::try_parse_from(["hl7", "ack", "--code", "AE", "msg.hl7"]).expect("parse");
        match cli.command {
            Some(Commands::Ack { code, input, .. }) => {
                assert_eq!(code, AckCode::AE);
                assert_eq!(input, Some(PathBuf::from("msg.hl7")));
            }
            _ => panic!("expected ack command"),
        }
        assert!(Cli::try_parse_from(["hl7", "ack", "--code", "XX"]).is_err());
    }

    #[test]
    fn reads_message_from_file() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        file.write_all(b"MSH|^~\\&|A|B|C|D|20240101||ADT^A01|1|P|2.3\nPID|1\n")
            .expect("write");
        let message = read_message(Some(file.path())).expect("read");
        assert_eq!(
            display_text(&message),
            "MSH|^~\\&|A|B|C|D|20240101||ADT^A01|1|P|2.3\nPID|1"
        );
    }
}
