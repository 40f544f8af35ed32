//! Facade of message operations used by transformation steps.
//!
//! Two families of operation live here:
//! - path-based access to single values (`get`, `set`, `copy`, `concatenate`, `clear`,
//!   `lookup`, `update_field_from_code`), built on [`hl7::Terser`]
//! - segment-level operations over the tree (`remove_segment`, `get_segment`,
//!   `duplicate_segment`, `duplicate_message`, `split_message`)

use crate::lookup::LookupTable;
use crate::TransformResult;
use hl7::{Hl7Error, Hl7Message, Terser, TerserPath};

/// Message operations. All methods are associated functions.
pub struct Hl7MessageUtils;

impl Hl7MessageUtils {
    pub fn get(message: &Hl7Message, path: &str) -> TransformResult<Option<String>> {
        Ok(Terser::get_str(message, path)?)
    }

    pub fn set(message: &mut Hl7Message, path: &str, value: &str) -> TransformResult<()> {
        Ok(Terser::set_str(message, path, value)?)
    }

    /// Copies the value at `from` to `to`.
    ///
    /// Returns `false` without touching `to` when there is no value at `from`.
    pub fn copy(message: &mut Hl7Message, from: &str, to: &str) -> TransformResult<bool> {
        let to = TerserPath::parse(to)?;
        match Self::get(message, from)? {
            Some(value) => {
                Terser::set(message, &to, &value)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Joins the non-empty values at `sources` with `separator` and writes them to `target`.
    pub fn concatenate(
        message: &mut Hl7Message,
        target: &str,
        sources: &[&str],
        separator: &str,
    ) -> TransformResult<()> {
        let target = TerserPath::parse(target)?;
        let mut parts = Vec::with_capacity(sources.len());
        for source in sources {
            if let Some(value) = Self::get(message, source)?.filter(|v| !v.is_empty()) {
                parts.push(value);
            }
        }
        Terser::set(message, &target, &parts.join(separator))?;
        Ok(())
    }

    pub fn clear(message: &mut Hl7Message, path: &str) -> TransformResult<bool> {
        Ok(Terser::clear(message, &TerserPath::parse(path)?)?)
    }

    /// Translates the value at `path` through `table` without modifying the message.
    pub fn lookup(
        message: &Hl7Message,
        path: &str,
        table: &dyn LookupTable,
    ) -> TransformResult<Option<String>> {
        Ok(Self::get(message, path)?.and_then(|code| table.lookup(&code)))
    }

    /// Replaces the value at `path` with its translation through `table`.
    ///
    /// Returns `false` when the path is empty or the table has no mapping for the value.
    pub fn update_field_from_code(
        message: &mut Hl7Message,
        path: &str,
        table: &dyn LookupTable,
    ) -> TransformResult<bool> {
        let path = TerserPath::parse(path)?;
        let Some(code) = Terser::get(message, &path).filter(|c| !c.is_empty()) else {
            return Ok(false);
        };
        match table.lookup(&code) {
            Some(mapped) => {
                Terser::set(message, &path, &mapped)?;
                Ok(true)
            }
            None => {
                tracing::warn!(%path, code = %code, "no lookup mapping for code");
                Ok(false)
            }
        }
    }

    /// Removes every segment named `name`, returning how many were removed.
    pub fn remove_segment(message: &mut Hl7Message, name: &str) -> usize {
        message.remove_all_matching_segments(name)
    }

    /// Encoded text of the `occurrence`-th segment named `name`.
    pub fn get_segment(message: &Hl7Message, name: &str, occurrence: usize) -> Option<String> {
        message
            .segment_named(name, occurrence)
            .map(ToString::to_string)
    }

    /// Inserts a copy of the `occurrence`-th segment named `name` directly after it.
    pub fn duplicate_segment(
        message: &mut Hl7Message,
        name: &str,
        occurrence: usize,
    ) -> TransformResult<()> {
        let index = message
            .segment_index(name, occurrence)
            .ok_or_else(|| Hl7Error::SegmentNotFound(format!("{name}({occurrence})")))?;
        message.duplicate_segment(index)?;
        Ok(())
    }

    /// Fans a message out into one copy per occurrence of `segment_type`.
    ///
    /// Copy `i` keeps only the `i`-th occurrence of `segment_type`; every other segment is
    /// unchanged. A message with no occurrence yields a single unchanged copy.
    pub fn duplicate_message(message: &Hl7Message, segment_type: &str) -> Vec<Hl7Message> {
        let count = message.segment_count(segment_type);
        if count == 0 {
            return vec![message.clone()];
        }

        let copies: Vec<Hl7Message> = (0..count)
            .map(|occurrence| {
                let mut copy = message.clone();
                copy.keep_only_occurrence(segment_type, occurrence);
                copy
            })
            .collect();
        tracing::debug!(segment = segment_type, copies = copies.len(), "duplicated message");
        copies
    }

    /// Splits a message into one message per group headed by `segment_type`.
    ///
    /// Every output keeps the segments before the first occurrence (the header part) followed
    /// by one group: an occurrence of `segment_type` and the segments up to the next
    /// occurrence. A message with no occurrence yields a single unchanged copy.
    pub fn split_message(
        message: &Hl7Message,
        segment_type: &str,
    ) -> TransformResult<Vec<Hl7Message>> {
        let starts = message.segment_indexes(segment_type);
        let Some(&first) = starts.first() else {
            return Ok(vec![message.clone()]);
        };

        let header = &message.segments()[..first];
        let mut result = Vec::with_capacity(starts.len());
        for (i, &start) in starts.iter().enumerate() {
            let end = starts.get(i + 1).copied().unwrap_or(message.len());
            let mut segments = header.to_vec();
            segments.extend_from_slice(&message.segments()[start..end]);
            result.push(Hl7Message::from_segments(segments)?);
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lookup::MapLookupTable;

    const ORU: &str = "MSH|^~\\&|LAB|HOSP|EHR|CLINIC|20240101||ORU^R01|42|P|2.4\r\
PID|1||123^^^^MRN||DOE^JOHN\r\
OBR|1|ORD1\r\
OBX|1|NM|GLU||5.4\r\
NTE|1||fasting\r\
OBX|2|NM|NA||140\r\
OBX|3|NM|K||4.1";

    fn message() -> Hl7Message {
        Hl7Message::parse(ORU).expect("parse")
    }

    fn table() -> MapLookupTable {
        [("HOSP".to_owned(), "GENERAL".to_owned())].into_iter().collect()
    }

    #[test]
    fn duplicate_message_fans_out_one_copy_per_occurrence() {
        let msg = message();
        let copies = Hl7MessageUtils::duplicate_message(&msg, "OBX");
        assert_eq!(copies.len(), 3);

        for (i, copy) in copies.iter().enumerate() {
            assert_eq!(copy.segment_count("OBX"), 1);
            assert_eq!(
                Hl7MessageUtils::get_segment(copy, "OBX", 0),
                Hl7MessageUtils::get_segment(&msg, "OBX", i)
            );
            let others: Vec<String> = copy
                .segments()
                .iter()
                .filter(|s| s.name() != "OBX")
                .map(ToString::to_string)
                .collect();
            let original_others: Vec<String> = msg
                .segments()
                .iter()
                .filter(|s| s.name() != "OBX")
                .map(ToString::to_string)
                .collect();
            assert_eq!(others, original_others);
        }
    }

    #[test]
    fn duplicate_message_without_occurrences_returns_copy() {
        let msg = message();
        let copies = Hl7MessageUtils::duplicate_message(&msg, "ZZZ");
        assert_eq!(copies.len(), 1);
        assert_eq!(copies[0].to_string(), ORU);
    }

    #[test]
    fn split_message_groups_following_segments() {
        let msg = message();
        let parts = Hl7MessageUtils::split_message(&msg, "OBX").expect("split");
        assert_eq!(parts.len(), 3);
        assert_eq!(
            parts[0].segment_names(),
            vec!["MSH", "PID", "OBR", "OBX", "NTE"]
        );
        assert_eq!(parts[2].segment_names(), vec!["MSH", "PID", "OBR", "OBX"]);
        assert_eq!(
            Hl7MessageUtils::get_segment(&parts[2], "OBX", 0).as_deref(),
            Some("OBX|3|NM|K||4.1")
        );
    }

    #[test]
    fn remove_and_duplicate_segment() {
        let mut msg = message();
        Hl7MessageUtils::duplicate_segment(&mut msg, "NTE", 0).expect("duplicate");
        assert_eq!(msg.segment_count("NTE"), 2);
        assert_eq!(Hl7MessageUtils::remove_segment(&mut msg, "NTE"), 2);
        assert!(Hl7MessageUtils::duplicate_segment(&mut msg, "NTE", 0).is_err());
    }

    #[test]
    fn copy_and_concatenate_values() {
        let mut msg = message();
        assert!(Hl7MessageUtils::copy(&mut msg, "MSH-4", "PID-18").expect("copy"));
        assert_eq!(
            Hl7MessageUtils::get(&msg, "PID-18").expect("path").as_deref(),
            Some("HOSP")
        );
        assert!(!Hl7MessageUtils::copy(&mut msg, "PID-30", "PID-19").expect("copy"));
        assert_eq!(Hl7MessageUtils::get(&msg, "PID-19").expect("path"), None);

        Hl7MessageUtils::concatenate(&mut msg, "NTE-3", &["PID-5-2", "PID-5-1", "PID-5-3"], " ")
            .expect("concatenate");
        assert_eq!(
            Hl7MessageUtils::get(&msg, "NTE-3").expect("path").as_deref(),
            Some("JOHN DOE")
        );
    }

    #[test]
    fn lookup_and_update_from_code() {
        let mut msg = message();
        let table = table();
        assert_eq!(
            Hl7MessageUtils::lookup(&msg, "MSH-4", &table).expect("lookup").as_deref(),
            Some("GENERAL")
        );
        assert!(Hl7MessageUtils::update_field_from_code(&mut msg, "MSH-4", &table).expect("update"));
        assert_eq!(
            Hl7MessageUtils::get(&msg, "MSH-4").expect("path").as_deref(),
            Some("GENERAL")
        );
        assert!(!Hl7MessageUtils::update_field_from_code(&mut msg, "MSH-3", &table).expect("update"));
        assert_eq!(
            Hl7MessageUtils::get(&msg, "MSH-3").expect("path").as_deref(),
            Some("LAB")
        );
    }

    #[test]
    fn clear_value() {
        let mut msg = message();
        assert!(Hl7MessageUtils::clear(&mut msg, "PID-5-2").expect("clear"));
        assert_eq!(
            Hl7MessageUtils::get_segment(&msg, "PID", 0).as_deref(),
            Some("PID|1||123^^^^MRN||DOE^")
        );
        assert!(Hl7MessageUtils::set(&mut msg, "ZZZ-1", "x").is_err());
    }
}
