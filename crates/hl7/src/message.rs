//! The message-level node of the tree.
//!
//! Mutations mark the message dirty instead of writing through to the source message on
//! every edit. A processing step edits freely and then calls [`Hl7Message::commit`] once.

use crate::msh::MshSegment;
use crate::pid::PidSegment;
use crate::segment::Segment;
use crate::source::{segment_lines, SourceMessage};
use crate::{out_of_range, Hl7Error, Hl7Result, SEGMENT_SEPARATOR};
use hl7_types::SegmentName;
use std::fmt;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Hl7Message {
    segments: Vec<Segment>,
    dirty: bool,
}

impl Hl7Message {
    /// Parses encoded text into a segment tree.
    ///
    /// Segments may be terminated by `\r`, `\n` or `\r\n`; blank lines are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`Hl7Error::Parse`] if the text holds no segments or a segment cannot be parsed.
    pub fn parse(text: &str) -> Hl7Result<Self> {
        let segments = segment_lines(text)
            .map(Segment::parse)
            .collect::<Hl7Result<Vec<_>>>()?;
        if segments.is_empty() {
            return Err(Hl7Error::Parse("message contains no segments".into()));
        }
        Ok(Self {
            segments,
            dirty: false,
        })
    }

    /// Builds the tree from the encoded form of `source`.
    pub fn from_source<M: SourceMessage + ?Sized>(source: &M) -> Hl7Result<Self> {
        Self::parse(&source.encode())
    }

    /// Builds a message from already constructed segments.
    pub fn from_segments(segments: Vec<Segment>) -> Hl7Result<Self> {
        if segments.is_empty() {
            return Err(Hl7Error::InvalidStructure(
                "message must contain at least one segment".into(),
            ));
        }
        Ok(Self {
            segments,
            dirty: true,
        })
    }

    /// True if the tree changed since it was built or last committed.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Re-parses the reassembled text into `source` unconditionally.
    ///
    /// # Errors
    ///
    /// Propagates the parse error from `source`; the dirty flag is left set in that case.
    pub fn refresh_source<M: SourceMessage + ?Sized>(&mut self, source: &mut M) -> Hl7Result<()> {
        let text = self.to_string();
        source.parse(&text)?;
        self.dirty = false;
        tracing::debug!(segments = self.segments.len(), "refreshed source message");
        Ok(())
    }

    /// Flushes pending changes into `source`. Returns `true` if a refresh was needed.
    pub fn commit<M: SourceMessage + ?Sized>(&mut self, source: &mut M) -> Hl7Result<bool> {
        if !self.dirty {
            return Ok(false);
        }
        self.refresh_source(source)?;
        Ok(true)
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn segment(&self, index: usize) -> Option<&Segment> {
        self.segments.get(index)
    }

    /// Mutable access to a segment. Marks the message dirty when the segment exists.
    pub fn segment_mut(&mut self, index: usize) -> Option<&mut Segment> {
        let segment = self.segments.get_mut(index)?;
        self.dirty = true;
        Some(segment)
    }

    pub fn segment_names(&self) -> Vec<&str> {
        self.segments.iter().map(Segment::name).collect()
    }

    /// Positions of every segment named `name`, in message order.
    pub fn segment_indexes(&self, name: &str) -> Vec<usize> {
        self.segments
            .iter()
            .enumerate()
            .filter(|(_, s)| s.name() == name)
            .map(|(i, _)| i)
            .collect()
    }

    /// Position of the `occurrence`-th (zero-based) segment named `name`.
    pub fn segment_index(&self, name: &str, occurrence: usize) -> Option<usize> {
        self.segments
            .iter()
            .enumerate()
            .filter(|(_, s)| s.name() == name)
            .nth(occurrence)
            .map(|(i, _)| i)
    }

    pub fn first_segment_index(&self, name: &str) -> Option<usize> {
        self.segment_index(name, 0)
    }

    pub fn segment_count(&self, name: &str) -> usize {
        self.segments.iter().filter(|s| s.name() == name).count()
    }

    pub fn segments_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Segment> + 'a {
        self.segments.iter().filter(move |s| s.name() == name)
    }

    pub fn segment_named(&self, name: &str, occurrence: usize) -> Option<&Segment> {
        self.segment_index(name, occurrence)
            .and_then(|i| self.segments.get(i))
    }

    pub fn segment_named_mut(&mut self, name: &str, occurrence: usize) -> Option<&mut Segment> {
        let index = self.segment_index(name, occurrence)?;
        self.segment_mut(index)
    }

    /// Removes the segment at `index` and returns it.
    pub fn remove_segment_at(&mut self, index: usize) -> Option<Segment> {
        if index >= self.segments.len() {
            return None;
        }
        self.dirty = true;
        Some(self.segments.remove(index))
    }

    /// Removes the `occurrence`-th (zero-based) segment named `name`.
    pub fn remove_segment(&mut self, name: &str, occurrence: usize) -> Option<Segment> {
        let index = self.segment_index(name, occurrence)?;
        self.remove_segment_at(index)
    }

    /// Removes every segment named `name`, returning how many were removed.
    pub fn remove_all_matching_segments(&mut self, name: &str) -> usize {
        let before = self.segments.len();
        self.segments.retain(|s| s.name() != name);
        let removed = before - self.segments.len();
        if removed > 0 {
            self.dirty = true;
            tracing::debug!(segment = name, removed, "removed segments");
        }
        removed
    }

    /// Keeps only the `occurrence`-th segment named `name`, removing the others.
    ///
    /// Returns how many segments were removed.
    pub fn keep_only_occurrence(&mut self, name: &str, occurrence: usize) -> usize {
        let mut seen = 0usize;
        let before = self.segments.len();
        self.segments.retain(|s| {
            if s.name() != name {
                return true;
            }
            let keep = seen == occurrence;
            seen += 1;
            keep
        });
        let removed = before - self.segments.len();
        if removed > 0 {
            self.dirty = true;
        }
        removed
    }

    /// Replaces the segment at `target_index` with a copy of the one at `source_index`.
    pub fn copy_segment(&mut self, source_index: usize, target_index: usize) -> Hl7Result<()> {
        let len = self.segments.len();
        let source = self
            .segments
            .get(source_index)
            .cloned()
            .ok_or_else(|| out_of_range("segment", source_index, len))?;
        let target = self
            .segments
            .get_mut(target_index)
            .ok_or_else(|| out_of_range("segment", target_index, len))?;
        *target = source;
        self.dirty = true;
        Ok(())
    }

    /// Inserts a copy of the segment at `index` directly after it.
    pub fn duplicate_segment(&mut self, index: usize) -> Hl7Result<()> {
        let len = self.segments.len();
        let copy = self
            .segments
            .get(index)
            .cloned()
            .ok_or_else(|| out_of_range("segment", index, len))?;
        self.segments.insert(index + 1, copy);
        self.dirty = true;
        Ok(())
    }

    /// Inserts `segment` at `index`; `index == len` appends.
    pub fn insert_segment(&mut self, index: usize, segment: Segment) -> Hl7Result<()> {
        if index > self.segments.len() {
            return Err(out_of_range("segment", index, self.segments.len()));
        }
        self.segments.insert(index, segment);
        self.dirty = true;
        Ok(())
    }

    pub fn append_segment(&mut self, segment: Segment) {
        self.segments.push(segment);
        self.dirty = true;
    }

    /// Header view, if the message has an MSH segment.
    pub fn msh(&self) -> Option<MshSegment<&Segment>> {
        let segment = self.segments.iter().find(|s| s.is_msh())?;
        MshSegment::new(segment).ok()
    }

    /// Edits the header through its typed view, returning what `edit` returns.
    ///
    /// The message is marked dirty only when the edit changed the segment.
    pub fn msh_mut<R>(
        &mut self,
        edit: impl FnOnce(&mut MshSegment<&mut Segment>) -> R,
    ) -> Option<R> {
        let index = self.segments.iter().position(Segment::is_msh)?;
        let before = self.segments[index].clone();
        let result = {
            let mut msh = MshSegment::new(&mut self.segments[index]).ok()?;
            edit(&mut msh)
        };
        self.dirty |= self.segments[index] != before;
        Some(result)
    }

    pub fn pid(&self) -> Option<PidSegment<&Segment>> {
        let segment = self
            .segments
            .iter()
            .find(|s| s.segment_name() == SegmentName::PID)?;
        PidSegment::new(segment).ok()
    }

    /// Edits the first PID segment through its typed view. Dirties the message only on change.
    pub fn pid_mut<R>(
        &mut self,
        edit: impl FnOnce(&mut PidSegment<&mut Segment>) -> R,
    ) -> Option<R> {
        let index = self
            .segments
            .iter()
            .position(|s| s.segment_name() == SegmentName::PID)?;
        let before = self.segments[index].clone();
        let result = {
            let mut pid = PidSegment::new(&mut self.segments[index]).ok()?;
            edit(&mut pid)
        };
        self.dirty |= self.segments[index] != before;
        Some(result)
    }

    /// MSH-9, for example `ADT^A01`.
    pub fn message_type(&self) -> Option<String> {
        self.msh().and_then(|msh| msh.message_type())
    }

    pub fn control_id(&self) -> Option<String> {
        self.msh().and_then(|msh| msh.control_id())
    }

    pub fn version(&self) -> Option<String> {
        self.msh().and_then(|msh| msh.version())
    }
}

impl fmt::Display for Hl7Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                write!(f, "{SEGMENT_SEPARATOR}")?;
            }
            write!(f, "{segment}")?;
        }
        Ok(())
    }
}

impl std::str::FromStr for Hl7Message {
    type Err = Hl7Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
