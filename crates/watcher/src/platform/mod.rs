//! Per-platform recognizer tables
//!
//! Each platform's notification API reports the same user action as a different burst of
//! raw operations. A table lists the patterns for one platform, grouped by family in the
//! order the coalescer tries them: write, remove, create, rename. Within a family the first
//! matching case wins, so longer patterns come before their prefixes.

mod unix;
mod windows;

use crate::coalesce::{Probe, Queued};
use crate::event::{RawOp, SemanticEvent};
use serde::{Deserialize, Serialize};
use shadow_core::PathRef;
use std::path::Path;

/// Which notification dialect to decode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    /// inotify / FSEvents / kqueue style bursts
    Unix,
    /// ReadDirectoryChangesW style bursts (split and duplicated operations)
    Windows,
}

impl Platform {
    /// The platform this binary was built for
    pub fn detect() -> Self {
        if cfg!(windows) {
            Platform::Windows
        } else {
            Platform::Unix
        }
    }

    pub fn table(&self) -> &'static [Recognizer] {
        match self {
            Platform::Unix => unix::TABLE,
            Platform::Windows => windows::TABLE,
        }
    }

    /// Maximum number of queued entries a single pattern inspects
    pub fn lookahead(&self) -> usize {
        match self {
            Platform::Unix => 3,
            Platform::Windows => 6,
        }
    }
}

impl Default for Platform {
    fn default() -> Self {
        Self::detect()
    }
}

/// Recognizer family, in evaluation order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Family {
    Write,
    Remove,
    /// A create match ends the current drain
    Create,
    Rename,
}

/// A recognized pattern: the event and how many queued entries it consumed
pub type Match = (SemanticEvent, usize);

/// One pattern of a platform table
pub struct Recognizer {
    pub family: Family,
    /// Case label for debug logs
    pub case: &'static str,
    pub matches: fn(&Window<'_>) -> Option<Match>,
}

/// Bounded view of the queue starting at the coalescer's cursor
pub struct Window<'a> {
    entries: &'a [Queued],
    probe: &'a dyn Probe,
}

impl<'a> Window<'a> {
    pub(crate) fn new(entries: &'a [Queued], probe: &'a dyn Probe) -> Self {
        Self { entries, probe }
    }

    /// Number of entries visible (fewer than the lookahead near the end of the queue)
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether entry `i` exists and has operation `op`
    pub fn is(&self, i: usize, op: RawOp) -> bool {
        self.entries.get(i).is_some_and(|q| q.event.op == op)
    }

    /// Whether the window starts with exactly these operations
    pub fn starts_with(&self, ops: &[RawOp]) -> bool {
        ops.iter().enumerate().all(|(i, op)| self.is(i, *op))
    }

    pub fn path(&self, i: usize) -> Option<&'a Path> {
        self.entries.get(i).map(|q| q.event.path.as_path())
    }

    /// Both entries exist and name the same path
    pub fn same_path(&self, i: usize, j: usize) -> bool {
        matches!((self.path(i), self.path(j)), (Some(a), Some(b)) if a == b)
    }

    /// Both entries exist and were queued under the same parent fingerprint
    pub fn same_fingerprint(&self, i: usize, j: usize) -> bool {
        match (self.entries.get(i), self.entries.get(j)) {
            (Some(a), Some(b)) => a.parent_fingerprint == b.parent_fingerprint,
            _ => false,
        }
    }

    /// Whether the path of entry `i` currently exists
    pub fn exists(&self, i: usize) -> bool {
        self.path(i).is_some_and(|p| self.probe.exists(p))
    }

    /// Single-path event on entry `i`'s path
    pub(crate) fn event_on(
        &self,
        i: usize,
        build: fn(PathRef) -> SemanticEvent,
    ) -> Option<SemanticEvent> {
        self.path(i).map(|p| build(PathRef::fs(p)))
    }

    /// Rename from entry `i`'s path to entry `j`'s path
    pub(crate) fn rename(&self, i: usize, j: usize) -> Option<SemanticEvent> {
        let from = self.path(i)?;
        let to = self.path(j)?;
        Some(SemanticEvent::rename(PathRef::fs(from), PathRef::fs(to)))
    }
}

/// Recognizer shared by every table: a file write stands alone
fn write_single(w: &Window<'_>) -> Option<Match> {
    if w.is(0, RawOp::Write) {
        return Some((w.event_on(0, SemanticEvent::write)?, 1));
    }
    None
}

const WRITE: Recognizer = Recognizer {
    family: Family::Write,
    case: "write",
    matches: write_single,
};
