//! Raw notification coalescing
//!
//! The coalescer buffers raw notifications and, once per tick, turns as much of the buffer
//! as it can recognize into semantic events using the platform's recognizer table. Entries
//! that don't (yet) form a recognizable pattern stay queued for the next call.

use crate::event::{RawEvent, RawOp, SemanticEvent};
use crate::platform::{Family, Platform, Window};
use parking_lot::Mutex;
use shadow_core::Blake3Hash;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

/// Filesystem queries the recognizers depend on
pub trait Probe: Send + Sync {
    fn exists(&self, path: &Path) -> bool;
    fn is_dir(&self, path: &Path) -> bool;
}

/// Probe backed by the local filesystem
#[derive(Debug, Default, Clone, Copy)]
pub struct FsProbe;

impl Probe for FsProbe {
    fn exists(&self, path: &Path) -> bool {
        path.symlink_metadata().is_ok()
    }

    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }
}

/// A queued raw event with the fingerprint of its parent node at enqueue time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Queued {
    pub event: RawEvent,
    pub parent_fingerprint: Option<Blake3Hash>,
}

pub struct Coalescer {
    queue: Mutex<Vec<Queued>>,
    next_seq: AtomicU64,
    platform: Platform,
    probe: Box<dyn Probe>,
}

impl Coalescer {
    pub fn new(platform: Platform) -> Self {
        Self::with_probe(platform, FsProbe)
    }

    pub fn with_probe(platform: Platform, probe: impl Probe + 'static) -> Self {
        Self {
            queue: Mutex::new(Vec::new()),
            next_seq: AtomicU64::new(0),
            platform,
            probe: Box::new(probe),
        }
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    /// Queue a raw event, returning its sequence number
    pub fn append(&self, mut event: RawEvent, parent_fingerprint: Option<Blake3Hash>) -> u64 {
        let mut queue = self.queue.lock();
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        event.seq = seq;
        queue.push(Queued {
            event,
            parent_fingerprint,
        });
        seq
    }

    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.lock().is_empty()
    }

    /// Drain every recognizable prefix of the queue into semantic events
    ///
    /// Permission changes and directory writes are dropped as they're reached. Scanning
    /// stops after a create (so the caller can apply it before later events are judged
    /// against the tree) or at the first entry no recognizer accepts. Only the consumed
    /// prefix is removed.
    pub fn process(&self) -> Vec<SemanticEvent> {
        let mut queue = self.queue.lock();
        let table = self.platform.table();
        let lookahead = self.platform.lookahead();

        let mut cursor = 0;
        let mut events = Vec::new();
        while cursor < queue.len() {
            let head = &queue[cursor].event;
            if head.op == RawOp::Chmod || (head.op == RawOp::Write && self.probe.is_dir(&head.path))
            {
                cursor += 1;
                continue;
            }

            let end = (cursor + lookahead).min(queue.len());
            let window = Window::new(&queue[cursor..end], self.probe.as_ref());
            let Some((recognizer, (event, consumed))) = table
                .iter()
                .find_map(|r| (r.matches)(&window).map(|m| (r, m)))
            else {
                break;
            };

            debug!("{}: {}", recognizer.case, event);
            cursor += consumed.max(1);
            events.push(event);
            if recognizer.family == Family::Create {
                break;
            }
        }

        queue.drain(..cursor);
        events
    }
}
