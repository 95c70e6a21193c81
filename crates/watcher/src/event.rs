//! Raw notifications and the semantic events derived from them

use notify::event::{ModifyKind, RenameMode};
use notify::EventKind as NotifyKind;
use shadow_core::{EventKind, PathRef};
use std::fmt;
use std::path::PathBuf;

/// Operation carried by a raw OS notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RawOp {
    Create,
    Write,
    Remove,
    Rename,
    /// Permission change; never part of a recognized pattern
    Chmod,
}

/// One raw notification, as queued on the coalescer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEvent {
    pub path: PathBuf,
    pub op: RawOp,
    /// Arrival order, assigned when queued
    pub seq: u64,
}

impl RawEvent {
    pub fn new(path: impl Into<PathBuf>, op: RawOp) -> Self {
        Self {
            path: path.into(),
            op,
            seq: 0,
        }
    }

    /// Map a `notify` event onto raw operations
    ///
    /// `Name(Both)` is dropped: backends that emit it also deliver the `From` and `To`
    /// halves separately. Access and unclassified events carry nothing the coalescer uses.
    pub fn from_notify(event: &notify::Event) -> Vec<RawEvent> {
        let op = match event.kind {
            NotifyKind::Create(_) => RawOp::Create,
            NotifyKind::Remove(_) => RawOp::Remove,
            NotifyKind::Modify(ModifyKind::Metadata(_)) => RawOp::Chmod,
            NotifyKind::Modify(ModifyKind::Name(RenameMode::To)) => RawOp::Create,
            NotifyKind::Modify(ModifyKind::Name(RenameMode::Both)) => return Vec::new(),
            NotifyKind::Modify(ModifyKind::Name(_)) => RawOp::Rename,
            NotifyKind::Modify(_) => RawOp::Write,
            NotifyKind::Access(_) | NotifyKind::Any | NotifyKind::Other => return Vec::new(),
        };
        event
            .paths
            .iter()
            .map(|path| RawEvent::new(path.clone(), op))
            .collect()
    }
}

/// A recognized change, ready to apply to the tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SemanticEvent {
    pub kind: EventKind,
    pub from: PathRef,
    /// New path for `Rename`; destination directory for `Move`
    pub to: Option<PathRef>,
}

impl SemanticEvent {
    pub fn new(kind: EventKind, from: PathRef) -> Self {
        Self {
            kind,
            from,
            to: None,
        }
    }

    pub fn with_destination(kind: EventKind, from: PathRef, to: PathRef) -> Self {
        Self {
            kind,
            from,
            to: Some(to),
        }
    }

    pub fn create(from: PathRef) -> Self {
        Self::new(EventKind::Create, from)
    }

    pub fn remove(from: PathRef) -> Self {
        Self::new(EventKind::Remove, from)
    }

    pub fn write(from: PathRef) -> Self {
        Self::new(EventKind::Write, from)
    }

    pub fn rename(from: PathRef, to: PathRef) -> Self {
        Self::with_destination(EventKind::Rename, from, to)
    }

    pub fn move_to(from: PathRef, to_dir: PathRef) -> Self {
        Self::with_destination(EventKind::Move, from, to_dir)
    }
}

impl fmt::Display for SemanticEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.from)?;
        if let Some(to) = &self.to {
            write!(f, " -> {}", to)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{AccessKind, CreateKind, DataChange, MetadataKind, RemoveKind};

    fn notify_event(kind: NotifyKind, paths: &[&str]) -> notify::Event {
        paths
            .iter()
            .fold(notify::Event::new(kind), |e, p| e.add_path(PathBuf::from(p)))
    }

    fn ops(event: notify::Event) -> Vec<RawOp> {
        RawEvent::from_notify(&event).into_iter().map(|r| r.op).collect()
    }

    #[test]
    fn test_notify_kinds_map_to_raw_ops() {
        assert_eq!(
            ops(notify_event(NotifyKind::Create(CreateKind::File), &["/a"])),
            vec![RawOp::Create]
        );
        assert_eq!(
            ops(notify_event(
                NotifyKind::Modify(ModifyKind::Data(DataChange::Content)),
                &["/a"]
            )),
            vec![RawOp::Write]
        );
        assert_eq!(
            ops(notify_event(
                NotifyKind::Modify(ModifyKind::Metadata(MetadataKind::Permissions)),
                &["/a"]
            )),
            vec![RawOp::Chmod]
        );
        assert_eq!(
            ops(notify_event(NotifyKind::Remove(RemoveKind::Folder), &["/a"])),
            vec![RawOp::Remove]
        );
    }

    #[test]
    fn test_rename_halves() {
        assert_eq!(
            ops(notify_event(
                NotifyKind::Modify(ModifyKind::Name(RenameMode::From)),
                &["/a"]
            )),
            vec![RawOp::Rename]
        );
        assert_eq!(
            ops(notify_event(
                NotifyKind::Modify(ModifyKind::Name(RenameMode::To)),
                &["/b"]
            )),
            vec![RawOp::Create]
        );
        assert!(ops(notify_event(
            NotifyKind::Modify(ModifyKind::Name(RenameMode::Both)),
            &["/a", "/b"]
        ))
        .is_empty());
    }

    #[test]
    fn test_access_is_ignored() {
        assert!(ops(notify_event(NotifyKind::Access(AccessKind::Any), &["/a"])).is_empty());
    }

    #[test]
    fn test_display() {
        let event = SemanticEvent::rename(
            PathRef::virtual_path("root/a", false),
            PathRef::virtual_path("root/b", false),
        );
        assert_eq!(event.to_string(), "rename root/a -> root/b");
        assert_eq!(
            SemanticEvent::create(PathRef::virtual_path("root/a", false)).to_string(),
            "create root/a"
        );
    }
}
