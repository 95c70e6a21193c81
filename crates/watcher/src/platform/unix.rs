//! Recognizers for inotify / FSEvents / kqueue bursts

use super::{Family, Match, Recognizer, Window, WRITE};
use crate::event::{RawOp, SemanticEvent};

pub(super) static TABLE: &[Recognizer] = &[
    WRITE,
    Recognizer {
        family: Family::Remove,
        case: "remove-watched-dir",
        matches: remove_twice,
    },
    Recognizer {
        family: Family::Remove,
        case: "remove-moved-out",
        matches: rename_twice_gone,
    },
    Recognizer {
        family: Family::Remove,
        case: "remove-moved-elsewhere",
        matches: rename_then_foreign_create,
    },
    Recognizer {
        family: Family::Remove,
        case: "remove-trailing-rename",
        matches: trailing_rename_gone,
    },
    Recognizer {
        family: Family::Remove,
        case: "remove",
        matches: remove_single,
    },
    Recognizer {
        family: Family::Create,
        case: "create-alone",
        matches: create_alone,
    },
    Recognizer {
        family: Family::Create,
        case: "create-chmod",
        matches: create_chmod,
    },
    Recognizer {
        family: Family::Create,
        case: "create-moved-in",
        matches: create_rename_in_place,
    },
    Recognizer {
        family: Family::Create,
        case: "create",
        matches: create_single,
    },
    Recognizer {
        family: Family::Rename,
        case: "rename-watched-dir",
        matches: rename_create_rename,
    },
    Recognizer {
        family: Family::Rename,
        case: "rename",
        matches: rename_create,
    },
];

// Deleting a watched directory reports it from both its own watch and its parent's.
fn remove_twice(w: &Window<'_>) -> Option<Match> {
    if w.starts_with(&[RawOp::Remove, RawOp::Remove]) && w.same_path(0, 1) {
        return Some((w.event_on(0, SemanticEvent::remove)?, 2));
    }
    None
}

// Moving a watched directory somewhere unwatched.
fn rename_twice_gone(w: &Window<'_>) -> Option<Match> {
    if w.starts_with(&[RawOp::Rename, RawOp::Rename]) && w.same_path(0, 1) && !w.exists(0) {
        return Some((w.event_on(0, SemanticEvent::remove)?, 2));
    }
    None
}

// The create that follows belongs to a different directory.
fn rename_then_foreign_create(w: &Window<'_>) -> Option<Match> {
    if w.starts_with(&[RawOp::Rename, RawOp::Create]) && !w.same_fingerprint(0, 1) {
        return Some((w.event_on(0, SemanticEvent::remove)?, 1));
    }
    None
}

fn trailing_rename_gone(w: &Window<'_>) -> Option<Match> {
    if w.is(0, RawOp::Rename) && w.len() == 1 && !w.exists(0) {
        return Some((w.event_on(0, SemanticEvent::remove)?, 1));
    }
    None
}

fn remove_single(w: &Window<'_>) -> Option<Match> {
    if w.is(0, RawOp::Remove) {
        return Some((w.event_on(0, SemanticEvent::remove)?, 1));
    }
    None
}

fn create_alone(w: &Window<'_>) -> Option<Match> {
    if w.is(0, RawOp::Create) && w.len() == 1 {
        return Some((w.event_on(0, SemanticEvent::create)?, 1));
    }
    None
}

fn create_chmod(w: &Window<'_>) -> Option<Match> {
    if w.starts_with(&[RawOp::Create, RawOp::Chmod]) && w.same_path(0, 1) {
        return Some((w.event_on(0, SemanticEvent::create)?, 2));
    }
    None
}

fn create_rename_in_place(w: &Window<'_>) -> Option<Match> {
    if w.starts_with(&[RawOp::Create, RawOp::Rename])
        && w.same_path(0, 1)
        && w.same_fingerprint(0, 1)
        && w.exists(0)
    {
        return Some((w.event_on(0, SemanticEvent::create)?, 2));
    }
    None
}

fn create_single(w: &Window<'_>) -> Option<Match> {
    if w.is(0, RawOp::Create) {
        return Some((w.event_on(0, SemanticEvent::create)?, 1));
    }
    None
}

// Renaming a watched directory: parent reports from/to, the directory's own watch repeats from.
fn rename_create_rename(w: &Window<'_>) -> Option<Match> {
    if w.starts_with(&[RawOp::Rename, RawOp::Create, RawOp::Rename]) && w.same_path(0, 2) {
        return Some((w.rename(0, 1)?, 3));
    }
    None
}

fn rename_create(w: &Window<'_>) -> Option<Match> {
    if w.starts_with(&[RawOp::Rename, RawOp::Create]) && !w.same_path(0, 1) {
        return Some((w.rename(0, 1)?, 2));
    }
    None
}
