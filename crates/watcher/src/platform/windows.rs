//! Recognizers for ReadDirectoryChangesW bursts
//!
//! Windows splits a save or move into several creates, writes and renames, often
//! reporting the same path more than once, so patterns here look up to six entries ahead.

use super::{Family, Match, Recognizer, Window, WRITE};
use crate::event::RawOp::{self, Create, Rename, Write};
use crate::event::SemanticEvent;

pub(super) static TABLE: &[Recognizer] = &[
    WRITE,
    Recognizer {
        family: Family::Remove,
        case: "remove-watched-dir",
        matches: remove_twice,
    },
    Recognizer {
        family: Family::Remove,
        case: "remove",
        matches: remove_single,
    },
    Recognizer {
        family: Family::Create,
        case: "create-replace-6",
        matches: create_replace_full,
    },
    Recognizer {
        family: Family::Create,
        case: "create-replace-5",
        matches: create_replace,
    },
    Recognizer {
        family: Family::Create,
        case: "create-alone",
        matches: create_alone,
    },
    Recognizer {
        family: Family::Create,
        case: "create-via-temp",
        matches: create_via_temp,
    },
    Recognizer {
        family: Family::Create,
        case: "create-write",
        matches: create_write,
    },
    Recognizer {
        family: Family::Create,
        case: "create-rename",
        matches: create_rename,
    },
    Recognizer {
        family: Family::Create,
        case: "create",
        matches: create_single,
    },
    Recognizer {
        family: Family::Rename,
        case: "rename-write-3",
        matches: rename_three_writes,
    },
    Recognizer {
        family: Family::Rename,
        case: "rename-write-2",
        matches: rename_two_writes,
    },
    Recognizer {
        family: Family::Rename,
        case: "rename-write",
        matches: rename_write,
    },
    Recognizer {
        family: Family::Rename,
        case: "rename",
        matches: rename_create,
    },
];

fn remove_twice(w: &Window<'_>) -> Option<Match> {
    if w.starts_with(&[RawOp::Remove, RawOp::Remove]) && w.same_path(0, 1) {
        return Some((w.event_on(0, SemanticEvent::remove)?, 2));
    }
    None
}

fn remove_single(w: &Window<'_>) -> Option<Match> {
    if w.is(0, RawOp::Remove) {
        return Some((w.event_on(0, SemanticEvent::remove)?, 1));
    }
    None
}

// Editor save through a temp file: the temp is created, written, renamed away and the
// target is recreated and written (twice).
fn create_replace_full(w: &Window<'_>) -> Option<Match> {
    if w.starts_with(&[Create, Write, Rename, Create, Write, Write])
        && w.same_path(0, 2)
        && w.same_path(3, 5)
    {
        return Some((w.event_on(5, SemanticEvent::create)?, 6));
    }
    None
}

fn create_replace(w: &Window<'_>) -> Option<Match> {
    if w.starts_with(&[Create, Write, Rename, Create, Write]) && w.same_path(0, 2) {
        return Some((w.event_on(3, SemanticEvent::create)?, 5));
    }
    None
}

fn create_alone(w: &Window<'_>) -> Option<Match> {
    if w.is(0, Create) && w.len() == 1 {
        return Some((w.event_on(0, SemanticEvent::create)?, 1));
    }
    None
}

fn create_via_temp(w: &Window<'_>) -> Option<Match> {
    if w.starts_with(&[Create, Rename, Create, Write])
        && w.same_fingerprint(0, 1)
        && w.same_path(2, 3)
    {
        return Some((w.event_on(3, SemanticEvent::create)?, 4));
    }
    None
}

fn create_write(w: &Window<'_>) -> Option<Match> {
    if w.starts_with(&[Create, Write]) && w.same_path(0, 1) {
        return Some((w.event_on(0, SemanticEvent::create)?, 2));
    }
    None
}

fn create_rename(w: &Window<'_>) -> Option<Match> {
    if w.starts_with(&[Create, Rename]) && w.same_path(0, 1) {
        return Some((w.event_on(0, SemanticEvent::create)?, 2));
    }
    None
}

fn create_single(w: &Window<'_>) -> Option<Match> {
    if w.is(0, Create) {
        return Some((w.event_on(0, SemanticEvent::create)?, 1));
    }
    None
}

fn rename_three_writes(w: &Window<'_>) -> Option<Match> {
    if w.starts_with(&[Rename, Create, Write, Write, Write])
        && w.same_path(1, 3)
        && w.same_path(1, 4)
    {
        return Some((w.rename(0, 4)?, 5));
    }
    None
}

fn rename_two_writes(w: &Window<'_>) -> Option<Match> {
    if w.starts_with(&[Rename, Create, Write, Write]) && w.same_path(1, 2) && w.same_path(2, 3) {
        return Some((w.rename(0, 1)?, 4));
    }
    None
}

fn rename_write(w: &Window<'_>) -> Option<Match> {
    if w.starts_with(&[Rename, Create, Write]) && w.same_path(1, 2) {
        return Some((w.rename(0, 1)?, 3));
    }
    None
}

fn rename_create(w: &Window<'_>) -> Option<Match> {
    if w.starts_with(&[Rename, Create]) && !w.same_path(0, 1) {
        return Some((w.rename(0, 1)?, 2));
    }
    None
}
