//! Semantic event kinds

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of a semantic change applied to the shadow tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    /// Node (and, for directories, its subtree) created
    Create,
    /// Node detached and dropped
    Remove,
    /// Node renamed in place
    Rename,
    /// Node re-parented
    Move,
    /// File content changed
    Write,
}

impl EventKind {
    /// Lowercase name used in logs and the interactive shell
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Create => "create",
            EventKind::Remove => "remove",
            EventKind::Rename => "rename",
            EventKind::Move => "move",
            EventKind::Write => "write",
        }
    }

    /// Whether events of this kind carry a destination path
    pub fn has_destination(&self) -> bool {
        matches!(self, EventKind::Rename | EventKind::Move)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "create" => Ok(EventKind::Create),
            "remove" => Ok(EventKind::Remove),
            "rename" => Ok(EventKind::Rename),
            "move" => Ok(EventKind::Move),
            "write" => Ok(EventKind::Write),
            other => Err(format!("unknown event kind: {}", other)),
        }
    }
}
