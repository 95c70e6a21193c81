//! Errors raised by tree and path operations

use std::path::PathBuf;
use thiserror::Error;

/// Failure of a single tree operation
///
/// Every variant leaves the tree unmodified.
#[derive(Debug, Error)]
pub enum TreeError {
    /// Path or UUID lookup miss
    #[error("node not found: {0}")]
    NotFound(String),

    /// A sibling with the same name already exists under the target parent
    #[error("node already exists: {0}")]
    AlreadyExists(String),

    /// Path cannot be expressed relative to the tree (or would create a cycle)
    #[error("invalid path: {0}")]
    InvalidPath(String),

    /// Stat, read or fingerprint failed on the backing filesystem
    #[error("I/O failure at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl TreeError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// True for lookup misses (the recoverable, "nothing happened" case)
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Result type for tree operations
pub type Result<T> = std::result::Result<T, TreeError>;
