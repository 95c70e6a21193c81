//! Watcher errors

use shadow_core::TreeError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WatchError {
    /// A tree operation failed; the tree is unchanged
    #[error(transparent)]
    Tree(#[from] TreeError),

    /// Registering or receiving from the OS notification source failed
    #[error("notification source error: {0}")]
    Source(#[from] notify::Error),

    /// The event can't be dispatched (e.g. a rename without a destination)
    #[error("unrecognized event: {0}")]
    Unrecognized(String),

    #[error("watch root is not a directory: {}", .0.display())]
    RootNotDirectory(PathBuf),

    /// The watcher has been stopped
    #[error("watcher stopped")]
    Stopped,

    /// The filesystem watcher was created outside a tokio runtime
    #[error("no tokio runtime available to run the watch loops")]
    NoRuntime,

    #[error("invalid watcher config: {0}")]
    Config(String),

    /// Restoring from encoded transactions failed
    #[error(transparent)]
    Journal(#[from] shadow_journal::JournalError),
}

/// Result type for watcher operations
pub type Result<T> = std::result::Result<T, WatchError>;
