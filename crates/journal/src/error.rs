//! Journal errors

use thiserror::Error;

#[derive(Debug, Error)]
pub enum JournalError {
    /// Transaction bytes could not be encoded or decoded
    #[error("transaction codec error: {0}")]
    Codec(#[from] bincode::Error),

    /// The sled store failed
    #[error("journal storage error: {0}")]
    Storage(#[from] sled::Error),

    /// The transaction sequence is inconsistent
    #[error("replay failed at transaction {index}: {reason}")]
    Replay { index: usize, reason: String },
}

impl JournalError {
    pub(crate) fn replay(index: usize, reason: impl Into<String>) -> Self {
        Self::Replay {
            index,
            reason: reason.into(),
        }
    }
}

/// Result type for journal operations
pub type Result<T> = std::result::Result<T, JournalError>;
