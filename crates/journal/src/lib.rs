//! Transaction log for the shadow tree
//!
//! This crate provides:
//! - `Transaction`, the flattened record of one applied tree mutation, and its bincode codec
//! - `replay`, which folds an ordered transaction list into a fresh tree
//! - `Journal`, an append-only sled store of transactions ordered by sequence number

pub mod error;
pub mod journal;
pub mod replay;
pub mod transaction;

// Re-exports
pub use error::{JournalError, Result};
pub use journal::Journal;
pub use replay::{decode_and_replay, replay};
pub use transaction::Transaction;
