//! Filesystem watching for the shadow tree
//!
//! This crate provides:
//! - Raw notification mapping and the per-platform event coalescer
//! - The OS watch registration set, rebuilt when watched directories move
//! - `Watcher`, which keeps a shadow tree in sync with a real directory
//! - `VirtualTree`, the same tree contract driven directly by caller events

pub mod apply;
pub mod coalesce;
pub mod config;
pub mod error;
pub mod event;
pub mod platform;
pub mod registry;
pub mod restore;
pub mod virtual_tree;
pub mod watcher;

// Re-exports
pub use coalesce::{Coalescer, FsProbe, Probe};
pub use config::WatcherConfig;
pub use error::{Result, WatchError};
pub use event::{RawEvent, RawOp, SemanticEvent};
pub use platform::Platform;
pub use restore::{restore_with_transactions, Restore};
pub use virtual_tree::VirtualTree;
pub use watcher::Watcher;
