//! Core data model for the shadow tree
//!
//! This crate provides:
//! - `PathRef`, a location handle with filesystem and virtual variants
//! - BLAKE3 fingerprinting of files and (shallowly) directories
//! - The in-memory shadow tree (`Node`, `Meta`) and its structural operations
//! - The event kinds shared by the watcher and the transaction log

pub mod error;
pub mod hash;
pub mod kind;
pub mod node;
pub mod path;

// Re-exports
pub use error::{Result, TreeError};
pub use hash::{fingerprint, Blake3Hash};
pub use kind::EventKind;
pub use node::{ExtraPayload, Measured, Meta, Node, OnDiscovered, Site, Staged};
pub use path::{PathRef, Stat};
