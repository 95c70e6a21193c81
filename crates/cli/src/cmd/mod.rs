//! CLI command implementations

pub mod replay;
pub mod shell;
pub mod watch;
