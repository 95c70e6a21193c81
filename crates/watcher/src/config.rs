//! Watcher configuration

use crate::platform::Platform;
use crate::{Result, WatchError};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Watcher settings, loadable from TOML
///
/// ```toml
/// tick_ms = 500
/// event_buffer = 4096
/// platform = "windows"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatcherConfig {
    /// Interval between coalescer drains, in milliseconds
    pub tick_ms: u64,
    /// Capacity of the `events` and `errors` streams
    pub event_buffer: usize,
    /// Recognizer table to use (defaults to the host platform)
    pub platform: Platform,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            tick_ms: 2000,
            event_buffer: 1024,
            platform: Platform::detect(),
        }
    }
}

impl WatcherConfig {
    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms.max(1))
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        toml::from_str(contents).map_err(|e| WatchError::Config(e.to_string()))
    }

    /// Load from a TOML file; missing keys take their defaults
    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| WatchError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&contents)
    }
}
