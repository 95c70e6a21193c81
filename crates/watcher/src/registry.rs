//! OS watch registrations
//!
//! Registrations are per directory and non-recursive, keyed by absolute path. When a
//! watched directory is renamed or moved every registration under it goes stale, so the
//! set is rebuilt on a fresh notification source with the old prefix rewritten.

use crate::Result;
use notify::{RecommendedWatcher, RecursiveMode, Watcher as _};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tracing::{debug, warn};

/// Stream of raw results from one notification source
pub type RawReceiver = UnboundedReceiver<notify::Result<notify::Event>>;

/// The set of directories registered with one notification source
pub struct WatchSet {
    watcher: RecommendedWatcher,
    paths: BTreeSet<PathBuf>,
}

impl WatchSet {
    /// Create an empty set on a new notification source
    pub fn new() -> Result<(Self, RawReceiver)> {
        let (tx, rx) = mpsc::unbounded_channel();
        let watcher = notify::recommended_watcher(move |res| {
            // Receiver gone means the set was replaced or the watcher stopped
            let _ = tx.send(res);
        })?;
        Ok((
            Self {
                watcher,
                paths: BTreeSet::new(),
            },
            rx,
        ))
    }

    /// Register a directory (no-op if already registered)
    pub fn add(&mut self, path: &Path) -> Result<()> {
        if self.paths.contains(path) {
            return Ok(());
        }
        self.watcher.watch(path, RecursiveMode::NonRecursive)?;
        self.paths.insert(path.to_path_buf());
        debug!("Watching {}", path.display());
        Ok(())
    }

    /// Unregister a directory
    ///
    /// The OS may already have dropped the registration (the directory is gone), so a
    /// failed unwatch is only logged.
    pub fn remove(&mut self, path: &Path) {
        if !self.paths.remove(path) {
            return;
        }
        if let Err(e) = self.watcher.unwatch(path) {
            debug!("Unwatch {} failed: {}", path.display(), e);
        }
    }

    /// Unregister `prefix` and every registered path below it
    pub fn remove_tree(&mut self, prefix: &Path) {
        let doomed: Vec<PathBuf> = self
            .paths
            .iter()
            .filter(|p| p.starts_with(prefix))
            .cloned()
            .collect();
        for path in doomed {
            self.remove(&path);
        }
    }

    /// Unregister everything
    pub fn clear(&mut self) {
        let all: Vec<PathBuf> = self.paths.iter().cloned().collect();
        for path in all {
            self.remove(&path);
        }
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.paths.contains(path)
    }

    /// Registered paths in sorted order
    pub fn paths(&self) -> Vec<PathBuf> {
        self.paths.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Build a replacement set with every path under `from` moved under `to`
    ///
    /// `self` is left untouched; the caller swaps the result in, which closes the old
    /// source. Paths that fail to register on the new source are skipped with a warning.
    pub fn rebuild(&self, from: &Path, to: &Path) -> Result<(WatchSet, RawReceiver)> {
        let (mut next, rx) = WatchSet::new()?;
        for path in &self.paths {
            let rewritten = rewrite_prefix(path, from, to);
            if let Err(e) = next.add(&rewritten) {
                warn!("Failed to re-register {}: {}", rewritten.display(), e);
            }
        }
        debug!(
            "Rebuilt watch set for {} -> {} ({} paths)",
            from.display(),
            to.display(),
            next.len()
        );
        Ok((next, rx))
    }
}

/// Replace the `from` prefix of `path` with `to`, matching whole components only
pub fn rewrite_prefix(path: &Path, from: &Path, to: &Path) -> PathBuf {
    match path.strip_prefix(from) {
        Ok(rest) if rest.as_os_str().is_empty() => to.to_path_buf(),
        Ok(rest) => to.join(rest),
        Err(_) => path.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_rewrite_prefix_matches_components() {
        let to = Path::new("/w/c");
        assert_eq!(rewrite_prefix(Path::new("/w/a"), Path::new("/w/a"), to), to);
        assert_eq!(
            rewrite_prefix(Path::new("/w/a/b"), Path::new("/w/a"), to),
            Path::new("/w/c/b")
        );
        assert_eq!(
            rewrite_prefix(Path::new("/w/a-other"), Path::new("/w/a"), to),
            Path::new("/w/a-other")
        );
    }

    #[test]
    fn test_add_remove_tree() -> anyhow::Result<()> {
        let temp_dir = TempDir::new()?;
        let root = temp_dir.path().to_path_buf();
        fs::create_dir_all(root.join("a/b"))?;
        fs::create_dir_all(root.join("a-other"))?;

        let (mut set, _rx) = WatchSet::new()?;
        for dir in [root.clone(), root.join("a"), root.join("a/b"), root.join("a-other")] {
            set.add(&dir)?;
        }
        set.add(&root)?;
        assert_eq!(set.len(), 4);

        set.remove_tree(&root.join("a"));
        assert_eq!(set.paths(), vec![root.clone(), root.join("a-other")]);

        set.clear();
        assert!(set.is_empty());
        Ok(())
    }

    #[test]
    fn test_rebuild_after_directory_rename() -> anyhow::Result<()> {
        let temp_dir = TempDir::new()?;
        let root = temp_dir.path().to_path_buf();
        fs::create_dir_all(root.join("a/b"))?;
        fs::create_dir_all(root.join("a-other"))?;

        let (mut set, _rx) = WatchSet::new()?;
        for dir in [root.clone(), root.join("a"), root.join("a/b"), root.join("a-other")] {
            set.add(&dir)?;
        }

        fs::rename(root.join("a"), root.join("c"))?;
        let (next, _next_rx) = set.rebuild(&root.join("a"), &root.join("c"))?;
        set = next;

        assert!(!set.contains(&root.join("a")));
        assert!(!set.contains(&root.join("a/b")));
        assert!(set.contains(&root.join("c")));
        assert!(set.contains(&root.join("c/b")));
        assert!(set.contains(&root.join("a-other")));
        assert_eq!(set.len(), 4);
        Ok(())
    }

    #[test]
    fn test_add_missing_directory_fails() {
        let (mut set, _rx) = WatchSet::new().unwrap();
        assert!(set.add(Path::new("/definitely/not/here")).is_err());
        assert!(set.is_empty());
    }
}
