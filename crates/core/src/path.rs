//! Location handles for real and virtual trees
//!
//! Everything above this module talks to a `PathRef` through its methods only; the
//! filesystem/virtual split never leaks into tree or watcher code.

use crate::error::{Result, TreeError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

/// Separator used by tree paths and virtual paths
pub const SEPARATOR: char = '/';

/// Handle to a location, either backed by the filesystem or purely nominal
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PathRef {
    /// Real path on the local filesystem
    Fs(PathBuf),
    /// Nominal path: always exists, never touches the disk
    Virtual {
        /// `/`-separated path
        path: String,
        /// Whether the location should be treated as a directory
        is_dir: bool,
    },
}

/// Subset of file metadata recorded on nodes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Stat {
    pub is_dir: bool,
    pub size: u64,
    /// Modification time, Unix seconds
    pub modified: i64,
    /// Permission bits rendered as a string tag
    pub permission: String,
}

impl PathRef {
    /// Filesystem-backed handle
    pub fn fs(path: impl Into<PathBuf>) -> Self {
        PathRef::Fs(path.into())
    }

    /// Virtual handle
    pub fn virtual_path(path: impl Into<String>, is_dir: bool) -> Self {
        PathRef::Virtual {
            path: path.into(),
            is_dir,
        }
    }

    pub fn is_virtual(&self) -> bool {
        matches!(self, PathRef::Virtual { .. })
    }

    pub fn is_dir(&self) -> bool {
        match self {
            PathRef::Fs(path) => path.is_dir(),
            PathRef::Virtual { is_dir, .. } => *is_dir,
        }
    }

    pub fn exists(&self) -> bool {
        match self {
            PathRef::Fs(path) => path.symlink_metadata().is_ok(),
            PathRef::Virtual { .. } => true,
        }
    }

    /// Whether the location is a symbolic link (never true for virtual paths)
    pub fn is_symlink(&self) -> bool {
        match self {
            PathRef::Fs(path) => path.is_symlink(),
            PathRef::Virtual { .. } => false,
        }
    }

    /// Last path component, or an empty string for a root
    pub fn name(&self) -> String {
        match self {
            PathRef::Fs(path) => path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            PathRef::Virtual { path, .. } => path
                .trim_end_matches(SEPARATOR)
                .rsplit(SEPARATOR)
                .next()
                .unwrap_or_default()
                .to_string(),
        }
    }

    /// Parent location of the same variant (virtual parents are directories)
    pub fn parent(&self) -> Option<PathRef> {
        match self {
            PathRef::Fs(path) => path.parent().map(|p| PathRef::Fs(p.to_path_buf())),
            PathRef::Virtual { path, .. } => {
                let trimmed = path.trim_end_matches(SEPARATOR);
                let (parent, _) = trimmed.rsplit_once(SEPARATOR)?;
                Some(PathRef::virtual_path(parent, true))
            }
        }
    }

    /// Child location of the same variant
    pub fn join(&self, name: &str, is_dir: bool) -> PathRef {
        match self {
            PathRef::Fs(path) => PathRef::Fs(path.join(name)),
            PathRef::Virtual { path, .. } => {
                let base = path.trim_end_matches(SEPARATOR);
                PathRef::virtual_path(format!("{}{}{}", base, SEPARATOR, name), is_dir)
            }
        }
    }

    /// Tree path of `self` relative to `base`, `/`-joined with no leading separator
    pub fn relative_to(&self, base: &PathRef) -> Result<String> {
        match (self, base) {
            (PathRef::Fs(path), PathRef::Fs(base)) => {
                let rel = path
                    .strip_prefix(base)
                    .map_err(|_| TreeError::InvalidPath(path.display().to_string()))?;
                let segments: Vec<String> = rel
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy().into_owned())
                    .collect();
                Ok(segments.join("/"))
            }
            _ => {
                let full = self.to_string();
                let prefix = base.to_string();
                let prefix = prefix.trim_end_matches(SEPARATOR);
                let rest = full
                    .strip_prefix(prefix)
                    .ok_or_else(|| TreeError::InvalidPath(full.clone()))?;
                if !prefix.is_empty() && !rest.is_empty() && !rest.starts_with(SEPARATOR) {
                    return Err(TreeError::InvalidPath(full));
                }
                Ok(rest.trim_matches(SEPARATOR).to_string())
            }
        }
    }

    /// Metadata snapshot; empty (apart from `is_dir`) for virtual paths
    pub fn stat(&self) -> Result<Stat> {
        match self {
            PathRef::Fs(path) => {
                let metadata = fs::metadata(path).map_err(|e| TreeError::io(path, e))?;
                let modified = metadata
                    .modified()
                    .ok()
                    .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
                    .map(|d| d.as_secs() as i64)
                    .unwrap_or_default();
                Ok(Stat {
                    is_dir: metadata.is_dir(),
                    size: metadata.len(),
                    modified,
                    permission: permission_tag(&metadata),
                })
            }
            PathRef::Virtual { is_dir, .. } => Ok(Stat {
                is_dir: *is_dir,
                ..Stat::default()
            }),
        }
    }

    /// Backing filesystem path, if any
    pub fn as_fs_path(&self) -> Option<&Path> {
        match self {
            PathRef::Fs(path) => Some(path),
            PathRef::Virtual { .. } => None,
        }
    }
}

impl fmt::Display for PathRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathRef::Fs(path) => write!(f, "{}", path.display()),
            PathRef::Virtual { path, .. } => f.write_str(path),
        }
    }
}

#[cfg(unix)]
fn permission_tag(metadata: &fs::Metadata) -> String {
    use std::os::unix::fs::PermissionsExt;
    format!("{:o}", metadata.permissions().mode())
}

#[cfg(not(unix))]
fn permission_tag(metadata: &fs::Metadata) -> String {
    if metadata.permissions().readonly() {
        "r".to_string()
    } else {
        "rw".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_fs_path() -> anyhow::Result<()> {
        let temp_dir = TempDir::new()?;
        let folder = temp_dir.path().join("test");
        let file = temp_dir.path().join("test.txt");
        fs::create_dir(&folder)?;
        fs::write(&file, b"")?;

        let folder_ref = PathRef::fs(&folder);
        let file_ref = PathRef::fs(&file);

        assert!(folder_ref.is_dir());
        assert!(!folder_ref.is_virtual());
        assert!(folder_ref.exists());
        assert_eq!(folder_ref.name(), "test");
        assert_eq!(folder_ref.parent().unwrap(), PathRef::fs(temp_dir.path()));

        assert!(!file_ref.is_dir());
        assert!(file_ref.exists());
        assert_eq!(file_ref.name(), "test.txt");

        let base = PathRef::fs(temp_dir.path().parent().unwrap());
        let expected = format!(
            "{}/test",
            temp_dir.path().file_name().unwrap().to_string_lossy()
        );
        assert_eq!(folder_ref.relative_to(&base)?, expected);

        assert!(!PathRef::fs(temp_dir.path().join("missing")).exists());
        Ok(())
    }

    #[test]
    fn test_virtual_path() -> anyhow::Result<()> {
        let folder = PathRef::virtual_path("/tmp/fs-shadow/test", true);
        let file = PathRef::virtual_path("/tmp/fs-shadow/test.txt", false);

        assert!(folder.is_dir());
        assert!(folder.is_virtual());
        assert!(folder.exists());
        assert_eq!(folder.name(), "test");
        assert_eq!(folder.parent().unwrap().name(), "fs-shadow");
        assert!(folder.parent().unwrap().is_dir());

        assert!(!file.is_dir());
        assert!(file.exists());
        assert_eq!(file.name(), "test.txt");

        let base = PathRef::virtual_path("/tmp", true);
        assert_eq!(folder.relative_to(&base)?, "fs-shadow/test");
        assert_eq!(file.stat()?, Stat::default());
        Ok(())
    }

    #[test]
    fn test_virtual_relative_rejects_sibling_prefix() {
        let path = PathRef::virtual_path("root-other/a", false);
        let base = PathRef::virtual_path("root", true);
        assert!(path.relative_to(&base).is_err());
    }

    #[test]
    fn test_virtual_join_and_relative_root() -> anyhow::Result<()> {
        let root = PathRef::virtual_path("root", true);
        let child = root.join("sub", true);
        assert_eq!(child.to_string(), "root/sub");
        assert_eq!(root.parent(), None);
        assert_eq!(child.relative_to(&PathRef::virtual_path("", true))?, "root/sub");
        Ok(())
    }

    #[test]
    fn test_fs_stat_reports_size() -> anyhow::Result<()> {
        let temp_dir = TempDir::new()?;
        let file = temp_dir.path().join("data.bin");
        fs::write(&file, vec![0u8; 42])?;

        let stat = PathRef::fs(&file).stat()?;
        assert!(!stat.is_dir);
        assert_eq!(stat.size, 42);
        assert!(!stat.permission.is_empty());
        Ok(())
    }
}
