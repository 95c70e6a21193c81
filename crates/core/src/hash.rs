//! BLAKE3 fingerprints for shadow tree nodes
//!
//! Files are hashed by content. Directories are hashed shallowly: the digest covers the
//! sorted names of the immediate children (or the modification time when empty), so it
//! answers "did my listing change", not "did anything below me change".

use crate::error::{Result, TreeError};
use crate::path::PathRef;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{BufReader, Read};
use std::path::Path;

/// Files at or above this size are hashed through a memory map
pub const MMAP_THRESHOLD: u64 = 4 * 1024 * 1024;

/// Maximum number of child names folded into a directory fingerprint
pub const DIR_LISTING_LIMIT: usize = 100;

/// A BLAKE3 hash (32 bytes)
#[derive(Copy, Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
pub struct Blake3Hash([u8; 32]);

impl Blake3Hash {
    /// Create a new Blake3Hash from bytes
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get the hash as a byte slice
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Lowercase hex string
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from a 64-character hex string
    pub fn from_hex(s: &str) -> std::result::Result<Self, hex::FromHexError> {
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(s, &mut bytes)?;
        Ok(Self(bytes))
    }
}

impl std::fmt::Debug for Blake3Hash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Blake3Hash({})", self.to_hex())
    }
}

impl std::fmt::Display for Blake3Hash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// Hash bytes using BLAKE3
pub fn hash_bytes(data: &[u8]) -> Blake3Hash {
    Blake3Hash::from_bytes(*blake3::hash(data).as_bytes())
}

/// Hash a file using BLAKE3 (streaming for small files, mmap for large ones)
pub fn hash_file(path: &Path) -> std::io::Result<Blake3Hash> {
    let file = fs::File::open(path)?;
    if file.metadata()?.len() >= MMAP_THRESHOLD {
        // SAFETY: read-only map, dropped before returning
        let mmap = unsafe { memmap2::Mmap::map(&file)? };
        return Ok(hash_bytes(&mmap));
    }

    let mut reader = BufReader::new(file);
    let mut hasher = blake3::Hasher::new();
    let mut buffer = [0u8; 8192];
    loop {
        let bytes_read = reader.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }
    Ok(Blake3Hash::from_bytes(*hasher.finalize().as_bytes()))
}

/// Hash the immediate child listing of a directory
pub fn hash_dir_listing(path: &Path) -> std::io::Result<Blake3Hash> {
    let mut names = fs::read_dir(path)?
        .map(|entry| entry.map(|e| e.file_name().to_string_lossy().into_owned()))
        .collect::<std::io::Result<Vec<_>>>()?;
    names.sort_unstable();

    let mut hasher = blake3::Hasher::new();
    if names.is_empty() {
        // Empty directories fall back to their modification time
        let modified = fs::metadata(path)?
            .modified()?
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        hasher.update(modified.to_string().as_bytes());
    } else {
        for name in names.iter().take(DIR_LISTING_LIMIT) {
            hasher.update(name.as_bytes());
        }
    }
    Ok(Blake3Hash::from_bytes(*hasher.finalize().as_bytes()))
}

/// Fingerprint a location
///
/// Returns `None` for virtual paths, which have no content to hash.
pub fn fingerprint(path: &PathRef) -> Result<Option<Blake3Hash>> {
    let Some(fs_path) = path.as_fs_path() else {
        return Ok(None);
    };
    let digest = if fs_path.is_dir() {
        hash_dir_listing(fs_path)
    } else {
        hash_file(fs_path)
    };
    digest.map(Some).map_err(|e| TreeError::io(fs_path, e))
}
