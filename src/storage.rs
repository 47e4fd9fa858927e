//! Blob storage abstraction.
//!
//! The [`Storage`] trait is the seam between derivation logic and wherever
//! blobs actually live. Paths are always storage-relative; each
//! implementation owns its root and its public URL prefix. The production
//! implementation is [`FileStorage`] — a plain directory tree.
//!
//! Existence checks and URL resolution are deliberately separate operations:
//! the deriver asks `exists` first and only resolves a URL on a hit, so a
//! remote-backed implementation can keep `url_for` cheap and local.

use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("blob not found: {0}")]
    NotFound(String),
    #[error("path is not valid UTF-8: {0}")]
    InvalidPath(String),
}

/// Key/value blob store with existence checks and URL resolution.
///
/// All paths are relative to the store's root.
pub trait Storage {
    /// Whether a blob exists at the given relative path.
    fn exists(&self, path: &Path) -> Result<bool, StorageError>;

    /// Resolve a relative path to a public URL.
    fn url_for(&self, path: &Path) -> Result<String, StorageError>;

    /// Read a blob's full contents.
    fn read(&self, path: &Path) -> Result<Vec<u8>, StorageError>;

    /// Write a blob, creating parent directories as needed.
    fn write(&self, path: &Path, data: &[u8]) -> Result<(), StorageError>;
}

/// Filesystem-backed storage rooted at `media_root`.
///
/// URLs are formed by joining `media_url` with the relative path using `/`
/// separators regardless of platform.
#[derive(Debug, Clone)]
pub struct FileStorage {
    media_root: PathBuf,
    media_url: String,
}

impl FileStorage {
    pub fn new(media_root: impl Into<PathBuf>, media_url: impl Into<String>) -> Self {
        Self {
            media_root: media_root.into(),
            media_url: media_url.into(),
        }
    }

    /// Build from the storage section of a [`crate::config::LibraryConfig`].
    pub fn from_config(config: &crate::config::StorageConfig) -> Self {
        Self::new(&config.media_root, &config.media_url)
    }

    fn absolute(&self, path: &Path) -> PathBuf {
        self.media_root.join(path)
    }
}

impl Storage for FileStorage {
    fn exists(&self, path: &Path) -> Result<bool, StorageError> {
        // A failed metadata lookup that is not plain absence (permissions,
        // a file in the middle of the path) must surface as an error, not
        // read as a cache miss.
        match fs::metadata(self.absolute(path)) {
            Ok(meta) => Ok(meta.is_file()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StorageError::Io(e)),
        }
    }

    fn url_for(&self, path: &Path) -> Result<String, StorageError> {
        let rel = path
            .to_str()
            .ok_or_else(|| StorageError::InvalidPath(path.to_string_lossy().to_string()))?;
        let rel = rel.replace('\\', "/");
        Ok(format!(
            "{}/{}",
            self.media_url.trim_end_matches('/'),
            rel.trim_start_matches('/')
        ))
    }

    fn read(&self, path: &Path) -> Result<Vec<u8>, StorageError> {
        let absolute = self.absolute(path);
        if !absolute.is_file() {
            return Err(StorageError::NotFound(path.to_string_lossy().to_string()));
        }
        Ok(fs::read(absolute)?)
    }

    fn write(&self, path: &Path, data: &[u8]) -> Result<(), StorageError> {
        let absolute = self.absolute(path);
        if let Some(parent) = absolute.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(absolute, data)?;
        Ok(())
    }
}
