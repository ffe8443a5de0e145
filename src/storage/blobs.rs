//! Blob store trait and filesystem implementation.
//!
//! Attachment bytes are kept out of the relational store and delegated to
//! a `BlobStore`. The default implementation writes one file per
//! attachment id under `<data>/blobs/`.

use crate::{Error, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Trait for stores that hold raw attachment bytes.
///
/// Keys are attachment ids; metadata lives in the relational store.
pub trait BlobStore: Send + Sync {
    /// Store bytes under the given key, replacing any existing blob.
    fn put(&mut self, key: &str, bytes: &[u8]) -> Result<()>;

    /// Read the bytes stored under the given key.
    fn get(&self, key: &str) -> Result<Vec<u8>>;

    /// Delete the blob stored under the given key.
    ///
    /// Deleting a missing blob is not an error; metadata and bytes may be
    /// cleaned up independently.
    fn delete(&mut self, key: &str) -> Result<()>;

    /// Get the storage location description (for display purposes).
    fn location(&self) -> String;
}

/// Filesystem-backed blob store, one file per key.
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    /// Open or create a blob store rooted at the given directory.
    pub fn open(root: &Path) -> Result<Self> {
        fs::create_dir_all(root)?;
        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    fn blob_path(&self, key: &str) -> Result<PathBuf> {
        // Keys are UUIDs; reject anything that could escape the root.
        if key.is_empty() || !key.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return Err(Error::InvalidInput(format!("invalid blob key: {}", key)));
        }
        Ok(self.root.join(key))
    }
}

impl BlobStore for FsBlobStore {
    fn put(&mut self, key: &str, bytes: &[u8]) -> Result<()> {
        let path = self.blob_path(key)?;
        fs::write(path, bytes)?;
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Vec<u8>> {
        let path = self.blob_path(key)?;
        if !path.exists() {
            return Err(Error::NotFound(format!("Blob not found: {}", key)));
        }
        Ok(fs::read(path)?)
    }

    fn delete(&mut self, key: &str) -> Result<()> {
        let path = self.blob_path(key)?;
        if path.exists() {
            fs::remove_file(path)?;
        }
        Ok(())
    }

    fn location(&self) -> String {
        self.root.display().to_string()
    }
}
