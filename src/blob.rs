//! Content-addressable blob store.
//!
//! Blobs are named by the SHA-256 hex digest of their bytes and laid out in a
//! two-character fan-out under the store root (`ab/ab12…`). Imports are
//! idempotent: a blob that already exists is never rewritten.

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

/// Hex SHA-256 digest of a byte slice.
pub fn hash_bytes(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Digest of the empty byte string — the "no content" sentinel used by the
/// fingerprinter and stored in records whose file or side document is absent.
pub fn empty_hash() -> String {
    hash_bytes(b"")
}

#[derive(Debug, Clone)]
pub struct BlobStore {
    root: PathBuf,
}

impl BlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Filesystem path a blob with this hash lives at (whether or not it
    /// exists yet).
    pub fn content_archive_path(&self, hash: &str) -> PathBuf {
        let fanout = if hash.len() >= 2 { &hash[..2] } else { hash };
        self.root.join(fanout).join(hash)
    }

    pub async fn contains(&self, hash: &str) -> bool {
        tokio::fs::try_exists(self.content_archive_path(hash))
            .await
            .unwrap_or(false)
    }

    /// Store a byte blob, returning its content hash.
    pub async fn import_bytes(&self, bytes: &[u8]) -> Result<String> {
        let hash = hash_bytes(bytes);
        let path = self.content_archive_path(&hash);
        if tokio::fs::try_exists(&path).await.unwrap_or(false) {
            return Ok(hash);
        }
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create blob directory: {}", parent.display()))?;
        }
        tokio::fs::write(&path, bytes)
            .await
            .with_context(|| format!("Failed to write blob: {}", path.display()))?;
        Ok(hash)
    }

    pub async fn import_string(&self, text: &str) -> Result<String> {
        self.import_bytes(text.as_bytes()).await
    }

    /// Store a file's bytes, returning their content hash.
    pub async fn import_file(&self, path: &Path) -> Result<String> {
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read file for import: {}", path.display()))?;
        self.import_bytes(&bytes).await
    }

    /// Read a blob's bytes; `None` when no blob with this hash is archived.
    pub async fn read(&self, hash: &str) -> Result<Option<Vec<u8>>> {
        let path = self.content_archive_path(hash);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => {
                Err(err).with_context(|| format!("Failed to read blob: {}", path.display()))
            }
        }
    }

    /// Read a blob as UTF-8 text; `None` when absent or not valid UTF-8.
    pub async fn read_string(&self, hash: &str) -> Result<Option<String>> {
        Ok(self
            .read(hash)
            .await?
            .and_then(|bytes| String::from_utf8(bytes).ok()))
    }
}
