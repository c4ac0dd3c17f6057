//! Durable, content-addressed job store.
//!
//! The store is the persistence boundary between build time and request
//! time. It holds one descriptor per unique (fileHash, queryHash) pair at
//! `<cacheRoot>/<fileHash>/<queryHash>.json`, plus a run marker consumed by
//! the packaging step. Original asset copies land in the publish tree (see
//! [`original_path`]), not under the cache root, so the platform serves
//! them as plain static files.
//!
//! Ingestion appends, the render side only reads; nothing here deletes.

mod descriptor;
mod metadata;
mod path;

pub use descriptor::JobDescriptor;
pub use metadata::{load_or_create_originals_dir, METADATA_FILE, ORIGINALS_PREFIX};
pub use path::{
    descriptor_dir, descriptor_path, file_hash_for, original_name, original_path, query_hash_for,
    source_image_ref,
};

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

/// Marker file written once every queued ingest job has settled.
pub const RUN_MARKER: &str = ".did-run";

/// Errors from job store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("descriptor serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Filesystem-backed job store rooted at one cache directory.
#[derive(Debug, Clone)]
pub struct JobStore {
    cache_root: PathBuf,
}

impl JobStore {
    pub fn new(cache_root: impl Into<PathBuf>) -> Self {
        Self {
            cache_root: cache_root.into(),
        }
    }

    pub fn cache_root(&self) -> &Path {
        &self.cache_root
    }

    /// Persists one descriptor, creating parent directories as needed.
    ///
    /// Idempotent: re-writing the same (fileHash, queryHash) with the same
    /// descriptor produces byte-identical content, and writers for
    /// different queryHash values under one fileHash do not conflict.
    pub async fn put(
        &self,
        file_hash: &str,
        query_hash: &str,
        descriptor: &JobDescriptor,
    ) -> Result<(), StoreError> {
        let target = descriptor_path(&self.cache_root, file_hash, query_hash);
        tokio::fs::create_dir_all(descriptor_dir(&self.cache_root, file_hash)).await?;
        tokio::fs::write(&target, serde_json::to_vec(descriptor)?).await?;
        Ok(())
    }

    /// Looks up a descriptor by key.
    ///
    /// Returns `None` for keys that are missing, malformed (anything that
    /// would escape the per-hash directory), or whose stored content does
    /// not parse. Never fails for a missing-but-plausible key.
    pub async fn get(
        &self,
        file_hash: &str,
        query_hash: &str,
    ) -> Result<Option<JobDescriptor>, StoreError> {
        if !valid_key(file_hash) || !valid_key(query_hash) {
            return Ok(None);
        }
        let target = descriptor_path(&self.cache_root, file_hash, query_hash);
        let bytes = match tokio::fs::read(&target).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        match serde_json::from_slice(&bytes) {
            Ok(descriptor) => Ok(Some(descriptor)),
            Err(err) => {
                warn!(path = %target.display(), error = %err, "unreadable job descriptor");
                Ok(None)
            }
        }
    }

    /// Copies an original asset to `dest`, a no-op if `dest` already exists.
    ///
    /// Callers route concurrent copies for one destination through the
    /// dedup coordinator; this check only covers re-runs against a
    /// populated store.
    pub async fn copy_original(&self, source: &Path, dest: &Path) -> Result<(), StoreError> {
        if tokio::fs::try_exists(dest).await? {
            return Ok(());
        }
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::copy(source, dest).await?;
        Ok(())
    }

    /// Writes the empty `.did-run` marker into the cache root.
    pub async fn write_run_marker(&self) -> Result<(), StoreError> {
        tokio::fs::create_dir_all(&self.cache_root).await?;
        tokio::fs::write(self.cache_root.join(RUN_MARKER), b"").await?;
        Ok(())
    }

    pub fn run_marker_path(&self) -> PathBuf {
        self.cache_root.join(RUN_MARKER)
    }
}

/// A key is one path component: no separators, no traversal, not hidden.
fn valid_key(key: &str) -> bool {
    !key.is_empty()
        && !key.starts_with('.')
        && !key.contains('/')
        && !key.contains('\\')
        && !key.contains("..")
}
