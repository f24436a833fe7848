//! Immutable snapshot archive.
//!
//! Every successful sync writes timestamped JSON snapshots to object
//! storage. The transport is abstracted behind [`ObjectStore`]; the engine
//! only needs "durably store a named JSON blob and return its address".
//! Snapshots are a time series of point-in-time archives: a new object per
//! call, never read-modify-write, never deleted by this crate.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::PathBuf;

mod writer;

pub use writer::{namespace_for, object_key, SnapshotWriter};

/// Durable named-blob storage.
///
/// `put` must create a new object at `key` and return its address. Keys use
/// `/` separators; implementations map them to their own hierarchy.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put(&self, key: &str, bytes: &[u8]) -> Result<String>;
}

/// Filesystem-backed object store.
///
/// Maps object keys to paths under a root directory. Stands in for a cloud
/// bucket in development and tests; the returned address is the absolute
/// file path.
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    async fn put(&self, key: &str, bytes: &[u8]) -> Result<String> {
        let path = self.root.join(key);

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .context("Failed to create snapshot directory")?;
        }

        tokio::fs::write(&path, bytes)
            .await
            .context("Failed to write snapshot object")?;

        Ok(path.display().to_string())
    }
}
