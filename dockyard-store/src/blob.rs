//! Blob storage for serialized payloads keyed by path
//! (e.g. `snapshots/<container>/<id>.json`).

use crate::error::{Result, StoreError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, instrument};

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store `bytes` under `key`, replacing any previous value. Returns the size written.
    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<u64>;

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Returns whether a value was present.
    async fn delete(&self, key: &str) -> Result<bool>;
}

/// Keys are relative, `/`-separated and may not escape the store root.
fn validate_key(key: &str) -> Result<()> {
    let path = Path::new(key);
    let escapes = path
        .components()
        .any(|c| !matches!(c, Component::Normal(_)));

    if key.is_empty() || escapes {
        return Err(StoreError::InvalidInput(format!("Invalid blob key: {key}")));
    }
    Ok(())
}

/// Filesystem-backed store rooted at a directory.
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        validate_key(key)?;
        Ok(self.root.join(key))
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    #[instrument(skip(self, bytes), fields(size = bytes.len()))]
    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<u64> {
        let path = self.path_for(key)?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let size = bytes.len() as u64;
        fs::write(&path, bytes).await?;
        debug!(path = %path.display(), size, "Blob written");

        Ok(size)
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path_for(key)?;

        match fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let path = self.path_for(key)?;

        match fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

/// In-process store, used by tests and ephemeral deployments.
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    blobs: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.blobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.blobs.read().await.is_empty()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<u64> {
        validate_key(key)?;
        let size = bytes.len() as u64;
        self.blobs.write().await.insert(key.to_string(), bytes);
        Ok(size)
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        validate_key(key)?;
        Ok(self.blobs.read().await.get(key).cloned())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        validate_key(key)?;
        Ok(self.blobs.write().await.remove(key).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fs_blob_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlobStore::new(dir.path());

        let size = store.put("snapshots/svc-a/1.json", b"{}".to_vec()).await.unwrap();
        assert_eq!(size, 2);
        assert_eq!(store.get("snapshots/svc-a/1.json").await.unwrap(), Some(b"{}".to_vec()));

        assert!(store.delete("snapshots/svc-a/1.json").await.unwrap());
        assert!(!store.delete("snapshots/svc-a/1.json").await.unwrap());
        assert_eq!(store.get("snapshots/svc-a/1.json").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_keys_cannot_escape_root() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlobStore::new(dir.path());

        for key in ["../outside.json", "/etc/passwd", "a/../../b", ""] {
            let err = store.put(key, Vec::new()).await.unwrap_err();
            assert!(matches!(err, StoreError::InvalidInput(_)), "key {key:?} accepted");
        }
    }

    #[tokio::test]
    async fn test_memory_blob_store() {
        let store = MemoryBlobStore::new();
        assert!(store.is_empty().await);

        store.put("a/b", vec![1, 2, 3]).await.unwrap();
        assert_eq!(store.len().await, 1);
        assert_eq!(store.get("a/b").await.unwrap(), Some(vec![1, 2, 3]));
        assert!(store.delete("a/b").await.unwrap());
        assert!(store.is_empty().await);
    }
}
