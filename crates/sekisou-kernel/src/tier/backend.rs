//! Payload stores for the warm and cold tiers.
//!
//! A tier backend holds raw payloads keyed by virtual path and nothing
//! else; all metadata stays in the hot store.

use async_trait::async_trait;
use dashmap::DashMap;
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::vfs::{VfsError, VfsResult, path};

/// Raw payload store.
#[async_trait]
pub trait TierBackend: Send + Sync + std::fmt::Debug {
    /// Short label for logs.
    fn name(&self) -> &str;

    /// Store a payload, replacing any previous one.
    async fn put(&self, key: &str, data: &[u8]) -> VfsResult<()>;

    /// Fetch a payload. ENOENT if absent.
    async fn get(&self, key: &str) -> VfsResult<Vec<u8>>;

    /// Drop a payload. Absent keys are not an error.
    async fn delete(&self, key: &str) -> VfsResult<()>;

    async fn contains(&self, key: &str) -> VfsResult<bool>;
}

/// Payloads in a concurrent map. For tests and ephemeral setups.
#[derive(Debug)]
pub struct MemoryTier {
    name: String,
    objects: DashMap<String, Vec<u8>>,
}

impl MemoryTier {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            objects: DashMap::new(),
        }
    }

    /// Number of stored payloads.
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

#[async_trait]
impl TierBackend for MemoryTier {
    fn name(&self) -> &str {
        &self.name
    }

    async fn put(&self, key: &str, data: &[u8]) -> VfsResult<()> {
        self.objects.insert(path::normalize(key), data.to_vec());
        Ok(())
    }

    async fn get(&self, key: &str) -> VfsResult<Vec<u8>> {
        let key = path::normalize(key);
        self.objects
            .get(&key)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| VfsError::not_found(key))
    }

    async fn delete(&self, key: &str) -> VfsResult<()> {
        self.objects.remove(&path::normalize(key));
        Ok(())
    }

    async fn contains(&self, key: &str) -> VfsResult<bool> {
        Ok(self.objects.contains_key(&path::normalize(key)))
    }
}

/// Payloads as files under a host directory, mirroring the virtual layout.
#[derive(Debug, Clone)]
pub struct LocalTier {
    name: String,
    root: PathBuf,
}

impl LocalTier {
    /// The directory is created on first write.
    pub fn new(name: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            root: root.into(),
        }
    }

    /// Get the root path.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Host path for a key. Normalizing first keeps `..` inside the root.
    fn host_path(&self, key: &str) -> PathBuf {
        let normalized = path::normalize(key);
        self.root.join(normalized.trim_start_matches('/'))
    }
}

#[async_trait]
impl TierBackend for LocalTier {
    fn name(&self) -> &str {
        &self.name
    }

    async fn put(&self, key: &str, data: &[u8]) -> VfsResult<()> {
        let full = self.host_path(key);
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&full, data).await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> VfsResult<Vec<u8>> {
        match fs::read(self.host_path(key)).await {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(VfsError::not_found(path::normalize(key)))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, key: &str) -> VfsResult<()> {
        match fs::remove_file(self.host_path(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn contains(&self, key: &str) -> VfsResult<bool> {
        Ok(fs::try_exists(self.host_path(key)).await?)
    }
}
