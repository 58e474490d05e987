//! Byte stores backing the image cache

use crate::config::CacheConfig;
use crate::error::Result;
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tokio::sync::Mutex;

/// Key/value storage for downloaded image bytes
///
/// Keys are image URLs. Stores are bounded: a `put` may evict other entries,
/// and an entry too large for the store is silently not kept.
#[async_trait]
pub trait ImageStore: Send + Sync {
    /// Bytes stored under `key`, if present
    async fn get(&self, key: &str) -> Option<Vec<u8>>;

    /// Store `data` under `key`, replacing any previous entry
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`](crate::Error::Io) if a persistent store cannot
    /// write the entry.
    async fn put(&self, key: &str, data: &[u8]) -> Result<()>;
}

#[derive(Default)]
pub(super) struct MemoryEntries {
    entries: HashMap<String, Vec<u8>>,
    /// Least recently used first
    order: VecDeque<String>,
    size: u64,
}

impl MemoryEntries {
    fn touch(&mut self, key: &str) {
        if let Some(pos) = self.order.iter().position(|k| k == key) {
            if let Some(k) = self.order.remove(pos) {
                self.order.push_back(k);
            }
        }
    }

    fn remove(&mut self, key: &str) {
        if let Some(old) = self.entries.remove(key) {
            self.size -= old.len() as u64;
            self.order.retain(|k| k != key);
        }
    }
}

/// In-memory store evicting least recently used entries
pub struct MemoryStore {
    capacity: u64,
    pub(super) inner: Mutex<MemoryEntries>,
}

impl MemoryStore {
    /// Create a store holding at most `capacity` bytes
    pub fn new(capacity: u64) -> Self {
        Self {
            capacity,
            inner: Mutex::new(MemoryEntries::default()),
        }
    }

    /// Total bytes currently stored
    pub async fn size(&self) -> u64 {
        self.inner.lock().await.size
    }

    /// Number of stored entries
    pub async fn len(&self) -> usize {
        self.inner.lock().await.entries.len()
    }

    /// Whether the store is empty
    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.entries.is_empty()
    }
}

#[async_trait]
impl ImageStore for MemoryStore {
    async fn get(&self, key: &str) -> Option<Vec<u8>> {
        let mut inner = self.inner.lock().await;
        let data = inner.entries.get(key).cloned()?;
        inner.touch(key);
        Some(data)
    }

    async fn put(&self, key: &str, data: &[u8]) -> Result<()> {
        let len = data.len() as u64;
        let mut inner = self.inner.lock().await;
        inner.remove(key);
        if len > self.capacity {
            return Ok(());
        }

        while inner.size + len > self.capacity {
            let Some(oldest) = inner.order.pop_front() else {
                break;
            };
            if let Some(evicted) = inner.entries.remove(&oldest) {
                inner.size -= evicted.len() as u64;
                tracing::trace!(key = %oldest, bytes = evicted.len(), "Evicted from memory cache");
            }
        }

        inner.entries.insert(key.to_string(), data.to_vec());
        inner.order.push_back(key.to_string());
        inner.size += len;
        Ok(())
    }
}

/// On-disk store, one file per entry named by the SHA-256 of its key
pub struct DiskStore {
    dir: PathBuf,
    capacity: u64,
    // Serializes eviction scans
    write_lock: Mutex<()>,
}

impl DiskStore {
    /// Open (creating if needed) a store in `dir` holding at most `capacity` bytes
    pub async fn open(dir: impl AsRef<Path>, capacity: u64) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Self {
            dir,
            capacity,
            write_lock: Mutex::new(()),
        })
    }

    /// Directory holding the entries
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the file storing `key`
    pub fn path_for(&self, key: &str) -> PathBuf {
        let mut hasher = Sha256::new();
        hasher.update(key.as_bytes());
        self.dir.join(format!("{:x}", hasher.finalize()))
    }

    /// Total bytes of all stored entries
    pub async fn size(&self) -> Result<u64> {
        Ok(self.entries().await?.iter().map(|e| e.len).sum())
    }

    async fn entries(&self) -> Result<Vec<DiskEntry>> {
        let mut entries = Vec::new();
        let mut dir = tokio::fs::read_dir(&self.dir).await?;
        while let Some(entry) = dir.next_entry().await? {
            let metadata = entry.metadata().await?;
            if !metadata.is_file() {
                continue;
            }
            entries.push(DiskEntry {
                path: entry.path(),
                len: metadata.len(),
                modified: metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH),
            });
        }
        Ok(entries)
    }

    /// Remove oldest files until the store fits its capacity
    async fn evict(&self, keep: &Path) -> Result<()> {
        let mut entries = self.entries().await?;
        let mut total: u64 = entries.iter().map(|e| e.len).sum();
        if total <= self.capacity {
            return Ok(());
        }

        entries.sort_by_key(|e| e.modified);
        for entry in entries {
            if total <= self.capacity {
                break;
            }
            if entry.path == keep {
                continue;
            }
            match tokio::fs::remove_file(&entry.path).await {
                Ok(()) => {
                    total -= entry.len;
                    tracing::trace!(path = %entry.path.display(), "Evicted from disk cache");
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => total -= entry.len,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }
}

struct DiskEntry {
    path: PathBuf,
    len: u64,
    modified: SystemTime,
}

#[async_trait]
impl ImageStore for DiskStore {
    async fn get(&self, key: &str) -> Option<Vec<u8>> {
        let path = self.path_for(key);
        match tokio::fs::read(&path).await {
            Ok(data) => Some(data),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to read cached image");
                None
            }
        }
    }

    async fn put(&self, key: &str, data: &[u8]) -> Result<()> {
        if data.len() as u64 > self.capacity {
            return Ok(());
        }

        let _guard = self.write_lock.lock().await;
        let path = self.path_for(key);
        let tmp = path.with_extension("tmp");
        tokio::fs::write(&tmp, data).await?;
        tokio::fs::rename(&tmp, &path).await?;
        self.evict(&path).await
    }
}

/// Memory tier in front of an optional disk tier
pub struct ImageCache {
    memory: MemoryStore,
    disk: Option<DiskStore>,
}

impl ImageCache {
    /// Create a cache from its tiers
    pub fn new(memory: MemoryStore, disk: Option<DiskStore>) -> Self {
        Self { memory, disk }
    }

    /// Memory-only cache
    pub fn in_memory(capacity: u64) -> Self {
        Self::new(MemoryStore::new(capacity), None)
    }

    /// Create a cache from settings
    ///
    /// With a disk directory configured, entries go to `{disk_dir}/{namespace}`
    /// so that several caches (photos, avatars) can share one directory.
    pub async fn from_config(config: &CacheConfig, namespace: &str) -> Result<Self> {
        let memory = MemoryStore::new(config.memory_capacity_bytes);
        let disk = match &config.disk_dir {
            Some(dir) => Some(DiskStore::open(dir.join(namespace), config.disk_capacity_bytes).await?),
            None => None,
        };
        Ok(Self::new(memory, disk))
    }

    /// The memory tier
    pub fn memory(&self) -> &MemoryStore {
        &self.memory
    }

    /// The disk tier, if configured
    pub fn disk(&self) -> Option<&DiskStore> {
        self.disk.as_ref()
    }
}

#[async_trait]
impl ImageStore for ImageCache {
    async fn get(&self, key: &str) -> Option<Vec<u8>> {
        if let Some(data) = self.memory.get(key).await {
            return Some(data);
        }

        let data = self.disk.as_ref()?.get(key).await?;
        // Promote; memory puts cannot fail
        self.memory.put(key, &data).await.ok();
        Some(data)
    }

    async fn put(&self, key: &str, data: &[u8]) -> Result<()> {
        self.memory.put(key, data).await?;
        if let Some(disk) = &self.disk {
            disk.put(key, data).await?;
        }
        Ok(())
    }
}
