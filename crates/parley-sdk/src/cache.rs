//! On-device key-value cache for the last known message list.

use crate::error::CacheError;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use ulid::Ulid;

/// Maximum accepted key length in bytes.
pub const MAX_KEY_LENGTH: usize = 128;

/// Persistent key-value slot storage.
#[async_trait]
pub trait CacheStore: Send + Sync + 'static {
    /// Read the blob stored under `key`, if any.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError>;

    /// Replace the blob stored under `key`.
    async fn set(&self, key: &str, value: Vec<u8>) -> Result<(), CacheError>;
}

/// Reject keys that could escape a storage directory.
pub fn validate_key(key: &str) -> Result<(), CacheError> {
    let invalid = |reason: &str| CacheError::InvalidKey {
        key: key.to_string(),
        reason: reason.to_string(),
    };

    if key.trim().is_empty() {
        return Err(invalid("key cannot be empty"));
    }
    if key.len() > MAX_KEY_LENGTH {
        return Err(invalid("key is too long"));
    }
    if key.contains("..") || key.contains('/') || key.contains('\\') {
        return Err(invalid("key cannot contain path separators"));
    }
    if key.chars().any(char::is_control) {
        return Err(invalid("key contains control characters"));
    }
    Ok(())
}

/// In-memory cache for tests and simulation.
///
/// Reads and writes can be forced to fail to exercise degraded paths.
#[derive(Default)]
pub struct MemoryCacheStore {
    entries: RwLock<HashMap<String, Vec<u8>>>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    writes: AtomicUsize,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store with one pre-populated slot.
    pub fn with_entry(key: impl Into<String>, value: Vec<u8>) -> Self {
        let store = Self::new();
        store.entries.write().insert(key.into(), value);
        store
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Raw content of a slot, bypassing failure injection.
    pub fn peek(&self, key: &str) -> Option<Vec<u8>> {
        self.entries.read().get(key).cloned()
    }

    /// Number of successful writes so far.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(CacheError::Read {
                key: key.to_string(),
                reason: "simulated read failure".to_string(),
            });
        }
        Ok(self.entries.read().get(key).cloned())
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> Result<(), CacheError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(CacheError::Write {
                key: key.to_string(),
                reason: "simulated write failure".to_string(),
            });
        }
        self.entries.write().insert(key.to_string(), value);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// File-backed cache: one `<key>.json` file per slot in a directory.
///
/// Writes go to a uniquely named temporary file that is renamed into place,
/// so a reader never observes a partially written slot.
pub struct FileCacheStore {
    dir: PathBuf,
}

impl FileCacheStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn slot_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }
}

#[async_trait]
impl CacheStore for FileCacheStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        validate_key(key)?;
        match tokio::fs::read(self.slot_path(key)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(CacheError::Read {
                key: key.to_string(),
                reason: e.to_string(),
            }),
        }
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> Result<(), CacheError> {
        validate_key(key)?;
        let write_err = |e: std::io::Error| CacheError::Write {
            key: key.to_string(),
            reason: e.to_string(),
        };

        tokio::fs::create_dir_all(&self.dir).await.map_err(write_err)?;

        let tmp = self.dir.join(format!(".{}.{}.tmp", key, Ulid::new()));
        tokio::fs::write(&tmp, &value).await.map_err(write_err)?;
        if let Err(e) = tokio::fs::rename(&tmp, self.slot_path(key)).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(write_err(e));
        }
        tracing::trace!(key, bytes = value.len(), "Cache slot written");
        Ok(())
    }
}
