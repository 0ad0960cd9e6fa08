//! In-memory implementations of the storage seams.
//!
//! Not durable across restarts. Used by tests, by the default
//! [`crate::server::state::AppState`], and by embedders that manage
//! persistence themselves.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{DurableKeyStore, KeyRecord, LegacyKeySource, StorageError};

// =============================================================================
// Memory durable store
// =============================================================================

/// Durable-store stand-in backed by a `HashMap`.
///
/// Can be switched "offline" to simulate a locked device or revoked storage
/// permission, and counts committed writes so tests can assert how many keys
/// were created.
#[derive(Debug)]
pub struct MemoryKeyStore {
    records: RwLock<HashMap<String, KeyRecord>>,
    available: AtomicBool,
    puts: AtomicUsize,
}

impl MemoryKeyStore {
    /// Creates a new, empty, reachable store.
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            available: AtomicBool::new(true),
            puts: AtomicUsize::new(0),
        }
    }

    /// Make every subsequent operation succeed (`true`) or fail as unreachable (`false`).
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Number of successful `put` calls so far.
    pub fn put_count(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }

    /// Number of stored records.
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    /// Returns `true` if no records are stored.
    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    fn check(&self) -> Result<(), StorageError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StorageError::Unreachable("memory key store is offline".into()))
        }
    }
}

impl Default for MemoryKeyStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DurableKeyStore for MemoryKeyStore {
    async fn probe(&self) -> Result<(), StorageError> {
        self.check()
    }

    async fn get(&self, identity: &str) -> Result<Option<KeyRecord>, StorageError> {
        self.check()?;
        // Suspend like a real medium would, so callers interleave.
        tokio::task::yield_now().await;
        Ok(self.records.read().await.get(identity).cloned())
    }

    async fn put(&self, identity: &str, record: &KeyRecord) -> Result<(), StorageError> {
        self.check()?;
        tokio::task::yield_now().await;
        self.records
            .write()
            .await
            .insert(identity.to_owned(), record.clone());
        self.puts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn delete(&self, identity: &str) -> Result<(), StorageError> {
        self.check()?;
        self.records.write().await.remove(identity);
        Ok(())
    }
}

// =============================================================================
// Memory legacy store
// =============================================================================

/// Legacy-source stand-in backed by a `HashMap` of raw text entries.
#[derive(Debug, Default)]
pub struct MemoryLegacyStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryLegacyStore {
    /// Creates a new, empty legacy store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an entry, as an older client would have written it.
    pub async fn insert(&self, entry: impl Into<String>, value: impl Into<String>) {
        self.entries.write().await.insert(entry.into(), value.into());
    }

    /// Returns `true` if `entry` is present.
    pub async fn contains(&self, entry: &str) -> bool {
        self.entries.read().await.contains_key(entry)
    }
}

#[async_trait]
impl LegacyKeySource for MemoryLegacyStore {
    async fn get(&self, entry: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.read().await.get(entry).cloned())
    }

    async fn remove(&self, entry: &str) -> Result<(), StorageError> {
        self.entries.write().await.remove(entry);
        Ok(())
    }
}
