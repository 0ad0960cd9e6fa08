//! [`KeyStore`]: resolves the single key that belongs to each identity.

use std::future::Future;
use std::sync::Arc;

use tracing::{debug, info, warn};

use super::cache::{IdentityLocks, KeyCache};
use super::legacy::{import_legacy_key, legacy_entry_name};
use super::{
    identity_fingerprint, DurableKeyStore, FieldKey, KeyError, LegacyKeySource, StorageError,
};

/// Default number of identity keys kept in memory.
pub const DEFAULT_CACHE_CAPACITY: usize = 1024;

/// Owner of every identity's key material.
///
/// Cheap to clone; clones share the cache, locks and storage backends.
///
/// Per identity the key moves `Absent -> (Created | Migrated) -> Present`.
/// `Present` is terminal until [`KeyStore::clear_key`] returns the identity to
/// `Absent`. Creation and migration run under a per-identity lock, so
/// concurrent first use commits exactly one key.
#[derive(Clone)]
pub struct KeyStore {
    inner: Arc<Inner>,
}

struct Inner {
    durable: Arc<dyn DurableKeyStore>,
    legacy: Option<Arc<dyn LegacyKeySource>>,
    cache: KeyCache,
    locks: IdentityLocks,
}

/// Builder for [`KeyStore`].
pub struct KeyStoreBuilder {
    durable: Arc<dyn DurableKeyStore>,
    legacy: Option<Arc<dyn LegacyKeySource>>,
    cache_capacity: usize,
}

impl KeyStoreBuilder {
    /// Migrate keys found in `legacy` on first use of each identity.
    pub fn legacy(mut self, legacy: Arc<dyn LegacyKeySource>) -> Self {
        self.legacy = Some(legacy);
        self
    }

    /// Maximum number of keys held in memory (at least one).
    pub fn cache_capacity(mut self, capacity: usize) -> Self {
        self.cache_capacity = capacity;
        self
    }

    /// Finish building.
    pub fn build(self) -> KeyStore {
        KeyStore {
            inner: Arc::new(Inner {
                durable: self.durable,
                legacy: self.legacy,
                cache: KeyCache::new(self.cache_capacity),
                locks: IdentityLocks::default(),
            }),
        }
    }
}

impl KeyStore {
    /// Key store over `durable` with no legacy source and the default cache size.
    pub fn new(durable: Arc<dyn DurableKeyStore>) -> Self {
        Self::builder(durable).build()
    }

    /// Start configuring a key store over `durable`.
    pub fn builder(durable: Arc<dyn DurableKeyStore>) -> KeyStoreBuilder {
        KeyStoreBuilder {
            durable,
            legacy: None,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
        }
    }

    /// Return the key for `identity`, creating or migrating one on first use.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::StorageUnavailable`] when the durable medium fails
    /// its probe or any read/write against it, or when its record for this
    /// identity cannot be parsed. Legacy import failures are not errors.
    ///
    /// # Cancellation
    ///
    /// The locked lookup-migrate-create section runs on its own task. Dropping
    /// the returned future stops the wait, not the work: the identity lock is
    /// released only after any key write has committed or failed.
    pub async fn resolve_or_create_key(&self, identity: &str) -> Result<Arc<FieldKey>, KeyError> {
        if let Some(key) = self.inner.cache.get(identity).await {
            return Ok(key);
        }

        self.inner.durable.probe().await.map_err(unavailable)?;

        let store = self.clone();
        let identity = identity.to_owned();
        run_to_completion(async move {
            let _guard = store.inner.locks.acquire(&identity).await;
            store.load_or_create(&identity).await
        })
        .await
    }

    /// Body of [`KeyStore::resolve_or_create_key`]; caller holds the identity lock.
    async fn load_or_create(&self, identity: &str) -> Result<Arc<FieldKey>, KeyError> {
        // Another caller may have finished creating the key while we waited.
        if let Some(key) = self.inner.cache.get(identity).await {
            return Ok(key);
        }

        if let Some(record) = self.inner.durable.get(identity).await.map_err(unavailable)? {
            let key = Arc::new(record.to_key().map_err(unavailable)?);
            self.inner.cache.insert(identity, Arc::clone(&key)).await;
            debug!(identity = %identity_fingerprint(identity), "key loaded from durable store");
            return Ok(key);
        }

        if let Some(key) = self.migrate_legacy(identity).await? {
            return Ok(key);
        }

        let key = Arc::new(FieldKey::generate());
        self.inner
            .durable
            .put(identity, &key.to_record())
            .await
            .map_err(unavailable)?;
        self.inner.cache.insert(identity, Arc::clone(&key)).await;
        info!(identity = %identity_fingerprint(identity), "created field key");
        Ok(key)
    }

    /// Import a legacy key for `identity` if one exists.
    ///
    /// Runs under the identity's lock. Unimportable entries are deleted and
    /// never retried, and `Ok(None)` tells the caller to create a fresh key.
    async fn migrate_legacy(&self, identity: &str) -> Result<Option<Arc<FieldKey>>, KeyError> {
        let Some(legacy) = &self.inner.legacy else {
            return Ok(None);
        };
        let entry = legacy_entry_name(identity);
        let fingerprint = identity_fingerprint(identity);

        let encoded = match legacy.get(&entry).await {
            Ok(Some(encoded)) => encoded,
            Ok(None) => return Ok(None),
            Err(StorageError::Corrupt(reason)) => {
                warn!(identity = %fingerprint, %reason, "legacy store unreadable; ignoring it");
                return Ok(None);
            }
            Err(e) => return Err(unavailable(e)),
        };

        match import_legacy_key(&encoded) {
            Ok(key) => {
                let key = Arc::new(key);
                self.inner
                    .durable
                    .put(identity, &key.to_record())
                    .await
                    .map_err(unavailable)?;
                self.inner.cache.insert(identity, Arc::clone(&key)).await;
                if let Err(e) = legacy.remove(&entry).await {
                    // The durable copy wins from now on, so the stale entry is never read again.
                    warn!(identity = %fingerprint, error = %e, "failed to delete migrated legacy key");
                }
                info!(identity = %fingerprint, "migrated legacy key to durable store");
                Ok(Some(key))
            }
            Err(e) => {
                warn!(identity = %fingerprint, error = %e, "discarding unimportable legacy key");
                if let Err(e) = legacy.remove(&entry).await {
                    warn!(identity = %fingerprint, error = %e, "failed to delete legacy key");
                }
                Ok(None)
            }
        }
    }

    /// Forget `identity`'s key in memory and in durable storage.
    ///
    /// Any leftover legacy entry is removed too, so a wiped identity cannot
    /// resurrect an old key. Clearing an identity without a key is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::StorageUnavailable`] if the durable record cannot be removed.
    ///
    /// Like key creation, the removal finishes even if the caller stops waiting.
    pub async fn clear_key(&self, identity: &str) -> Result<(), KeyError> {
        let store = self.clone();
        let identity = identity.to_owned();
        run_to_completion(async move {
            let _guard = store.inner.locks.acquire(&identity).await;
            store.remove_everywhere(&identity).await
        })
        .await
    }

    async fn remove_everywhere(&self, identity: &str) -> Result<(), KeyError> {
        self.inner.cache.remove(identity).await;
        self.inner.durable.delete(identity).await.map_err(unavailable)?;

        if let Some(legacy) = &self.inner.legacy {
            if let Err(e) = legacy.remove(&legacy_entry_name(identity)).await {
                warn!(identity = %identity_fingerprint(identity), error = %e, "failed to delete legacy key");
            }
        }
        info!(identity = %identity_fingerprint(identity), "cleared field key");
        Ok(())
    }

    /// Whether durable storage holds a key for `identity`.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::StorageUnavailable`] if the durable medium cannot be read.
    pub async fn has_key(&self, identity: &str) -> Result<bool, KeyError> {
        let record = self.inner.durable.get(identity).await.map_err(unavailable)?;
        Ok(record.is_some())
    }

    /// Check that the durable medium is reachable.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::StorageUnavailable`] if the probe fails.
    pub async fn probe(&self) -> Result<(), KeyError> {
        self.inner.durable.probe().await.map_err(unavailable)
    }

    /// Number of keys currently held in memory.
    pub async fn cached_len(&self) -> usize {
        self.inner.cache.len().await
    }
}

/// Drive a locked key-store mutation on a detached task and wait for it.
///
/// The task owns the identity guard, so cancelling the waiter cannot hand the
/// lock to the next caller while a write is still in flight.
async fn run_to_completion<T, F>(work: F) -> Result<T, KeyError>
where
    F: Future<Output = Result<T, KeyError>> + Send + 'static,
    T: Send + 'static,
{
    match tokio::spawn(work).await {
        Ok(result) => result,
        Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
        Err(e) => Err(unavailable(StorageError::Unreachable(format!(
            "key store task did not finish: {e}"
        )))),
    }
}

fn unavailable(e: StorageError) -> KeyError {
    warn!(error = %e, "durable key storage unavailable");
    KeyError::StorageUnavailable(e)
}
