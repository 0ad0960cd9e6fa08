//! Process-local key cache and per-identity creation locks.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex, MutexGuard, PoisonError};

use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

use super::FieldKey;

/// Bounded map of identity → key.
///
/// Purely an optimisation over durable storage, so when full an arbitrary
/// entry is evicted; the evicted identity is reloaded from disk on next use.
#[derive(Debug)]
pub(crate) struct KeyCache {
    capacity: usize,
    entries: RwLock<HashMap<String, Arc<FieldKey>>>,
}

impl KeyCache {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub(crate) async fn get(&self, identity: &str) -> Option<Arc<FieldKey>> {
        self.entries.read().await.get(identity).cloned()
    }

    pub(crate) async fn insert(&self, identity: &str, key: Arc<FieldKey>) {
        let mut entries = self.entries.write().await;
        if entries.len() >= self.capacity && !entries.contains_key(identity) {
            if let Some(victim) = entries.keys().next().cloned() {
                entries.remove(&victim);
            }
        }
        entries.insert(identity.to_owned(), key);
    }

    pub(crate) async fn remove(&self, identity: &str) {
        self.entries.write().await.remove(identity);
    }

    pub(crate) async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}

/// Registry of per-identity async mutexes.
///
/// Serialises lookup-create-migrate for one identity while leaving other
/// identities untouched. An identity's mutex is dropped from the registry
/// once nobody holds or waits for it.
#[derive(Debug, Default)]
pub(crate) struct IdentityLocks {
    locks: StdMutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl IdentityLocks {
    pub(crate) async fn acquire(&self, identity: &str) -> IdentityGuard<'_> {
        let lock = self
            .registry()
            .entry(identity.to_owned())
            .or_default()
            .clone();
        let guard = Arc::clone(&lock).lock_owned().await;
        IdentityGuard {
            locks: self,
            identity: identity.to_owned(),
            lock,
            guard: Some(guard),
        }
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.registry().len()
    }

    // The map is only touched in short non-async sections; a panic there
    // cannot leave it logically inconsistent, so poisoning is ignored.
    fn registry(&self) -> MutexGuard<'_, HashMap<String, Arc<Mutex<()>>>> {
        self.locks.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Held for the duration of a create/migrate/clear on one identity.
pub(crate) struct IdentityGuard<'a> {
    locks: &'a IdentityLocks,
    identity: String,
    lock: Arc<Mutex<()>>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for IdentityGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        let mut registry = self.locks.registry();
        // One reference in the registry, one here: nobody else is waiting.
        if Arc::strong_count(&self.lock) == 2 {
            registry.remove(&self.identity);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn cache_insert_get_remove() {
        let cache = KeyCache::new(4);
        cache.insert("a", Arc::new(FieldKey::generate())).await;
        assert!(cache.get("a").await.is_some());
        cache.remove("a").await;
        assert!(cache.get("a").await.is_none());
    }

    #[tokio::test]
    async fn cache_is_bounded() {
        let cache = KeyCache::new(2);
        for id in ["a", "b", "c"] {
            cache.insert(id, Arc::new(FieldKey::generate())).await;
        }
        assert_eq!(cache.len().await, 2);
        assert!(cache.get("c").await.is_some());
    }

    #[tokio::test]
    async fn reinserting_at_capacity_does_not_evict() {
        let cache = KeyCache::new(2);
        cache.insert("a", Arc::new(FieldKey::generate())).await;
        cache.insert("b", Arc::new(FieldKey::generate())).await;
        cache.insert("a", Arc::new(FieldKey::generate())).await;
        assert!(cache.get("a").await.is_some());
        assert!(cache.get("b").await.is_some());
    }

    #[tokio::test]
    async fn lock_entry_removed_after_release() {
        let locks = IdentityLocks::default();
        {
            let _guard = locks.acquire("u1").await;
            assert_eq!(locks.len(), 1);
        }
        assert_eq!(locks.len(), 0);
    }

    #[tokio::test]
    async fn same_identity_is_serialised() {
        let locks = Arc::new(IdentityLocks::default());
        let first = locks.acquire("u1").await;

        let contender = {
            let locks = Arc::clone(&locks);
            tokio::spawn(async move {
                let _guard = locks.acquire("u1").await;
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!contender.is_finished());

        drop(first);
        contender.await.unwrap();
        assert_eq!(locks.len(), 0);
    }

    #[tokio::test]
    async fn different_identities_do_not_block() {
        let locks = IdentityLocks::default();
        let _a = locks.acquire("u1").await;
        let _b = tokio::time::timeout(Duration::from_secs(1), locks.acquire("u2"))
            .await
            .expect("u2 must not wait on u1");
        assert_eq!(locks.len(), 2);
    }
}
