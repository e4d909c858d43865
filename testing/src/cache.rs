//! In-memory cache store for tests.
//!
//! TTL expiry is driven by the tokio clock, so tests can pin time with
//! `tokio::time::pause()` and `tokio::time::advance(..)` instead of sleeping.

use coursehub_core::cache::{CacheStore, NO_EXPIRY};
use coursehub_core::queue::BoxFuture;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

struct Entry {
    value: Vec<u8>,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|deadline| deadline <= Instant::now())
    }
}

/// In-memory [`CacheStore`] with lazy TTL expiry.
///
/// Expired entries are pruned on access, which is all the store's contract
/// requires: an expired key reads as a miss.
#[derive(Clone)]
pub struct InMemoryCacheStore {
    entries: Arc<Mutex<HashMap<String, Entry>>>,
}

impl InMemoryCacheStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Number of live (unexpired) entries.
    pub async fn len(&self) -> usize {
        let entries = self.entries.lock().await;
        entries.values().filter(|e| !e.is_expired()).count()
    }

    /// Whether the store holds no live entries.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    fn deadline(ttl: Duration) -> Option<Instant> {
        (ttl > NO_EXPIRY).then(|| Instant::now() + ttl)
    }
}

impl Default for InMemoryCacheStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CacheStore for InMemoryCacheStore {
    fn get(&self, key: &str) -> BoxFuture<'_, Option<Vec<u8>>> {
        let key = key.to_owned();
        Box::pin(async move {
            let mut entries = self.entries.lock().await;
            match entries.get(&key) {
                Some(entry) if entry.is_expired() => {
                    entries.remove(&key);
                    None
                }
                Some(entry) => Some(entry.value.clone()),
                None => None,
            }
        })
    }

    fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> BoxFuture<'_, bool> {
        let key = key.to_owned();
        Box::pin(async move {
            let mut entries = self.entries.lock().await;
            entries.insert(
                key,
                Entry {
                    value,
                    expires_at: Self::deadline(ttl),
                },
            );
            true
        })
    }

    fn del(&self, key: &str) -> BoxFuture<'_, bool> {
        let key = key.to_owned();
        Box::pin(async move {
            let mut entries = self.entries.lock().await;
            entries.remove(&key);
            true
        })
    }

    fn exists(&self, key: &str) -> BoxFuture<'_, bool> {
        let key = key.to_owned();
        Box::pin(async move {
            let mut entries = self.entries.lock().await;
            match entries.get(&key) {
                Some(entry) if entry.is_expired() => {
                    entries.remove(&key);
                    false
                }
                Some(_) => true,
                None => false,
            }
        })
    }

    fn expire(&self, key: &str, ttl: Duration) -> BoxFuture<'_, bool> {
        let key = key.to_owned();
        Box::pin(async move {
            let mut entries = self.entries.lock().await;
            match entries.get_mut(&key) {
                Some(entry) if !entry.is_expired() => {
                    entry.expires_at = Self::deadline(ttl);
                    true
                }
                _ => false,
            }
        })
    }

    fn flush(&self) -> BoxFuture<'_, bool> {
        Box::pin(async move {
            let mut entries = self.entries.lock().await;
            entries.clear();
            true
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn set_then_get_roundtrip() {
        let store = InMemoryCacheStore::new();
        assert!(store.set("k", b"v".to_vec(), Duration::from_secs(5)).await);
        assert_eq!(store.get("k").await, Some(b"v".to_vec()));
        assert!(store.exists("k").await);
    }

    #[tokio::test(start_paused = true)]
    async fn entries_expire_after_ttl() {
        let store = InMemoryCacheStore::new();
        store.set("k", b"v".to_vec(), Duration::from_secs(5)).await;

        tokio::time::advance(Duration::from_secs(6)).await;

        assert_eq!(store.get("k").await, None);
        assert!(!store.exists("k").await);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_ttl_means_no_expiry() {
        let store = InMemoryCacheStore::new();
        store.set("k", b"v".to_vec(), NO_EXPIRY).await;

        tokio::time::advance(Duration::from_secs(86_400)).await;
        assert_eq!(store.get("k").await, Some(b"v".to_vec()));

        assert!(store.del("k").await);
        assert_eq!(store.get("k").await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn expire_refreshes_deadline() {
        let store = InMemoryCacheStore::new();
        store.set("k", b"v".to_vec(), Duration::from_secs(5)).await;

        tokio::time::advance(Duration::from_secs(4)).await;
        assert!(store.expire("k", Duration::from_secs(10)).await);

        tokio::time::advance(Duration::from_secs(6)).await;
        assert_eq!(store.get("k").await, Some(b"v".to_vec()));
    }

    #[tokio::test]
    async fn flush_clears_everything() {
        let store = InMemoryCacheStore::new();
        store.set("a", b"1".to_vec(), NO_EXPIRY).await;
        store.set("b", b"2".to_vec(), NO_EXPIRY).await;

        assert!(store.flush().await);
        assert!(store.is_empty().await);
    }
}
