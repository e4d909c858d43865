//! Read-through caching and targeted invalidation.
//!
//! The coordinator owns the two halves of the cache-consistency contract:
//!
//! - **Read path**: [`read_through`](CacheCoordinator::read_through) serves
//!   cache hits without touching the source of truth; on miss the caller's
//!   loader computes the canonical value and the coordinator stores it with a
//!   TTL. Short TTLs (seconds to low minutes) suit frequently-changing
//!   aggregates; longer TTLs suit near-static data.
//! - **Write path**: the `invalidate_*` methods delete every cache key
//!   derived from a mutated resource: the direct entity key, the listing
//!   keys that could embed it, and the owner-scoped aggregates. Invalidation
//!   is a best-effort delete set, not a transaction.
//!
//! A read that misses and recomputes concurrently with a
//! mutation-plus-invalidation on the same resource can repopulate a stale
//! value. That staleness is bounded by the entry's TTL and accepted.

use crate::keys;
use coursehub_core::cache::CacheStore;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Read-through population plus per-resource invalidation over a
/// [`CacheStore`].
#[derive(Clone)]
pub struct CacheCoordinator {
    store: Arc<dyn CacheStore>,
}

impl CacheCoordinator {
    /// Create a coordinator over the given store.
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self { store }
    }

    /// Serve `key` from cache, or compute it with `load` and cache the
    /// result with `ttl`.
    ///
    /// Cache failures never surface: an unreachable store reads as a miss
    /// and a failed write is dropped. An undecodable cached entry is deleted
    /// and recomputed. Loader errors propagate unchanged.
    ///
    /// # Errors
    ///
    /// Returns whatever error `load` produced; the cache itself never errors.
    pub async fn read_through<T, E, F, Fut>(
        &self,
        key: &str,
        ttl: Duration,
        load: F,
    ) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if let Some(bytes) = self.store.get(key).await {
            match serde_json::from_slice(&bytes) {
                Ok(value) => {
                    tracing::debug!(key = %key, "Cache hit");
                    return Ok(value);
                }
                Err(error) => {
                    tracing::warn!(key = %key, error = %error, "Dropping undecodable cache entry");
                    self.store.del(key).await;
                }
            }
        }

        tracing::debug!(key = %key, "Cache miss");
        let value = load().await?;

        match serde_json::to_vec(&value) {
            Ok(bytes) => {
                self.store.set(key, bytes, ttl).await;
            }
            Err(error) => {
                tracing::warn!(key = %key, error = %error, "Failed to encode value for caching");
            }
        }

        Ok(value)
    }

    /// Invalidate everything derived from a course: its detail view, the
    /// published listing, and the owning educator's aggregates.
    ///
    /// Returns how many delete operations were issued successfully.
    pub async fn invalidate_course(&self, course_id: &str, educator_id: &str) -> usize {
        let deleted = self
            .delete_all(vec![
                keys::course_detail(course_id),
                keys::PUBLISHED_COURSES.to_owned(),
                keys::educator_courses(educator_id),
                keys::educator_dashboard(educator_id),
                keys::educator_enrolled_students(educator_id),
            ])
            .await;
        tracing::debug!(course_id = %course_id, deleted, "Invalidated course caches");
        deleted
    }

    /// Invalidate a user's profile and enrollment views.
    pub async fn invalidate_user(&self, user_id: &str) -> usize {
        let deleted = self
            .delete_all(vec![
                keys::user_profile(user_id),
                keys::user_enrollments(user_id),
            ])
            .await;
        tracing::debug!(user_id = %user_id, deleted, "Invalidated user caches");
        deleted
    }

    /// Invalidate the views touched by an enrollment: the student's lists
    /// and the educator's dashboard aggregates.
    pub async fn invalidate_enrollment(&self, user_id: &str, educator_id: &str) -> usize {
        let deleted = self
            .delete_all(vec![
                keys::user_profile(user_id),
                keys::user_enrollments(user_id),
                keys::educator_dashboard(educator_id),
                keys::educator_enrolled_students(educator_id),
            ])
            .await;
        tracing::debug!(
            user_id = %user_id,
            educator_id = %educator_id,
            deleted,
            "Invalidated enrollment caches"
        );
        deleted
    }

    /// Invalidate a user's progress view of one course.
    pub async fn invalidate_progress(&self, user_id: &str, course_id: &str) -> usize {
        let deleted = self
            .delete_all(vec![keys::user_progress(user_id, course_id)])
            .await;
        tracing::debug!(
            user_id = %user_id,
            course_id = %course_id,
            deleted,
            "Invalidated progress cache"
        );
        deleted
    }

    /// Drop the whole cache.
    pub async fn flush(&self) -> bool {
        self.store.flush().await
    }

    async fn delete_all(&self, cache_keys: Vec<String>) -> usize {
        futures::future::join_all(cache_keys.iter().map(|key| self.store.del(key)))
            .await
            .into_iter()
            .filter(|issued| *issued)
            .count()
    }
}
