//! Fail-soft cache store abstraction.
//!
//! [`CacheStore`] is the thin key/value accessor behind the invalidation
//! coordinator and the rate limiter. All operations are **fail-soft**: when
//! the underlying store is unreachable, `get` reports a miss and the mutating
//! operations report `false` instead of raising. Callers must always have a
//! non-cache fallback path (recompute from the source of truth) and must
//! never turn a cache failure into a request failure.
//!
//! # TTL Semantics
//!
//! A positive TTL schedules automatic expiry. [`NO_EXPIRY`] (zero) persists
//! the entry until explicit deletion or a store-wide [`flush`](CacheStore::flush).
//!
//! Entries are never mutated in place: updates are modeled as
//! delete-and-recreate, which keeps the invalidation rules simple.

use crate::queue::BoxFuture;
use std::time::Duration;

/// TTL value meaning "no automatic expiry".
pub const NO_EXPIRY: Duration = Duration::ZERO;

/// Fail-soft key/value store with per-entry TTL.
///
/// Implemented by `coursehub-cache` (Redis) and `coursehub-testing`
/// (in-memory). Implementations log infrastructure failures and degrade to
/// miss/`false`; they never propagate errors to callers.
pub trait CacheStore: Send + Sync {
    /// Fetch a value. `None` means miss, including when the store is down.
    fn get(&self, key: &str) -> BoxFuture<'_, Option<Vec<u8>>>;

    /// Store a value with the given TTL ([`NO_EXPIRY`] for none).
    /// Returns whether the write was accepted.
    fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> BoxFuture<'_, bool>;

    /// Delete a key. Returns whether the delete was issued successfully
    /// (deleting an absent key still counts as success).
    fn del(&self, key: &str) -> BoxFuture<'_, bool>;

    /// Whether a key currently exists.
    fn exists(&self, key: &str) -> BoxFuture<'_, bool>;

    /// Reset the TTL of an existing key. Returns `false` when the key is
    /// absent or the store is down.
    fn expire(&self, key: &str, ttl: Duration) -> BoxFuture<'_, bool>;

    /// Drop every entry in the store. Returns whether the flush was issued.
    fn flush(&self) -> BoxFuture<'_, bool>;
}
