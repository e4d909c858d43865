//! # Coursehub Cache
//!
//! The cache-consistency side of the system:
//!
//! - [`RedisCacheStore`]: fail-soft Redis implementation of the
//!   [`CacheStore`](coursehub_core::CacheStore) trait
//! - [`CacheCoordinator`]: read-through population plus targeted
//!   invalidation on mutation
//! - [`RateLimiter`]: fixed-window rate limiting on top of the cache store
//! - [`keys`]: the cache key naming scheme
//!
//! # Consistency Model
//!
//! Reads are served cache-first; on miss the caller computes the canonical
//! value from the source of truth and the coordinator stores it with a TTL.
//! Mutations delete every key derived from the mutated resource. A read that
//! misses and recomputes concurrently with a mutation can repopulate a
//! just-invalidated value: this is accepted **bounded staleness** (bounded by
//! the entry's TTL), not a correctness defect; no synchronous consistency
//! between cache and source of truth is promised.
//!
//! # Fail-Soft
//!
//! Every cache operation degrades to a miss or a `false` when Redis is
//! unreachable. A cache outage makes the system slower, never broken.

pub mod coordinator;
pub mod keys;
pub mod rate_limit;
pub mod store;

pub use coordinator::CacheCoordinator;
pub use rate_limit::RateLimiter;
pub use store::{ConnectError, RedisCacheStore};
