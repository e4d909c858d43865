//! Redis-backed cache store.
//!
//! A thin, fail-soft adapter over a [`redis::aio::ConnectionManager`]: every
//! operation catches infrastructure errors, logs them, and degrades to a
//! miss or `false`. Callers always have a non-cache fallback path (recompute
//! from the source of truth) and must never treat a cache failure as a
//! request failure.
//!
//! # TTL
//!
//! `ttl > 0` issues `SETEX` for automatic expiry; a zero TTL issues a plain
//! `SET` and the entry persists until an explicit delete or a store-wide
//! flush.

use coursehub_core::cache::{CacheStore, NO_EXPIRY};
use coursehub_core::queue::BoxFuture;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use std::time::Duration;
use thiserror::Error;

/// Failure to establish the Redis connection at startup.
///
/// Unlike the per-operation fail-soft behavior, construction is allowed to
/// fail loudly: a process that can never reach its cache should say so when
/// it boots.
#[derive(Error, Debug)]
#[error("failed to connect to Redis at {url}: {source}")]
pub struct ConnectError {
    /// The connection URL (credentials included as given).
    pub url: String,
    /// The underlying client error.
    #[source]
    pub source: redis::RedisError,
}

/// Fail-soft [`CacheStore`] over Redis.
///
/// The [`ConnectionManager`] multiplexes one TCP connection and reconnects
/// automatically after transient drops; cloning the store clones only the
/// handle.
///
/// # Example
///
/// ```no_run
/// use coursehub_cache::RedisCacheStore;
/// use coursehub_core::cache::CacheStore;
/// use std::time::Duration;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = RedisCacheStore::connect("redis://127.0.0.1:6379").await?;
///
/// store.set("course:42:detail", b"{}".to_vec(), Duration::from_secs(5)).await;
/// let hit = store.get("course:42:detail").await;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct RedisCacheStore {
    conn: ConnectionManager,
}

impl RedisCacheStore {
    /// Connect to Redis.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectError`] when the URL is invalid or the initial
    /// connection cannot be established.
    pub async fn connect(url: &str) -> Result<Self, ConnectError> {
        let client = redis::Client::open(url).map_err(|source| ConnectError {
            url: url.to_owned(),
            source,
        })?;
        let conn = ConnectionManager::new(client)
            .await
            .map_err(|source| ConnectError {
                url: url.to_owned(),
                source,
            })?;

        tracing::info!("Redis cache store connected");
        Ok(Self { conn })
    }

    /// Number of whole seconds in a TTL, at least one so sub-second TTLs
    /// still expire instead of persisting.
    fn ttl_seconds(ttl: Duration) -> u64 {
        ttl.as_secs().max(1)
    }
}

impl CacheStore for RedisCacheStore {
    fn get(&self, key: &str) -> BoxFuture<'_, Option<Vec<u8>>> {
        let mut conn = self.conn.clone();
        let key = key.to_owned();
        Box::pin(async move {
            let result: redis::RedisResult<Option<Vec<u8>>> = conn.get(&key).await;
            match result {
                Ok(value) => value,
                Err(error) => {
                    tracing::warn!(key = %key, error = %error, "Redis GET failed, treating as miss");
                    None
                }
            }
        })
    }

    fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> BoxFuture<'_, bool> {
        let mut conn = self.conn.clone();
        let key = key.to_owned();
        Box::pin(async move {
            let result: redis::RedisResult<()> = if ttl > NO_EXPIRY {
                conn.set_ex(&key, value, Self::ttl_seconds(ttl)).await
            } else {
                conn.set(&key, value).await
            };
            match result {
                Ok(()) => true,
                Err(error) => {
                    tracing::warn!(key = %key, error = %error, "Redis SET failed");
                    false
                }
            }
        })
    }

    fn del(&self, key: &str) -> BoxFuture<'_, bool> {
        let mut conn = self.conn.clone();
        let key = key.to_owned();
        Box::pin(async move {
            let result: redis::RedisResult<u64> = conn.del(&key).await;
            match result {
                Ok(_) => true,
                Err(error) => {
                    tracing::warn!(key = %key, error = %error, "Redis DEL failed");
                    false
                }
            }
        })
    }

    fn exists(&self, key: &str) -> BoxFuture<'_, bool> {
        let mut conn = self.conn.clone();
        let key = key.to_owned();
        Box::pin(async move {
            let result: redis::RedisResult<bool> = conn.exists(&key).await;
            match result {
                Ok(exists) => exists,
                Err(error) => {
                    tracing::warn!(key = %key, error = %error, "Redis EXISTS failed");
                    false
                }
            }
        })
    }

    fn expire(&self, key: &str, ttl: Duration) -> BoxFuture<'_, bool> {
        let mut conn = self.conn.clone();
        let key = key.to_owned();
        Box::pin(async move {
            let result: redis::RedisResult<bool> = if ttl > NO_EXPIRY {
                let seconds = i64::try_from(Self::ttl_seconds(ttl)).unwrap_or(i64::MAX);
                conn.expire(&key, seconds).await
            } else {
                redis::cmd("PERSIST").arg(&key).query_async(&mut conn).await
            };
            match result {
                Ok(applied) => applied,
                Err(error) => {
                    tracing::warn!(key = %key, error = %error, "Redis EXPIRE failed");
                    false
                }
            }
        })
    }

    fn flush(&self) -> BoxFuture<'_, bool> {
        let mut conn = self.conn.clone();
        Box::pin(async move {
            let result: redis::RedisResult<()> =
                redis::cmd("FLUSHDB").query_async(&mut conn).await;
            match result {
                Ok(()) => {
                    tracing::info!("Redis cache flushed");
                    true
                }
                Err(error) => {
                    tracing::warn!(error = %error, "Redis FLUSHDB failed");
                    false
                }
            }
        })
    }
}
