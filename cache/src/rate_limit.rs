//! Fixed-window rate limiting on top of the cache store.
//!
//! A counter lives at a TTL-bound key per subject. A call at or over the
//! limit is rejected without incrementing; an allowed call increments the
//! counter and refreshes the TTL to the window. Expiry of the key is the
//! sole reset mechanism; there is no explicit reset operation.
//!
//! Built strictly on the fail-soft [`CacheStore`]: when the store is
//! unreachable the counter reads as zero and the limiter fails open. A cache
//! outage must never turn into request failures.

use crate::keys;
use coursehub_core::cache::CacheStore;
use std::sync::Arc;
use std::time::Duration;

/// Fixed-window rate limiter.
///
/// # Example
///
/// ```ignore
/// let limiter = RateLimiter::new(Arc::clone(&store));
///
/// // At most one rating per user per course per minute.
/// let allowed = limiter
///     .check_and_increment("rating:u-1:c-42", Duration::from_secs(60), 1)
///     .await;
/// ```
#[derive(Clone)]
pub struct RateLimiter {
    store: Arc<dyn CacheStore>,
}

impl RateLimiter {
    /// Create a limiter over the given store.
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self { store }
    }

    /// Check the subject's counter and, if under `limit`, increment it and
    /// refresh its TTL to `window`. Returns whether the call is allowed.
    pub async fn check_and_increment(
        &self,
        subject: &str,
        window: Duration,
        limit: u64,
    ) -> bool {
        let key = keys::rate_limit(subject);
        let count = self.current_count(&key).await;

        if count >= limit {
            tracing::warn!(
                subject = %subject,
                count,
                limit,
                window_secs = window.as_secs(),
                "Rate limit exceeded"
            );
            return false;
        }

        let next = count + 1;
        self.store
            .set(&key, next.to_string().into_bytes(), window)
            .await;
        tracing::debug!(subject = %subject, count = next, limit, "Rate limit check passed");
        true
    }

    /// The subject's current counter (zero when absent or expired).
    pub async fn attempts(&self, subject: &str) -> u64 {
        self.current_count(&keys::rate_limit(subject)).await
    }

    async fn current_count(&self, key: &str) -> u64 {
        match self.store.get(key).await {
            Some(bytes) => std::str::from_utf8(&bytes)
                .ok()
                .and_then(|text| text.trim().parse().ok())
                .unwrap_or(0),
            None => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coursehub_testing::InMemoryCacheStore;

    fn limiter() -> RateLimiter {
        RateLimiter::new(Arc::new(InMemoryCacheStore::new()))
    }

    #[tokio::test]
    async fn allows_up_to_the_limit() {
        let limiter = limiter();
        for _ in 0..5 {
            assert!(
                limiter
                    .check_and_increment("login:u-1", Duration::from_secs(60), 5)
                    .await
            );
        }
        assert_eq!(limiter.attempts("login:u-1").await, 5);
    }

    #[tokio::test]
    async fn rejects_the_call_over_the_limit_without_incrementing() {
        let limiter = limiter();
        for _ in 0..3 {
            limiter
                .check_and_increment("login:u-1", Duration::from_secs(60), 3)
                .await;
        }

        assert!(
            !limiter
                .check_and_increment("login:u-1", Duration::from_secs(60), 3)
                .await
        );
        // The rejected call did not bump the counter.
        assert_eq!(limiter.attempts("login:u-1").await, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn window_expiry_resets_the_counter() {
        let limiter = limiter();
        for _ in 0..3 {
            limiter
                .check_and_increment("rating:u-1:c-42", Duration::from_secs(60), 3)
                .await;
        }
        assert!(
            !limiter
                .check_and_increment("rating:u-1:c-42", Duration::from_secs(60), 3)
                .await
        );

        tokio::time::advance(Duration::from_secs(61)).await;

        // The next call succeeds and the counter restarts at 1.
        assert!(
            limiter
                .check_and_increment("rating:u-1:c-42", Duration::from_secs(60), 3)
                .await
        );
        assert_eq!(limiter.attempts("rating:u-1:c-42").await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn each_allowed_call_refreshes_the_window() {
        let limiter = limiter();
        limiter
            .check_and_increment("s", Duration::from_secs(60), 5)
            .await;

        tokio::time::advance(Duration::from_secs(40)).await;
        limiter
            .check_and_increment("s", Duration::from_secs(60), 5)
            .await;

        // 40s + 40s past the first call, but only 40s past the refresh.
        tokio::time::advance(Duration::from_secs(40)).await;
        assert_eq!(limiter.attempts("s").await, 2);
    }
}
