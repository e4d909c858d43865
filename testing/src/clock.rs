//! Deterministic clock for tests.

use chrono::{DateTime, Utc};
use coursehub_core::clock::Clock;

/// Fixed clock: always returns the same instant, making envelope timestamps
/// reproducible.
///
/// # Example
///
/// ```
/// use coursehub_testing::FixedClock;
/// use coursehub_core::clock::Clock;
///
/// let clock = FixedClock::default_test_time();
/// assert_eq!(clock.now(), clock.now());
/// ```
#[derive(Debug, Clone)]
pub struct FixedClock {
    time: DateTime<Utc>,
}

impl FixedClock {
    /// Create a fixed clock pinned to the given time.
    #[must_use]
    pub const fn new(time: DateTime<Utc>) -> Self {
        Self { time }
    }

    /// A fixed clock at 2025-01-01T00:00:00Z.
    ///
    /// # Panics
    ///
    /// Panics if the hardcoded timestamp fails to parse, which cannot happen.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn default_test_time() -> Self {
        Self::new(
            DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
                .expect("hardcoded timestamp should always parse")
                .with_timezone(&Utc),
        )
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.time
    }
}
