//! # Coursehub Testing
//!
//! In-memory implementations of the coursehub infrastructure traits, for
//! exercising dispatcher, publisher, coordinator and handler behavior without
//! a live broker or cache:
//!
//! - [`InMemoryBroker`]: a [`MessageQueue`](coursehub_core::MessageQueue)
//!   with FIFO queues, topology validation and dead-letter routing
//! - [`InMemoryCacheStore`]: a [`CacheStore`](coursehub_core::CacheStore)
//!   with TTL expiry driven by the tokio clock (works under
//!   `tokio::time::pause`)
//! - [`FixedClock`]: deterministic time for envelope stamping
//! - [`handlers`]: instrumented [`EventHandler`](coursehub_core::EventHandler)
//!   doubles for retry/dead-letter scenarios
//!
//! # Example
//!
//! ```ignore
//! use coursehub_testing::{InMemoryBroker, handlers::FlakyHandler};
//!
//! #[tokio::test]
//! async fn retries_then_acks() {
//!     let broker = Arc::new(InMemoryBroker::new());
//!     broker.declare_topology(&topology).await.unwrap();
//!
//!     // Handler fails twice, then succeeds on the third delivery.
//!     let handler = Arc::new(FlakyHandler::failing(2));
//!     // ... run a dispatcher against the broker ...
//!     assert_eq!(broker.queue_len("course_creation").await, 0);
//! }
//! ```

pub mod broker;
pub mod cache;
pub mod clock;
pub mod handlers;

pub use broker::InMemoryBroker;
pub use cache::InMemoryCacheStore;
pub use clock::FixedClock;
