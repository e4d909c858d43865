//! # Coursehub Core
//!
//! Core types and traits for the coursehub asynchronous event-processing and
//! cache-consistency layer.
//!
//! This crate defines the shared vocabulary of the system and performs no I/O:
//!
//! - [`Envelope`]: the wire unit placed on a queue (payload plus
//!   retry/timestamp metadata)
//! - [`Topology`] / [`QueueTopology`]: queue declarations with durability,
//!   message TTL, retry budget and dead-letter routing
//! - [`MessageQueue`] / [`Delivery`]: the broker abstraction implemented by
//!   `coursehub-amqp` (production) and `coursehub-testing` (in-memory)
//! - [`CacheStore`]: the fail-soft key/value cache abstraction implemented by
//!   `coursehub-cache` (Redis) and `coursehub-testing` (in-memory)
//! - [`EventHandler`] / [`HandlerError`]: the contract between the consumer
//!   dispatcher and domain event handlers
//! - [`Clock`]: injectable time source for deterministic tests
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐     publish      ┌──────────────┐
//! │ HTTP mutation │ ───────────────► │    Broker    │
//! └──────────────┘   (Publisher)    └──────┬───────┘
//!                                          │ deliver
//!                                          ▼
//!                                  ┌──────────────┐
//!                                  │  Dispatcher  │── ack / retry / DLQ
//!                                  └──────┬───────┘
//!                                         │ invoke
//!                                         ▼
//!                                  ┌──────────────┐    invalidate    ┌───────┐
//!                                  │   Handler    │ ───────────────► │ Cache │
//!                                  └──────────────┘                  └───────┘
//! ```
//!
//! # Delivery Semantics
//!
//! The system provides **at-least-once** delivery with no ordering guarantee
//! across retries or across independent messages. Handlers must be idempotent:
//! a retried message resends the full original payload, and a crash between
//! handler completion and acknowledgement causes broker-initiated redelivery.

pub mod cache;
pub mod clock;
pub mod envelope;
pub mod handler;
pub mod queue;
pub mod topology;

pub use cache::CacheStore;
pub use clock::{Clock, SystemClock};
pub use envelope::Envelope;
pub use handler::{EventHandler, HandlerError};
pub use queue::{BoxFuture, BrokerError, Delivery, DeliveryStream, MessageQueue};
pub use topology::{QueueTopology, Topology};
