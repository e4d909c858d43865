//! Broker abstraction: durable publish, per-queue consumption, ack/nack.
//!
//! This module provides the [`MessageQueue`] trait implemented by the
//! production AMQP client (`coursehub-amqp`) and the in-memory broker
//! (`coursehub-testing`). The consumer dispatcher is written against this
//! trait, so its retry and dead-letter semantics are exercised in tests
//! without a live broker.
//!
//! # Delivery Semantics
//!
//! **At-least-once** with explicit acknowledgement:
//! - A delivery stays invisible-but-owned until [`Delivery::ack`] removes it
//!   or [`Delivery::dead_letter`] routes it to the queue's dead-letter queue.
//! - A consumer that drops a delivery without acknowledging it (crash,
//!   shutdown) causes broker-initiated redelivery, to this or another
//!   consumer instance.
//! - The channel's prefetch bound limits how many deliveries a consumer holds
//!   unacknowledged at once, the system's only backpressure mechanism.
//!
//! # Dyn Compatibility
//!
//! Trait methods return explicit `Pin<Box<dyn Future>>` instead of `async fn`
//! so the traits can be used as objects (`Arc<dyn MessageQueue>`,
//! `Box<dyn Delivery>`) and shared between the publisher and the dispatcher.

use crate::topology::Topology;
use futures::Stream;
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Boxed `Send` future, the return type of dyn-compatible trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Errors from broker operations.
#[derive(Error, Debug, Clone)]
pub enum BrokerError {
    /// Could not establish a transport connection to the broker.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// The channel is not open and could not be re-established.
    #[error("Channel unavailable: {0}")]
    ChannelUnavailable(String),

    /// The broker did not accept a published message.
    #[error("Publish failed for queue '{queue}': {reason}")]
    PublishFailed {
        /// Target queue.
        queue: String,
        /// Why the publish failed.
        reason: String,
    },

    /// Setting up a consumer failed.
    #[error("Consume failed for queue '{queue}': {reason}")]
    ConsumeFailed {
        /// Source queue.
        queue: String,
        /// Why consumption could not start.
        reason: String,
    },

    /// Declaring a queue or its dead-letter companion failed.
    #[error("Topology declaration failed for queue '{queue}': {reason}")]
    TopologyFailed {
        /// Queue being declared.
        queue: String,
        /// Why the declaration failed.
        reason: String,
    },

    /// A queue was re-declared with properties that differ from its existing
    /// declaration. This is a configuration error, not a transient failure.
    #[error("Queue '{queue}' re-declared with mismatched properties")]
    TopologyMismatch {
        /// The conflicting queue.
        queue: String,
    },

    /// The queue has not been declared in this broker's topology.
    #[error("Queue '{0}' is not declared")]
    UnknownQueue(String),

    /// Acknowledging or dead-lettering a delivery failed.
    #[error("Acknowledgement failed: {0}")]
    AckFailed(String),
}

/// A single message handed to a consumer, awaiting acknowledgement.
///
/// Exactly one of [`ack`](Delivery::ack) or
/// [`dead_letter`](Delivery::dead_letter) must be called; both consume the
/// delivery. Dropping a delivery unacknowledged leaves the message to the
/// broker's redelivery machinery.
pub trait Delivery: Send {
    /// The raw message body as published.
    fn body(&self) -> &[u8];

    /// Positively acknowledge: the message is removed from its source queue.
    fn ack(self: Box<Self>) -> BoxFuture<'static, Result<(), BrokerError>>;

    /// Negatively acknowledge without requeue: the broker routes the message,
    /// payload intact, to the queue's configured dead-letter queue.
    fn dead_letter(self: Box<Self>) -> BoxFuture<'static, Result<(), BrokerError>>;
}

/// Stream of deliveries from a single queue.
pub type DeliveryStream =
    Pin<Box<dyn Stream<Item = Result<Box<dyn Delivery>, BrokerError>> + Send>>;

/// A broker client: topology declaration, durable enqueue, and per-queue
/// consumption.
///
/// Implementations must be `Send + Sync`; the same client instance is shared
/// by the publisher and every dispatcher in the process.
pub trait MessageQueue: Send + Sync {
    /// Assert that every queue in `topology` and its dead-letter queue exist
    /// with the configured durability, TTL and dead-letter routing.
    ///
    /// Safe to call repeatedly: identical re-declaration is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError::TopologyMismatch`] when a queue already exists
    /// with different properties, or [`BrokerError::TopologyFailed`] when the
    /// broker rejects a declaration.
    fn declare_topology(&self, topology: &Topology) -> BoxFuture<'_, Result<(), BrokerError>>;

    /// Durably enqueue a raw message body.
    ///
    /// Returns whether the broker's local buffer accepted the message. This
    /// is **not** a delivery or consumption confirmation; callers treating
    /// `true` as "processed" are mistaken.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError::PublishFailed`] (after one lazy reconnection
    /// attempt, for transport-backed implementations) when the message could
    /// not be handed to the broker at all.
    fn publish(&self, queue: &str, body: Vec<u8>) -> BoxFuture<'_, Result<bool, BrokerError>>;

    /// Begin consuming a queue, yielding deliveries as the broker pushes
    /// them. The number of unacknowledged deliveries outstanding at once is
    /// bounded by the channel's prefetch setting.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError::ConsumeFailed`] when the consumer cannot be
    /// registered, or [`BrokerError::UnknownQueue`] for undeclared queues.
    fn consume(&self, queue: &str) -> BoxFuture<'_, Result<DeliveryStream, BrokerError>>;
}
