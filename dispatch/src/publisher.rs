//! Envelope construction and durable enqueue.
//!
//! The publisher is the single write path onto the broker for HTTP-triggered
//! mutations: it wraps a domain event in an [`Envelope`] (timestamp from the
//! injected clock, retry count zero, optional correlation id), serializes it
//! to the JSON wire form and hands it to the broker for a durable publish.
//!
//! The returned boolean is the broker's local-buffer acceptance, **not** a
//! delivery or consumption confirmation: the triggering request may complete
//! as soon as the message is accepted, independent of the eventual handler
//! outcome. Retry metadata is owned by the dispatcher: the publisher always
//! stamps a fresh envelope with `retryCount: 0`.

use coursehub_core::clock::{Clock, SystemClock};
use coursehub_core::envelope::Envelope;
use coursehub_core::queue::{BrokerError, MessageQueue};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;

/// Errors surfaced to publish callers.
///
/// Transport problems are surfaced (after the broker client's one lazy
/// reconnection attempt), never swallowed into a silent no-op.
#[derive(Error, Debug)]
pub enum PublishError {
    /// The event could not be serialized to the wire form.
    #[error("failed to serialize event: {0}")]
    Serialize(#[from] serde_json::Error),

    /// The broker rejected or never received the message.
    #[error(transparent)]
    Broker(#[from] BrokerError),
}

/// Per-publish options.
#[derive(Debug, Clone, Default)]
pub struct PublishOptions {
    /// Correlation id stamped on the envelope, if any.
    pub correlation_id: Option<String>,
}

impl PublishOptions {
    /// Options carrying a freshly generated correlation id.
    #[must_use]
    pub fn correlated() -> Self {
        Self {
            correlation_id: Some(uuid::Uuid::new_v4().to_string()),
        }
    }

    /// Options carrying the given correlation id.
    pub fn with_correlation_id(correlation_id: impl Into<String>) -> Self {
        Self {
            correlation_id: Some(correlation_id.into()),
        }
    }
}

/// Builds envelopes and durably enqueues them.
///
/// Cheap to clone per call site; holds only shared handles.
///
/// # Example
///
/// ```ignore
/// let publisher = Publisher::new(Arc::clone(&broker));
///
/// let accepted = publisher
///     .publish("course_creation", &event)
///     .await?;
/// assert!(accepted); // buffered by the broker, not yet processed
/// ```
#[derive(Clone)]
pub struct Publisher {
    queue: Arc<dyn MessageQueue>,
    clock: Arc<dyn Clock>,
}

impl Publisher {
    /// Create a publisher over the given broker client, stamping envelope
    /// timestamps from the system clock.
    pub fn new(queue: Arc<dyn MessageQueue>) -> Self {
        Self {
            queue,
            clock: Arc::new(SystemClock),
        }
    }

    /// Replace the clock (deterministic timestamps in tests).
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Publish an event to a queue with default options.
    ///
    /// # Errors
    ///
    /// See [`publish_with_options`](Self::publish_with_options).
    pub async fn publish<E>(&self, queue: &str, event: &E) -> Result<bool, PublishError>
    where
        E: Serialize + Sync,
    {
        self.publish_with_options(queue, event, PublishOptions::default())
            .await
    }

    /// Publish an event to a queue.
    ///
    /// Returns whether the broker's local buffer accepted the message.
    ///
    /// # Errors
    ///
    /// Returns [`PublishError::Serialize`] when the event cannot be encoded,
    /// or [`PublishError::Broker`] when the broker could not take the message
    /// at all (after the transport's single lazy reconnection attempt).
    pub async fn publish_with_options<E>(
        &self,
        queue: &str,
        event: &E,
        options: PublishOptions,
    ) -> Result<bool, PublishError>
    where
        E: Serialize + Sync,
    {
        let mut envelope = Envelope::new(event, self.clock.now());
        if let Some(correlation_id) = options.correlation_id {
            envelope = envelope.with_correlation_id(correlation_id);
        }
        let body = serde_json::to_vec(&envelope)?;

        let accepted = self.queue.publish(queue, body).await?;
        if accepted {
            tracing::debug!(queue = %queue, "Message accepted by broker");
        } else {
            tracing::warn!(queue = %queue, "Broker buffer did not accept message");
        }
        Ok(accepted)
    }
}
