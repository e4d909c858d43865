//! Message envelope: the wire unit placed on a queue.
//!
//! An [`Envelope`] wraps a domain event with the metadata the dispatcher needs
//! for retry accounting: a creation timestamp, a retry counter, and an
//! optional correlation id for tracing a message across services.
//!
//! # Wire Format
//!
//! Envelopes serialize to JSON with the event's own fields flattened to the
//! top level, matching the broker payload schema:
//!
//! ```json
//! {
//!   "courseId": "c-42",
//!   "educatorId": "e-7",
//!   "timestamp": "2025-06-01T12:00:00Z",
//!   "retryCount": 0,
//!   "correlationId": "1fa0…"
//! }
//! ```
//!
//! `retryCount` defaults to `0` when absent so messages published by older
//! producers still decode. `correlationId` is omitted entirely when unset.
//!
//! # Retry Accounting
//!
//! `retry_count` is owned by the consumer dispatcher: the publisher always
//! stamps `0`, and each failed processing attempt republishes the payload with
//! the counter incremented. The counter is monotonically non-decreasing across
//! redeliveries of the same logical event and never exceeds the queue's
//! configured retry budget at the moment of dead-lettering.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The name of the wire field carrying the retry counter.
pub const RETRY_COUNT_FIELD: &str = "retryCount";

/// A domain event wrapped with queue-delivery metadata.
///
/// Created by the publisher, mutated only by the dispatcher's retry logic,
/// and destroyed on successful acknowledgement or on dead-lettering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope<E> {
    /// The domain event, flattened into the top level of the wire form.
    #[serde(flatten)]
    pub event: E,
    /// When the envelope was first published.
    pub timestamp: DateTime<Utc>,
    /// Number of failed processing attempts so far.
    #[serde(default)]
    pub retry_count: u32,
    /// Optional id correlating this message with the request that caused it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
}

impl<E> Envelope<E> {
    /// Wrap an event for first publication: retry count zero, no correlation.
    pub const fn new(event: E, timestamp: DateTime<Utc>) -> Self {
        Self {
            event,
            timestamp,
            retry_count: 0,
            correlation_id: None,
        }
    }

    /// Attach a correlation id.
    #[must_use]
    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }

    /// Whether this envelope has never failed processing.
    #[must_use]
    pub const fn is_first_attempt(&self) -> bool {
        self.retry_count == 0
    }
}

/// Rewrite the raw wire form of an envelope with its retry counter incremented.
///
/// Operates on the JSON text rather than a decoded [`Envelope`] so that fields
/// the typed event does not model survive the retry round-trip intact; a
/// dead-lettered message must carry its full original payload.
///
/// # Errors
///
/// Returns the underlying `serde_json` error if `body` is not valid JSON.
pub fn increment_retry_count(body: &[u8]) -> Result<Vec<u8>, serde_json::Error> {
    let mut value: serde_json::Value = serde_json::from_slice(body)?;
    if let Some(object) = value.as_object_mut() {
        let next = object
            .get(RETRY_COUNT_FIELD)
            .and_then(serde_json::Value::as_u64)
            .unwrap_or(0)
            + 1;
        object.insert(RETRY_COUNT_FIELD.to_owned(), serde_json::Value::from(next));
    }
    serde_json::to_vec(&value)
}
