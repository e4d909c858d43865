//! The contract between the consumer dispatcher and domain event handlers.
//!
//! A handler processes one decoded envelope at a time and reports the outcome
//! through [`HandlerError`]'s two variants, which drive the dispatcher's
//! retry/dead-letter state machine:
//!
//! - `Ok(())` → the delivery is acknowledged.
//! - [`HandlerError::Processing`] → retried up to the queue's retry budget,
//!   then dead-lettered with the payload intact.
//! - [`HandlerError::Permanent`] → dead-lettered immediately; retrying an
//!   input the handler has classified as invalid cannot succeed.
//!
//! # Idempotency Requirement
//!
//! Delivery is at-least-once: retries resend the full original payload, and a
//! crash between handler completion and acknowledgement causes
//! broker-initiated redelivery. Handlers must tolerate being invoked more
//! than once for the same logical event without duplicating externally
//! visible effects: key side effects by a stable token derived from the
//! payload (an entity id, a correlation id) and skip work already done.

use crate::envelope::Envelope;
use crate::queue::BoxFuture;
use thiserror::Error;

/// A domain handler's failure, classified for the dispatcher.
#[derive(Error, Debug, Clone)]
pub enum HandlerError {
    /// The input can never be processed successfully; the dispatcher
    /// dead-letters the message without retrying.
    #[error("permanent handler failure: {0}")]
    Permanent(String),

    /// A transient domain failure; the dispatcher redelivers until the
    /// queue's retry budget is exhausted.
    #[error("handler processing failed: {0}")]
    Processing(String),
}

impl HandlerError {
    /// A failure that retrying cannot fix.
    pub fn permanent(reason: impl Into<String>) -> Self {
        Self::Permanent(reason.into())
    }

    /// A failure worth retrying.
    pub fn processing(reason: impl Into<String>) -> Self {
        Self::Processing(reason.into())
    }

    /// Whether the dispatcher should skip retries for this failure.
    #[must_use]
    pub const fn is_permanent(&self) -> bool {
        matches!(self, Self::Permanent(_))
    }
}

/// Processor for one queue's event type.
///
/// Registered with a dispatcher; invoked once per delivery with the decoded
/// envelope. Up to the queue's prefetch bound of invocations run
/// concurrently, so implementations must be `Send + Sync` and internally
/// consistent under interleaving.
pub trait EventHandler<E>: Send + Sync {
    /// Process one delivered event.
    fn handle<'a>(&'a self, envelope: &'a Envelope<E>) -> BoxFuture<'a, Result<(), HandlerError>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification_drives_retry_eligibility() {
        assert!(HandlerError::permanent("bad input").is_permanent());
        assert!(!HandlerError::processing("datastore down").is_permanent());
    }
}
