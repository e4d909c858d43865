//! Instrumented event-handler doubles for dispatcher scenarios.

use coursehub_core::envelope::Envelope;
use coursehub_core::handler::{EventHandler, HandlerError};
use coursehub_core::queue::BoxFuture;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use tokio::sync::{Mutex, watch};

/// How a [`FlakyHandler`] fails while its failure budget lasts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FailureMode {
    Transient,
    Permanent,
}

/// A handler that fails a scripted number of times, recording the retry
/// count of every envelope it sees.
///
/// Used to drive the dispatcher's retry and dead-letter paths:
///
/// - [`FlakyHandler::failing(2)`](FlakyHandler::failing) fails the first two
///   deliveries and succeeds afterwards
/// - [`FlakyHandler::always_failing`] never succeeds (retry-budget
///   exhaustion)
/// - [`FlakyHandler::permanently_failing`] reports a permanent
///   classification on every delivery
pub struct FlakyHandler {
    failures_remaining: AtomicU32,
    mode: FailureMode,
    retry_counts: Mutex<Vec<u32>>,
    invocations: watch::Sender<u32>,
    succeeded: watch::Sender<bool>,
}

impl FlakyHandler {
    fn new(failures: u32, mode: FailureMode) -> Arc<Self> {
        let (invocations, _) = watch::channel(0);
        let (succeeded, _) = watch::channel(false);
        Arc::new(Self {
            failures_remaining: AtomicU32::new(failures),
            mode,
            retry_counts: Mutex::new(Vec::new()),
            invocations,
            succeeded,
        })
    }

    /// Fail the first `times` deliveries with a transient error, then
    /// succeed.
    #[must_use]
    pub fn failing(times: u32) -> Arc<Self> {
        Self::new(times, FailureMode::Transient)
    }

    /// Fail every delivery with a transient error.
    #[must_use]
    pub fn always_failing() -> Arc<Self> {
        Self::new(u32::MAX, FailureMode::Transient)
    }

    /// Fail every delivery with a permanent classification.
    #[must_use]
    pub fn permanently_failing() -> Arc<Self> {
        Self::new(u32::MAX, FailureMode::Permanent)
    }

    /// The `retryCount` of each envelope seen, in delivery order.
    pub async fn retry_counts(&self) -> Vec<u32> {
        self.retry_counts.lock().await.clone()
    }

    /// Block until the handler has been invoked at least `count` times.
    pub async fn wait_until_invoked(&self, count: u32) {
        let mut rx = self.invocations.subscribe();
        // The sender lives as long as `self`, so this cannot fail.
        let _ = rx.wait_for(|seen| *seen >= count).await;
    }

    /// Block until the handler has reported success once.
    pub async fn wait_until_succeeded(&self) {
        let mut rx = self.succeeded.subscribe();
        let _ = rx.wait_for(|done| *done).await;
    }
}

impl<E: Send + Sync> EventHandler<E> for FlakyHandler {
    fn handle<'a>(&'a self, envelope: &'a Envelope<E>) -> BoxFuture<'a, Result<(), HandlerError>> {
        Box::pin(async move {
            {
                let mut counts = self.retry_counts.lock().await;
                counts.push(envelope.retry_count);
                let seen = u32::try_from(counts.len()).unwrap_or(u32::MAX);
                let _ = self.invocations.send(seen);
            }

            let remaining = self.failures_remaining.load(Ordering::SeqCst);
            if remaining == 0 {
                let _ = self.succeeded.send(true);
                return Ok(());
            }

            if remaining != u32::MAX {
                self.failures_remaining.fetch_sub(1, Ordering::SeqCst);
            }

            match self.mode {
                FailureMode::Transient => Err(HandlerError::processing("induced transient failure")),
                FailureMode::Permanent => Err(HandlerError::permanent("induced permanent failure")),
            }
        })
    }
}
