//! Per-queue delivery loop with retry accounting and dead-lettering.
//!
//! One [`Dispatcher`] consumes one queue with one typed handler, mirroring
//! the queue topology: the retry budget comes from the queue's
//! [`QueueTopology`](coursehub_core::topology::QueueTopology) entry, and
//! dead-lettering relies on the broker's configured dead-letter routing.
//!
//! # Outcomes
//!
//! - **Acked**: the handler succeeded; the message is gone.
//! - **Retried**: the handler failed transiently with budget remaining; the
//!   full original payload is republished to the same queue with its retry
//!   counter incremented, and the original delivery is acknowledged.
//!   Republishing happens *before* the ack: if the republish fails, the
//!   original stays unacknowledged and the broker redelivers it. The failure
//!   mode is an occasional duplicate in-flight copy, never a lost message.
//! - **DeadLettered**: the payload could not be decoded (retrying cannot
//!   help), the handler classified the failure as permanent, or the retry
//!   budget is spent. The message lands in the dead-letter queue with its
//!   payload intact for operator inspection or replay.
//!
//! # Concurrency
//!
//! Up to the configured concurrency bound of handler invocations run at once
//! per queue; with the AMQP backend the channel prefetch is the effective
//! backpressure limit. No ordering is guaranteed across retries or across
//! independent messages once that bound exceeds one.

use coursehub_core::envelope::{self, Envelope};
use coursehub_core::handler::EventHandler;
use coursehub_core::queue::{BrokerError, Delivery, MessageQueue};
use coursehub_core::topology::Topology;
use futures::StreamExt;
use serde::de::DeserializeOwned;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::watch;

/// Default bound on concurrent handler executions per queue.
pub const DEFAULT_CONCURRENCY: usize = 10;

/// Errors from dispatcher setup and the delivery loop.
#[derive(Error, Debug)]
pub enum DispatchError {
    /// A broker operation failed.
    #[error(transparent)]
    Broker(#[from] BrokerError),

    /// The dispatcher's queue is not present in the topology.
    #[error("queue '{0}' is not present in the topology")]
    UnknownQueue(String),

    /// Re-encoding the retry payload failed.
    #[error("failed to re-encode retry payload: {0}")]
    Reencode(#[from] serde_json::Error),
}

/// Terminal state of one delivered message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Handler succeeded; the delivery was acknowledged.
    Acked,
    /// A copy with an incremented retry counter was republished and the
    /// original acknowledged.
    Retried,
    /// The message was routed to the dead-letter queue.
    DeadLettered,
}

/// The consumer loop for a single queue.
///
/// Constructed together with a shutdown sender; send `true` to stop pulling
/// deliveries. In-flight handler executions are drained before
/// [`run`](Dispatcher::run) returns. Any delivery that was handed out but not
/// yet acknowledged at shutdown becomes invisible to this process and is
/// redelivered by the broker; handlers must stay idempotent to tolerate
/// this.
///
/// # Example
///
/// ```ignore
/// let (dispatcher, shutdown) = Dispatcher::new(
///     Arc::clone(&broker),
///     &topology,
///     "course_creation",
///     Arc::new(course_handler),
/// )?;
///
/// let worker = tokio::spawn(dispatcher.run());
///
/// // On SIGTERM:
/// shutdown.send(true).ok();
/// worker.await??;
/// ```
pub struct Dispatcher<E, H> {
    queue_client: Arc<dyn MessageQueue>,
    queue_name: String,
    max_retries: u32,
    handler: Arc<H>,
    concurrency: usize,
    shutdown: watch::Receiver<bool>,
    _event: PhantomData<fn() -> E>,
}

impl<E, H> Dispatcher<E, H>
where
    E: DeserializeOwned + Send + Sync,
    H: EventHandler<E>,
{
    /// Create a dispatcher for one queue.
    ///
    /// The queue's retry budget is read from `topology`.
    ///
    /// Returns the dispatcher and the shutdown sender.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::UnknownQueue`] when `queue_name` has no
    /// topology entry.
    pub fn new(
        queue_client: Arc<dyn MessageQueue>,
        topology: &Topology,
        queue_name: &str,
        handler: Arc<H>,
    ) -> Result<(Self, watch::Sender<bool>), DispatchError> {
        let entry = topology
            .get(queue_name)
            .ok_or_else(|| DispatchError::UnknownQueue(queue_name.to_owned()))?;
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let dispatcher = Self {
            queue_client,
            queue_name: queue_name.to_owned(),
            max_retries: entry.max_retries(),
            handler,
            concurrency: DEFAULT_CONCURRENCY,
            shutdown: shutdown_rx,
            _event: PhantomData,
        };

        Ok((dispatcher, shutdown_tx))
    }

    /// Bound the number of concurrently executing handlers for this queue.
    #[must_use]
    pub const fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Consume the queue until shutdown is signalled.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Broker`] when the consumer cannot be set up.
    /// Per-delivery failures are logged and never stop the loop.
    pub async fn run(self) -> Result<(), DispatchError> {
        tracing::info!(
            queue = %self.queue_name,
            max_retries = self.max_retries,
            concurrency = self.concurrency,
            "Starting consumer dispatcher"
        );

        let deliveries = self.queue_client.consume(&self.queue_name).await?;

        let mut shutdown = self.shutdown.clone();
        let stop = Box::pin(async move {
            // The sender living for the process lifetime is the common case;
            // a dropped sender also stops the loop.
            let _ = shutdown.wait_for(|stop| *stop).await;
        });

        deliveries
            .take_until(stop)
            .for_each_concurrent(self.concurrency, |delivery| async {
                match delivery {
                    Ok(delivery) => match self.process(delivery).await {
                        Ok(outcome) => {
                            tracing::debug!(
                                queue = %self.queue_name,
                                outcome = ?outcome,
                                "Delivery settled"
                            );
                        }
                        Err(error) => {
                            // The delivery is dropped unacknowledged; the
                            // broker redelivers it after its visibility
                            // window.
                            tracing::error!(
                                queue = %self.queue_name,
                                error = %error,
                                "Delivery processing aborted, awaiting redelivery"
                            );
                        }
                    },
                    Err(error) => {
                        tracing::error!(
                            queue = %self.queue_name,
                            error = %error,
                            "Error receiving delivery from broker"
                        );
                    }
                }
            })
            .await;

        tracing::info!(queue = %self.queue_name, "Consumer dispatcher stopped");
        Ok(())
    }

    /// Settle one delivery: decode, invoke the handler, then acknowledge,
    /// retry or dead-letter.
    async fn process(&self, delivery: Box<dyn Delivery>) -> Result<DispatchOutcome, DispatchError> {
        let body = delivery.body().to_vec();

        let envelope: Envelope<E> = match serde_json::from_slice(&body) {
            Ok(envelope) => envelope,
            Err(error) => {
                // An undecodable payload can never be reprocessed safely:
                // dead-letter immediately, zero retries.
                tracing::error!(
                    queue = %self.queue_name,
                    error = %error,
                    "Undecodable payload, dead-lettering without retry"
                );
                Self::settle(delivery.dead_letter(), "dead-letter").await;
                return Ok(DispatchOutcome::DeadLettered);
            }
        };

        match self.handler.handle(&envelope).await {
            Ok(()) => {
                Self::settle(delivery.ack(), "ack").await;
                Ok(DispatchOutcome::Acked)
            }
            Err(error) if error.is_permanent() => {
                tracing::warn!(
                    queue = %self.queue_name,
                    retry_count = envelope.retry_count,
                    error = %error,
                    "Permanent handler failure, dead-lettering without retry"
                );
                Self::settle(delivery.dead_letter(), "dead-letter").await;
                Ok(DispatchOutcome::DeadLettered)
            }
            Err(error) if envelope.retry_count < self.max_retries => {
                tracing::warn!(
                    queue = %self.queue_name,
                    retry_count = envelope.retry_count,
                    max_retries = self.max_retries,
                    error = %error,
                    "Handler failed, republishing for retry"
                );

                // Republish first, ack second: a failed republish leaves the
                // original unacknowledged for broker redelivery.
                let retried = envelope::increment_retry_count(&body)?;
                let accepted = self
                    .queue_client
                    .publish(&self.queue_name, retried)
                    .await?;
                if !accepted {
                    return Err(DispatchError::Broker(BrokerError::PublishFailed {
                        queue: self.queue_name.clone(),
                        reason: "broker did not accept the retry copy".to_owned(),
                    }));
                }
                Self::settle(delivery.ack(), "ack").await;
                Ok(DispatchOutcome::Retried)
            }
            Err(error) => {
                tracing::error!(
                    queue = %self.queue_name,
                    retry_count = envelope.retry_count,
                    max_retries = self.max_retries,
                    error = %error,
                    "Retry budget exhausted, dead-lettering"
                );
                Self::settle(delivery.dead_letter(), "dead-letter").await;
                Ok(DispatchOutcome::DeadLettered)
            }
        }
    }

    /// Await an ack/nack, logging failures instead of propagating them: the
    /// worst case is a redelivery, which idempotent handlers absorb.
    async fn settle(
        op: impl Future<Output = Result<(), BrokerError>> + Send,
        kind: &'static str,
    ) {
        if let Err(error) = op.await {
            tracing::warn!(
                error = %error,
                kind,
                "Failed to settle delivery (message may be redelivered)"
            );
        }
    }
}
