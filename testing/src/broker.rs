//! In-memory message broker for tests.
//!
//! Reproduces, entirely in process memory, the broker behavior the
//! dispatcher depends on: FIFO queues, idempotent topology declaration with
//! mismatch detection, and nack-without-requeue routing to the dead-letter
//! queue. Queue contents are inspectable so tests can assert on end
//! states ("source queue empty, DLQ holds the original payload").

use coursehub_core::queue::{BoxFuture, BrokerError, Delivery, DeliveryStream, MessageQueue};
use coursehub_core::topology::Topology;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::{Mutex, Notify};

/// One queue's buffered messages and consumer wakeup.
struct QueueBuffer {
    messages: VecDeque<Vec<u8>>,
    notify: Arc<Notify>,
}

impl QueueBuffer {
    fn new() -> Self {
        Self {
            messages: VecDeque::new(),
            notify: Arc::new(Notify::new()),
        }
    }
}

struct BrokerInner {
    topology: Mutex<Topology>,
    queues: Mutex<HashMap<String, QueueBuffer>>,
}

/// In-memory [`MessageQueue`] implementation.
///
/// Single consumer per queue; deliveries are handed out in FIFO order.
/// Publishing to an undeclared queue is an error (stricter than a real
/// broker's silent drop, which only hides test bugs).
#[derive(Clone)]
pub struct InMemoryBroker {
    inner: Arc<BrokerInner>,
}

impl InMemoryBroker {
    /// Create an empty broker with no declared queues.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(BrokerInner {
                topology: Mutex::new(Topology::new()),
                queues: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Number of messages currently buffered in a queue.
    pub async fn queue_len(&self, queue: &str) -> usize {
        let queues = self.inner.queues.lock().await;
        queues.get(queue).map_or(0, |q| q.messages.len())
    }

    /// Snapshot of a queue's buffered message bodies, front first.
    pub async fn messages(&self, queue: &str) -> Vec<Vec<u8>> {
        let queues = self.inner.queues.lock().await;
        queues
            .get(queue)
            .map_or_else(Vec::new, |q| q.messages.iter().cloned().collect())
    }
}

impl Default for InMemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageQueue for InMemoryBroker {
    fn declare_topology(&self, topology: &Topology) -> BoxFuture<'_, Result<(), BrokerError>> {
        let topology = topology.clone();
        Box::pin(async move {
            let mut declared = self.inner.topology.lock().await;
            let mut queues = self.inner.queues.lock().await;

            for entry in topology.queues() {
                match declared.get(entry.name()) {
                    // Identical re-declaration is a no-op.
                    Some(existing) if existing == entry => {}
                    Some(_) => {
                        return Err(BrokerError::TopologyMismatch {
                            queue: entry.name().to_owned(),
                        });
                    }
                    None => {
                        queues
                            .entry(entry.name().to_owned())
                            .or_insert_with(QueueBuffer::new);
                        queues
                            .entry(entry.dead_letter_queue().to_owned())
                            .or_insert_with(QueueBuffer::new);
                        *declared = declared.clone().with_queue(entry.clone());
                        tracing::debug!(queue = entry.name(), "Queue declared");
                    }
                }
            }

            Ok(())
        })
    }

    fn publish(&self, queue: &str, body: Vec<u8>) -> BoxFuture<'_, Result<bool, BrokerError>> {
        let queue = queue.to_owned();
        Box::pin(async move {
            let mut queues = self.inner.queues.lock().await;
            let Some(buffer) = queues.get_mut(&queue) else {
                return Err(BrokerError::UnknownQueue(queue));
            };
            buffer.messages.push_back(body);
            buffer.notify.notify_one();
            Ok(true)
        })
    }

    fn consume(&self, queue: &str) -> BoxFuture<'_, Result<DeliveryStream, BrokerError>> {
        let queue = queue.to_owned();
        let inner = Arc::clone(&self.inner);
        Box::pin(async move {
            let dead_letter_queue = {
                let topology = inner.topology.lock().await;
                topology
                    .get(&queue)
                    .map(|entry| entry.dead_letter_queue().to_owned())
                    .ok_or_else(|| BrokerError::UnknownQueue(queue.clone()))?
            };

            let stream = async_stream::stream! {
                loop {
                    let (popped, notify) = {
                        let mut queues = inner.queues.lock().await;
                        let Some(buffer) = queues.get_mut(&queue) else {
                            break;
                        };
                        (buffer.messages.pop_front(), Arc::clone(&buffer.notify))
                    };

                    match popped {
                        Some(body) => {
                            let delivery = InMemoryDelivery {
                                body,
                                dead_letter_queue: dead_letter_queue.clone(),
                                inner: Arc::clone(&inner),
                            };
                            yield Ok(Box::new(delivery) as Box<dyn Delivery>);
                        }
                        // Missed-wakeup safe: a publish between the pop and
                        // this await leaves a stored permit on the Notify.
                        None => notify.notified().await,
                    }
                }
            };

            Ok(Box::pin(stream) as DeliveryStream)
        })
    }
}

/// A delivery handed out by [`InMemoryBroker`].
struct InMemoryDelivery {
    body: Vec<u8>,
    dead_letter_queue: String,
    inner: Arc<BrokerInner>,
}

impl Delivery for InMemoryDelivery {
    fn body(&self) -> &[u8] {
        &self.body
    }

    fn ack(self: Box<Self>) -> BoxFuture<'static, Result<(), BrokerError>> {
        // The message was removed from its buffer at delivery time.
        Box::pin(async move { Ok(()) })
    }

    fn dead_letter(self: Box<Self>) -> BoxFuture<'static, Result<(), BrokerError>> {
        Box::pin(async move {
            let this = *self;
            let mut queues = this.inner.queues.lock().await;
            let Some(buffer) = queues.get_mut(&this.dead_letter_queue) else {
                return Err(BrokerError::UnknownQueue(this.dead_letter_queue));
            };
            buffer.messages.push_back(this.body);
            buffer.notify.notify_one();
            Ok(())
        })
    }
}
