//! Queue topology: durable queues with TTL, retry budgets and dead-lettering.
//!
//! Every declared queue has exactly one associated dead-letter queue. The
//! broker enforces durability, message TTL and dead-letter routing; the retry
//! budget (`max_retries`) is an application-layer property read by the
//! consumer dispatcher, not a broker-native setting.
//!
//! Topology declaration is idempotent: re-declaring a queue with identical
//! properties is a no-op, while re-declaring with mismatched properties is a
//! configuration error surfaced as
//! [`BrokerError::TopologyMismatch`](crate::queue::BrokerError::TopologyMismatch),
//! never silently ignored.

use std::time::Duration;

/// Default time a message may sit in a queue before the broker drops it to
/// the dead-letter queue: one hour.
pub const DEFAULT_MESSAGE_TTL: Duration = Duration::from_secs(3600);

/// Default number of processing retries before dead-lettering.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Declaration for a single queue and its dead-letter companion.
///
/// # Example
///
/// ```
/// use coursehub_core::topology::QueueTopology;
/// use std::time::Duration;
///
/// let queue = QueueTopology::new("course_creation")
///     .with_message_ttl(Duration::from_secs(600))
///     .with_max_retries(5);
///
/// assert_eq!(queue.dead_letter_queue(), "course_creation_dlq");
/// assert!(queue.is_durable());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueTopology {
    name: String,
    durable: bool,
    message_ttl: Duration,
    max_retries: u32,
    dead_letter_queue: String,
}

impl QueueTopology {
    /// Declare a queue with the standard defaults: durable, one-hour message
    /// TTL, three retries, and a dead-letter queue named `{name}_dlq`.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let dead_letter_queue = format!("{name}_dlq");
        Self {
            name,
            durable: true,
            message_ttl: DEFAULT_MESSAGE_TTL,
            max_retries: DEFAULT_MAX_RETRIES,
            dead_letter_queue,
        }
    }

    /// Override queue durability.
    #[must_use]
    pub const fn with_durable(mut self, durable: bool) -> Self {
        self.durable = durable;
        self
    }

    /// Override the message TTL.
    #[must_use]
    pub const fn with_message_ttl(mut self, ttl: Duration) -> Self {
        self.message_ttl = ttl;
        self
    }

    /// Override the application-layer retry budget.
    #[must_use]
    pub const fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Override the dead-letter queue name.
    #[must_use]
    pub fn with_dead_letter_queue(mut self, name: impl Into<String>) -> Self {
        self.dead_letter_queue = name.into();
        self
    }

    /// The queue name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the queue survives a broker restart.
    #[must_use]
    pub const fn is_durable(&self) -> bool {
        self.durable
    }

    /// How long a message may wait in the queue before the broker
    /// dead-letters it.
    #[must_use]
    pub const fn message_ttl(&self) -> Duration {
        self.message_ttl
    }

    /// Number of processing retries before the dispatcher dead-letters a
    /// message.
    #[must_use]
    pub const fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Name of the dead-letter queue receiving exhausted or undecodable
    /// messages.
    #[must_use]
    pub fn dead_letter_queue(&self) -> &str {
        &self.dead_letter_queue
    }
}

/// The full set of queues a process declares and consumes.
///
/// Queue names must be unique within a topology; lookup is by name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Topology {
    queues: Vec<QueueTopology>,
}

impl Topology {
    /// An empty topology.
    #[must_use]
    pub const fn new() -> Self {
        Self { queues: Vec::new() }
    }

    /// Add a queue declaration.
    #[must_use]
    pub fn with_queue(mut self, queue: QueueTopology) -> Self {
        self.queues.push(queue);
        self
    }

    /// Look up a queue declaration by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&QueueTopology> {
        self.queues.iter().find(|q| q.name() == name)
    }

    /// All declared queues, in declaration order.
    #[must_use]
    pub fn queues(&self) -> &[QueueTopology] {
        &self.queues
    }

    /// Number of declared queues (dead-letter queues not counted).
    #[must_use]
    pub fn len(&self) -> usize {
        self.queues.len()
    }

    /// Whether no queues are declared.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queues.is_empty()
    }
}
