//! Queue names and the default topology.
//!
//! Every queue gets the standard settings (durable, one-hour message TTL,
//! three retries, `{name}_dlq` dead-letter companion); the dispatcher reads
//! the retry budget from this topology.

use coursehub_core::topology::{QueueTopology, Topology};

/// New course submitted by an educator.
pub const COURSE_CREATION: &str = "course_creation";

/// Existing course edited.
pub const COURSE_UPDATED: &str = "course_updated";

/// Course removed from the catalog.
pub const COURSE_DELETED: &str = "course_deleted";

/// Payment gateway confirmed a purchase.
pub const PAYMENT_SUCCEEDED: &str = "payment_succeeded";

/// A student's lecture progress changed.
pub const COURSE_PROGRESS_UPDATED: &str = "course_progress_updated";

/// A student rated a course.
pub const COURSE_RATING_ADDED: &str = "course_rating_added";

/// Outbound notification requests.
pub const EMAIL_NOTIFICATIONS: &str = "email_notifications";

/// All queues this worker consumes, with standard settings.
#[must_use]
pub fn default_topology() -> Topology {
    [
        COURSE_CREATION,
        COURSE_UPDATED,
        COURSE_DELETED,
        PAYMENT_SUCCEEDED,
        COURSE_PROGRESS_UPDATED,
        COURSE_RATING_ADDED,
        EMAIL_NOTIFICATIONS,
    ]
    .into_iter()
    .fold(Topology::new(), |topology, name| {
        topology.with_queue(QueueTopology::new(name))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_queue_has_a_dead_letter_companion() {
        let topology = default_topology();
        assert_eq!(topology.len(), 7);
        for queue in topology.queues() {
            assert_eq!(queue.dead_letter_queue(), format!("{}_dlq", queue.name()));
            assert!(queue.is_durable());
        }
    }
}
