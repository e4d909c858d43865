//! Outbound notification processor with duplicate suppression.
//!
//! At-least-once delivery, handler retries and upstream re-enqueues all
//! funnel into this queue, so the handler keys every send by an idempotency
//! token and records a sent-marker in the cache store. The marker store is
//! fail-soft: with the cache down the check reads as "not sent" and a
//! duplicate notification may go out, which the delivery contract already
//! allows.

use crate::events::EmailNotification;
use crate::providers::NotificationSender;
use coursehub_cache::keys;
use coursehub_core::cache::CacheStore;
use coursehub_core::envelope::Envelope;
use coursehub_core::handler::{EventHandler, HandlerError};
use coursehub_core::queue::BoxFuture;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// How long a sent-marker lives. Covers the broker's redelivery window with
/// a wide margin.
const SENT_MARKER_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Processes [`EmailNotification`] events.
pub struct EmailHandler {
    sender: Arc<dyn NotificationSender>,
    store: Arc<dyn CacheStore>,
}

impl EmailHandler {
    /// Create the handler over the notification provider and the marker
    /// store.
    pub fn new(sender: Arc<dyn NotificationSender>, store: Arc<dyn CacheStore>) -> Self {
        Self { sender, store }
    }

    /// The token a notification is deduplicated by: the envelope's
    /// correlation id when the producer stamped one, else a stable digest of
    /// the notification content.
    fn idempotency_token(envelope: &Envelope<EmailNotification>) -> String {
        envelope.correlation_id.clone().unwrap_or_else(|| {
            let event = &envelope.event;
            let mut seed = Vec::new();
            seed.extend_from_slice(event.template.as_bytes());
            seed.push(0);
            seed.extend_from_slice(event.to.as_bytes());
            seed.push(0);
            if let Ok(data) = serde_json::to_vec(&event.data) {
                seed.extend_from_slice(&data);
            }
            Uuid::new_v5(&Uuid::NAMESPACE_OID, &seed).to_string()
        })
    }
}

impl EventHandler<EmailNotification> for EmailHandler {
    fn handle<'a>(
        &'a self,
        envelope: &'a Envelope<EmailNotification>,
    ) -> BoxFuture<'a, Result<(), HandlerError>> {
        Box::pin(async move {
            let event = &envelope.event;
            let token = Self::idempotency_token(envelope);
            let marker = keys::notification_sent(&token);

            if self.store.exists(&marker).await {
                tracing::debug!(
                    template = %event.template,
                    to = %event.to,
                    token = %token,
                    "Duplicate notification suppressed"
                );
                return Ok(());
            }

            self.sender
                .notify(&event.template, &event.to, &event.data)
                .await
                .map_err(|error| HandlerError::processing(error.to_string()))?;

            // Best-effort: a failed marker write only risks one extra send.
            self.store.set(&marker, b"1".to_vec(), SENT_MARKER_TTL).await;

            tracing::info!(template = %event.template, to = %event.to, "Notification sent");
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::mocks::RecordingNotificationSender;
    use coursehub_core::clock::Clock;
    use coursehub_testing::{FixedClock, InMemoryCacheStore};
    use serde_json::json;

    fn notification() -> EmailNotification {
        EmailNotification {
            to: "e-7".to_owned(),
            template: "course_created".to_owned(),
            data: json!({"courseId": "c-42", "courseTitle": "Intro to Rust"}),
        }
    }

    fn envelope(event: EmailNotification, correlation: Option<&str>) -> Envelope<EmailNotification> {
        let envelope = Envelope::new(event, FixedClock::default_test_time().now());
        match correlation {
            Some(token) => envelope.with_correlation_id(token),
            None => envelope,
        }
    }

    fn handler() -> (EmailHandler, Arc<RecordingNotificationSender>, Arc<InMemoryCacheStore>) {
        let sender = Arc::new(RecordingNotificationSender::new());
        let store = Arc::new(InMemoryCacheStore::new());
        (EmailHandler::new(sender.clone(), store.clone()), sender, store)
    }

    #[tokio::test]
    async fn sends_and_records_the_marker() {
        let (handler, sender, store) = handler();

        handler
            .handle(&envelope(notification(), Some("course_created:c-42")))
            .await
            .unwrap();

        let sent = sender.sent().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].template, "course_created");
        assert_eq!(sent[0].recipient, "e-7");
        assert!(
            store
                .exists(&keys::notification_sent("course_created:c-42"))
                .await
        );
    }

    #[tokio::test]
    async fn duplicate_token_is_suppressed() {
        let (handler, sender, _store) = handler();
        let envelope = envelope(notification(), Some("course_created:c-42"));

        handler.handle(&envelope).await.unwrap();
        handler.handle(&envelope).await.unwrap();

        assert_eq!(sender.sent().await.len(), 1);
    }

    #[tokio::test]
    async fn identical_content_without_correlation_collapses() {
        let (handler, sender, _store) = handler();

        handler.handle(&envelope(notification(), None)).await.unwrap();
        handler.handle(&envelope(notification(), None)).await.unwrap();

        assert_eq!(sender.sent().await.len(), 1);
    }

    #[tokio::test]
    async fn distinct_content_both_send() {
        let (handler, sender, _store) = handler();

        handler.handle(&envelope(notification(), None)).await.unwrap();
        let mut other = notification();
        other.to = "e-8".to_owned();
        handler.handle(&envelope(other, None)).await.unwrap();

        assert_eq!(sender.sent().await.len(), 2);
    }

    #[tokio::test]
    async fn provider_failure_is_transient_and_leaves_no_marker() {
        let (handler, sender, store) = handler();
        sender.set_failing(true);

        let envelope = envelope(notification(), Some("course_created:c-42"));
        let err = handler.handle(&envelope).await.unwrap_err();
        assert!(!err.is_permanent());
        assert!(
            !store
                .exists(&keys::notification_sent("course_created:c-42"))
                .await
        );

        // The retry delivers once the provider recovers.
        sender.set_failing(false);
        handler.handle(&envelope).await.unwrap();
        assert_eq!(sender.sent().await.len(), 1);
    }
}
