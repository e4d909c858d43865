//! Enqueueing outbound notifications.
//!
//! Handlers never call the notification provider directly: they enqueue an
//! [`EmailNotification`] on the email queue and the email worker delivers it.
//! A handler retry therefore re-enqueues rather than re-sends, and the email
//! worker's duplicate suppression keeps that harmless.

use crate::events::EmailNotification;
use crate::queues;
use coursehub_core::queue::BrokerError;
use coursehub_dispatch::{PublishError, PublishOptions, Publisher};

/// Enqueues notifications for the email worker.
#[derive(Clone)]
pub struct Mailer {
    publisher: Publisher,
}

impl Mailer {
    /// Create a mailer publishing through the given publisher.
    pub const fn new(publisher: Publisher) -> Self {
        Self { publisher }
    }

    /// Enqueue one notification.
    ///
    /// `token` becomes the envelope's correlation id, which the email worker
    /// uses to suppress duplicate sends. Callers derive it from stable
    /// payload fields (an entity id, a purchase id) so that redeliveries and
    /// handler retries of the same logical event produce the same token,
    /// never from fresh randomness.
    ///
    /// # Errors
    ///
    /// Returns [`PublishError`] when the notification could not be handed to
    /// the broker; callers treat this as a transient processing failure.
    pub async fn enqueue(
        &self,
        to: impl Into<String>,
        template: impl Into<String>,
        data: serde_json::Value,
        token: impl Into<String>,
    ) -> Result<(), PublishError> {
        let notification = EmailNotification {
            to: to.into(),
            template: template.into(),
            data,
        };

        let accepted = self
            .publisher
            .publish_with_options(
                queues::EMAIL_NOTIFICATIONS,
                &notification,
                PublishOptions::with_correlation_id(token),
            )
            .await?;

        if accepted {
            Ok(())
        } else {
            Err(PublishError::Broker(BrokerError::PublishFailed {
                queue: queues::EMAIL_NOTIFICATIONS.to_owned(),
                reason: "broker buffer did not accept the message".to_owned(),
            }))
        }
    }
}
