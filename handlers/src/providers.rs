//! Traits for third-party collaborator services.
//!
//! The notification sender and the object-storage service are external
//! systems; handlers consume them through these traits so tests can swap in
//! the in-memory versions from [`mocks`](crate::mocks). Both services are
//! invoked only from within domain handlers, never by the dispatcher itself.

use coursehub_core::queue::BoxFuture;
use thiserror::Error;

/// Notification delivery failure.
///
/// Treated as transient by the email handler: the message is retried and
/// dead-lettered only once the budget is exhausted.
#[derive(Error, Debug, Clone)]
#[error("notification delivery failed: {0}")]
pub struct NotifyError(pub String);

/// Outbound notification service (email, push).
pub trait NotificationSender: Send + Sync {
    /// Deliver one notification rendered from `template` and `data`.
    ///
    /// # Errors
    ///
    /// Returns [`NotifyError`] when the provider rejects the request or
    /// cannot be reached.
    fn notify(
        &self,
        template: &str,
        recipient: &str,
        data: &serde_json::Value,
    ) -> BoxFuture<'_, Result<(), NotifyError>>;
}

/// Object-storage failure.
#[derive(Error, Debug, Clone)]
#[error("media upload failed: {0}")]
pub struct StorageError(pub String);

/// Object-storage service for course media.
pub trait MediaStorage: Send + Sync {
    /// Upload the staged file at `path` and return the public URL to embed
    /// in domain records.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] when the upload fails.
    fn store(&self, path: &str) -> BoxFuture<'_, Result<String, StorageError>>;
}
