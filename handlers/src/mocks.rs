//! In-memory collaborator implementations for testing.
//!
//! Enabled through the default-on `test-utils` feature. The repositories can
//! simulate a datastore outage with [`set_offline`], which handlers must
//! report as a transient processing failure.
//!
//! [`set_offline`]: InMemoryCourseRepository::set_offline

use crate::model::{Course, User};
use crate::providers::{MediaStorage, NotificationSender, NotifyError, StorageError};
use crate::repository::{CourseRepository, RepositoryError, UserRepository};
use coursehub_core::queue::BoxFuture;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;

fn outage_check(offline: &AtomicBool) -> Result<(), RepositoryError> {
    if offline.load(Ordering::SeqCst) {
        Err(RepositoryError("simulated datastore outage".to_owned()))
    } else {
        Ok(())
    }
}

/// In-memory [`CourseRepository`].
#[derive(Clone, Default)]
pub struct InMemoryCourseRepository {
    courses: Arc<Mutex<HashMap<String, Course>>>,
    offline: Arc<AtomicBool>,
}

impl InMemoryCourseRepository {
    /// Create an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed or replace a course directly.
    pub async fn insert(&self, course: Course) {
        self.courses.lock().await.insert(course.id.clone(), course);
    }

    /// Snapshot a stored course.
    pub async fn get(&self, course_id: &str) -> Option<Course> {
        self.courses.lock().await.get(course_id).cloned()
    }

    /// Number of stored courses.
    pub async fn len(&self) -> usize {
        self.courses.lock().await.len()
    }

    /// Toggle the simulated outage: while offline every operation fails.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }
}

impl CourseRepository for InMemoryCourseRepository {
    fn find(&self, course_id: &str) -> BoxFuture<'_, Result<Option<Course>, RepositoryError>> {
        let course_id = course_id.to_owned();
        Box::pin(async move {
            outage_check(&self.offline)?;
            Ok(self.courses.lock().await.get(&course_id).cloned())
        })
    }

    fn upsert(&self, course: Course) -> BoxFuture<'_, Result<(), RepositoryError>> {
        Box::pin(async move {
            outage_check(&self.offline)?;
            self.courses.lock().await.insert(course.id.clone(), course);
            Ok(())
        })
    }

    fn delete(&self, course_id: &str) -> BoxFuture<'_, Result<(), RepositoryError>> {
        let course_id = course_id.to_owned();
        Box::pin(async move {
            outage_check(&self.offline)?;
            self.courses.lock().await.remove(&course_id);
            Ok(())
        })
    }
}

/// In-memory [`UserRepository`].
#[derive(Clone, Default)]
pub struct InMemoryUserRepository {
    users: Arc<Mutex<HashMap<String, User>>>,
    offline: Arc<AtomicBool>,
}

impl InMemoryUserRepository {
    /// Create an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed or replace a user directly.
    pub async fn insert(&self, user: User) {
        self.users.lock().await.insert(user.id.clone(), user);
    }

    /// Snapshot a stored user.
    pub async fn get(&self, user_id: &str) -> Option<User> {
        self.users.lock().await.get(user_id).cloned()
    }

    /// Toggle the simulated outage: while offline every operation fails.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }
}

impl UserRepository for InMemoryUserRepository {
    fn find(&self, user_id: &str) -> BoxFuture<'_, Result<Option<User>, RepositoryError>> {
        let user_id = user_id.to_owned();
        Box::pin(async move {
            outage_check(&self.offline)?;
            Ok(self.users.lock().await.get(&user_id).cloned())
        })
    }

    fn upsert(&self, user: User) -> BoxFuture<'_, Result<(), RepositoryError>> {
        Box::pin(async move {
            outage_check(&self.offline)?;
            self.users.lock().await.insert(user.id.clone(), user);
            Ok(())
        })
    }
}

/// A notification captured by [`RecordingNotificationSender`].
#[derive(Debug, Clone, PartialEq)]
pub struct SentNotification {
    /// Template name.
    pub template: String,
    /// Recipient id or address.
    pub recipient: String,
    /// Template data.
    pub data: serde_json::Value,
}

/// [`NotificationSender`] that records instead of delivering.
#[derive(Clone, Default)]
pub struct RecordingNotificationSender {
    sent: Arc<Mutex<Vec<SentNotification>>>,
    failing: Arc<AtomicBool>,
}

impl RecordingNotificationSender {
    /// Create a sender with nothing recorded.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every notification delivered so far, in order.
    pub async fn sent(&self) -> Vec<SentNotification> {
        self.sent.lock().await.clone()
    }

    /// Toggle the simulated provider outage.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

impl NotificationSender for RecordingNotificationSender {
    fn notify(
        &self,
        template: &str,
        recipient: &str,
        data: &serde_json::Value,
    ) -> BoxFuture<'_, Result<(), NotifyError>> {
        let notification = SentNotification {
            template: template.to_owned(),
            recipient: recipient.to_owned(),
            data: data.clone(),
        };
        Box::pin(async move {
            if self.failing.load(Ordering::SeqCst) {
                return Err(NotifyError("simulated provider outage".to_owned()));
            }
            self.sent.lock().await.push(notification);
            Ok(())
        })
    }
}

/// [`MediaStorage`] that fabricates deterministic URLs.
#[derive(Clone, Default)]
pub struct StubMediaStorage {
    stored: Arc<Mutex<Vec<String>>>,
}

impl StubMediaStorage {
    /// Create a stub with nothing stored.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every staged path uploaded so far, in order.
    pub async fn stored(&self) -> Vec<String> {
        self.stored.lock().await.clone()
    }
}

impl MediaStorage for StubMediaStorage {
    fn store(&self, path: &str) -> BoxFuture<'_, Result<String, StorageError>> {
        let path = path.to_owned();
        Box::pin(async move {
            self.stored.lock().await.push(path.clone());
            Ok(format!("https://media.coursehub.test/{path}"))
        })
    }
}
