//! Repository traits for the primary datastore.
//!
//! The datastore itself is an external collaborator; these traits expose
//! only the by-id operations the handlers need. Implementations are expected
//! to be thread-safe handles over a connection pool; in-memory versions live
//! in [`mocks`](crate::mocks).

use crate::model::{Course, User};
use coursehub_core::queue::BoxFuture;
use thiserror::Error;

/// Datastore failure as the handlers see it.
///
/// Handlers map this to a transient processing failure: the message is
/// retried, and dead-lettered only once the budget is exhausted.
#[derive(Error, Debug, Clone)]
#[error("datastore unavailable: {0}")]
pub struct RepositoryError(pub String);

/// Course persistence by id.
pub trait CourseRepository: Send + Sync {
    /// Fetch a course.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError`] when the datastore cannot be reached.
    fn find(&self, course_id: &str) -> BoxFuture<'_, Result<Option<Course>, RepositoryError>>;

    /// Insert or replace a course (keyed by `course.id`).
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError`] when the datastore cannot be reached.
    fn upsert(&self, course: Course) -> BoxFuture<'_, Result<(), RepositoryError>>;

    /// Delete a course. Deleting an absent course is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError`] when the datastore cannot be reached.
    fn delete(&self, course_id: &str) -> BoxFuture<'_, Result<(), RepositoryError>>;
}

/// User persistence by id.
pub trait UserRepository: Send + Sync {
    /// Fetch a user.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError`] when the datastore cannot be reached.
    fn find(&self, user_id: &str) -> BoxFuture<'_, Result<Option<User>, RepositoryError>>;

    /// Insert or replace a user (keyed by `user.id`).
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError`] when the datastore cannot be reached.
    fn upsert(&self, user: User) -> BoxFuture<'_, Result<(), RepositoryError>>;
}
