//! Lecture-progress processor.
//!
//! Progress events arrive on every completed lecture; the handler's only
//! domain action is the congratulations notification once a student crosses
//! the completion threshold, plus dropping the cached progress view. Progress
//! itself is persisted by the HTTP layer before the event is published.

use crate::events::{ProgressUpdated, templates};
use crate::mailer::Mailer;
use crate::repository::{CourseRepository, UserRepository};
use coursehub_cache::CacheCoordinator;
use coursehub_core::envelope::Envelope;
use coursehub_core::handler::{EventHandler, HandlerError};
use coursehub_core::queue::BoxFuture;
use serde_json::json;
use std::sync::Arc;

/// Completion percentage at which the congratulations notification is sent.
pub const COMPLETION_THRESHOLD_PERCENT: u64 = 80;

fn transient(error: impl std::fmt::Display) -> HandlerError {
    HandlerError::processing(error.to_string())
}

/// Processes [`ProgressUpdated`] events.
pub struct ProgressHandler {
    users: Arc<dyn UserRepository>,
    courses: Arc<dyn CourseRepository>,
    cache: CacheCoordinator,
    mailer: Mailer,
}

impl ProgressHandler {
    /// Create the handler over its collaborators.
    pub fn new(
        users: Arc<dyn UserRepository>,
        courses: Arc<dyn CourseRepository>,
        cache: CacheCoordinator,
        mailer: Mailer,
    ) -> Self {
        Self {
            users,
            courses,
            cache,
            mailer,
        }
    }
}

impl EventHandler<ProgressUpdated> for ProgressHandler {
    fn handle<'a>(
        &'a self,
        envelope: &'a Envelope<ProgressUpdated>,
    ) -> BoxFuture<'a, Result<(), HandlerError>> {
        Box::pin(async move {
            let event = &envelope.event;

            if event.total_lectures == 0 {
                return Err(HandlerError::permanent("course has no lectures"));
            }
            if event.completed_lectures > event.total_lectures {
                return Err(HandlerError::permanent(format!(
                    "completed {} of {} lectures",
                    event.completed_lectures, event.total_lectures
                )));
            }

            let user = self
                .users
                .find(&event.user_id)
                .await
                .map_err(transient)?
                .ok_or_else(|| {
                    HandlerError::processing(format!("user {} not found", event.user_id))
                })?;
            let course = self
                .courses
                .find(&event.course_id)
                .await
                .map_err(transient)?
                .ok_or_else(|| {
                    HandlerError::processing(format!("course {} not found", event.course_id))
                })?;

            let percent =
                u64::from(event.completed_lectures) * 100 / u64::from(event.total_lectures);
            if percent >= COMPLETION_THRESHOLD_PERCENT {
                // Keyed by student and course, not by lecture: crossing the
                // threshold repeatedly congratulates once.
                self.mailer
                    .enqueue(
                        &event.user_id,
                        templates::COURSE_COMPLETION,
                        json!({
                            "userName": user.name,
                            "courseTitle": course.title,
                            "completionPercentage": percent,
                        }),
                        format!(
                            "{}:{}:{}",
                            templates::COURSE_COMPLETION,
                            event.user_id,
                            event.course_id
                        ),
                    )
                    .await
                    .map_err(transient)?;
            }

            self.cache
                .invalidate_progress(&event.user_id, &event.course_id)
                .await;

            tracing::debug!(
                user_id = %event.user_id,
                course_id = %event.course_id,
                percent,
                "Progress processed"
            );
            Ok(())
        })
    }
}
