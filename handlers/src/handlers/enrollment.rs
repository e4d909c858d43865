//! Purchase-to-enrollment processor.
//!
//! Consumes [`PurchaseCompleted`] events fed from payment-gateway webhooks.
//! Webhook providers redeliver aggressively, so the enrolled-set check is the
//! handler's idempotency anchor: a purchase already applied is acknowledged
//! without touching anything.

use crate::events::{PurchaseCompleted, templates};
use crate::mailer::Mailer;
use crate::repository::{CourseRepository, UserRepository};
use coursehub_cache::CacheCoordinator;
use coursehub_core::envelope::Envelope;
use coursehub_core::handler::{EventHandler, HandlerError};
use coursehub_core::queue::BoxFuture;
use serde_json::json;
use std::sync::Arc;

fn transient(error: impl std::fmt::Display) -> HandlerError {
    HandlerError::processing(error.to_string())
}

/// Processes [`PurchaseCompleted`] events.
pub struct EnrollmentHandler {
    users: Arc<dyn UserRepository>,
    courses: Arc<dyn CourseRepository>,
    cache: CacheCoordinator,
    mailer: Mailer,
}

impl EnrollmentHandler {
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

impl EventHandler<PurchaseCompleted> for EnrollmentHandler {
    fn handle<'a>(
        &'a self,
        envelope: &'a Envelope<PurchaseCompleted>,
    ) -> BoxFuture<'a, Result<(), HandlerError>> {
        Box::pin(async move {
            let event = &envelope.event;

            let mut user = self
                .users
                .find(&event.user_id)
                .await
                .map_err(transient)?
                .ok_or_else(|| {
                    HandlerError::processing(format!("user {} not found", event.user_id))
                })?;
            let mut course = self
                .courses
                .find(&event.course_id)
                .await
                .map_err(transient)?
                .ok_or_else(|| {
                    HandlerError::processing(format!("course {} not found", event.course_id))
                })?;

            if user.is_enrolled(&event.course_id) {
                tracing::debug!(
                    purchase_id = %event.purchase_id,
                    user_id = %event.user_id,
                    "Purchase already applied, skipping"
                );
                return Ok(());
            }

            // Emails go out before the enrollment is persisted: once the
            // enrolled check above short-circuits, a redelivery would skip
            // them. The purchase-keyed token keeps a re-enqueue from sending
            // twice.
            self.mailer
                .enqueue(
                    &event.user_id,
                    templates::COURSE_ENROLLMENT_SUCCESS,
                    json!({
                        "userName": user.name,
                        "courseTitle": course.title,
                        "amount": event.amount,
                    }),
                    format!(
                        "{}:{}",
                        templates::COURSE_ENROLLMENT_SUCCESS,
                        event.purchase_id
                    ),
                )
                .await
                .map_err(transient)?;
            self.mailer
                .enqueue(
                    &course.educator_id,
                    templates::NEW_STUDENT_ENROLLED,
                    json!({
                        "studentName": user.name,
                        "courseTitle": course.title,
                        "amount": event.amount,
                    }),
                    format!("{}:{}", templates::NEW_STUDENT_ENROLLED, event.purchase_id),
                )
                .await
                .map_err(transient)?;

            user.enrolled_courses.push(event.course_id.clone());
            if !course.enrolled_students.iter().any(|id| id == &event.user_id) {
                course.enrolled_students.push(event.user_id.clone());
            }
            let educator_id = course.educator_id.clone();

            // Course first: the enrolled check keys off the user record, so a
            // crash between the two upserts is healed by the redelivery.
            self.courses.upsert(course).await.map_err(transient)?;
            self.users.upsert(user).await.map_err(transient)?;

            self.cache
                .invalidate_enrollment(&event.user_id, &educator_id)
                .await;

            tracing::info!(
                purchase_id = %event.purchase_id,
                user_id = %event.user_id,
                course_id = %event.course_id,
                "Enrollment recorded"
            );
            Ok(())
        })
    }
}
