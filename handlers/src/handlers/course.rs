//! Course lifecycle processors: creation, update, deletion and ratings.
//!
//! Each handler persists through the course repository, deletes the cache
//! keys derived from the mutated course, and enqueues the educator-facing
//! notification. Redeliveries are absorbed by upserting against the
//! pre-assigned course id and by the email worker's duplicate suppression.

use crate::events::{CourseCreation, CourseDeleted, CourseDraft, CourseUpdate, RatingAdded, templates};
use crate::mailer::Mailer;
use crate::model::Course;
use crate::providers::MediaStorage;
use crate::repository::{CourseRepository, UserRepository};
use coursehub_cache::CacheCoordinator;
use coursehub_core::envelope::Envelope;
use coursehub_core::handler::{EventHandler, HandlerError};
use coursehub_core::queue::BoxFuture;
use serde_json::json;
use std::sync::Arc;

fn validate_draft(draft: &CourseDraft) -> Result<(), HandlerError> {
    if draft.title.trim().is_empty() {
        return Err(HandlerError::permanent("course title must not be empty"));
    }
    validate_price(draft.price)?;
    validate_discount(draft.discount)
}

fn validate_price(price: f64) -> Result<(), HandlerError> {
    if !price.is_finite() || price < 0.0 {
        return Err(HandlerError::permanent(format!(
            "invalid course price: {price}"
        )));
    }
    Ok(())
}

fn validate_discount(discount: f64) -> Result<(), HandlerError> {
    if !(0.0..=100.0).contains(&discount) {
        return Err(HandlerError::permanent(format!(
            "invalid discount percentage: {discount}"
        )));
    }
    Ok(())
}

fn transient(error: impl std::fmt::Display) -> HandlerError {
    HandlerError::processing(error.to_string())
}

/// Processes [`CourseCreation`] events.
pub struct CourseCreationHandler {
    courses: Arc<dyn CourseRepository>,
    media: Arc<dyn MediaStorage>,
    cache: CacheCoordinator,
    mailer: Mailer,
}

impl CourseCreationHandler {
    /// Create the handler over its collaborators.
    pub fn new(
        courses: Arc<dyn CourseRepository>,
        media: Arc<dyn MediaStorage>,
        cache: CacheCoordinator,
        mailer: Mailer,
    ) -> Self {
        Self {
            courses,
            media,
            cache,
            mailer,
        }
    }
}

impl EventHandler<CourseCreation> for CourseCreationHandler {
    fn handle<'a>(
        &'a self,
        envelope: &'a Envelope<CourseCreation>,
    ) -> BoxFuture<'a, Result<(), HandlerError>> {
        Box::pin(async move {
            let event = &envelope.event;
            validate_draft(&event.course)?;

            let thumbnail_url = match &event.thumbnail_path {
                Some(path) => Some(self.media.store(path).await.map_err(transient)?),
                None => None,
            };

            // Redelivery overwrites the same document instead of duplicating
            // it; ratings and enrollments recorded since the first attempt
            // are carried over.
            let existing = self.courses.find(&event.course_id).await.map_err(transient)?;
            let (ratings, enrolled_students) = existing
                .map(|course| (course.ratings, course.enrolled_students))
                .unwrap_or_default();

            let course = Course {
                id: event.course_id.clone(),
                educator_id: event.educator_id.clone(),
                title: event.course.title.clone(),
                description: event.course.description.clone(),
                price: event.course.price,
                discount: event.course.discount,
                published: event.course.published,
                thumbnail_url,
                ratings,
                enrolled_students,
            };
            let title = course.title.clone();
            self.courses.upsert(course).await.map_err(transient)?;

            self.cache
                .invalidate_course(&event.course_id, &event.educator_id)
                .await;

            self.mailer
                .enqueue(
                    &event.educator_id,
                    templates::COURSE_CREATED,
                    json!({ "courseId": event.course_id, "courseTitle": title }),
                    format!("{}:{}", templates::COURSE_CREATED, event.course_id),
                )
                .await
                .map_err(transient)?;

            tracing::info!(
                course_id = %event.course_id,
                educator_id = %event.educator_id,
                "Course created"
            );
            Ok(())
        })
    }
}

/// Processes [`CourseUpdate`] events.
pub struct CourseUpdateHandler {
    courses: Arc<dyn CourseRepository>,
    media: Arc<dyn MediaStorage>,
    cache: CacheCoordinator,
    mailer: Mailer,
}

impl CourseUpdateHandler {
    /// Create the handler over its collaborators.
    pub fn new(
        courses: Arc<dyn CourseRepository>,
        media: Arc<dyn MediaStorage>,
        cache: CacheCoordinator,
        mailer: Mailer,
    ) -> Self {
        Self {
            courses,
            media,
            cache,
            mailer,
        }
    }
}

impl EventHandler<CourseUpdate> for CourseUpdateHandler {
    fn handle<'a>(
        &'a self,
        envelope: &'a Envelope<CourseUpdate>,
    ) -> BoxFuture<'a, Result<(), HandlerError>> {
        Box::pin(async move {
            let event = &envelope.event;
            let changes = &event.changes;

            if let Some(title) = &changes.title {
                if title.trim().is_empty() {
                    return Err(HandlerError::permanent("course title must not be empty"));
                }
            }
            if let Some(price) = changes.price {
                validate_price(price)?;
            }
            if let Some(discount) = changes.discount {
                validate_discount(discount)?;
            }

            let mut course = self
                .courses
                .find(&event.course_id)
                .await
                .map_err(transient)?
                // The creation event may still be in flight on another
                // dispatcher; retry until it lands.
                .ok_or_else(|| {
                    HandlerError::processing(format!("course {} not found", event.course_id))
                })?;

            if course.educator_id != event.educator_id {
                return Err(HandlerError::permanent(format!(
                    "educator {} does not own course {}",
                    event.educator_id, event.course_id
                )));
            }

            if let Some(title) = &changes.title {
                course.title = title.clone();
            }
            if let Some(description) = &changes.description {
                course.description = description.clone();
            }
            if let Some(price) = changes.price {
                course.price = price;
            }
            if let Some(discount) = changes.discount {
                course.discount = discount;
            }
            if let Some(published) = changes.published {
                course.published = published;
            }
            if let Some(path) = &event.thumbnail_path {
                course.thumbnail_url = Some(self.media.store(path).await.map_err(transient)?);
            }

            let title = course.title.clone();
            self.courses.upsert(course).await.map_err(transient)?;

            self.cache
                .invalidate_course(&event.course_id, &event.educator_id)
                .await;

            self.mailer
                .enqueue(
                    &event.educator_id,
                    templates::COURSE_UPDATED,
                    json!({ "courseId": event.course_id, "courseTitle": title }),
                    // Distinct updates of the same course get distinct tokens;
                    // redeliveries keep the original timestamp and collapse.
                    format!(
                        "{}:{}:{}",
                        templates::COURSE_UPDATED,
                        event.course_id,
                        envelope.timestamp.timestamp_millis()
                    ),
                )
                .await
                .map_err(transient)?;

            tracing::info!(course_id = %event.course_id, "Course updated");
            Ok(())
        })
    }
}

/// Processes [`CourseDeleted`] events.
pub struct CourseDeleteHandler {
    courses: Arc<dyn CourseRepository>,
    cache: CacheCoordinator,
}

impl CourseDeleteHandler {
    /// Create the handler over its collaborators.
    pub fn new(courses: Arc<dyn CourseRepository>, cache: CacheCoordinator) -> Self {
        Self { courses, cache }
    }
}

impl EventHandler<CourseDeleted> for CourseDeleteHandler {
    fn handle<'a>(
        &'a self,
        envelope: &'a Envelope<CourseDeleted>,
    ) -> BoxFuture<'a, Result<(), HandlerError>> {
        Box::pin(async move {
            let event = &envelope.event;

            // Deleting an absent course is a no-op, which makes redelivery
            // harmless.
            self.courses
                .delete(&event.course_id)
                .await
                .map_err(transient)?;

            self.cache
                .invalidate_course(&event.course_id, &event.educator_id)
                .await;

            tracing::info!(course_id = %event.course_id, "Course deleted");
            Ok(())
        })
    }
}

/// Processes [`RatingAdded`] events.
pub struct RatingHandler {
    courses: Arc<dyn CourseRepository>,
    users: Arc<dyn UserRepository>,
    cache: CacheCoordinator,
    mailer: Mailer,
}

impl RatingHandler {
    /// Create the handler over its collaborators.
    pub fn new(
        courses: Arc<dyn CourseRepository>,
        users: Arc<dyn UserRepository>,
        cache: CacheCoordinator,
        mailer: Mailer,
    ) -> Self {
        Self {
            courses,
            users,
            cache,
            mailer,
        }
    }
}

impl EventHandler<RatingAdded> for RatingHandler {
    fn handle<'a>(
        &'a self,
        envelope: &'a Envelope<RatingAdded>,
    ) -> BoxFuture<'a, Result<(), HandlerError>> {
        Box::pin(async move {
            let event = &envelope.event;

            if !(1..=5).contains(&event.rating) {
                return Err(HandlerError::permanent(format!(
                    "rating {} outside 1..=5",
                    event.rating
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
            let mut course = self
                .courses
                .find(&event.course_id)
                .await
                .map_err(transient)?
                .ok_or_else(|| {
                    HandlerError::processing(format!("course {} not found", event.course_id))
                })?;

            // One rating per user: redelivery replaces rather than appends.
            course.rate(&event.user_id, event.rating);
            let educator_id = course.educator_id.clone();
            let title = course.title.clone();
            self.courses.upsert(course).await.map_err(transient)?;

            self.cache
                .invalidate_course(&event.course_id, &educator_id)
                .await;

            self.mailer
                .enqueue(
                    &educator_id,
                    templates::COURSE_RATING_RECEIVED,
                    json!({
                        "studentName": user.name,
                        "courseTitle": title,
                        "rating": event.rating,
                    }),
                    format!(
                        "{}:{}:{}",
                        templates::COURSE_RATING_RECEIVED,
                        event.course_id,
                        event.user_id
                    ),
                )
                .await
                .map_err(transient)?;

            tracing::info!(
                course_id = %event.course_id,
                user_id = %event.user_id,
                rating = event.rating,
                "Rating recorded"
            );
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::events::CourseChanges;
    use crate::mocks::{InMemoryCourseRepository, InMemoryUserRepository, StubMediaStorage};
    use crate::model::User;
    use crate::queues;
    use coursehub_cache::keys;
    use coursehub_core::cache::CacheStore;
    use coursehub_core::clock::Clock;
    use coursehub_core::queue::MessageQueue;
    use coursehub_dispatch::Publisher;
    use coursehub_testing::{FixedClock, InMemoryBroker, InMemoryCacheStore};
    use std::time::Duration;

    struct Fixture {
        courses: Arc<InMemoryCourseRepository>,
        users: Arc<InMemoryUserRepository>,
        media: Arc<StubMediaStorage>,
        store: Arc<InMemoryCacheStore>,
        cache: CacheCoordinator,
        mailer: Mailer,
        broker: Arc<InMemoryBroker>,
    }

    async fn fixture() -> Fixture {
        let broker = Arc::new(InMemoryBroker::new());
        broker
            .declare_topology(&queues::default_topology())
            .await
            .unwrap();
        let store = Arc::new(InMemoryCacheStore::new());
        Fixture {
            courses: Arc::new(InMemoryCourseRepository::new()),
            users: Arc::new(InMemoryUserRepository::new()),
            media: Arc::new(StubMediaStorage::new()),
            store: store.clone(),
            cache: CacheCoordinator::new(store),
            mailer: Mailer::new(Publisher::new(broker.clone())),
            broker,
        }
    }

    fn envelope<E>(event: E) -> Envelope<E> {
        Envelope::new(event, FixedClock::default_test_time().now())
    }

    fn creation_event() -> CourseCreation {
        CourseCreation {
            course_id: "c-1".to_owned(),
            educator_id: "e-1".to_owned(),
            course: CourseDraft {
                title: "Intro to Rust".to_owned(),
                description: "Ownership and borrowing".to_owned(),
                price: 49.0,
                discount: 10.0,
                published: true,
            },
            thumbnail_path: Some("staging/thumb.png".to_owned()),
        }
    }

    fn seeded_course() -> Course {
        Course {
            id: "c-1".to_owned(),
            educator_id: "e-1".to_owned(),
            title: "Intro to Rust".to_owned(),
            description: String::new(),
            price: 49.0,
            discount: 0.0,
            published: true,
            thumbnail_url: None,
            ratings: Vec::new(),
            enrolled_students: Vec::new(),
        }
    }

    #[tokio::test]
    async fn creation_persists_uploads_and_notifies() {
        let f = fixture().await;
        let handler = CourseCreationHandler::new(
            f.courses.clone(),
            f.media.clone(),
            f.cache.clone(),
            f.mailer.clone(),
        );

        handler.handle(&envelope(creation_event())).await.unwrap();

        let course = f.courses.get("c-1").await.unwrap();
        assert_eq!(course.title, "Intro to Rust");
        assert_eq!(
            course.thumbnail_url.as_deref(),
            Some("https://media.coursehub.test/staging/thumb.png")
        );

        let emails = f.broker.messages(queues::EMAIL_NOTIFICATIONS).await;
        assert_eq!(emails.len(), 1);
        let wire: serde_json::Value = serde_json::from_slice(&emails[0]).unwrap();
        assert_eq!(wire["to"], "e-1");
        assert_eq!(wire["template"], "course_created");
        assert_eq!(wire["correlationId"], "course_created:c-1");
    }

    #[tokio::test]
    async fn redelivered_creation_upserts_instead_of_duplicating() {
        let f = fixture().await;
        let handler = CourseCreationHandler::new(
            f.courses.clone(),
            f.media.clone(),
            f.cache.clone(),
            f.mailer.clone(),
        );

        let envelope = envelope(creation_event());
        handler.handle(&envelope).await.unwrap();

        // A rating lands between the first attempt and the redelivery.
        let mut course = f.courses.get("c-1").await.unwrap();
        course.rate("u-9", 5);
        f.courses.insert(course).await;

        handler.handle(&envelope).await.unwrap();

        assert_eq!(f.courses.len().await, 1);
        let course = f.courses.get("c-1").await.unwrap();
        assert_eq!(course.ratings.len(), 1, "redelivery must keep ratings");

        // Both enqueues carry the same token, so only one email goes out.
        let emails = f.broker.messages(queues::EMAIL_NOTIFICATIONS).await;
        assert_eq!(emails.len(), 2);
        let first: serde_json::Value = serde_json::from_slice(&emails[0]).unwrap();
        let second: serde_json::Value = serde_json::from_slice(&emails[1]).unwrap();
        assert_eq!(first["correlationId"], second["correlationId"]);
    }

    #[tokio::test]
    async fn empty_title_is_rejected_permanently() {
        let f = fixture().await;
        let handler = CourseCreationHandler::new(
            f.courses.clone(),
            f.media.clone(),
            f.cache.clone(),
            f.mailer.clone(),
        );

        let mut event = creation_event();
        event.course.title = "   ".to_owned();

        let err = handler.handle(&envelope(event)).await.unwrap_err();
        assert!(err.is_permanent());
        assert!(f.courses.get("c-1").await.is_none());
    }

    #[tokio::test]
    async fn out_of_range_discount_is_rejected_permanently() {
        let f = fixture().await;
        let handler = CourseCreationHandler::new(
            f.courses.clone(),
            f.media.clone(),
            f.cache.clone(),
            f.mailer.clone(),
        );

        let mut event = creation_event();
        event.course.discount = 120.0;

        let err = handler.handle(&envelope(event)).await.unwrap_err();
        assert!(err.is_permanent());
    }

    #[tokio::test]
    async fn creation_invalidates_derived_cache_keys() {
        let f = fixture().await;
        for key in [keys::course_detail("c-1"), keys::PUBLISHED_COURSES.to_owned()] {
            f.store
                .set(&key, b"stale".to_vec(), Duration::from_secs(300))
                .await;
        }
        let handler = CourseCreationHandler::new(
            f.courses.clone(),
            f.media.clone(),
            f.cache.clone(),
            f.mailer.clone(),
        );

        handler.handle(&envelope(creation_event())).await.unwrap();

        assert_eq!(f.store.get(&keys::course_detail("c-1")).await, None);
        assert_eq!(f.store.get(keys::PUBLISHED_COURSES).await, None);
    }

    #[tokio::test]
    async fn datastore_outage_is_a_transient_failure() {
        let f = fixture().await;
        f.courses.set_offline(true);
        let handler = CourseCreationHandler::new(
            f.courses.clone(),
            f.media.clone(),
            f.cache.clone(),
            f.mailer.clone(),
        );

        let err = handler.handle(&envelope(creation_event())).await.unwrap_err();
        assert!(!err.is_permanent());
    }

    #[tokio::test]
    async fn update_applies_only_the_changed_fields() {
        let f = fixture().await;
        f.courses.insert(seeded_course()).await;
        let handler = CourseUpdateHandler::new(
            f.courses.clone(),
            f.media.clone(),
            f.cache.clone(),
            f.mailer.clone(),
        );

        let event = CourseUpdate {
            course_id: "c-1".to_owned(),
            educator_id: "e-1".to_owned(),
            changes: CourseChanges {
                price: Some(29.0),
                ..CourseChanges::default()
            },
            thumbnail_path: None,
        };
        handler.handle(&envelope(event)).await.unwrap();

        let course = f.courses.get("c-1").await.unwrap();
        assert_eq!(course.price, 29.0);
        assert_eq!(course.title, "Intro to Rust");
    }

    #[tokio::test]
    async fn update_on_missing_course_is_retried() {
        let f = fixture().await;
        let handler = CourseUpdateHandler::new(
            f.courses.clone(),
            f.media.clone(),
            f.cache.clone(),
            f.mailer.clone(),
        );

        let event = CourseUpdate {
            course_id: "c-404".to_owned(),
            educator_id: "e-1".to_owned(),
            changes: CourseChanges::default(),
            thumbnail_path: None,
        };
        let err = handler.handle(&envelope(event)).await.unwrap_err();
        assert!(!err.is_permanent());
    }

    #[tokio::test]
    async fn update_by_non_owner_is_rejected_permanently() {
        let f = fixture().await;
        f.courses.insert(seeded_course()).await;
        let handler = CourseUpdateHandler::new(
            f.courses.clone(),
            f.media.clone(),
            f.cache.clone(),
            f.mailer.clone(),
        );

        let event = CourseUpdate {
            course_id: "c-1".to_owned(),
            educator_id: "e-intruder".to_owned(),
            changes: CourseChanges::default(),
            thumbnail_path: None,
        };
        let err = handler.handle(&envelope(event)).await.unwrap_err();
        assert!(err.is_permanent());
    }

    #[tokio::test]
    async fn delete_removes_the_course_and_its_cache_keys() {
        let f = fixture().await;
        f.courses.insert(seeded_course()).await;
        f.store
            .set(
                &keys::course_detail("c-1"),
                b"stale".to_vec(),
                Duration::from_secs(300),
            )
            .await;
        let handler = CourseDeleteHandler::new(f.courses.clone(), f.cache.clone());

        let event = CourseDeleted {
            course_id: "c-1".to_owned(),
            educator_id: "e-1".to_owned(),
        };
        handler.handle(&envelope(event.clone())).await.unwrap();
        // Redelivery of the delete is a no-op.
        handler.handle(&envelope(event)).await.unwrap();

        assert!(f.courses.get("c-1").await.is_none());
        assert_eq!(f.store.get(&keys::course_detail("c-1")).await, None);
    }

    #[tokio::test]
    async fn rating_is_an_upsert_keyed_by_user() {
        let f = fixture().await;
        f.courses.insert(seeded_course()).await;
        f.users
            .insert(User {
                id: "u-1".to_owned(),
                name: "Ada".to_owned(),
                email: "ada@example.com".to_owned(),
                enrolled_courses: vec!["c-1".to_owned()],
            })
            .await;
        let handler = RatingHandler::new(
            f.courses.clone(),
            f.users.clone(),
            f.cache.clone(),
            f.mailer.clone(),
        );

        for rating in [5, 3] {
            let event = RatingAdded {
                user_id: "u-1".to_owned(),
                course_id: "c-1".to_owned(),
                rating,
            };
            handler.handle(&envelope(event)).await.unwrap();
        }

        let course = f.courses.get("c-1").await.unwrap();
        assert_eq!(course.ratings.len(), 1);
        assert_eq!(course.ratings[0].rating, 3);
    }

    #[tokio::test]
    async fn out_of_range_rating_is_rejected_permanently() {
        let f = fixture().await;
        let handler = RatingHandler::new(
            f.courses.clone(),
            f.users.clone(),
            f.cache.clone(),
            f.mailer.clone(),
        );

        for rating in [0, 6] {
            let event = RatingAdded {
                user_id: "u-1".to_owned(),
                course_id: "c-1".to_owned(),
                rating,
            };
            let err = handler.handle(&envelope(event)).await.unwrap_err();
            assert!(err.is_permanent());
        }
    }
}
