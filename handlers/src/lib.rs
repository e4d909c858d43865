//! # Coursehub Handlers
//!
//! Domain event types and their processors for the course-marketplace
//! worker: the business logic invoked by the consumer dispatcher.
//!
//! Each queue carries exactly one typed event ([`events`]), decoded and
//! validated before any handler code runs; an undecodable payload is a
//! narrow, dispatcher-level error, never a runtime surprise inside business
//! logic. Handlers implement
//! [`EventHandler`](coursehub_core::EventHandler) and report failures
//! through the permanent/transient classification that drives retry and
//! dead-letter routing.
//!
//! # Idempotency
//!
//! Delivery is at-least-once, so every handler tolerates duplicate
//! invocations for the same logical event:
//!
//! - course creation upserts by the pre-assigned course id
//! - enrollment checks the user's enrolled set before mutating
//! - ratings are upserts keyed by user id
//! - notifications are deduplicated by an idempotency token recorded in the
//!   cache store
//!
//! # Collaborators
//!
//! The primary datastore, the notification sender and the object-storage
//! service are external systems consumed through traits ([`repository`],
//! [`providers`]); in-memory versions live in [`mocks`] behind the
//! default-on `test-utils` feature.

pub mod events;
pub mod handlers;
pub mod mailer;
pub mod model;
pub mod providers;
pub mod queues;
pub mod repository;

#[cfg(feature = "test-utils")]
pub mod mocks;

pub use handlers::course::{
    CourseCreationHandler, CourseDeleteHandler, CourseUpdateHandler, RatingHandler,
};
pub use handlers::email::EmailHandler;
pub use handlers::enrollment::EnrollmentHandler;
pub use handlers::progress::ProgressHandler;
pub use mailer::Mailer;
