//! One typed event per queue.
//!
//! Each queue's payload decodes into exactly one of these shapes before any
//! handler runs; a payload that does not match is dead-lettered by the
//! dispatcher as a serialization failure. Field names follow the camelCase
//! wire convention shared with the HTTP layer.

use serde::{Deserialize, Serialize};

/// Notification template names.
pub mod templates {
    /// Educator confirmation after course creation.
    pub const COURSE_CREATED: &str = "course_created";
    /// Educator confirmation after course update.
    pub const COURSE_UPDATED: &str = "course_updated";
    /// Student welcome after a successful purchase.
    pub const COURSE_ENROLLMENT_SUCCESS: &str = "course_enrollment_success";
    /// Educator notice of a new enrollment.
    pub const NEW_STUDENT_ENROLLED: &str = "new_student_enrolled";
    /// Student congratulations on finishing a course.
    pub const COURSE_COMPLETION: &str = "course_completion";
    /// Educator notice of a new or changed rating.
    pub const COURSE_RATING_RECEIVED: &str = "course_rating_received";
}

/// Payload of [`queues::COURSE_CREATION`](crate::queues::COURSE_CREATION).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseCreation {
    /// Pre-assigned id of the course to create (idempotency key).
    pub course_id: String,
    /// Submitting educator.
    pub educator_id: String,
    /// The course content.
    pub course: CourseDraft,
    /// Staging path of an uploaded thumbnail, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_path: Option<String>,
}

/// The submitted course fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseDraft {
    /// Course title; must be non-empty.
    pub title: String,
    /// Course description.
    #[serde(default)]
    pub description: String,
    /// List price; must be non-negative.
    pub price: f64,
    /// Discount percentage, 0..=100.
    #[serde(default)]
    pub discount: f64,
    /// Whether to publish immediately.
    #[serde(default)]
    pub published: bool,
}

/// Payload of [`queues::COURSE_UPDATED`](crate::queues::COURSE_UPDATED).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseUpdate {
    /// Course to update.
    pub course_id: String,
    /// Owning educator.
    pub educator_id: String,
    /// The fields to change; absent fields keep their value.
    pub changes: CourseChanges,
    /// Staging path of a replacement thumbnail, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_path: Option<String>,
}

/// Partial course update.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseChanges {
    /// New title.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// New description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// New list price.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    /// New discount percentage.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discount: Option<f64>,
    /// New published flag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published: Option<bool>,
}

/// Payload of [`queues::COURSE_DELETED`](crate::queues::COURSE_DELETED).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseDeleted {
    /// Course to delete.
    pub course_id: String,
    /// Owning educator.
    pub educator_id: String,
}

/// Payload of [`queues::PAYMENT_SUCCEEDED`](crate::queues::PAYMENT_SUCCEEDED),
/// fed from payment-gateway webhooks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseCompleted {
    /// Purchase record id (stable across webhook retries).
    pub purchase_id: String,
    /// Buying user.
    pub user_id: String,
    /// Purchased course.
    pub course_id: String,
    /// Amount paid.
    pub amount: f64,
}

/// Payload of
/// [`queues::COURSE_PROGRESS_UPDATED`](crate::queues::COURSE_PROGRESS_UPDATED).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressUpdated {
    /// The student.
    pub user_id: String,
    /// The course being progressed.
    pub course_id: String,
    /// The lecture just completed.
    pub lecture_id: String,
    /// Total lectures the student has completed in this course.
    pub completed_lectures: u32,
    /// Total lectures in the course.
    pub total_lectures: u32,
}

/// Payload of
/// [`queues::COURSE_RATING_ADDED`](crate::queues::COURSE_RATING_ADDED).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RatingAdded {
    /// Rating author.
    pub user_id: String,
    /// Rated course.
    pub course_id: String,
    /// Stars, 1..=5.
    pub rating: u8,
}

/// Payload of
/// [`queues::EMAIL_NOTIFICATIONS`](crate::queues::EMAIL_NOTIFICATIONS).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailNotification {
    /// Recipient id or address.
    pub to: String,
    /// Template name (see [`templates`]).
    pub template: String,
    /// Template data.
    #[serde(default)]
    pub data: serde_json::Value,
}
