//! Domain records as the worker sees them.
//!
//! These are the fields the event handlers actually touch; the primary
//! datastore owns the full documents.

use serde::{Deserialize, Serialize};

/// A marketplace course.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    /// Course id, assigned by the caller before the creation event is
    /// published so redeliveries upsert instead of duplicating.
    pub id: String,
    /// Owning educator.
    pub educator_id: String,
    /// Course title.
    pub title: String,
    /// Course description.
    pub description: String,
    /// List price.
    pub price: f64,
    /// Discount percentage applied to the list price.
    pub discount: f64,
    /// Whether the course is visible in the public catalog.
    pub published: bool,
    /// URL of the uploaded thumbnail, when one exists.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
    /// Ratings, at most one per user.
    #[serde(default)]
    pub ratings: Vec<Rating>,
    /// Ids of enrolled students.
    #[serde(default)]
    pub enrolled_students: Vec<String>,
}

impl Course {
    /// Record or replace this user's rating.
    pub fn rate(&mut self, user_id: &str, rating: u8) {
        match self.ratings.iter_mut().find(|r| r.user_id == user_id) {
            Some(existing) => existing.rating = rating,
            None => self.ratings.push(Rating {
                user_id: user_id.to_owned(),
                rating,
            }),
        }
    }
}

/// One user's rating of a course.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rating {
    /// Rating author.
    pub user_id: String,
    /// Stars, 1..=5.
    pub rating: u8,
}

/// A marketplace user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// User id from the identity provider.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Contact address for notifications.
    pub email: String,
    /// Ids of courses the user is enrolled in.
    #[serde(default)]
    pub enrolled_courses: Vec<String>,
}

impl User {
    /// Whether the user is enrolled in a course.
    #[must_use]
    pub fn is_enrolled(&self, course_id: &str) -> bool {
        self.enrolled_courses.iter().any(|id| id == course_id)
    }
}
