//! Cache key naming scheme.
//!
//! Point lookups use `<entity>:<id>:<view>`; collection/listing caches use
//! `cache:<listing-name>`. Invalidation operates on exact keys derived here;
//! every cache producer and invalidator goes through this module so the
//! derived key sets stay in sync.

/// Listing of all published courses.
pub const PUBLISHED_COURSES: &str = "cache:courses:published";

/// Detail view of a single course.
#[must_use]
pub fn course_detail(course_id: &str) -> String {
    format!("course:{course_id}:detail")
}

/// An educator's own course list.
#[must_use]
pub fn educator_courses(educator_id: &str) -> String {
    format!("educator:{educator_id}:courses")
}

/// An educator's dashboard aggregate (revenue, enrollment counts).
#[must_use]
pub fn educator_dashboard(educator_id: &str) -> String {
    format!("educator:{educator_id}:dashboard")
}

/// The students enrolled across an educator's courses.
#[must_use]
pub fn educator_enrolled_students(educator_id: &str) -> String {
    format!("educator:{educator_id}:enrolled-students")
}

/// A user's profile view.
#[must_use]
pub fn user_profile(user_id: &str) -> String {
    format!("user:{user_id}:profile")
}

/// A user's enrolled-course list.
#[must_use]
pub fn user_enrollments(user_id: &str) -> String {
    format!("user:{user_id}:enrolled-courses")
}

/// A user's progress through one course.
#[must_use]
pub fn user_progress(user_id: &str, course_id: &str) -> String {
    format!("user:{user_id}:progress:{course_id}")
}

/// Fixed-window rate-limit counter for a subject.
#[must_use]
pub fn rate_limit(subject: &str) -> String {
    format!("rate_limit:{subject}")
}

/// Sent-marker for a notification idempotency token.
#[must_use]
pub fn notification_sent(token: &str) -> String {
    format!("notification:{token}:sent")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn point_keys_follow_entity_id_view() {
        assert_eq!(course_detail("42"), "course:42:detail");
        assert_eq!(user_profile("u-1"), "user:u-1:profile");
        assert_eq!(educator_dashboard("e-9"), "educator:e-9:dashboard");
    }

    #[test]
    fn listing_keys_carry_the_cache_prefix() {
        assert!(PUBLISHED_COURSES.starts_with("cache:"));
    }
}
