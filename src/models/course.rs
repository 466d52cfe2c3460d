//! Course and enrollment models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::UserSummary;

/// A course. Its forum, announcements and membership hang off `id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Course {
    pub id: i64,
    /// Short unique code, e.g. `CS101`
    pub code: String,
    pub title: String,
    pub description: Option<String>,
    /// Owner of the course
    pub instructor_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Role a user holds inside one course
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnrollmentRole {
    Instructor,
    Student,
}

impl Default for EnrollmentRole {
    fn default() -> Self {
        Self::Student
    }
}

impl fmt::Display for EnrollmentRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Instructor => write!(f, "instructor"),
            Self::Student => write!(f, "student"),
        }
    }
}

impl FromStr for EnrollmentRole {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "instructor" => Ok(Self::Instructor),
            "student" => Ok(Self::Student),
            _ => Err(anyhow::anyhow!("Invalid enrollment role: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Enrollment {
    pub course_id: i64,
    pub user_id: i64,
    pub role: EnrollmentRole,
    pub enrolled_at: DateTime<Utc>,
}

/// Enrollment joined with the member's public profile
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourseMember {
    pub user: UserSummary,
    pub role: EnrollmentRole,
    pub enrolled_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCourseInput {
    pub code: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateCourseInput {
    pub title: Option<String>,
    pub description: Option<String>,
}

/// Filter for course listings
#[derive(Debug, Clone, Default)]
pub struct CourseFilter {
    /// Substring match on code or title
    pub search: Option<String>,
    /// Restrict to courses this user is enrolled in
    pub member_id: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enrollment_role_parse() {
        assert_eq!(EnrollmentRole::from_str("INSTRUCTOR").unwrap(), EnrollmentRole::Instructor);
        assert_eq!(EnrollmentRole::from_str("student").unwrap(), EnrollmentRole::Student);
        assert!(EnrollmentRole::from_str("admin").is_err());
        assert_eq!(EnrollmentRole::default().to_string(), "student");
    }

    #[test]
    fn test_update_input_partial() {
        let input: UpdateCourseInput = serde_json::from_str(r#"{"title":"New"}"#).unwrap();
        assert_eq!(input.title.as_deref(), Some("New"));
        assert!(input.description.is_none());
    }
}
