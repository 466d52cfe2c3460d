//! User model
//!
//! Users carry a global role (admin, instructor, student) and an account
//! status. Per-course roles live on [`Enrollment`](super::Enrollment).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A registered account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    /// Username (unique)
    pub username: String,
    /// Email address (unique)
    pub email: String,
    /// Password hash (argon2)
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    /// Name shown next to posts and messages
    pub display_name: Option<String>,
    pub role: UserRole,
    pub status: UserStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Create a new User with the given parameters.
    ///
    /// The password must already be hashed, see `services::password::hash_password()`.
    pub fn new(username: String, email: String, password_hash: String, role: UserRole) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            username,
            email,
            password_hash,
            display_name: None,
            role,
            status: UserStatus::Active,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }

    /// Instructors and admins may create courses.
    pub fn can_create_courses(&self) -> bool {
        matches!(self.role, UserRole::Admin | UserRole::Instructor)
    }

    pub fn is_banned(&self) -> bool {
        self.status == UserStatus::Banned
    }

    pub fn is_active(&self) -> bool {
        self.status == UserStatus::Active
    }

    /// Display name if set, otherwise the username
    pub fn name(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.username)
    }

    /// Gravatar URL derived from the account email.
    pub fn avatar_url(&self) -> String {
        gravatar_url(&self.email)
    }

    /// Public projection used wherever another user's data is embedded.
    pub fn summary(&self) -> UserSummary {
        UserSummary {
            id: self.id,
            username: self.username.clone(),
            display_name: self.display_name.clone(),
            role: self.role,
            avatar_url: self.avatar_url(),
        }
    }
}

/// Generate a Gravatar URL from an email address
pub fn gravatar_url(email: &str) -> String {
    let email = email.trim();
    if email.is_empty() {
        return "https://www.gravatar.com/avatar/?d=mp&s=80".to_string();
    }
    let hash = format!("{:x}", md5::compute(email.to_lowercase()));
    format!("https://www.gravatar.com/avatar/{}?d=mp&s=80", hash)
}

/// Public view of a user, without email or password hash.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: i64,
    pub username: String,
    pub display_name: Option<String>,
    pub role: UserRole,
    pub avatar_url: String,
}

impl UserSummary {
    /// Placeholder for an author whose account no longer exists.
    pub fn deleted(id: i64) -> Self {
        Self {
            id,
            username: "[deleted]".to_string(),
            display_name: None,
            role: UserRole::Student,
            avatar_url: gravatar_url(""),
        }
    }
}

/// Global user role.
///
/// - Admin: full access, moderates every course
/// - Instructor: may create courses
/// - Student: default for new accounts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Admin,
    Instructor,
    Student,
}

impl Default for UserRole {
    fn default() -> Self {
        Self::Student
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserRole::Admin => write!(f, "admin"),
            UserRole::Instructor => write!(f, "instructor"),
            UserRole::Student => write!(f, "student"),
        }
    }
}

impl FromStr for UserRole {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "admin" => Ok(UserRole::Admin),
            "instructor" => Ok(UserRole::Instructor),
            "student" => Ok(UserRole::Student),
            _ => Err(anyhow::anyhow!("Invalid user role: {}", s)),
        }
    }
}

/// Account state. Banned users cannot log in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    Active,
    Banned,
}

impl Default for UserStatus {
    fn default() -> Self {
        Self::Active
    }
}

impl fmt::Display for UserStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserStatus::Active => write!(f, "active"),
            UserStatus::Banned => write!(f, "banned"),
        }
    }
}

impl FromStr for UserStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "active" => Ok(UserStatus::Active),
            "banned" => Ok(UserStatus::Banned),
            _ => Err(anyhow::anyhow!("Invalid user status: {}", s)),
        }
    }
}

/// Input for creating a new user (before password hashing)
#[derive(Debug, Clone)]
pub struct CreateUserInput {
    pub username: String,
    pub email: String,
    /// Plaintext password (will be hashed)
    pub password: String,
    /// Defaults to Student, or Admin for the very first account
    pub role: Option<UserRole>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn user(role: UserRole) -> User {
        User::new("someone".to_string(), "Someone@Example.edu ".to_string(), "hash".to_string(), role)
    }

    #[test]
    fn test_user_new() {
        let user = user(UserRole::Student);

        assert_eq!(user.id, 0);
        assert_eq!(user.username, "someone");
        assert_eq!(user.status, UserStatus::Active);
        assert!(user.display_name.is_none());
    }

    #[test]
    fn test_role_checks() {
        assert!(user(UserRole::Admin).is_admin());
        assert!(user(UserRole::Admin).can_create_courses());
        assert!(user(UserRole::Instructor).can_create_courses());
        assert!(!user(UserRole::Instructor).is_admin());
        assert!(!user(UserRole::Student).can_create_courses());
    }

    #[test]
    fn test_avatar_normalises_email() {
        let a = user(UserRole::Student).avatar_url();
        let b = gravatar_url("someone@example.edu");
        assert_eq!(a, b);
        assert!(a.starts_with("https://www.gravatar.com/avatar/"));
    }

    #[test]
    fn test_summary_hides_private_fields() {
        let mut u = user(UserRole::Instructor);
        u.id = 7;
        u.display_name = Some("Dr. Someone".to_string());

        let json = serde_json::to_value(u.summary()).unwrap();
        assert_eq!(json["id"], 7);
        assert_eq!(json["role"], "instructor");
        assert!(json.get("email").is_none());
        assert!(json.get("password_hash").is_none());
    }

    #[test]
    fn test_password_hash_not_serialized() {
        let json = serde_json::to_value(user(UserRole::Student)).unwrap();
        assert!(json.get("password_hash").is_none());
    }

    #[test]
    fn test_user_role_from_str() {
        assert_eq!(UserRole::from_str("ADMIN").unwrap(), UserRole::Admin);
        assert_eq!(UserRole::from_str("Instructor").unwrap(), UserRole::Instructor);
        assert!(UserRole::from_str("editor").is_err());
        assert_eq!(UserRole::default(), UserRole::Student);
    }

    #[test]
    fn test_user_status_from_str() {
        assert_eq!(UserStatus::from_str("banned").unwrap(), UserStatus::Banned);
        assert!(UserStatus::from_str("frozen").is_err());
    }

    proptest! {
        #[test]
        fn prop_role_display_roundtrip(role in prop_oneof![
            Just(UserRole::Admin),
            Just(UserRole::Instructor),
            Just(UserRole::Student),
        ]) {
            prop_assert_eq!(UserRole::from_str(&role.to_string()).unwrap(), role);
        }
    }
}
