//! Request and response bodies shared by the handlers and the client SDK
//!
//! Endpoints that return a model (posts, courses, notifications...) serialise
//! the model directly. The types here cover the remaining shapes.

use serde::{Deserialize, Serialize};

use crate::models::{EnrollmentRole, NotificationType, User, UserRole, UserStatus};

// ============================================================================
// Auth
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub username_or_email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateProfileRequest {
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

/// The caller's own account, including the email address
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub display_name: Option<String>,
    pub role: UserRole,
    pub status: UserStatus,
    pub avatar_url: String,
    pub created_at: String,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            avatar_url: user.avatar_url(),
            id: user.id,
            username: user.username,
            email: user.email,
            display_name: user.display_name,
            role: user.role,
            status: user.status,
            created_at: user.created_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthResponse {
    pub user: UserResponse,
    pub token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangePasswordResponse {
    /// Other sessions that were logged out
    pub revoked_sessions: u64,
}

// ============================================================================
// Courses
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddMemberRequest {
    pub user_id: i64,
    #[serde(default)]
    pub role: EnrollmentRole,
}

// ============================================================================
// Forum
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PinRequest {
    pub pinned: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentRequest {
    pub content: String,
}

// ============================================================================
// Chat
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartConversationRequest {
    pub recipient_id: i64,
}

// ============================================================================
// Admin
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetRoleRequest {
    pub role: UserRole,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetStatusRequest {
    pub status: UserStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendNotificationRequest {
    pub user_id: i64,
    pub message: String,
    pub notification_type: Option<NotificationType>,
    pub link: Option<String>,
}

// ============================================================================
// Misc
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountResponse {
    pub count: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdatedResponse {
    pub updated: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// `ok`, or `degraded` when the database does not answer
    pub status: String,
    pub version: String,
    pub database: bool,
    pub uptime_seconds: u64,
    pub total_requests: u64,
    pub avg_response_time_ms: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_response_hides_password_hash() {
        let mut user = User::new(
            "alice".to_string(),
            "Alice@Example.edu".to_string(),
            "secret-hash".to_string(),
            UserRole::Student,
        );
        user.id = 3;

        let response = UserResponse::from(user);
        let json = serde_json::to_string(&response).unwrap();
        assert!(!json.contains("secret-hash"));
        assert!(json.contains("\"role\":\"student\""));
        assert!(response.avatar_url.starts_with("https://www.gravatar.com/avatar/"));
    }

    #[test]
    fn test_add_member_role_defaults_to_student() {
        let req: AddMemberRequest = serde_json::from_str(r#"{"user_id": 4}"#).unwrap();
        assert_eq!(req.role, EnrollmentRole::Student);
    }
}
