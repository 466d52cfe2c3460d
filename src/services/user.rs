//! User service
//!
//! Registration, login and sessions, profile edits and the admin-side role and
//! status changes. The very first account registered becomes an admin.

use crate::db::repositories::{SessionRepository, UserRepository};
use crate::models::{ListParams, PagedResult, Session, User, UserRole, UserStatus, UserSummary};
use crate::services::password::{hash_password, verify_password};
use anyhow::Context;
use chrono::{Duration, Utc};
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Default session expiration time in days
const DEFAULT_SESSION_EXPIRATION_DAYS: i64 = 7;

/// Maximum display name length, in characters
pub const MAX_DISPLAY_NAME_LENGTH: usize = 100;

#[derive(Debug, thiserror::Error)]
pub enum UserServiceError {
    /// Invalid credentials
    #[error("Authentication failed: {0}")]
    AuthenticationError(String),

    #[error("Your account has been banned")]
    UserBanned,

    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Username or email already taken
    #[error("User already exists: {0}")]
    UserExists(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// User service for managing accounts and authentication
pub struct UserService {
    user_repo: Arc<dyn UserRepository>,
    session_repo: Arc<dyn SessionRepository>,
    session_expiration_days: i64,
    // held from the uniqueness checks through the insert so only one
    // concurrent registration can see an empty user table
    registration: Mutex<()>,
}

impl UserService {
    pub fn new(
        user_repo: Arc<dyn UserRepository>,
        session_repo: Arc<dyn SessionRepository>,
    ) -> Self {
        Self::with_session_expiration(user_repo, session_repo, DEFAULT_SESSION_EXPIRATION_DAYS)
    }

    pub fn with_session_expiration(
        user_repo: Arc<dyn UserRepository>,
        session_repo: Arc<dyn SessionRepository>,
        session_expiration_days: i64,
    ) -> Self {
        Self {
            user_repo,
            session_repo,
            session_expiration_days,
            registration: Mutex::new(()),
        }
    }

    /// Register a new account.
    ///
    /// The first account becomes `admin`, every later one `student`.
    ///
    /// # Errors
    ///
    /// - `ValidationError` for empty fields or an email without `@`
    /// - `UserExists` if the username or email is taken
    pub async fn register(&self, input: RegisterInput) -> Result<User, UserServiceError> {
        validate_register_input(&input)?;

        let username = input.username.trim().to_string();
        let email = input.email.trim().to_string();

        let _registering = self.registration.lock().await;

        if self
            .user_repo
            .get_by_username(&username)
            .await
            .context("Failed to check username")?
            .is_some()
        {
            return Err(UserServiceError::UserExists(format!(
                "Username '{}' is already taken",
                username
            )));
        }

        if self
            .user_repo
            .get_by_email(&email)
            .await
            .context("Failed to check email")?
            .is_some()
        {
            return Err(UserServiceError::UserExists(format!(
                "Email '{}' is already registered",
                email
            )));
        }

        let role = if self.is_first_user().await? {
            UserRole::Admin
        } else {
            UserRole::Student
        };

        let password_hash = hash_password(&input.password).context("Failed to hash password")?;
        let user = User::new(username, email, password_hash, role);

        let created = self
            .user_repo
            .create(&user)
            .await
            .context("Failed to create user")?;

        tracing::info!("Registered user {} ({}) as {}", created.username, created.id, created.role);
        Ok(created)
    }

    /// Check credentials and open a session.
    ///
    /// Banned accounts get `UserBanned` even with the right password.
    pub async fn login(&self, input: LoginInput) -> Result<(User, Session), UserServiceError> {
        let invalid = || UserServiceError::AuthenticationError("Invalid username or password".to_string());

        let user = self
            .find_user_by_username_or_email(input.username_or_email.trim())
            .await?
            .ok_or_else(invalid)?;

        let password_valid = verify_password(&input.password, &user.password_hash)
            .context("Failed to verify password")?;
        if !password_valid {
            return Err(invalid());
        }

        if user.is_banned() {
            return Err(UserServiceError::UserBanned);
        }

        let session = self.create_session(user.id).await?;
        Ok((user, session))
    }

    /// Key for login throttling.
    ///
    /// A username and an email that belong to the same account share one
    /// key; identifiers with no account are keyed on their lowercased text.
    pub async fn login_throttle_key(
        &self,
        username_or_email: &str,
    ) -> Result<String, UserServiceError> {
        let identifier = username_or_email.trim();
        Ok(match self.find_user_by_username_or_email(identifier).await? {
            Some(user) => format!("user:{}", user.id),
            None => format!("name:{}", identifier.to_lowercase()),
        })
    }

    /// Delete the session. Unknown tokens are not an error.
    pub async fn logout(&self, session_id: &str) -> Result<(), UserServiceError> {
        self.session_repo
            .delete(session_id)
            .await
            .context("Failed to delete session")?;
        Ok(())
    }

    /// Resolve a session token to its user.
    ///
    /// Returns `None` for unknown or expired tokens; expired sessions are
    /// removed on the way out.
    pub async fn validate_session(&self, token: &str) -> Result<Option<User>, UserServiceError> {
        let session = match self
            .session_repo
            .get_by_id(token)
            .await
            .context("Failed to get session")?
        {
            Some(s) => s,
            None => return Ok(None),
        };

        if session.is_expired() {
            if let Err(e) = self.session_repo.delete(token).await {
                tracing::warn!("Failed to delete expired session: {:#}", e);
            }
            return Ok(None);
        }

        let user = self
            .user_repo
            .get_by_id(session.user_id)
            .await
            .context("Failed to get user")?;

        Ok(user)
    }

    /// Open a new session for an already authenticated user
    pub async fn create_session(&self, user_id: i64) -> Result<Session, UserServiceError> {
        let now = Utc::now();
        let session = Session {
            id: Uuid::new_v4().to_string(),
            user_id,
            expires_at: now + Duration::days(self.session_expiration_days),
            created_at: now,
        };

        let created = self
            .session_repo
            .create(&session)
            .await
            .context("Failed to create session")?;

        Ok(created)
    }

    pub fn session_expiration_days(&self) -> i64 {
        self.session_expiration_days
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Option<User>, UserServiceError> {
        let user = self
            .user_repo
            .get_by_id(id)
            .await
            .context("Failed to get user by ID")?;
        Ok(user)
    }

    /// Like [`get_by_id`](Self::get_by_id) but a missing user is `NotFound`
    pub async fn get_user(&self, id: i64) -> Result<User, UserServiceError> {
        self.get_by_id(id)
            .await?
            .ok_or_else(|| UserServiceError::NotFound(format!("User {} not found", id)))
    }

    /// Set or clear the display name. Blank input clears it.
    pub async fn update_profile(
        &self,
        user: &User,
        display_name: Option<String>,
    ) -> Result<User, UserServiceError> {
        let display_name = display_name
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty());

        if let Some(ref name) = display_name {
            if name.chars().count() > MAX_DISPLAY_NAME_LENGTH {
                return Err(UserServiceError::ValidationError(format!(
                    "Display name must be at most {} characters",
                    MAX_DISPLAY_NAME_LENGTH
                )));
            }
        }

        let mut updated = self.get_user(user.id).await?;
        updated.display_name = display_name;
        updated.updated_at = Utc::now();

        let saved = self
            .user_repo
            .update(&updated)
            .await
            .context("Failed to update profile")?;
        Ok(saved)
    }

    /// Change the password and revoke every session except `current_session`.
    ///
    /// Returns the number of sessions revoked.
    pub async fn change_password(
        &self,
        user: &User,
        current_session: &str,
        current_password: &str,
        new_password: &str,
    ) -> Result<u64, UserServiceError> {
        if new_password.is_empty() {
            return Err(UserServiceError::ValidationError(
                "New password cannot be empty".to_string(),
            ));
        }

        let mut stored = self.get_user(user.id).await?;
        let valid = verify_password(current_password, &stored.password_hash)
            .context("Failed to verify password")?;
        if !valid {
            return Err(UserServiceError::AuthenticationError(
                "Current password is incorrect".to_string(),
            ));
        }

        stored.password_hash = hash_password(new_password).context("Failed to hash password")?;
        stored.updated_at = Utc::now();
        self.user_repo
            .update(&stored)
            .await
            .context("Failed to update password")?;

        let revoked = self
            .session_repo
            .delete_others(user.id, current_session)
            .await
            .context("Failed to revoke sessions")?;

        tracing::info!("User {} changed password, revoked {} other sessions", user.id, revoked);
        Ok(revoked)
    }

    /// Substring search over username and display name
    pub async fn search(
        &self,
        query: Option<&str>,
        params: &ListParams,
    ) -> Result<PagedResult<UserSummary>, UserServiceError> {
        let query = query.map(str::trim).filter(|q| !q.is_empty());
        let (users, total) = self
            .user_repo
            .search(query, params)
            .await
            .context("Failed to search users")?;

        Ok(PagedResult::new(users, total, params).map(|u| u.summary()))
    }

    pub async fn set_role(&self, user_id: i64, role: UserRole) -> Result<User, UserServiceError> {
        let mut user = self.get_user(user_id).await?;
        user.role = role;
        user.updated_at = Utc::now();

        let saved = self
            .user_repo
            .update(&user)
            .await
            .context("Failed to update user role")?;
        tracing::info!("User {} role set to {}", user_id, role);
        Ok(saved)
    }

    /// Change account status. Banning also ends every session of the user.
    pub async fn set_status(
        &self,
        user_id: i64,
        status: UserStatus,
    ) -> Result<User, UserServiceError> {
        let mut user = self.get_user(user_id).await?;
        user.status = status;
        user.updated_at = Utc::now();

        let saved = self
            .user_repo
            .update(&user)
            .await
            .context("Failed to update user status")?;

        if status == UserStatus::Banned {
            let revoked = self
                .session_repo
                .delete_by_user(user_id)
                .await
                .context("Failed to revoke sessions")?;
            tracing::info!("User {} banned, revoked {} sessions", user_id, revoked);
        }

        Ok(saved)
    }

    pub async fn is_first_user(&self) -> Result<bool, UserServiceError> {
        let count = self
            .user_repo
            .count()
            .await
            .context("Failed to count users")?;
        Ok(count == 0)
    }

    /// Delete all expired sessions, returning how many were removed
    pub async fn cleanup_expired_sessions(&self) -> Result<u64, UserServiceError> {
        let count = self
            .session_repo
            .delete_expired()
            .await
            .context("Failed to delete expired sessions")?;
        Ok(count)
    }

    async fn find_user_by_username_or_email(
        &self,
        username_or_email: &str,
    ) -> Result<Option<User>, UserServiceError> {
        if let Some(user) = self
            .user_repo
            .get_by_username(username_or_email)
            .await
            .context("Failed to get user by username")?
        {
            return Ok(Some(user));
        }

        let user = self
            .user_repo
            .get_by_email(username_or_email)
            .await
            .context("Failed to get user by email")?;
        Ok(user)
    }
}

fn validate_register_input(input: &RegisterInput) -> Result<(), UserServiceError> {
    if input.username.trim().is_empty() {
        return Err(UserServiceError::ValidationError(
            "Username cannot be empty".to_string(),
        ));
    }
    if input.email.trim().is_empty() {
        return Err(UserServiceError::ValidationError(
            "Email cannot be empty".to_string(),
        ));
    }
    if input.password.is_empty() {
        return Err(UserServiceError::ValidationError(
            "Password cannot be empty".to_string(),
        ));
    }
    if !input.email.contains('@') {
        return Err(UserServiceError::ValidationError(
            "Invalid email format".to_string(),
        ));
    }
    Ok(())
}

/// Input for user registration
#[derive(Debug, Clone)]
pub struct RegisterInput {
    pub username: String,
    pub email: String,
    pub password: String,
}

impl RegisterInput {
    pub fn new(
        username: impl Into<String>,
        email: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            email: email.into(),
            password: password.into(),
        }
    }
}

/// Input for user login
#[derive(Debug, Clone)]
pub struct LoginInput {
    pub username_or_email: String,
    pub password: String,
}

impl LoginInput {
    pub fn new(username_or_email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username_or_email: username_or_email.into(),
            password: password.into(),
        }
    }
}
