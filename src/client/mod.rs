//! Typed HTTP client for the CourseHub API
//!
//! Wraps `reqwest` and returns the same structs the server serialises.
//! The session token from `register` or `login` is kept and sent as a
//! bearer token on every later call.
//!
//! ```rust,ignore
//! let client = ApiClient::new("http://127.0.0.1:8080");
//! client.login("alice", "secret").await?;
//! let courses = client.list_courses(&CourseListQuery::default()).await?;
//! ```

mod chat;
mod courses;
mod forum;
mod notifications;

use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::api::common::UserSearchQuery;
use crate::api::responses::{
    AuthResponse, ChangePasswordRequest, ChangePasswordResponse, HealthResponse, LoginRequest,
    RegisterRequest, SendNotificationRequest, SetRoleRequest, SetStatusRequest,
    UpdateProfileRequest, UserResponse,
};
use crate::models::{Notification, NotificationType, PagedResult, UserRole, UserStatus, UserSummary};

const API_PREFIX: &str = "/api/v1";

/// Error type for client operations
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error {status} ({code}): {message}")]
    Api {
        status: StatusCode,
        code: String,
        message: String,
    },

    #[error("Not authenticated")]
    NotAuthenticated,
}

impl ClientError {
    /// Error code from the server envelope, if this is an API error
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Api { code, .. } => Some(code),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    code: String,
    message: String,
}

/// Client for the `/api/v1` routes
#[derive(Debug)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    token: RwLock<Option<String>>,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(Client::new(), base_url)
    }

    /// Use a preconfigured `reqwest::Client` (timeouts, proxies)
    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: RwLock::new(None),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn token(&self) -> Option<String> {
        self.token.read().await.clone()
    }

    /// Reuse a session token obtained elsewhere
    pub async fn set_token(&self, token: Option<String>) {
        *self.token.write().await = token;
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}{}", self.base_url, API_PREFIX, path)
    }

    fn public(&self, method: Method, path: &str) -> RequestBuilder {
        self.client.request(method, self.url(path))
    }

    /// Request carrying the stored bearer token
    async fn authed(&self, method: Method, path: &str) -> Result<RequestBuilder, ClientError> {
        let token = self.token.read().await;
        let token = token.as_deref().ok_or(ClientError::NotAuthenticated)?;
        Ok(self.client.request(method, self.url(path)).bearer_auth(token))
    }

    /// Send and decode a JSON body
    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ClientError> {
        let response = check(request.send().await?).await?;
        Ok(response.json().await?)
    }

    /// Send and discard the body (204 routes)
    async fn send_empty(&self, request: RequestBuilder) -> Result<(), ClientError> {
        check(request.send().await?).await?;
        Ok(())
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        self.send(self.authed(Method::GET, path).await?).await
    }

    async fn get_query<T: DeserializeOwned, Q: Serialize + ?Sized>(
        &self,
        path: &str,
        query: &Q,
    ) -> Result<T, ClientError> {
        self.send(self.authed(Method::GET, path).await?.query(query))
            .await
    }

    async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ClientError> {
        self.send(self.authed(Method::POST, path).await?.json(body))
            .await
    }

    async fn put<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ClientError> {
        self.send(self.authed(Method::PUT, path).await?.json(body))
            .await
    }

    async fn delete(&self, path: &str) -> Result<(), ClientError> {
        self.send_empty(self.authed(Method::DELETE, path).await?)
            .await
    }

    // ========================================================================
    // Auth
    // ========================================================================

    /// Create an account and keep its session
    pub async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<AuthResponse, ClientError> {
        let body = RegisterRequest {
            username: username.to_string(),
            email: email.to_string(),
            password: password.to_string(),
        };
        let auth: AuthResponse = self
            .send(self.public(Method::POST, "/auth/register").json(&body))
            .await?;
        self.set_token(Some(auth.token.clone())).await;
        Ok(auth)
    }

    pub async fn login(
        &self,
        username_or_email: &str,
        password: &str,
    ) -> Result<AuthResponse, ClientError> {
        let body = LoginRequest {
            username_or_email: username_or_email.to_string(),
            password: password.to_string(),
        };
        let auth: AuthResponse = self
            .send(self.public(Method::POST, "/auth/login").json(&body))
            .await?;
        self.set_token(Some(auth.token.clone())).await;
        Ok(auth)
    }

    /// End the session on the server and forget the token
    pub async fn logout(&self) -> Result<(), ClientError> {
        let request = self.authed(Method::POST, "/auth/logout").await?;
        self.send_empty(request).await?;
        self.set_token(None).await;
        Ok(())
    }

    pub async fn me(&self) -> Result<UserResponse, ClientError> {
        self.get("/auth/me").await
    }

    pub async fn update_profile(
        &self,
        display_name: Option<String>,
    ) -> Result<UserResponse, ClientError> {
        self.put("/auth/profile", &UpdateProfileRequest { display_name })
            .await
    }

    /// Change password. Other sessions are revoked by the server.
    pub async fn change_password(
        &self,
        current_password: &str,
        new_password: &str,
    ) -> Result<ChangePasswordResponse, ClientError> {
        let body = ChangePasswordRequest {
            current_password: current_password.to_string(),
            new_password: new_password.to_string(),
        };
        self.put("/auth/password", &body).await
    }

    // ========================================================================
    // Users
    // ========================================================================

    pub async fn search_users(
        &self,
        query: &UserSearchQuery,
    ) -> Result<PagedResult<UserSummary>, ClientError> {
        self.get_query("/users", query).await
    }

    pub async fn get_user(&self, id: i64) -> Result<UserSummary, ClientError> {
        self.get(&format!("/users/{}", id)).await
    }

    // ========================================================================
    // Admin
    // ========================================================================

    pub async fn admin_set_role(&self, user_id: i64, role: UserRole) -> Result<UserResponse, ClientError> {
        self.put(&format!("/admin/users/{}/role", user_id), &SetRoleRequest { role })
            .await
    }

    pub async fn admin_set_status(
        &self,
        user_id: i64,
        status: UserStatus,
    ) -> Result<UserResponse, ClientError> {
        self.put(&format!("/admin/users/{}/status", user_id), &SetStatusRequest { status })
            .await
    }

    pub async fn admin_send_notification(
        &self,
        user_id: i64,
        message: &str,
        notification_type: Option<NotificationType>,
        link: Option<String>,
    ) -> Result<Notification, ClientError> {
        let body = SendNotificationRequest {
            user_id,
            message: message.to_string(),
            notification_type,
            link,
        };
        self.post("/admin/notifications", &body).await
    }

    // ========================================================================
    // Health
    // ========================================================================

    /// Server health. A degraded server answers 503 with the same body.
    pub async fn health(&self) -> Result<HealthResponse, ClientError> {
        let response = self.public(Method::GET, "/health").send().await?;
        if response.status() == StatusCode::SERVICE_UNAVAILABLE {
            return Ok(response.json().await?);
        }
        Ok(check(response).await?.json().await?)
    }
}

/// Turn a non-success response into `ClientError::Api`
async fn check(response: Response) -> Result<Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let text = response.text().await?;
    let (code, message) = match serde_json::from_str::<ErrorEnvelope>(&text) {
        Ok(envelope) => (envelope.error.code, envelope.error.message),
        Err(_) => ("UNKNOWN".to_string(), text),
    };
    Err(ClientError::Api {
        status,
        code,
        message,
    })
}
