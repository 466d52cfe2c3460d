//! Authentication API endpoints
//!
//! - POST /api/v1/auth/register - Create an account and log in
//! - POST /api/v1/auth/login - Log in (rate limited)
//! - POST /api/v1/auth/logout - End the current session
//! - GET /api/v1/auth/me - Current user
//! - PUT /api/v1/auth/profile - Update display name
//! - PUT /api/v1/auth/password - Change password, logging out other sessions

use axum::{
    extract::{ConnectInfo, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::IntoResponse,
    routing::{get, post, put},
    Extension, Router,
};
use std::net::{IpAddr, SocketAddr};

use crate::api::extract::Json;
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser, SessionToken};
use crate::api::responses::{
    AuthResponse, ChangePasswordRequest, ChangePasswordResponse, LoginRequest, RegisterRequest,
    UpdateProfileRequest, UserResponse,
};
use crate::services::rate_limiter::WindowLimit;
use crate::services::{LoginInput, RegisterInput, UserServiceError};

/// Routes that need no session
pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
}

/// Routes behind `require_auth`
pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/auth/logout", post(logout))
        .route("/auth/me", get(get_current_user))
        .route("/auth/profile", put(update_profile))
        .route("/auth/password", put(change_password))
}

/// POST /api/v1/auth/register
///
/// The first account becomes admin.
async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let input = RegisterInput::new(body.username, body.email, body.password);
    let user = state.user_service.register(input).await?;
    let session = state.user_service.create_session(user.id).await?;

    let headers = session_cookie(&session.id, state.user_service.session_expiration_days())?;
    Ok((
        StatusCode::CREATED,
        headers,
        Json(AuthResponse {
            user: user.into(),
            token: session.id,
        }),
    ))
}

/// POST /api/v1/auth/login
///
/// Limited per client IP and per account. Failed attempts count against the
/// account whether it was named by username or email; a successful login
/// clears them.
async fn login(
    State(state): State<AppState>,
    peer: Option<Extension<ConnectInfo<SocketAddr>>>,
    headers: HeaderMap,
    Json(body): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let peer = peer.map(|Extension(ConnectInfo(addr))| addr.ip());
    if let Some(ip) = client_ip(&headers, peer, state.trust_proxy_headers) {
        if state.rate_limiter.is_ip_limited(ip).await {
            tracing::warn!("Login rate limit hit for IP {}", ip);
            return Err(ApiError::rate_limited(
                "Too many requests, please try again later",
                WindowLimit::IP.window.num_seconds() as u64,
            ));
        }
        state.rate_limiter.record_ip_request(ip).await;
    }

    let throttle_key = state
        .user_service
        .login_throttle_key(&body.username_or_email)
        .await?;
    if state.rate_limiter.is_username_limited(&throttle_key).await {
        tracing::warn!("Login rate limit hit for '{}'", body.username_or_email);
        return Err(ApiError::rate_limited(
            "Too many failed login attempts, please try again later",
            WindowLimit::USERNAME.window.num_seconds() as u64,
        ));
    }

    let input = LoginInput::new(body.username_or_email, body.password);
    let (user, session) = match state.user_service.login(input).await {
        Ok(ok) => ok,
        Err(UserServiceError::AuthenticationError(_)) => {
            state.rate_limiter.record_failed_attempt(&throttle_key).await;
            return Err(ApiError::unauthorized("Invalid username or password"));
        }
        Err(e) => return Err(e.into()),
    };

    state.rate_limiter.clear_username_attempts(&throttle_key).await;

    let headers = session_cookie(&session.id, state.user_service.session_expiration_days())?;
    Ok((
        headers,
        Json(AuthResponse {
            user: user.into(),
            token: session.id,
        }),
    ))
}

/// POST /api/v1/auth/logout
async fn logout(
    State(state): State<AppState>,
    SessionToken(token): SessionToken,
) -> Result<impl IntoResponse, ApiError> {
    state.user_service.logout(&token).await?;

    let mut headers = HeaderMap::new();
    headers.insert(
        header::SET_COOKIE,
        HeaderValue::from_static("session=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0"),
    );
    Ok((StatusCode::NO_CONTENT, headers))
}

/// GET /api/v1/auth/me
async fn get_current_user(user: AuthenticatedUser) -> Json<UserResponse> {
    Json(user.0.into())
}

/// PUT /api/v1/auth/profile
async fn update_profile(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<UpdateProfileRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    let updated = state
        .user_service
        .update_profile(&user.0, body.display_name)
        .await?;
    Ok(Json(updated.into()))
}

/// PUT /api/v1/auth/password
async fn change_password(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    SessionToken(token): SessionToken,
    Json(body): Json<ChangePasswordRequest>,
) -> Result<Json<ChangePasswordResponse>, ApiError> {
    let revoked = state
        .user_service
        .change_password(&user.0, &token, &body.current_password, &body.new_password)
        .await
        .map_err(|e| match e {
            // a wrong current password is a bad request, not a lost session
            UserServiceError::AuthenticationError(msg) => ApiError::validation_error(msg),
            other => other.into(),
        })?;

    Ok(Json(ChangePasswordResponse {
        revoked_sessions: revoked,
    }))
}

// ============================================================================
// Helpers
// ============================================================================

/// `Set-Cookie` for a new session
fn session_cookie(token: &str, expiration_days: i64) -> Result<HeaderMap, ApiError> {
    let cookie = format!(
        "session={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        token,
        expiration_days * 24 * 60 * 60
    );
    let value = HeaderValue::from_str(&cookie).map_err(ApiError::internal_error)?;

    let mut headers = HeaderMap::new();
    headers.insert(header::SET_COOKIE, value);
    Ok(headers)
}

/// Address to rate limit a request by.
///
/// The socket peer, unless the server sits behind a proxy it trusts to set
/// the forwarding headers.
fn client_ip(
    headers: &HeaderMap,
    peer: Option<IpAddr>,
    trust_proxy_headers: bool,
) -> Option<IpAddr> {
    if trust_proxy_headers {
        if let Some(ip) = extract_ip_address(headers) {
            return Some(ip);
        }
    }
    peer
}

/// Client IP from `X-Forwarded-For` (first hop) or `X-Real-IP`
fn extract_ip_address(headers: &HeaderMap) -> Option<IpAddr> {
    if let Some(forwarded) = headers.get("x-forwarded-for").and_then(|h| h.to_str().ok()) {
        if let Some(ip) = forwarded.split(',').next().and_then(|s| s.trim().parse().ok()) {
            return Some(ip);
        }
    }

    headers
        .get("x-real-ip")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_ip_prefers_forwarded_for() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("10.0.0.1, 172.16.0.1"));
        headers.insert("x-real-ip", HeaderValue::from_static("192.168.1.1"));
        assert_eq!(extract_ip_address(&headers), "10.0.0.1".parse().ok());
    }

    #[test]
    fn test_extract_ip_falls_back_to_real_ip() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("garbage"));
        headers.insert("x-real-ip", HeaderValue::from_static("192.168.1.1"));
        assert_eq!(extract_ip_address(&headers), "192.168.1.1".parse().ok());

        assert!(extract_ip_address(&HeaderMap::new()).is_none());
    }

    #[test]
    fn test_client_ip_ignores_headers_unless_trusted() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("10.0.0.1"));
        let peer: Option<IpAddr> = "203.0.113.9".parse().ok();

        assert_eq!(client_ip(&headers, peer, false), peer);
        assert_eq!(client_ip(&headers, peer, true), "10.0.0.1".parse().ok());
        assert_eq!(client_ip(&HeaderMap::new(), peer, true), peer);
        assert!(client_ip(&headers, None, false).is_none());
    }

    #[test]
    fn test_session_cookie() {
        let headers = session_cookie("abc", 7).unwrap();
        let cookie = headers.get(header::SET_COOKIE).unwrap().to_str().unwrap();
        assert!(cookie.starts_with("session=abc;"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("Max-Age=604800"));
    }
}
