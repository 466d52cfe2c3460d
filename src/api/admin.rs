//! Admin API endpoints
//!
//! Mounted behind `require_auth` and `require_admin`.
//!
//! - PUT /api/v1/admin/users/{id}/role
//! - PUT /api/v1/admin/users/{id}/status - Banning also ends the user's sessions
//! - POST /api/v1/admin/notifications - Send a notification to one user

use axum::{
    extract::State,
    http::StatusCode,
    routing::{post, put},
    Router,
};

use crate::api::extract::{Json, Path};
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::api::responses::{
    SendNotificationRequest, SetRoleRequest, SetStatusRequest, UserResponse,
};
use crate::models::{Notification, UserStatus};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/users/{id}/role", put(set_role))
        .route("/users/{id}/status", put(set_status))
        .route("/notifications", post(send_notification))
}

async fn set_role(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<SetRoleRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    let user = state.user_service.set_role(id, body.role).await?;
    Ok(Json(user.into()))
}

async fn set_status(
    State(state): State<AppState>,
    admin: AuthenticatedUser,
    Path(id): Path<i64>,
    Json(body): Json<SetStatusRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    if id == admin.0.id && body.status == UserStatus::Banned {
        return Err(ApiError::validation_error("You cannot ban yourself"));
    }
    let user = state.user_service.set_status(id, body.status).await?;
    Ok(Json(user.into()))
}

async fn send_notification(
    State(state): State<AppState>,
    Json(body): Json<SendNotificationRequest>,
) -> Result<(StatusCode, Json<Notification>), ApiError> {
    let notification = state
        .notification_service
        .send(body.user_id, &body.message, body.notification_type, body.link)
        .await?;
    Ok((StatusCode::CREATED, Json(notification)))
}
