//! Notification feed endpoints
//!
//! - GET /api/v1/notifications?unread_only=
//! - GET /api/v1/notifications/unread-count
//! - PUT /api/v1/notifications/read-all
//! - PUT /api/v1/notifications/{id}/read
//! - DELETE /api/v1/notifications/{id}

use axum::{
    extract::State,
    http::StatusCode,
    routing::{delete, get, put},
    Router,
};

use crate::api::common::NotificationListQuery;
use crate::api::extract::{Json, Path, Query};
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::api::responses::{CountResponse, UpdatedResponse};
use crate::models::{ListParams, Notification, PagedResult};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/notifications", get(list_notifications))
        .route("/notifications/unread-count", get(unread_count))
        .route("/notifications/read-all", put(mark_all_read))
        .route("/notifications/{id}/read", put(mark_read))
        .route("/notifications/{id}", delete(delete_notification))
}

async fn list_notifications(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(query): Query<NotificationListQuery>,
) -> Result<Json<PagedResult<Notification>>, ApiError> {
    let params = ListParams::from_query(query.page, query.per_page);
    let page = state
        .notification_service
        .list(user.0.id, query.unread_only, &params)
        .await?;
    Ok(Json(page))
}

async fn unread_count(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<CountResponse>, ApiError> {
    let count = state.notification_service.unread_count(user.0.id).await?;
    Ok(Json(CountResponse { count }))
}

async fn mark_all_read(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<UpdatedResponse>, ApiError> {
    let updated = state.notification_service.mark_all_read(user.0.id).await?;
    Ok(Json(UpdatedResponse { updated }))
}

async fn mark_read(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.notification_service.mark_read(id, user.0.id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn delete_notification(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.notification_service.delete(id, user.0.id).await?;
    Ok(StatusCode::NO_CONTENT)
}
