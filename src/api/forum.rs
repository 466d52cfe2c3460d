//! Forum endpoints
//!
//! Course-scoped:
//! - GET/POST /api/v1/courses/{id}/posts
//! - POST /api/v1/courses/{id}/announcements
//!
//! By post or reply id:
//! - GET/PUT/DELETE /api/v1/posts/{id}
//! - POST /api/v1/posts/{id}/like, PUT /api/v1/posts/{id}/pin
//! - POST /api/v1/posts/{id}/replies
//! - PUT/DELETE /api/v1/replies/{id}, POST /api/v1/replies/{id}/like

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post, put},
    Router,
};

use crate::api::common::PostListQuery;
use crate::api::extract::{Json, Path, Query};
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::api::responses::{ContentRequest, PinRequest};
use crate::models::{
    CreatePostInput, LikeToggle, PagedResult, PostDetail, PostView, ReplyView, UpdatePostInput,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/courses/{id}/posts", get(list_posts).post(create_post))
        .route("/courses/{id}/announcements", post(create_announcement))
        .route("/posts/{id}", get(get_post).put(update_post).delete(delete_post))
        .route("/posts/{id}/like", post(toggle_post_like))
        .route("/posts/{id}/pin", put(set_pinned))
        .route("/posts/{id}/replies", post(create_reply))
        .route("/replies/{id}", put(update_reply).delete(delete_reply))
        .route("/replies/{id}/like", post(toggle_reply_like))
}

// ============================================================================
// Posts
// ============================================================================

async fn list_posts(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(course_id): Path<i64>,
    Query(query): Query<PostListQuery>,
) -> Result<Json<PagedResult<PostView>>, ApiError> {
    let page = state
        .forum_service
        .list_posts(&user.0, course_id, &query.filter(), &query.params())
        .await?;
    Ok(Json(page))
}

async fn create_post(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(course_id): Path<i64>,
    Json(body): Json<CreatePostInput>,
) -> Result<(StatusCode, Json<PostView>), ApiError> {
    let post = state
        .forum_service
        .create_post(&user.0, course_id, body)
        .await?;
    Ok((StatusCode::CREATED, Json(post)))
}

async fn create_announcement(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(course_id): Path<i64>,
    Json(body): Json<CreatePostInput>,
) -> Result<(StatusCode, Json<PostView>), ApiError> {
    let post = state
        .forum_service
        .create_announcement(&user.0, course_id, body)
        .await?;
    Ok((StatusCode::CREATED, Json(post)))
}

async fn get_post(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<PostDetail>, ApiError> {
    Ok(Json(state.forum_service.get_post(&user.0, id).await?))
}

async fn update_post(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
    Json(body): Json<UpdatePostInput>,
) -> Result<Json<PostView>, ApiError> {
    Ok(Json(state.forum_service.update_post(&user.0, id, body).await?))
}

async fn delete_post(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.forum_service.delete_post(&user.0, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn toggle_post_like(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<LikeToggle>, ApiError> {
    Ok(Json(state.forum_service.toggle_post_like(&user.0, id).await?))
}

async fn set_pinned(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
    Json(body): Json<PinRequest>,
) -> Result<Json<PostView>, ApiError> {
    let post = state
        .forum_service
        .set_pinned(&user.0, id, body.pinned)
        .await?;
    Ok(Json(post))
}

// ============================================================================
// Replies
// ============================================================================

async fn create_reply(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(post_id): Path<i64>,
    Json(body): Json<ContentRequest>,
) -> Result<(StatusCode, Json<ReplyView>), ApiError> {
    let reply = state
        .forum_service
        .create_reply(&user.0, post_id, &body.content)
        .await?;
    Ok((StatusCode::CREATED, Json(reply)))
}

async fn update_reply(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
    Json(body): Json<ContentRequest>,
) -> Result<Json<ReplyView>, ApiError> {
    let reply = state
        .forum_service
        .update_reply(&user.0, id, &body.content)
        .await?;
    Ok(Json(reply))
}

async fn delete_reply(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.forum_service.delete_reply(&user.0, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn toggle_reply_like(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<LikeToggle>, ApiError> {
    Ok(Json(state.forum_service.toggle_reply_like(&user.0, id).await?))
}
