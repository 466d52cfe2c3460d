//! User directory endpoints
//!
//! - GET /api/v1/users?q= - Search by username or display name
//! - GET /api/v1/users/{id} - Public profile

use axum::{extract::State, routing::get, Router};

use crate::api::common::UserSearchQuery;
use crate::api::extract::{Json, Path, Query};
use crate::api::middleware::{ApiError, AppState};
use crate::models::{ListParams, PagedResult, UserSummary};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/users", get(search_users))
        .route("/users/{id}", get(get_user))
}

async fn search_users(
    State(state): State<AppState>,
    Query(query): Query<UserSearchQuery>,
) -> Result<Json<PagedResult<UserSummary>>, ApiError> {
    let params = ListParams::from_query(query.page, query.per_page);
    let page = state
        .user_service
        .search(query.q.as_deref(), &params)
        .await?;
    Ok(Json(page))
}

async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<UserSummary>, ApiError> {
    let user = state.user_service.get_user(id).await?;
    Ok(Json(user.summary()))
}
