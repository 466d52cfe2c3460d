//! Direct messaging endpoints
//!
//! - GET/POST /api/v1/conversations
//! - GET /api/v1/conversations/unread-count
//! - GET/POST /api/v1/conversations/{id}/messages
//! - PUT /api/v1/conversations/{id}/read
//! - DELETE /api/v1/messages/{id}

use axum::{
    extract::State,
    http::StatusCode,
    routing::{delete, get, put},
    Router,
};

use crate::api::common::PageQuery;
use crate::api::extract::{Json, Path, Query};
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::api::responses::{
    ContentRequest, CountResponse, StartConversationRequest, UpdatedResponse,
};
use crate::models::{ConversationSummary, Message, PagedResult};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/conversations", get(list_conversations).post(start_conversation))
        .route("/conversations/unread-count", get(unread_count))
        .route("/conversations/{id}/messages", get(list_messages).post(send_message))
        .route("/conversations/{id}/read", put(mark_read))
        .route("/messages/{id}", delete(delete_message))
}

async fn list_conversations(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(page): Query<PageQuery>,
) -> Result<Json<PagedResult<ConversationSummary>>, ApiError> {
    let conversations = state
        .chat_service
        .list_conversations(&user.0, &page.into())
        .await?;
    Ok(Json(conversations))
}

async fn start_conversation(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<StartConversationRequest>,
) -> Result<(StatusCode, Json<ConversationSummary>), ApiError> {
    let conversation = state
        .chat_service
        .start_conversation(&user.0, body.recipient_id)
        .await?;
    Ok((StatusCode::CREATED, Json(conversation)))
}

async fn unread_count(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<CountResponse>, ApiError> {
    let count = state.chat_service.unread_count(&user.0).await?;
    Ok(Json(CountResponse { count }))
}

async fn list_messages(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
    Query(page): Query<PageQuery>,
) -> Result<Json<PagedResult<Message>>, ApiError> {
    let messages = state
        .chat_service
        .list_messages(&user.0, id, &page.into())
        .await?;
    Ok(Json(messages))
}

async fn send_message(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
    Json(body): Json<ContentRequest>,
) -> Result<(StatusCode, Json<Message>), ApiError> {
    let message = state
        .chat_service
        .send_message(&user.0, id, &body.content)
        .await?;
    Ok((StatusCode::CREATED, Json(message)))
}

async fn mark_read(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<UpdatedResponse>, ApiError> {
    let updated = state.chat_service.mark_read(&user.0, id).await?;
    Ok(Json(UpdatedResponse { updated }))
}

async fn delete_message(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.chat_service.delete_message(&user.0, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
