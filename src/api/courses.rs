//! Course endpoints
//!
//! - GET/POST /api/v1/courses
//! - GET/PUT/DELETE /api/v1/courses/{id}
//! - POST/DELETE /api/v1/courses/{id}/enrollment - Join or leave
//! - GET/POST /api/v1/courses/{id}/members

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Router,
};

use crate::api::common::{CourseListQuery, PageQuery};
use crate::api::extract::{Json, Path, Query};
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::api::responses::AddMemberRequest;
use crate::models::{
    Course, CourseMember, CreateCourseInput, Enrollment, ListParams, PagedResult,
    UpdateCourseInput,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/courses", get(list_courses).post(create_course))
        .route("/courses/{id}", get(get_course).put(update_course).delete(delete_course))
        .route("/courses/{id}/enrollment", post(enroll).delete(leave))
        .route("/courses/{id}/members", get(list_members).post(add_member))
}

async fn list_courses(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(query): Query<CourseListQuery>,
) -> Result<Json<PagedResult<Course>>, ApiError> {
    let params = ListParams::from_query(query.page, query.per_page);
    let page = state
        .course_service
        .list_courses(&user.0, query.search, query.mine, &params)
        .await?;
    Ok(Json(page))
}

async fn create_course(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<CreateCourseInput>,
) -> Result<(StatusCode, Json<Course>), ApiError> {
    let course = state.course_service.create_course(&user.0, body).await?;
    Ok((StatusCode::CREATED, Json(course)))
}

async fn get_course(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Course>, ApiError> {
    Ok(Json(state.course_service.get_course(id).await?))
}

async fn update_course(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
    Json(body): Json<UpdateCourseInput>,
) -> Result<Json<Course>, ApiError> {
    let course = state.course_service.update_course(&user.0, id, body).await?;
    Ok(Json(course))
}

async fn delete_course(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.course_service.delete_course(&user.0, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn enroll(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<Enrollment>, ApiError> {
    Ok(Json(state.course_service.enroll(&user.0, id).await?))
}

async fn leave(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.course_service.leave(&user.0, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_members(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
    Query(page): Query<PageQuery>,
) -> Result<Json<PagedResult<CourseMember>>, ApiError> {
    let members = state
        .course_service
        .list_members(&user.0, id, &page.into())
        .await?;
    Ok(Json(members))
}

async fn add_member(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
    Json(body): Json<AddMemberRequest>,
) -> Result<(StatusCode, Json<CourseMember>), ApiError> {
    let member = state
        .course_service
        .add_member(&user.0, id, body.user_id, body.role)
        .await?;
    Ok((StatusCode::CREATED, Json(member)))
}
