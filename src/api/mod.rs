//! API layer - HTTP handlers and routing
//!
//! Every endpoint lives under `/api/v1`:
//! - Auth and user directory
//! - Courses, enrollments and members
//! - Course forums: posts, replies, likes, pins, announcements
//! - Direct messaging
//! - Notification feed
//! - Admin user management and broadcast
//! - Health

pub mod admin;
pub mod auth;
pub mod chat;
pub mod common;
pub mod courses;
pub mod extract;
pub mod forum;
pub mod health;
pub mod middleware;
pub mod notifications;
pub mod responses;
pub mod users;

use axum::{
    http::{header, HeaderValue, Method},
    middleware as axum_middleware,
    routing::get,
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub use middleware::{ApiError, AppState, AuthenticatedUser, RequestStats};

/// Build the `/api/v1` router
pub fn build_api_router(state: AppState) -> Router<AppState> {
    // Admin routes (need admin role)
    let admin_routes = Router::new()
        .nest("/admin", admin::router())
        .route_layer(axum_middleware::from_fn(middleware::require_admin))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ));

    // Protected routes (need a session)
    let protected_routes = Router::new()
        .merge(auth::protected_router())
        .merge(users::router())
        .merge(courses::router())
        .merge(forum::router())
        .merge(chat::router())
        .merge(notifications::router())
        .route_layer(axum_middleware::from_fn_with_state(
            state,
            middleware::require_auth,
        ));

    // Public routes
    Router::new()
        .route("/health", get(health::health))
        .merge(auth::public_router())
        .merge(admin_routes)
        .merge(protected_routes)
}

/// Build the complete router with middleware
pub fn build_router(state: AppState, cors_origin: &str) -> Router {
    let mut router = Router::new()
        .nest("/api/v1", build_api_router(state.clone()))
        .layer(TraceLayer::new_for_http());

    // Cookie auth needs an explicit origin with credentials
    match cors_origin.parse::<HeaderValue>() {
        Ok(origin) => {
            let cors = CorsLayer::new()
                .allow_origin(origin)
                .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
                .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::COOKIE])
                .allow_credentials(true);
            router = router.layer(cors);
        }
        Err(e) => tracing::warn!("Invalid CORS origin '{}', CORS disabled: {}", cors_origin, e),
    }

    router
        // Request stats middleware (outermost layer, runs for all requests)
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::request_stats_middleware,
        ))
        .with_state(state)
}
