//! GET /api/v1/health
//!
//! Database reachability plus the counters kept by the request stats
//! middleware. Answers 503 when the database does not respond.

use axum::{extract::State, http::StatusCode, Json};

use crate::api::middleware::AppState;
use crate::api::responses::HealthResponse;

pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let database = match state.pool.ping().await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!("Health check: database ping failed: {:#}", e);
            false
        }
    };

    let stats = &state.request_stats;
    let body = HealthResponse {
        status: if database { "ok" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        database,
        uptime_seconds: stats.uptime_seconds(),
        total_requests: stats.total_requests(),
        avg_response_time_ms: stats.avg_response_time_us() / 1000.0,
    };

    let status = if database {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(body))
}
