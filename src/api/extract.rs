//! Request extractors that reject with the JSON error envelope
//!
//! Drop-in replacements for axum's `Json`, `Query` and `Path`. A malformed
//! body, query string or path segment becomes a `VALIDATION_ERROR` instead of
//! axum's plain-text rejection.

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        FromRequest, FromRequestParts,
    },
    response::{IntoResponse, Response},
};

use crate::api::middleware::ApiError;

/// JSON body extractor and response
#[derive(Debug, Clone, Copy, Default, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct Json<T>(pub T);

impl<T> IntoResponse for Json<T>
where
    axum::Json<T>: IntoResponse,
{
    fn into_response(self) -> Response {
        axum::Json(self.0).into_response()
    }
}

#[derive(Debug, Clone, Copy, Default, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub struct Query<T>(pub T);

#[derive(Debug, Clone, Copy, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(ApiError))]
pub struct Path<T>(pub T);

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::validation_error(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::validation_error(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        // a route declared without the params its handler asks for
        if rejection.status().is_server_error() {
            return Self::internal_error(rejection.body_text());
        }
        Self::validation_error(rejection.body_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::Request, routing::post, Router};
    use serde::Deserialize;
    use tower::ServiceExt;

    #[derive(Debug, Deserialize)]
    struct Title {
        title: String,
    }

    #[derive(Debug, Deserialize)]
    struct Paging {
        page: u32,
    }

    async fn echo(
        Path(id): Path<i64>,
        Query(paging): Query<Paging>,
        Json(body): Json<Title>,
    ) -> Json<serde_json::Value> {
        Json(serde_json::json!({ "id": id, "page": paging.page, "title": body.title }))
    }

    async fn send(uri: &str, body: &str) -> (u16, serde_json::Value) {
        let app = Router::new().route("/items/{id}", post(echo));
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(uri)
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status().as_u16();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_well_formed_request_passes_through() {
        let (status, body) = send("/items/7?page=2", r#"{"title":"hi"}"#).await;
        assert_eq!(status, 200);
        assert_eq!(body["id"], 7);
        assert_eq!(body["page"], 2);
        assert_eq!(body["title"], "hi");
    }

    #[tokio::test]
    async fn test_rejections_use_error_envelope() {
        for (uri, body) in [
            ("/items/7?page=2", "{not json"),
            ("/items/7?page=2", r#"{"name":"missing title"}"#),
            ("/items/7?page=two", r#"{"title":"hi"}"#),
            ("/items/abc?page=2", r#"{"title":"hi"}"#),
        ] {
            let (status, json) = send(uri, body).await;
            assert_eq!(status, 400, "{} {}", uri, body);
            assert_eq!(json["error"]["code"], "VALIDATION_ERROR");
            assert!(!json["error"]["message"].as_str().unwrap().is_empty());
        }
    }
}
