//! HTTP metrics middleware for capturing all request/response metrics
//!
//! This middleware captures metrics for ALL HTTP responses including
//! framework-level errors that occur before handlers run:
//! - 404 Not Found
//! - 405 Method Not Allowed
//! - 408 Request Timeout (from the timeout layer)

use axum::{extract::Request, middleware::Next, response::Response};
use std::time::Instant;

use crate::observability::metrics::record_http_request;

/// Middleware that records HTTP request metrics for all responses
///
/// Applied as the outermost layer so 401s from the dispatcher and
/// framework-level rejections are counted alike.
pub async fn http_metrics_middleware(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();
    let path = request.uri().path().to_string();

    let response = next.run(request).await;

    let duration = start.elapsed();
    let status_code = response.status().as_u16();
    record_http_request(&method, &path, status_code, duration);

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{Request as HttpRequest, StatusCode},
        middleware,
        routing::get,
        Router,
    };
    use tower::ServiceExt;

    async fn handler_200() -> &'static str {
        "OK"
    }

    async fn handler_401() -> StatusCode {
        StatusCode::UNAUTHORIZED
    }

    fn test_app() -> Router {
        Router::new()
            .route("/api/anonymous", get(handler_200))
            .route("/api/authenticated", get(handler_401))
            .layer(middleware::from_fn(http_metrics_middleware))
    }

    async fn status_for(method: &str, uri: &str) -> StatusCode {
        let request = HttpRequest::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .expect("request builder should succeed");

        test_app()
            .oneshot(request)
            .await
            .expect("request should succeed")
            .status()
    }

    #[tokio::test]
    async fn test_middleware_passes_success_through() {
        assert_eq!(status_for("GET", "/api/anonymous").await, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_middleware_passes_unauthorized_through() {
        assert_eq!(
            status_for("GET", "/api/authenticated").await,
            StatusCode::UNAUTHORIZED
        );
    }

    #[tokio::test]
    async fn test_middleware_records_framework_errors() {
        assert_eq!(status_for("GET", "/nonexistent").await, StatusCode::NOT_FOUND);
        assert_eq!(
            status_for("DELETE", "/api/anonymous").await,
            StatusCode::METHOD_NOT_ALLOWED
        );
    }
}
