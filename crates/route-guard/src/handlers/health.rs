//! Health check handlers.
//!
//! - `/health`: Liveness probe - returns OK if the process is running
//! - `/ready`: Readiness probe - checks the discovery document is obtainable

use crate::routes::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;
use std::sync::Arc;

/// Readiness probe response body.
#[derive(Debug, Serialize)]
pub struct ReadinessResponse {
    pub status: &'static str,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<&'static str>,
}

/// Liveness probe handler.
///
/// Does NOT check any dependencies - failure means the process is hung.
pub async fn health_check() -> &'static str {
    "OK"
}

/// Readiness probe handler.
///
/// Returns 200 when a discovery document (fresh, or stale within its grace
/// period) is available, 503 otherwise. The first probe warms the cache.
///
/// ## Security
///
/// The 503 body is generic. The underlying error is logged server-side.
#[tracing::instrument(skip_all, name = "rg.health.readiness")]
pub async fn readiness_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.jwt_validator.discovery().get_configuration().await {
        Ok(_) => (
            StatusCode::OK,
            Json(ReadinessResponse {
                status: "ready",
                error: None,
            }),
        ),
        Err(e) => {
            tracing::warn!(target: "rg.health.readiness", error = %e, "Readiness check failed: discovery unavailable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ReadinessResponse {
                    status: "not_ready",
                    // Generic error - don't leak infrastructure details
                    error: Some("Service dependencies unavailable"),
                }),
            )
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_health_check_returns_ok() {
        assert_eq!(health_check().await, "OK");
    }

    #[test]
    fn test_readiness_response_omits_empty_error() {
        let ready = serde_json::to_value(ReadinessResponse {
            status: "ready",
            error: None,
        })
        .unwrap();
        assert_eq!(ready, serde_json::json!({"status": "ready"}));

        let not_ready = serde_json::to_value(ReadinessResponse {
            status: "not_ready",
            error: Some("Service dependencies unavailable"),
        })
        .unwrap();
        assert_eq!(not_ready["error"], "Service dependencies unavailable");
    }
}
