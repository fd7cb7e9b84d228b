//! HTTP routes for Route Guard.
//!
//! Defines the Axum router and application state.

use crate::auth::{DiscoveryCache, JwtValidator};
use crate::config::Config;
use crate::handlers;
use crate::middleware::http_metrics_middleware;
use axum::{middleware, routing::get, Router};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Token validator, owning the discovery cache.
    pub jwt_validator: Arc<JwtValidator>,
}

impl AppState {
    /// Build the discovery cache and validator from configuration.
    pub fn from_config(config: &Config) -> Self {
        let validation_config = Arc::new(config.validation_config());
        let discovery = DiscoveryCache::new(
            validation_config.discovery_url.clone(),
            config.refresh_policy(),
        );
        let jwt_validator = Arc::new(JwtValidator::new(discovery, validation_config));

        Self { jwt_validator }
    }
}

/// Build the application routes.
///
/// Creates an Axum router with:
/// - `/api/:route` - Route dispatcher (GET and POST)
/// - `/health` - Liveness probe (simple "OK")
/// - `/ready` - Readiness probe (discovery document obtainable)
/// - `/metrics` - Prometheus metrics endpoint
/// - TraceLayer for request logging
/// - HTTP metrics middleware
/// - 30 second request timeout
pub fn build_routes(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let app_routes = Router::new()
        .route("/api/:route", get(handlers::dispatch).post(handlers::dispatch))
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .with_state(state);

    // Metrics route with its own state
    let metrics_routes = Router::new()
        .route("/metrics", get(handlers::metrics_handler))
        .with_state(metrics_handle);

    // Layer order (bottom-to-top execution):
    // 1. TraceLayer - Log request details (innermost)
    // 2. TimeoutLayer - Timeout the request
    // 3. http_metrics_middleware - Record ALL responses (outermost)
    app_routes
        .merge(metrics_routes)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .layer(middleware::from_fn(http_metrics_middleware))
}
