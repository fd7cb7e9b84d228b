//! Metrics definitions for Route Guard.
//!
//! All metrics follow Prometheus naming conventions:
//! - `rg_` prefix for Route Guard
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Labels are bounded to prevent cardinality explosion:
//! - `method`: 7 values max (GET, POST, PATCH, DELETE, PUT, HEAD, OPTIONS)
//! - `endpoint`: 7 values (`/api/{route}` collapses every passthrough route)
//! - `status`: 3 values (success, error, timeout)
//! - `outcome`: 10 values (valid plus one per validation failure)
//!
//! Route segments are caller-controlled, so they never appear as labels
//! except for the two named routes.

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Install the global Prometheus recorder and return its render handle.
///
/// # Errors
///
/// Returns an error string if bucket configuration is rejected or a recorder
/// is already installed.
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    PrometheusBuilder::new()
        // HTTP request buckets; dispatch is sub-millisecond except on cold cache
        .set_buckets_for_metric(
            Matcher::Prefix("rg_http_request".to_string()),
            &[
                0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.000, 2.500, 5.000,
            ],
        )
        .map_err(|e| format!("Failed to set HTTP request buckets: {e}"))?
        // Discovery fetches are two sequential round trips to the provider
        .set_buckets_for_metric(
            Matcher::Prefix("rg_discovery_fetch".to_string()),
            &[0.050, 0.100, 0.250, 0.500, 1.000, 2.500, 5.000, 10.000],
        )
        .map_err(|e| format!("Failed to set discovery fetch buckets: {e}"))?
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus recorder: {e}"))
}

// ============================================================================
// HTTP Request Metrics
// ============================================================================

/// Record HTTP request completion
///
/// Metric: `rg_http_requests_total`, `rg_http_request_duration_seconds`
/// Labels: `method`, `endpoint`, `status_code` / `status`
///
/// This captures ALL HTTP responses including framework-level errors like
/// 404 Not Found and 405 Method Not Allowed.
pub fn record_http_request(method: &str, endpoint: &str, status_code: u16, duration: Duration) {
    // Normalize endpoint to prevent cardinality explosion
    let normalized_endpoint = normalize_endpoint(endpoint);

    // Determine status category for simplified querying
    let status = categorize_status_code(status_code);

    histogram!("rg_http_request_duration_seconds",
        "method" => method.to_string(),
        "endpoint" => normalized_endpoint,
        "status" => status
    )
    .record(duration.as_secs_f64());

    counter!("rg_http_requests_total",
        "method" => method.to_string(),
        "endpoint" => normalized_endpoint,
        "status_code" => status_code.to_string()
    )
    .increment(1);
}

/// Categorize HTTP status code into success/error/timeout
fn categorize_status_code(status_code: u16) -> &'static str {
    match status_code {
        200..=299 => "success",
        408 | 504 => "timeout",
        _ => "error",
    }
}

/// Normalize endpoint path to prevent label cardinality explosion
///
/// The two named routes keep their own label (matched case-insensitively, as
/// the dispatcher does). Every other `/api/{route}` collapses to one label.
fn normalize_endpoint(path: &str) -> &'static str {
    match path {
        "/" => "/",
        "/health" => "/health",
        "/ready" => "/ready",
        "/metrics" => "/metrics",
        _ => match path.strip_prefix("/api/") {
            Some(route) if route.eq_ignore_ascii_case("anonymous") => "/api/anonymous",
            Some(route) if route.eq_ignore_ascii_case("authenticated") => "/api/authenticated",
            Some(route) if !route.is_empty() && !route.contains('/') => "/api/{route}",
            // Unknown paths normalized to "/other" to bound cardinality
            _ => "/other",
        },
    }
}

// ============================================================================
// Token Validation Metrics
// ============================================================================

/// Record a token validation outcome
///
/// Metric: `rg_token_validations_total`
/// Labels: `outcome` (`valid` or a failure label)
pub fn record_token_validation(outcome: &'static str) {
    counter!("rg_token_validations_total", "outcome" => outcome).increment(1);
}

// ============================================================================
// Discovery Metrics
// ============================================================================

/// Record a discovery document fetch
///
/// Metric: `rg_discovery_fetch_total`, `rg_discovery_fetch_duration_seconds`
/// Labels: `status` (success, error)
pub fn record_discovery_fetch(status: &'static str, duration: Duration) {
    histogram!("rg_discovery_fetch_duration_seconds", "status" => status)
        .record(duration.as_secs_f64());

    counter!("rg_discovery_fetch_total", "status" => status).increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    // These tests execute the recording functions for coverage. Without an
    // installed recorder the metrics crate records to a no-op, so values are
    // not inspected here; the /metrics integration tests check rendering.

    #[test]
    fn test_record_http_request() {
        record_http_request("GET", "/health", 200, Duration::from_millis(1));
        record_http_request("GET", "/api/anonymous", 200, Duration::from_millis(1));
        record_http_request("POST", "/api/Authenticated", 401, Duration::from_millis(3));
        record_http_request("GET", "/api/foo", 200, Duration::from_millis(1));
        record_http_request("GET", "/api/authenticated", 504, Duration::from_secs(30));
    }

    #[test]
    fn test_categorize_status_code() {
        assert_eq!(categorize_status_code(200), "success");
        assert_eq!(categorize_status_code(204), "success");
        assert_eq!(categorize_status_code(401), "error");
        assert_eq!(categorize_status_code(404), "error");
        assert_eq!(categorize_status_code(503), "error");
        assert_eq!(categorize_status_code(408), "timeout");
        assert_eq!(categorize_status_code(504), "timeout");
    }

    #[test]
    fn test_normalize_endpoint_known_paths() {
        assert_eq!(normalize_endpoint("/"), "/");
        assert_eq!(normalize_endpoint("/health"), "/health");
        assert_eq!(normalize_endpoint("/ready"), "/ready");
        assert_eq!(normalize_endpoint("/metrics"), "/metrics");
    }

    #[test]
    fn test_normalize_endpoint_api_routes() {
        assert_eq!(normalize_endpoint("/api/anonymous"), "/api/anonymous");
        assert_eq!(normalize_endpoint("/api/ANONYMOUS"), "/api/anonymous");
        assert_eq!(normalize_endpoint("/api/authenticated"), "/api/authenticated");
        assert_eq!(normalize_endpoint("/api/Authenticated"), "/api/authenticated");
        assert_eq!(normalize_endpoint("/api/foo"), "/api/{route}");
        assert_eq!(normalize_endpoint("/api/some-random-id-123"), "/api/{route}");
    }

    #[test]
    fn test_normalize_endpoint_unknown_paths() {
        assert_eq!(normalize_endpoint("/api/"), "/other");
        assert_eq!(normalize_endpoint("/api/a/b"), "/other");
        assert_eq!(normalize_endpoint("/unknown"), "/other");
        assert_eq!(normalize_endpoint("/api"), "/other");
    }

    #[test]
    fn test_record_token_validation() {
        record_token_validation("valid");
        record_token_validation("bad_issuer");
        record_token_validation("fetch_error");
    }

    #[test]
    fn test_record_discovery_fetch() {
        record_discovery_fetch("success", Duration::from_millis(120));
        record_discovery_fetch("error", Duration::from_secs(10));
    }
}
