//! HTTP request handlers for Route Guard.

pub mod dispatch;
pub mod health;
pub mod metrics;

pub use dispatch::dispatch;
pub use health::{health_check, readiness_check};
pub use metrics::metrics_handler;
