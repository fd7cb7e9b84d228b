//! Observability module for Route Guard.
//!
//! Provides metrics definitions and recording helpers.

pub mod metrics;
