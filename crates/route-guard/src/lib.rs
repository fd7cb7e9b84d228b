//! Route Guard Service Library
//!
//! A minimal HTTP dispatcher that routes `/api/{route}` to an anonymous
//! handler, a bearer-token-authenticated handler, or an echo. Bearer tokens
//! are validated as signed JWTs against an OpenID Connect provider's
//! published signing keys and the configured issuer and audience sets.
//!
//! # Architecture
//!
//! ```text
//! routes/mod.rs -> handlers/dispatch.rs -> auth/bearer.rs
//!                                       -> auth/jwt.rs -> auth/discovery.rs
//!                                                      -> auth/verifier.rs
//! ```
//!
//! # Modules
//!
//! - `auth` - Token extraction, discovery cache, validation
//! - `config` - Service configuration from environment
//! - `errors` - Error types with HTTP status code mapping
//! - `handlers` - HTTP request handlers
//! - `middleware` - HTTP metrics middleware
//! - `observability` - Prometheus metrics
//! - `routes` - Axum router setup

pub mod auth;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod observability;
pub mod routes;
