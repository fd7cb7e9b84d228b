//! Common utilities shared across route-guard crates.

#![warn(clippy::pedantic)]

/// Module for secret types that prevent accidental logging
pub mod secret;

/// Module for JWT primitives (size limit, header decoding, lifetime checks)
pub mod jwt;
