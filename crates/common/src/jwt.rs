//! JWT primitives shared by route-guard crates.
//!
//! This module holds the parts of bearer-token validation that do not depend on
//! a signing key:
//! - Size limit applied before any parsing
//! - Clock skew constants for lifetime checks
//! - Unverified header decoding (`kid` and `alg` for key lookup)
//! - `exp` / `nbf` lifetime validation
//!
//! # Security
//!
//! - Tokens are size-checked BEFORE parsing (`DoS` prevention)
//! - Header values are only used to select a key; the token MUST still be
//!   signature-verified before any claim is trusted
//! - Error messages are generic; details are logged at debug level
//!
//! # Usage
//!
//! ```rust,ignore
//! use common::jwt::{decode_header, validate_lifetime, DEFAULT_CLOCK_SKEW};
//!
//! let header = decode_header(token)?;
//! let key = header.kid.as_deref().and_then(|kid| document.find_key(kid));
//! // ... verify signature with `key` ...
//! validate_lifetime(claims.exp, claims.nbf, DEFAULT_CLOCK_SKEW)?;
//! ```

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

// =============================================================================
// Constants
// =============================================================================

/// Maximum allowed JWT size in bytes (8KB).
///
/// Identity provider access tokens are typically 1-2KB; group overage claims
/// can push that up, but never past 8KB. Anything larger is rejected before
/// base64 decoding or signature verification.
pub const MAX_JWT_SIZE_BYTES: usize = 8192;

/// Default JWT clock skew tolerance (5 minutes).
///
/// Applied symmetrically to `exp` and `nbf`.
pub const DEFAULT_CLOCK_SKEW: Duration = Duration::from_secs(300);

/// Maximum allowed JWT clock skew tolerance (10 minutes).
///
/// Guards against configuration that would effectively disable lifetime checks.
pub const MAX_CLOCK_SKEW: Duration = Duration::from_secs(600);

// =============================================================================
// Error Types
// =============================================================================

/// Errors from the key-independent parts of JWT validation.
///
/// Display strings are intentionally identical so that a caller who surfaces
/// one cannot be used as an oracle.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JwtValidationError {
    /// Token size exceeds maximum allowed.
    #[error("The access token is invalid or expired")]
    TokenTooLarge,

    /// Token format is invalid (not a three-part compact JWS).
    #[error("The access token is invalid or expired")]
    MalformedToken,

    /// Token has no `exp` claim.
    #[error("The access token is invalid or expired")]
    MissingExpiry,

    /// Token `exp` is in the past (beyond clock skew).
    #[error("The access token is invalid or expired")]
    Expired,

    /// Token `nbf` is in the future (beyond clock skew).
    #[error("The access token is invalid or expired")]
    NotYetValid,
}

// =============================================================================
// Header
// =============================================================================

/// The unverified JOSE header fields needed to select a verification key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JwtHeader {
    /// Declared signing algorithm (e.g. `RS256`).
    pub alg: String,

    /// Key ID; `None` when the header omits it or it is empty.
    pub kid: Option<String>,
}

#[derive(Deserialize)]
struct RawHeader {
    alg: String,
    #[serde(default)]
    kid: Option<serde_json::Value>,
}

/// Decode the JOSE header of a compact JWT without verifying the signature.
///
/// # Security
///
/// - Token size is checked BEFORE any parsing
/// - Exactly three non-empty dot-separated segments are required
/// - The header must be base64url (no padding) JSON with a string `alg`
/// - A `kid` that is not a non-empty string is reported as absent
///
/// # Errors
///
/// - `TokenTooLarge` - Token exceeds `MAX_JWT_SIZE_BYTES`
/// - `MalformedToken` - Wrong structure, bad base64, invalid JSON, or no `alg`
pub fn decode_header(token: &str) -> Result<JwtHeader, JwtValidationError> {
    if token.len() > MAX_JWT_SIZE_BYTES {
        tracing::debug!(
            target: "common.jwt",
            token_size = token.len(),
            max_size = MAX_JWT_SIZE_BYTES,
            "Token rejected: size exceeds maximum allowed"
        );
        return Err(JwtValidationError::TokenTooLarge);
    }

    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 || parts.iter().any(|p| p.is_empty()) {
        tracing::debug!(
            target: "common.jwt",
            parts = parts.len(),
            "Token rejected: invalid JWT format"
        );
        return Err(JwtValidationError::MalformedToken);
    }

    let header_part = parts.first().ok_or(JwtValidationError::MalformedToken)?;
    let header_bytes = URL_SAFE_NO_PAD.decode(header_part).map_err(|e| {
        tracing::debug!(target: "common.jwt", error = %e, "Failed to decode JWT header base64");
        JwtValidationError::MalformedToken
    })?;

    let raw: RawHeader = serde_json::from_slice(&header_bytes).map_err(|e| {
        tracing::debug!(target: "common.jwt", error = %e, "Failed to parse JWT header JSON");
        JwtValidationError::MalformedToken
    })?;

    let kid = raw
        .kid
        .as_ref()
        .and_then(serde_json::Value::as_str)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string);

    Ok(JwtHeader { alg: raw.alg, kid })
}

// =============================================================================
// Lifetime
// =============================================================================

/// Validate `exp` and `nbf` against the current time with clock skew tolerance.
///
/// `exp` is mandatory. `nbf` is optional.
///
/// # Errors
///
/// - `MissingExpiry` - no `exp` claim
/// - `Expired` - `exp + skew < now`
/// - `NotYetValid` - `nbf - skew > now`
pub fn validate_lifetime(
    exp: Option<i64>,
    nbf: Option<i64>,
    clock_skew: Duration,
) -> Result<(), JwtValidationError> {
    let now = chrono::Utc::now().timestamp();
    validate_lifetime_at(exp, nbf, clock_skew, now)
}

/// Deterministic lifetime validation against an explicit `now` timestamp.
///
/// Prefer [`validate_lifetime`] in production code.
pub(crate) fn validate_lifetime_at(
    exp: Option<i64>,
    nbf: Option<i64>,
    clock_skew: Duration,
    now: i64,
) -> Result<(), JwtValidationError> {
    // Safe cast: clock_skew is bounded to MAX_CLOCK_SKEW (600 seconds)
    #[allow(clippy::cast_possible_wrap)]
    let clock_skew_secs = clock_skew.as_secs() as i64;

    let exp = exp.ok_or_else(|| {
        tracing::debug!(target: "common.jwt", "Token rejected: missing exp claim");
        JwtValidationError::MissingExpiry
    })?;

    if exp.saturating_add(clock_skew_secs) < now {
        tracing::debug!(
            target: "common.jwt",
            exp = exp,
            now = now,
            clock_skew_secs = clock_skew_secs,
            "Token rejected: expired"
        );
        return Err(JwtValidationError::Expired);
    }

    if let Some(nbf) = nbf {
        if nbf.saturating_sub(clock_skew_secs) > now {
            tracing::debug!(
                target: "common.jwt",
                nbf = nbf,
                now = now,
                clock_skew_secs = clock_skew_secs,
                "Token rejected: not yet valid"
            );
            return Err(JwtValidationError::NotYetValid);
        }
    }

    Ok(())
}

// =============================================================================
// Tests
// =============================================================================
