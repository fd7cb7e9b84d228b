//! Bearer token validation.
//!
//! Validates access tokens against the identity provider's published signing
//! keys and the configured issuer and audience sets.
//!
//! # Security
//!
//! - Tokens are size-checked BEFORE parsing (DoS prevention)
//! - Only RSA signature algorithms (RS*/PS*) are accepted
//! - A key pinned to one algorithm cannot verify tokens declaring another
//! - Expiry is mandatory; `exp`/`nbf` are checked with clock skew tolerance
//! - Issuers match exactly; audiences must intersect the configured set
//! - Every failure is a returned outcome, logged and counted, never a panic

use crate::auth::claims::ClaimSet;
use crate::auth::discovery::{DiscoveryCache, DiscoveryDocument, SigningKey};
use crate::auth::verifier::{JsonWebTokenVerifier, JwtVerifier, SignatureAlgorithm, VerifyError};
use crate::config::ValidationConfig;
use crate::observability::metrics::record_token_validation;
use common::jwt::{decode_header, validate_lifetime, JwtValidationError};
use std::sync::Arc;
use tracing::instrument;

/// Why a token was rejected. Only logs and metrics see the distinction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationFailure {
    MalformedToken,
    UnknownKey,
    BadSignature,
    Expired,
    NotYetValid,
    BadIssuer,
    BadAudience,
    FetchError,
    InternalError,
}

impl ValidationFailure {
    /// Metric label.
    pub fn label(self) -> &'static str {
        match self {
            Self::MalformedToken => "malformed_token",
            Self::UnknownKey => "unknown_key",
            Self::BadSignature => "bad_signature",
            Self::Expired => "expired",
            Self::NotYetValid => "not_yet_valid",
            Self::BadIssuer => "bad_issuer",
            Self::BadAudience => "bad_audience",
            Self::FetchError => "fetch_error",
            Self::InternalError => "internal_error",
        }
    }
}

/// Result of validating a token.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationOutcome {
    Valid(ClaimSet),
    Invalid(ValidationFailure),
}

impl ValidationOutcome {
    /// Metric label: `valid` or the failure label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Valid(_) => "valid",
            Self::Invalid(failure) => failure.label(),
        }
    }
}

/// Token validator backed by the discovery cache.
#[derive(Clone)]
pub struct JwtValidator {
    discovery: DiscoveryCache,
    verifier: Arc<dyn JwtVerifier>,
    config: Arc<ValidationConfig>,
}

impl JwtValidator {
    /// Create a validator using the `jsonwebtoken` verifier.
    pub fn new(discovery: DiscoveryCache, config: Arc<ValidationConfig>) -> Self {
        Self::with_verifier(discovery, Arc::new(JsonWebTokenVerifier), config)
    }

    /// Create a validator with a specific signature verifier.
    pub fn with_verifier(
        discovery: DiscoveryCache,
        verifier: Arc<dyn JwtVerifier>,
        config: Arc<ValidationConfig>,
    ) -> Self {
        Self {
            discovery,
            verifier,
            config,
        }
    }

    /// The discovery cache this validator reads keys from.
    pub fn discovery(&self) -> &DiscoveryCache {
        &self.discovery
    }

    /// Validate a bearer token.
    ///
    /// # Checks, in order
    ///
    /// 1. Structure and size → `MalformedToken`
    /// 2. `kid` lookup, with one throttled refresh on a miss → `UnknownKey`
    /// 3. Algorithm and signature → `BadSignature`
    /// 4. `exp` (mandatory) → `Expired`, `nbf` → `NotYetValid`
    /// 5. `iss` exactly in the configured set → `BadIssuer`
    /// 6. `aud` intersects the configured set → `BadAudience`
    #[instrument(skip_all)]
    pub async fn validate(&self, token: &str) -> ValidationOutcome {
        let outcome = match self.check(token).await {
            Ok(claims) => {
                if self.config.log_pii {
                    tracing::debug!(
                        target: "rg.auth.jwt",
                        subject = claims.subject().unwrap_or_default(),
                        "Token validated successfully"
                    );
                } else {
                    tracing::debug!(target: "rg.auth.jwt", "Token validated successfully");
                }
                ValidationOutcome::Valid(claims)
            }
            Err(failure) => {
                tracing::debug!(target: "rg.auth.jwt", failure = failure.label(), "Token rejected");
                ValidationOutcome::Invalid(failure)
            }
        };

        record_token_validation(outcome.label());
        outcome
    }

    async fn check(&self, token: &str) -> Result<ClaimSet, ValidationFailure> {
        // 1. Structure (includes size check via common::jwt)
        let header = decode_header(token).map_err(|e| {
            tracing::debug!(target: "rg.auth.jwt", error = ?e, "Token header decode failed");
            ValidationFailure::MalformedToken
        })?;

        // 2. Signing key
        let kid = header.kid.ok_or_else(|| {
            tracing::debug!(target: "rg.auth.jwt", "Token header has no kid");
            ValidationFailure::UnknownKey
        })?;
        let document = self.discovery.get_configuration().await.map_err(|e| {
            tracing::warn!(target: "rg.auth.jwt", error = %e, "Signing keys unavailable");
            ValidationFailure::FetchError
        })?;
        let key = self.find_key(document, &kid).await?;

        // 3. Algorithm and signature
        let algorithm = SignatureAlgorithm::from_name(&header.alg).ok_or_else(|| {
            tracing::debug!(target: "rg.auth.jwt", alg = %header.alg, "Token algorithm not accepted");
            ValidationFailure::BadSignature
        })?;
        if let Some(pinned) = key.algorithm.as_deref() {
            if pinned != algorithm.name() {
                tracing::debug!(
                    target: "rg.auth.jwt",
                    alg = %header.alg,
                    key_alg = %pinned,
                    "Token algorithm does not match signing key"
                );
                return Err(ValidationFailure::BadSignature);
            }
        }
        let payload = self
            .verifier
            .verify(token, algorithm, &key)
            .map_err(|e| match e {
                VerifyError::BadSignature => {
                    tracing::debug!(target: "rg.auth.jwt", "Token signature verification failed");
                    ValidationFailure::BadSignature
                }
                VerifyError::Malformed => {
                    tracing::debug!(target: "rg.auth.jwt", "Token payload is malformed");
                    ValidationFailure::MalformedToken
                }
                VerifyError::InvalidKey(_) | VerifyError::Crypto(_) => {
                    tracing::error!(target: "rg.auth.jwt", error = %e, kid = %kid, "Signature verification error");
                    ValidationFailure::InternalError
                }
            })?;
        let claims = ClaimSet::new(payload);

        // 4. Lifetime
        validate_lifetime(claims.expires_at(), claims.not_before(), self.config.clock_skew)
            .map_err(|e| match e {
                JwtValidationError::MissingExpiry | JwtValidationError::Expired => {
                    ValidationFailure::Expired
                }
                JwtValidationError::NotYetValid => ValidationFailure::NotYetValid,
                other => {
                    tracing::error!(target: "rg.auth.jwt", error = ?other, "Unexpected lifetime validation error");
                    ValidationFailure::InternalError
                }
            })?;

        // 5. Issuer
        let issuer = claims.issuer().unwrap_or_default();
        if !self.config.expected_issuers.contains(issuer) {
            if self.config.log_pii {
                tracing::debug!(target: "rg.auth.jwt", issuer = %issuer, "Token issuer not accepted");
            } else {
                tracing::debug!(target: "rg.auth.jwt", "Token issuer not accepted");
            }
            return Err(ValidationFailure::BadIssuer);
        }

        // 6. Audience
        let audiences = claims.audiences();
        if !audiences
            .iter()
            .any(|aud| self.config.expected_audiences.contains(*aud))
        {
            if self.config.log_pii {
                tracing::debug!(target: "rg.auth.jwt", audiences = ?audiences, "Token audience not accepted");
            } else {
                tracing::debug!(target: "rg.auth.jwt", "Token audience not accepted");
            }
            return Err(ValidationFailure::BadAudience);
        }

        Ok(claims)
    }

    /// Look up `kid`, refreshing the discovery document once if it is absent.
    async fn find_key(
        &self,
        document: Arc<DiscoveryDocument>,
        kid: &str,
    ) -> Result<SigningKey, ValidationFailure> {
        if let Some(key) = document.find_key(kid) {
            return Ok(key.clone());
        }

        tracing::debug!(target: "rg.auth.jwt", kid = %kid, "Signing key not in cached document");
        let refreshed = self.discovery.refresh_for_unknown_key().await.map_err(|e| {
            tracing::warn!(target: "rg.auth.jwt", error = %e, "Signing key refresh failed");
            ValidationFailure::FetchError
        })?;

        refreshed.find_key(kid).cloned().ok_or_else(|| {
            tracing::debug!(target: "rg.auth.jwt", kid = %kid, "Signing key not found after refresh");
            ValidationFailure::UnknownKey
        })
    }
}
