//! Builder patterns for test data construction
//!
//! Provides a fluent API for access token claims.

use crate::crypto_fixtures::{FixtureError, TestSigningKey};
use crate::{TEST_AUDIENCE, TEST_ISSUER};
use chrono::{Duration, Utc};
use jsonwebtoken::Algorithm;
use serde_json::{json, Map, Value};

/// Builder for access token claims
///
/// Defaults produce a token the test server accepts: configured issuer and
/// audience, valid for an hour.
///
/// # Example
/// ```rust,ignore
/// let token = TestTokenBuilder::new()
///     .for_user("alice")
///     .with_name("Alice Example")
///     .expires_in(3600)
///     .sign_with(&primary_key())?;
/// ```
pub struct TestTokenBuilder {
    claims: Map<String, Value>,
    algorithm: Algorithm,
}

impl TestTokenBuilder {
    /// Create a new token builder with defaults
    pub fn new() -> Self {
        let now = Utc::now();
        let mut claims = Map::new();
        claims.insert("iss".to_string(), json!(TEST_ISSUER));
        claims.insert("aud".to_string(), json!(TEST_AUDIENCE));
        claims.insert("sub".to_string(), json!("test-subject"));
        claims.insert(
            "exp".to_string(),
            json!((now + Duration::seconds(3600)).timestamp()),
        );
        claims.insert(
            "nbf".to_string(),
            json!((now - Duration::seconds(60)).timestamp()),
        );
        claims.insert("iat".to_string(), json!(now.timestamp()));

        Self {
            claims,
            algorithm: Algorithm::RS256,
        }
    }

    /// Set the subject
    pub fn for_user(self, subject: &str) -> Self {
        self.with_claim("sub", json!(subject))
    }

    /// Set the `name` claim
    pub fn with_name(self, name: &str) -> Self {
        self.with_claim("name", json!(name))
    }

    /// Set the `unique_name` claim
    pub fn with_unique_name(self, unique_name: &str) -> Self {
        self.with_claim("unique_name", json!(unique_name))
    }

    /// Set the issuer
    pub fn issued_by(self, issuer: &str) -> Self {
        self.with_claim("iss", json!(issuer))
    }

    /// Set a single audience
    pub fn for_audience(self, audience: &str) -> Self {
        self.with_claim("aud", json!(audience))
    }

    /// Set an audience array
    pub fn for_audiences(self, audiences: &[&str]) -> Self {
        self.with_claim("aud", json!(audiences))
    }

    /// Set expiration in seconds from now (negative for already expired)
    pub fn expires_in(self, seconds: i64) -> Self {
        let exp = (Utc::now() + Duration::seconds(seconds)).timestamp();
        self.with_claim("exp", json!(exp))
    }

    /// Set not-before in seconds from now (positive for not yet valid)
    pub fn not_before_in(self, seconds: i64) -> Self {
        let nbf = (Utc::now() + Duration::seconds(seconds)).timestamp();
        self.with_claim("nbf", json!(nbf))
    }

    /// Set an arbitrary claim
    pub fn with_claim(mut self, name: &str, value: Value) -> Self {
        self.claims.insert(name.to_string(), value);
        self
    }

    /// Remove a claim
    pub fn without_claim(mut self, name: &str) -> Self {
        self.claims.remove(name);
        self
    }

    /// Set the signing algorithm (default RS256)
    pub fn with_algorithm(mut self, algorithm: Algorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    /// Build the claims as a JSON value
    pub fn build(self) -> Value {
        Value::Object(self.claims)
    }

    /// Build and sign the token with the given key
    pub fn sign_with(self, key: &TestSigningKey) -> Result<String, FixtureError> {
        let algorithm = self.algorithm;
        key.sign(algorithm, &self.build())
    }
}

impl Default for TestTokenBuilder {
    fn default() -> Self {
        Self::new()
    }
}
