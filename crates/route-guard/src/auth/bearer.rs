//! Bearer token extraction from the `Authorization` header.

use axum::http::{header::AUTHORIZATION, HeaderMap};
use common::secret::{ExposeSecret, SecretString};

/// A bearer credential taken from a request. Not parsed until validation.
#[derive(Debug, Clone)]
pub struct BearerToken(SecretString);

impl BearerToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(SecretString::from(token.into()))
    }

    /// An empty token, used when the request carried no usable credential.
    /// It always fails validation as malformed.
    pub fn empty() -> Self {
        Self::new(String::new())
    }

    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }
}

/// Extract a bearer token from request headers.
///
/// Only the exact form `Bearer <token>` is recognised. The header is split on
/// every whitespace character without collapsing runs, and must yield exactly
/// two parts with a case-sensitive `Bearer` scheme.
pub fn extract_bearer(headers: &HeaderMap) -> Option<BearerToken> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;

    let mut parts = value.split(char::is_whitespace);
    let scheme = parts.next()?;
    let token = parts.next()?;
    if parts.next().is_some() || scheme != "Bearer" {
        return None;
    }

    Some(BearerToken::new(token))
}
