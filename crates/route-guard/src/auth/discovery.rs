//! OpenID Connect discovery cache.
//!
//! Fetches the identity provider's metadata document and the signing key set
//! it references, and caches both as one immutable [`DiscoveryDocument`].
//!
//! # Refresh behaviour
//!
//! - The document is valid for the JWKS response's `Cache-Control: max-age`,
//!   or for the configured refresh interval when the provider sends none.
//! - At most one fetch is in flight. Concurrent callers queue on the refresh
//!   lock and, once they hold it, take any document fetched after they
//!   started waiting, even one whose validity has already run out.
//! - The fetch runs in a spawned task that owns the refresh lock, so a caller
//!   that goes away does not abort it and the result still lands in the cache.
//! - After a failed fetch no new attempt is made until the minimum refresh
//!   interval has passed. Meanwhile, and whenever a fetch fails, the last good
//!   document is served until `expires_at + grace_period`.
//! - A forced refresh for an unknown `kid` is skipped when the current
//!   document was fetched less than the minimum refresh interval ago.

use crate::observability::metrics::record_discovery_fetch;
use reqwest::header::CACHE_CONTROL;
use serde::Deserialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tracing::instrument;

/// Timing parameters for the discovery cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshPolicy {
    /// Validity window when the JWKS response carries no `max-age`.
    pub refresh_interval: Duration,

    /// How long past expiry the last good document may be served.
    pub grace_period: Duration,

    /// Minimum spacing between fetch attempts after a failure, and between a
    /// successful fetch and a forced refresh.
    pub min_refresh_interval: Duration,

    /// HTTP timeout for each discovery and JWKS request.
    pub request_timeout: Duration,
}

impl Default for RefreshPolicy {
    fn default() -> Self {
        Self {
            refresh_interval: Duration::from_secs(12 * 60 * 60),
            grace_period: Duration::from_secs(60 * 60),
            min_refresh_interval: Duration::from_secs(60),
            request_timeout: Duration::from_secs(10),
        }
    }
}

/// Errors fetching or interpreting discovery metadata.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DiscoveryError {
    #[error("Discovery request failed: {0}")]
    Transport(String),

    #[error("Discovery endpoint returned status {0}")]
    Status(u16),

    #[error("Invalid discovery response: {0}")]
    InvalidDocument(String),

    #[error("Signing key set contains no usable keys")]
    NoUsableKeys,

    #[error("Discovery fetch task failed: {0}")]
    Task(String),
}

/// OpenID Connect provider metadata (the fields the validator uses).
#[derive(Debug, Clone, Deserialize)]
pub struct OpenIdConfiguration {
    #[serde(default)]
    pub issuer: String,

    pub jwks_uri: String,
}

/// JSON Web Key as published by the provider.
#[derive(Debug, Clone, Deserialize)]
pub struct Jwk {
    pub kty: String,

    #[serde(default)]
    pub kid: Option<String>,

    #[serde(default, rename = "use")]
    pub key_use: Option<String>,

    #[serde(default)]
    pub alg: Option<String>,

    /// RSA modulus (base64url).
    #[serde(default)]
    pub n: Option<String>,

    /// RSA public exponent (base64url).
    #[serde(default)]
    pub e: Option<String>,
}

/// JWKS response body.
#[derive(Debug, Clone, Deserialize)]
pub struct JwksResponse {
    pub keys: Vec<Jwk>,
}

/// Public key material for signature verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyMaterial {
    /// RSA public key components, base64url encoded.
    Rsa { n: String, e: String },
}

/// A signing key usable for token verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SigningKey {
    pub kid: String,

    /// Algorithm the provider restricts this key to, if any.
    pub algorithm: Option<String>,

    pub material: KeyMaterial,
}

impl Jwk {
    /// Convert to a [`SigningKey`], or `None` for keys the validator cannot use
    /// (non-RSA, encryption keys, missing `kid` or components).
    fn into_signing_key(self) -> Option<SigningKey> {
        if self.kty != "RSA" {
            tracing::debug!(target: "rg.auth.discovery", kty = %self.kty, "Skipping non-RSA key");
            return None;
        }
        if let Some(key_use) = self.key_use.as_deref() {
            if key_use != "sig" {
                tracing::debug!(target: "rg.auth.discovery", key_use = %key_use, "Skipping non-signing key");
                return None;
            }
        }
        let kid = self.kid.filter(|k| !k.is_empty())?;
        let (Some(n), Some(e)) = (self.n, self.e) else {
            tracing::debug!(target: "rg.auth.discovery", kid = %kid, "Skipping RSA key without n/e");
            return None;
        };

        Some(SigningKey {
            kid,
            algorithm: self.alg,
            material: KeyMaterial::Rsa { n, e },
        })
    }
}

/// Provider metadata plus signing keys, replaced wholesale on refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryDocument {
    pub issuer: String,
    pub jwks_uri: String,
    pub signing_keys: Vec<SigningKey>,
}

impl DiscoveryDocument {
    /// Find a signing key by key ID.
    pub fn find_key(&self, kid: &str) -> Option<&SigningKey> {
        self.signing_keys.iter().find(|key| key.kid == kid)
    }
}

struct CachedDocument {
    document: Arc<DiscoveryDocument>,
    fetched_at: Instant,
    expires_at: Instant,
}

#[derive(Default)]
struct RefreshState {
    /// When the last failed fetch finished, with its error.
    last_failure: Option<(Instant, DiscoveryError)>,
}

struct Inner {
    discovery_url: String,
    http_client: reqwest::Client,
    policy: RefreshPolicy,
    cache: RwLock<Option<CachedDocument>>,
    refresh: Arc<Mutex<RefreshState>>,
}

/// Shared cache of the identity provider's discovery document.
///
/// Cheap to clone; clones share one cache.
#[derive(Clone)]
pub struct DiscoveryCache {
    inner: Arc<Inner>,
}

impl DiscoveryCache {
    /// Create a cache for the given discovery document URL.
    pub fn new(discovery_url: String, policy: RefreshPolicy) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(policy.request_timeout)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(target: "rg.auth.discovery", error = %e, "Failed to build HTTP client with custom config, using defaults");
                reqwest::Client::new()
            });

        Self {
            inner: Arc::new(Inner {
                discovery_url,
                http_client,
                policy,
                cache: RwLock::new(None),
                refresh: Arc::new(Mutex::new(RefreshState::default())),
            }),
        }
    }

    /// Get the current discovery document, fetching it if the cache is empty
    /// or its validity window has elapsed.
    ///
    /// # Errors
    ///
    /// Returns `DiscoveryError` when no document can be fetched and no cached
    /// document is within its grace period.
    #[instrument(skip_all)]
    pub async fn get_configuration(&self) -> Result<Arc<DiscoveryDocument>, DiscoveryError> {
        if let Some(document) = self.inner.fresh_document().await {
            return Ok(document);
        }

        let requested_at = Instant::now();
        let state = Arc::clone(&self.inner.refresh).lock_owned().await;

        // Another caller may have refreshed while we waited for the lock. Its
        // result is used even if already expired (e.g. max-age=0).
        if let Some(document) = self.inner.fresh_document().await {
            tracing::debug!(target: "rg.auth.discovery", "Discovery document refreshed by concurrent caller");
            return Ok(document);
        }
        if let Some(document) = self.inner.fetched_after(requested_at).await {
            tracing::debug!(target: "rg.auth.discovery", "Using document fetched by concurrent caller");
            return Ok(document);
        }

        if let Some(error) = self.inner.backoff_error(&state) {
            drop(state);
            return self.inner.fallback(error).await;
        }

        self.spawn_refresh(state).await
    }

    /// Refresh the document because a token named a key it does not contain.
    ///
    /// Skipped, returning the current document, when the last successful
    /// fetch is more recent than the minimum refresh interval.
    ///
    /// # Errors
    ///
    /// Same as [`get_configuration`](Self::get_configuration).
    #[instrument(skip_all)]
    pub async fn refresh_for_unknown_key(
        &self,
    ) -> Result<Arc<DiscoveryDocument>, DiscoveryError> {
        let requested_at = Instant::now();
        let state = Arc::clone(&self.inner.refresh).lock_owned().await;

        if let Some(document) = self.inner.fetched_after(requested_at).await {
            tracing::debug!(target: "rg.auth.discovery", "Using document fetched by concurrent caller");
            return Ok(document);
        }

        {
            let cache = self.inner.cache.read().await;
            if let Some(cached) = cache.as_ref() {
                if cached.fetched_at.elapsed() < self.inner.policy.min_refresh_interval {
                    tracing::debug!(target: "rg.auth.discovery", "Forced refresh throttled, document is recent");
                    return Ok(Arc::clone(&cached.document));
                }
            }
        }

        if let Some(error) = self.inner.backoff_error(&state) {
            drop(state);
            return self.inner.fallback(error).await;
        }

        tracing::info!(target: "rg.auth.discovery", "Refreshing discovery document for unknown signing key");
        self.spawn_refresh(state).await
    }

    /// Run the fetch in its own task. The task owns the refresh lock, so the
    /// fetch completes and single-flight holds even if this caller is dropped.
    async fn spawn_refresh(
        &self,
        mut state: tokio::sync::OwnedMutexGuard<RefreshState>,
    ) -> Result<Arc<DiscoveryDocument>, DiscoveryError> {
        let inner = Arc::clone(&self.inner);
        let task = tokio::spawn(async move {
            let result = inner.fetch_and_store(&mut state).await;
            drop(state);
            result
        });

        let result = match task.await {
            Ok(result) => result,
            Err(e) => {
                tracing::error!(target: "rg.auth.discovery", error = %e, "Discovery fetch task failed");
                Err(DiscoveryError::Task(e.to_string()))
            }
        };

        match result {
            Ok(document) => Ok(document),
            Err(error) => self.inner.fallback(error).await,
        }
    }
}

impl Inner {
    async fn fresh_document(&self) -> Option<Arc<DiscoveryDocument>> {
        let cache = self.cache.read().await;
        cache
            .as_ref()
            .filter(|cached| Instant::now() < cached.expires_at)
            .map(|cached| Arc::clone(&cached.document))
    }

    /// The cached document, if it was fetched after `instant`.
    async fn fetched_after(&self, instant: Instant) -> Option<Arc<DiscoveryDocument>> {
        let cache = self.cache.read().await;
        cache
            .as_ref()
            .filter(|cached| cached.fetched_at > instant)
            .map(|cached| Arc::clone(&cached.document))
    }

    /// The last error, if a fetch failed within the minimum refresh interval.
    fn backoff_error(&self, state: &RefreshState) -> Option<DiscoveryError> {
        state
            .last_failure
            .as_ref()
            .filter(|(failed_at, _)| failed_at.elapsed() < self.policy.min_refresh_interval)
            .map(|(_, error)| {
                tracing::debug!(target: "rg.auth.discovery", "Discovery fetch backing off after recent failure");
                error.clone()
            })
    }

    /// Serve the last good document if it is within its grace period.
    async fn fallback(&self, error: DiscoveryError) -> Result<Arc<DiscoveryDocument>, DiscoveryError> {
        let cache = self.cache.read().await;
        if let Some(cached) = cache.as_ref() {
            let within_grace = cached
                .expires_at
                .checked_add(self.policy.grace_period)
                .map_or(true, |limit| Instant::now() < limit);
            if within_grace {
                tracing::warn!(
                    target: "rg.auth.discovery",
                    error = %error,
                    "Discovery refresh failed, serving cached document within grace period"
                );
                return Ok(Arc::clone(&cached.document));
            }
        }

        tracing::warn!(target: "rg.auth.discovery", error = %error, "Discovery document unavailable");
        Err(error)
    }

    async fn fetch_and_store(
        &self,
        state: &mut RefreshState,
    ) -> Result<Arc<DiscoveryDocument>, DiscoveryError> {
        let start = Instant::now();
        let result = fetch_document(&self.http_client, &self.discovery_url).await;
        let duration = start.elapsed();

        match result {
            Ok(fetched) => {
                record_discovery_fetch("success", duration);

                let now = Instant::now();
                let validity = fetched.max_age.unwrap_or(self.policy.refresh_interval);
                let expires_at = now
                    .checked_add(validity)
                    .or_else(|| now.checked_add(self.policy.refresh_interval))
                    .unwrap_or(now);

                tracing::info!(
                    target: "rg.auth.discovery",
                    key_count = fetched.document.signing_keys.len(),
                    validity_secs = validity.as_secs(),
                    "Discovery document refreshed"
                );

                let document = Arc::new(fetched.document);
                let mut cache = self.cache.write().await;
                *cache = Some(CachedDocument {
                    document: Arc::clone(&document),
                    fetched_at: now,
                    expires_at,
                });
                state.last_failure = None;

                Ok(document)
            }
            Err(error) => {
                record_discovery_fetch("error", duration);
                tracing::warn!(target: "rg.auth.discovery", error = %error, "Discovery fetch failed");
                state.last_failure = Some((Instant::now(), error.clone()));
                Err(error)
            }
        }
    }
}

struct FetchedDocument {
    document: DiscoveryDocument,
    max_age: Option<Duration>,
}

async fn fetch_document(
    client: &reqwest::Client,
    discovery_url: &str,
) -> Result<FetchedDocument, DiscoveryError> {
    tracing::debug!(target: "rg.auth.discovery", url = %discovery_url, "Fetching discovery document");

    let response = client
        .get(discovery_url)
        .send()
        .await
        .map_err(|e| DiscoveryError::Transport(e.to_string()))?;
    if !response.status().is_success() {
        return Err(DiscoveryError::Status(response.status().as_u16()));
    }
    let configuration: OpenIdConfiguration = response
        .json()
        .await
        .map_err(|e| DiscoveryError::InvalidDocument(e.to_string()))?;

    tracing::debug!(target: "rg.auth.discovery", url = %configuration.jwks_uri, "Fetching signing keys");

    let response = client
        .get(&configuration.jwks_uri)
        .send()
        .await
        .map_err(|e| DiscoveryError::Transport(e.to_string()))?;
    if !response.status().is_success() {
        return Err(DiscoveryError::Status(response.status().as_u16()));
    }
    let max_age = response
        .headers()
        .get(CACHE_CONTROL)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_max_age);
    let jwks: JwksResponse = response
        .json()
        .await
        .map_err(|e| DiscoveryError::InvalidDocument(e.to_string()))?;

    let signing_keys: Vec<SigningKey> = jwks
        .keys
        .into_iter()
        .filter_map(Jwk::into_signing_key)
        .collect();
    if signing_keys.is_empty() {
        return Err(DiscoveryError::NoUsableKeys);
    }

    Ok(FetchedDocument {
        document: DiscoveryDocument {
            issuer: configuration.issuer,
            jwks_uri: configuration.jwks_uri,
            signing_keys,
        },
        max_age,
    })
}

/// Extract `max-age` from a `Cache-Control` header value.
fn parse_max_age(cache_control: &str) -> Option<Duration> {
    cache_control
        .split(',')
        .filter_map(|directive| {
            let (name, value) = directive.trim().split_once('=')?;
            name.trim()
                .eq_ignore_ascii_case("max-age")
                .then(|| value.trim().trim_matches('"').parse::<u64>().ok())
                .flatten()
        })
        .next()
        .map(Duration::from_secs)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rsa_jwk(kid: &str) -> serde_json::Value {
        json!({"kty": "RSA", "kid": kid, "use": "sig", "n": "AQAB", "e": "AQAB"})
    }

    #[test]
    fn test_parse_max_age() {
        assert_eq!(
            parse_max_age("public, max-age=86400"),
            Some(Duration::from_secs(86400))
        );
        assert_eq!(parse_max_age("max-age=0"), Some(Duration::ZERO));
        assert_eq!(parse_max_age("Max-Age=\"60\""), Some(Duration::from_secs(60)));
        assert_eq!(parse_max_age("no-cache"), None);
        assert_eq!(parse_max_age("max-age=soon"), None);
        assert_eq!(parse_max_age(""), None);
    }

    #[test]
    fn test_jwk_keeps_rsa_signing_keys() {
        let jwk: Jwk = serde_json::from_value(json!({
            "kty": "RSA", "kid": "k1", "use": "sig", "alg": "RS256",
            "n": "modulus", "e": "AQAB", "x5c": ["ignored"]
        }))
        .unwrap();

        let key = jwk.into_signing_key().unwrap();
        assert_eq!(key.kid, "k1");
        assert_eq!(key.algorithm.as_deref(), Some("RS256"));
        assert_eq!(
            key.material,
            KeyMaterial::Rsa {
                n: "modulus".to_string(),
                e: "AQAB".to_string()
            }
        );
    }

    #[test]
    fn test_jwk_without_use_is_kept() {
        let jwk: Jwk =
            serde_json::from_value(json!({"kty": "RSA", "kid": "k1", "n": "n", "e": "e"})).unwrap();
        assert!(jwk.into_signing_key().is_some());
    }

    #[test]
    fn test_jwk_unusable_keys_are_skipped() {
        for value in [
            json!({"kty": "EC", "kid": "ec", "crv": "P-256", "x": "x", "y": "y"}),
            json!({"kty": "RSA", "kid": "enc", "use": "enc", "n": "n", "e": "e"}),
            json!({"kty": "RSA", "use": "sig", "n": "n", "e": "e"}),
            json!({"kty": "RSA", "kid": "", "n": "n", "e": "e"}),
            json!({"kty": "RSA", "kid": "no-e", "n": "n"}),
        ] {
            let jwk: Jwk = serde_json::from_value(value.clone()).unwrap();
            assert!(jwk.into_signing_key().is_none(), "should skip {value}");
        }
    }

    #[test]
    fn test_find_key() {
        let jwks: JwksResponse =
            serde_json::from_value(json!({"keys": [rsa_jwk("a"), rsa_jwk("b")]})).unwrap();
        let document = DiscoveryDocument {
            issuer: "https://issuer.example/".to_string(),
            jwks_uri: "https://issuer.example/keys".to_string(),
            signing_keys: jwks
                .keys
                .into_iter()
                .filter_map(Jwk::into_signing_key)
                .collect(),
        };

        assert_eq!(document.find_key("b").unwrap().kid, "b");
        assert!(document.find_key("c").is_none());
    }

    #[test]
    fn test_openid_configuration_tolerates_extra_fields() {
        let config: OpenIdConfiguration = serde_json::from_value(json!({
            "issuer": "https://login.microsoftonline.com/tenant/v2.0",
            "jwks_uri": "https://login.microsoftonline.com/tenant/discovery/v2.0/keys",
            "token_endpoint": "https://example/token",
            "response_types_supported": ["code"]
        }))
        .unwrap();

        assert_eq!(
            config.jwks_uri,
            "https://login.microsoftonline.com/tenant/discovery/v2.0/keys"
        );

        let missing: Result<OpenIdConfiguration, _> =
            serde_json::from_value(json!({"issuer": "x"}));
        assert!(missing.is_err());
    }

    #[tokio::test]
    async fn test_unreachable_provider_returns_error() {
        let cache = DiscoveryCache::new(
            "http://127.0.0.1:1/.well-known/openid-configuration".to_string(),
            RefreshPolicy {
                request_timeout: Duration::from_secs(2),
                ..RefreshPolicy::default()
            },
        );

        let result = cache.get_configuration().await;
        assert!(matches!(result, Err(DiscoveryError::Transport(_))));

        // Within the backoff window the same error is returned without a fetch
        let again = cache.get_configuration().await;
        assert_eq!(again.unwrap_err(), result.unwrap_err());
    }
}
