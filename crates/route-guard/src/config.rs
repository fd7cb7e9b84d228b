//! Route Guard configuration.
//!
//! Configuration is loaded from environment variables. The identity provider
//! settings (tenant, client, audience, issuers) are static for the life of the
//! process; the validator receives an immutable [`ValidationConfig`] derived
//! from them.

use crate::auth::discovery::RefreshPolicy;
use common::jwt::{DEFAULT_CLOCK_SKEW, MAX_CLOCK_SKEW};
use std::collections::{HashMap, HashSet};
use std::env;
use std::time::Duration;
use thiserror::Error;

/// Default authority template. `{tenant}` is replaced with `IDP_TENANT`.
pub const DEFAULT_IDP_INSTANCE: &str = "https://login.microsoftonline.com/{tenant}/v2.0";

/// Default discovery refresh interval in seconds (12 hours).
pub const DEFAULT_DISCOVERY_REFRESH_SECONDS: u64 = 12 * 60 * 60;

/// Default grace period in seconds for serving a stale discovery document.
pub const DEFAULT_DISCOVERY_GRACE_SECONDS: u64 = 60 * 60;

/// Default minimum spacing in seconds between discovery fetch attempts.
pub const DEFAULT_DISCOVERY_MIN_REFRESH_SECONDS: u64 = 60;

/// Default HTTP timeout in seconds for discovery and JWKS requests.
pub const DEFAULT_DISCOVERY_TIMEOUT_SECONDS: u64 = 10;

/// Default graceful-shutdown drain period in seconds.
pub const DEFAULT_DRAIN_SECONDS: u64 = 30;

/// Route Guard configuration.
#[derive(Clone)]
pub struct Config {
    /// Server bind address (default: "0.0.0.0:8080").
    pub bind_address: String,

    /// Tenant name (e.g. "contoso.onmicrosoft.com").
    pub tenant: String,

    /// Tenant GUID, used for the v1 `sts.windows.net` issuer form.
    pub tenant_id: String,

    /// Application (client) ID. Accepted as a token audience.
    pub client_id: String,

    /// Application ID URI. Accepted as a token audience.
    pub audience: String,

    /// Authority URL derived from `IDP_INSTANCE` and the tenant.
    pub authority: String,

    /// Issuer strings accepted in the `iss` claim.
    pub valid_issuers: Vec<String>,

    /// OpenID Connect discovery document URL.
    pub discovery_url: String,

    /// JWT clock skew tolerance in seconds for `exp`/`nbf` validation.
    pub jwt_clock_skew_seconds: i64,

    /// Discovery document lifetime when the provider does not send `max-age`.
    pub discovery_refresh_seconds: u64,

    /// How long past expiry a cached document may still be served when a
    /// refresh fails.
    pub discovery_grace_seconds: u64,

    /// Minimum spacing between discovery fetch attempts (failure backoff and
    /// unknown-`kid` refresh throttle).
    pub discovery_min_refresh_seconds: u64,

    /// HTTP timeout for discovery and JWKS requests.
    pub discovery_timeout_seconds: u64,

    /// Include claim values in validation logs. Off unless explicitly enabled.
    pub log_pii: bool,

    /// Seconds to keep serving in-flight requests after a shutdown signal.
    pub drain_seconds: u64,
}

/// Custom Debug implementation that redacts tenant and client identifiers.
impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("bind_address", &self.bind_address)
            .field("tenant", &self.tenant)
            .field("tenant_id", &"[REDACTED]")
            .field("client_id", &"[REDACTED]")
            .field("audience", &self.audience)
            .field("authority", &self.authority)
            .field("valid_issuers", &self.valid_issuers.len())
            .field("discovery_url", &self.discovery_url)
            .field("jwt_clock_skew_seconds", &self.jwt_clock_skew_seconds)
            .field("discovery_refresh_seconds", &self.discovery_refresh_seconds)
            .field("discovery_grace_seconds", &self.discovery_grace_seconds)
            .field(
                "discovery_min_refresh_seconds",
                &self.discovery_min_refresh_seconds,
            )
            .field("discovery_timeout_seconds", &self.discovery_timeout_seconds)
            .field("log_pii", &self.log_pii)
            .field("drain_seconds", &self.drain_seconds)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid JWT clock skew configuration: {0}")]
    InvalidJwtClockSkew(String),

    #[error("Invalid discovery configuration: {0}")]
    InvalidDiscovery(String),

    #[error("Invalid issuer configuration: {0}")]
    InvalidIssuers(String),

    #[error("Invalid LOG_PII value: {0}")]
    InvalidLogPii(String),

    #[error("Invalid drain configuration: {0}")]
    InvalidDrain(String),
}

/// Immutable validation parameters shared by every token validation.
#[derive(Debug, Clone)]
pub struct ValidationConfig {
    /// Accepted `aud` values (application ID URI and client ID).
    pub expected_audiences: HashSet<String>,

    /// Accepted `iss` values, matched exactly.
    pub expected_issuers: HashSet<String>,

    /// Discovery document URL the signing keys come from.
    pub discovery_url: String,

    /// Clock skew tolerance for `exp`/`nbf`.
    pub clock_skew: Duration,

    /// Whether claim values may appear in logs.
    pub log_pii: bool,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let required = |key: &str| {
            vars.get(key)
                .filter(|v| !v.trim().is_empty())
                .cloned()
                .ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
        };

        let tenant = required("IDP_TENANT")?;
        let tenant_id = required("IDP_TENANT_ID")?;
        let client_id = required("IDP_CLIENT_ID")?;
        let audience = required("IDP_AUDIENCE")?;

        let bind_address = vars
            .get("BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| "0.0.0.0:8080".to_string());

        let instance = vars
            .get("IDP_INSTANCE")
            .cloned()
            .unwrap_or_else(|| DEFAULT_IDP_INSTANCE.to_string());
        let authority = instance
            .replace("{tenant}", &tenant)
            .trim_end_matches('/')
            .to_string();

        let discovery_url = vars.get("DISCOVERY_URL").cloned().unwrap_or_else(|| {
            format!("{}/.well-known/openid-configuration", authority)
        });

        let valid_issuers = match vars.get("IDP_VALID_ISSUERS") {
            Some(list) => {
                let issuers: Vec<String> = list
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(ToString::to_string)
                    .collect();
                if issuers.is_empty() {
                    return Err(ConfigError::InvalidIssuers(
                        "IDP_VALID_ISSUERS must list at least one issuer".to_string(),
                    ));
                }
                issuers
            }
            None => default_issuers(&tenant, &tenant_id),
        };

        // Parse JWT clock skew tolerance with validation
        let jwt_clock_skew_seconds = if let Some(value_str) = vars.get("JWT_CLOCK_SKEW_SECONDS") {
            let value: i64 = value_str.parse().map_err(|e| {
                ConfigError::InvalidJwtClockSkew(format!(
                    "JWT_CLOCK_SKEW_SECONDS must be a valid integer, got '{}': {}",
                    value_str, e
                ))
            })?;

            if value <= 0 {
                return Err(ConfigError::InvalidJwtClockSkew(format!(
                    "JWT_CLOCK_SKEW_SECONDS must be positive, got {}",
                    value
                )));
            }

            if value > MAX_CLOCK_SKEW.as_secs() as i64 {
                return Err(ConfigError::InvalidJwtClockSkew(format!(
                    "JWT_CLOCK_SKEW_SECONDS must not exceed {} seconds, got {}",
                    MAX_CLOCK_SKEW.as_secs(),
                    value
                )));
            }

            value
        } else {
            DEFAULT_CLOCK_SKEW.as_secs() as i64
        };

        let discovery_refresh_seconds = parse_seconds(
            vars,
            "DISCOVERY_REFRESH_SECONDS",
            DEFAULT_DISCOVERY_REFRESH_SECONDS,
            false,
        )?;
        let discovery_grace_seconds = parse_seconds(
            vars,
            "DISCOVERY_GRACE_SECONDS",
            DEFAULT_DISCOVERY_GRACE_SECONDS,
            true,
        )?;
        let discovery_min_refresh_seconds = parse_seconds(
            vars,
            "DISCOVERY_MIN_REFRESH_SECONDS",
            DEFAULT_DISCOVERY_MIN_REFRESH_SECONDS,
            true,
        )?;
        let discovery_timeout_seconds = parse_seconds(
            vars,
            "DISCOVERY_TIMEOUT_SECONDS",
            DEFAULT_DISCOVERY_TIMEOUT_SECONDS,
            false,
        )?;

        let log_pii = match vars.get("LOG_PII").map(|v| v.trim().to_ascii_lowercase()) {
            None => false,
            Some(v) if v == "true" || v == "1" => true,
            Some(v) if v == "false" || v == "0" || v.is_empty() => false,
            Some(v) => return Err(ConfigError::InvalidLogPii(v)),
        };

        let drain_seconds = match vars.get("RG_DRAIN_SECONDS") {
            Some(value_str) => value_str.parse::<u64>().map_err(|e| {
                ConfigError::InvalidDrain(format!(
                    "RG_DRAIN_SECONDS must be a valid non-negative integer, got '{}': {}",
                    value_str, e
                ))
            })?,
            None => DEFAULT_DRAIN_SECONDS,
        };

        Ok(Config {
            bind_address,
            tenant,
            tenant_id,
            client_id,
            audience,
            authority,
            valid_issuers,
            discovery_url,
            jwt_clock_skew_seconds,
            discovery_refresh_seconds,
            discovery_grace_seconds,
            discovery_min_refresh_seconds,
            discovery_timeout_seconds,
            log_pii,
            drain_seconds,
        })
    }

    /// Build the immutable validation parameters.
    ///
    /// Both the application ID URI and the client ID are accepted audiences.
    pub fn validation_config(&self) -> ValidationConfig {
        ValidationConfig {
            expected_audiences: HashSet::from([self.audience.clone(), self.client_id.clone()]),
            expected_issuers: self.valid_issuers.iter().cloned().collect(),
            discovery_url: self.discovery_url.clone(),
            clock_skew: Duration::from_secs(self.jwt_clock_skew_seconds.unsigned_abs()),
            log_pii: self.log_pii,
        }
    }

    /// Build the discovery cache refresh policy.
    pub fn refresh_policy(&self) -> RefreshPolicy {
        RefreshPolicy {
            refresh_interval: Duration::from_secs(self.discovery_refresh_seconds),
            grace_period: Duration::from_secs(self.discovery_grace_seconds),
            min_refresh_interval: Duration::from_secs(self.discovery_min_refresh_seconds),
            request_timeout: Duration::from_secs(self.discovery_timeout_seconds),
        }
    }
}

/// The issuer forms a single tenant can appear under: v2 and v1 endpoints on
/// each login host, plus the tenant-id based `sts.windows.net` issuer.
fn default_issuers(tenant: &str, tenant_id: &str) -> Vec<String> {
    vec![
        format!("https://login.microsoftonline.com/{}/", tenant),
        format!("https://login.microsoftonline.com/{}/v2.0", tenant),
        format!("https://login.windows.net/{}/", tenant),
        format!("https://login.microsoft.com/{}/", tenant),
        format!("https://sts.windows.net/{}/", tenant_id),
    ]
}

fn parse_seconds(
    vars: &HashMap<String, String>,
    key: &str,
    default: u64,
    allow_zero: bool,
) -> Result<u64, ConfigError> {
    let Some(value_str) = vars.get(key) else {
        return Ok(default);
    };

    let value: u64 = value_str.parse().map_err(|e| {
        ConfigError::InvalidDiscovery(format!(
            "{} must be a valid non-negative integer, got '{}': {}",
            key, value_str, e
        ))
    })?;

    if value == 0 && !allow_zero {
        return Err(ConfigError::InvalidDiscovery(format!(
            "{} must be greater than 0",
            key
        )));
    }

    Ok(value)
}
