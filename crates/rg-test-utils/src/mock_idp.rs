//! Mock OpenID Connect identity provider
//!
//! Serves a discovery document and a JWKS from a `wiremock` server. The
//! `*_mock` builders return unmounted mocks so tests can attach call-count
//! expectations or limits before mounting.

use crate::crypto_fixtures::TestSigningKey;
use crate::TEST_ISSUER;
use serde_json::{json, Value};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Path of the discovery document on the mock server.
pub const DISCOVERY_PATH: &str = "/.well-known/openid-configuration";

/// Path of the JWKS on the mock server.
pub const JWKS_PATH: &str = "/discovery/v2.0/keys";

/// A running mock identity provider.
///
/// # Example
/// ```rust,ignore
/// let idp = MockIdentityProvider::empty().await;
/// idp.discovery_mock().expect(1).mount(idp.server()).await;
/// idp.keys_mock(&[primary_key()]).expect(1).mount(idp.server()).await;
/// ```
pub struct MockIdentityProvider {
    server: MockServer,
}

impl MockIdentityProvider {
    /// Start a provider with nothing mounted.
    pub async fn empty() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    /// Start a provider publishing the given signing keys.
    pub async fn start(keys: &[TestSigningKey]) -> Self {
        let idp = Self::empty().await;
        idp.discovery_mock().mount(&idp.server).await;
        idp.keys_mock(keys).mount(&idp.server).await;
        idp
    }

    /// The underlying mock server, for mounting custom responses.
    pub fn server(&self) -> &MockServer {
        &self.server
    }

    /// URL of the discovery document.
    pub fn discovery_url(&self) -> String {
        format!("{}{}", self.server.uri(), DISCOVERY_PATH)
    }

    /// URL of the JWKS.
    pub fn jwks_url(&self) -> String {
        format!("{}{}", self.server.uri(), JWKS_PATH)
    }

    /// Discovery document body.
    pub fn discovery_document(&self) -> Value {
        json!({
            "issuer": TEST_ISSUER,
            "jwks_uri": self.jwks_url(),
            "authorization_endpoint": format!("{}/oauth2/v2.0/authorize", self.server.uri()),
            "token_endpoint": format!("{}/oauth2/v2.0/token", self.server.uri()),
            "id_token_signing_alg_values_supported": ["RS256"],
        })
    }

    /// Unmounted mock serving the discovery document.
    pub fn discovery_mock(&self) -> Mock {
        Mock::given(method("GET"))
            .and(path(DISCOVERY_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(self.discovery_document()))
    }

    /// Unmounted mock serving a JWKS with the given keys.
    pub fn keys_mock(&self, keys: &[TestSigningKey]) -> Mock {
        Self::keys_response_mock(ResponseTemplate::new(200).set_body_json(jwks(keys)))
    }

    /// Unmounted mock serving the JWKS with a `Cache-Control: max-age`.
    pub fn keys_mock_with_max_age(&self, keys: &[TestSigningKey], max_age_secs: u64) -> Mock {
        Self::keys_response_mock(
            ResponseTemplate::new(200)
                .insert_header("Cache-Control", format!("public, max-age={max_age_secs}").as_str())
                .set_body_json(jwks(keys)),
        )
    }

    /// Unmounted mock failing the JWKS request with the given status.
    pub fn keys_failure_mock(&self, status: u16) -> Mock {
        Self::keys_response_mock(ResponseTemplate::new(status))
    }

    fn keys_response_mock(response: ResponseTemplate) -> Mock {
        Mock::given(method("GET"))
            .and(path(JWKS_PATH))
            .respond_with(response)
    }
}

/// JWKS body for the given keys.
pub fn jwks(keys: &[TestSigningKey]) -> Value {
    json!({ "keys": keys.iter().map(TestSigningKey::jwk_json).collect::<Vec<_>>() })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto_fixtures::{primary_key, secondary_key};

    #[tokio::test]
    async fn test_serves_discovery_and_keys() {
        let idp = MockIdentityProvider::start(&[primary_key(), secondary_key()]).await;
        let client = reqwest::Client::new();

        let document: Value = client
            .get(idp.discovery_url())
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(document["issuer"], TEST_ISSUER);
        assert_eq!(document["jwks_uri"], idp.jwks_url());

        let keys: Value = client
            .get(idp.jwks_url())
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(keys["keys"].as_array().unwrap().len(), 2);
        assert_eq!(keys["keys"][0]["kid"], "test-key-primary");
    }
}
