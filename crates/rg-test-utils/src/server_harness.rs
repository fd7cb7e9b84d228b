//! Test server harness for E2E testing
//!
//! Provides `TestRouteGuardServer` for spawning real Route Guard instances
//! against a [`MockIdentityProvider`].

use crate::mock_idp::MockIdentityProvider;
use crate::{TEST_AUDIENCE, TEST_CLIENT_ID, TEST_TENANT, TEST_TENANT_ID};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use route_guard::config::Config;
use route_guard::observability::metrics::init_metrics_recorder;
use route_guard::routes::{self, AppState};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, OnceLock};
use tokio::task::JoinHandle;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Process-wide metrics handle.
///
/// The global recorder can only be installed once per process. If another
/// test binary component already installed one, fall back to a detached
/// recorder so the `/metrics` route still renders.
pub fn metrics_handle() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            init_metrics_recorder()
                .unwrap_or_else(|_| PrometheusBuilder::new().build_recorder().handle())
        })
        .clone()
}

/// Environment for a Route Guard pointed at the given discovery URL.
pub fn test_vars(discovery_url: &str) -> HashMap<String, String> {
    HashMap::from([
        ("BIND_ADDRESS".to_string(), "127.0.0.1:0".to_string()),
        ("IDP_TENANT".to_string(), TEST_TENANT.to_string()),
        ("IDP_TENANT_ID".to_string(), TEST_TENANT_ID.to_string()),
        ("IDP_CLIENT_ID".to_string(), TEST_CLIENT_ID.to_string()),
        ("IDP_AUDIENCE".to_string(), TEST_AUDIENCE.to_string()),
        ("DISCOVERY_URL".to_string(), discovery_url.to_string()),
    ])
}

/// Test harness for spawning Route Guard in E2E tests.
///
/// # Example
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_anonymous() -> Result<()> {
///     let idp = MockIdentityProvider::start(&[primary_key()]).await;
///     let server = TestRouteGuardServer::spawn(&idp).await?;
///
///     let response = reqwest::get(format!("{}/api/anonymous", server.url())).await?;
///     assert_eq!(response.status(), 200);
///     Ok(())
/// }
/// ```
pub struct TestRouteGuardServer {
    addr: SocketAddr,
    config: Config,
    _handle: JoinHandle<()>,
}

impl TestRouteGuardServer {
    /// Spawn a server using the provider's discovery URL and default settings.
    pub async fn spawn(idp: &MockIdentityProvider) -> Result<Self, anyhow::Error> {
        Self::spawn_with_vars(idp, &[]).await
    }

    /// Spawn a server with extra environment overrides.
    ///
    /// The server will:
    /// - Bind to a random available port (127.0.0.1:0)
    /// - Start the HTTP server in the background
    pub async fn spawn_with_vars(
        idp: &MockIdentityProvider,
        overrides: &[(&str, &str)],
    ) -> Result<Self, anyhow::Error> {
        let mut vars = test_vars(&idp.discovery_url());
        for (key, value) in overrides {
            vars.insert((*key).to_string(), (*value).to_string());
        }

        let config = Config::from_vars(&vars)
            .map_err(|e| anyhow::anyhow!("Failed to create config: {}", e))?;

        let state = Arc::new(AppState::from_config(&config));
        let app = routes::build_routes(state, metrics_handle());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind test server: {}", e))?;

        let addr = listener
            .local_addr()
            .map_err(|e| anyhow::anyhow!("Failed to get local address: {}", e))?;

        let handle = tokio::spawn(async move {
            let make_service = app.into_make_service_with_connect_info::<SocketAddr>();
            if let Err(e) = axum::serve(listener, make_service).await {
                eprintln!("Test server error: {}", e);
            }
        });

        Ok(Self {
            addr,
            config,
            _handle: handle,
        })
    }

    /// Get the base URL of the test server.
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Get the socket address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Get reference to the server configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }
}

impl Drop for TestRouteGuardServer {
    fn drop(&mut self) {
        // Abort the HTTP server task so the port is released when the test ends
        self._handle.abort();
    }
}
