//! # Route Guard Test Utilities
//!
//! Shared test utilities for the Route Guard service.
//!
//! This crate provides:
//! - Fixed RSA signing keys (`crypto_fixtures`)
//! - Access token claim builders (`token_builders`)
//! - A mock OpenID Connect provider (`mock_idp`)
//! - Server test harness (`TestRouteGuardServer` for E2E tests)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use rg_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_authenticated() -> Result<()> {
//!     let idp = MockIdentityProvider::start(&[primary_key()]).await;
//!     let server = TestRouteGuardServer::spawn(&idp).await?;
//!     let token = TestTokenBuilder::new().with_name("Alice").sign_with(&primary_key())?;
//!
//!     let response = reqwest::Client::new()
//!         .get(format!("{}/api/authenticated", server.url()))
//!         .bearer_auth(token)
//!         .send()
//!         .await?;
//!
//!     assert_eq!(response.text().await?, "Alice");
//!     Ok(())
//! }
//! ```

pub mod crypto_fixtures;
pub mod mock_idp;
pub mod server_harness;
pub mod token_builders;

// Re-export commonly used items
pub use crypto_fixtures::{primary_key, secondary_key, FixtureError, TestSigningKey};
pub use mock_idp::MockIdentityProvider;
pub use server_harness::*;
pub use token_builders::TestTokenBuilder;

/// Tenant name used by the test configuration.
pub const TEST_TENANT: &str = "contoso.onmicrosoft.com";

/// Tenant ID used by the test configuration.
pub const TEST_TENANT_ID: &str = "72f988bf-0000-4000-8000-2d7cd011db47";

/// Application (client) ID; an accepted audience.
pub const TEST_CLIENT_ID: &str = "6e74172b-be56-4843-9ff4-e66a39bb12e3";

/// Application ID URI; an accepted audience and the default token audience.
pub const TEST_AUDIENCE: &str = "https://contoso.onmicrosoft.com/route-guard";

/// v2 issuer for the test tenant; one of the default accepted issuers.
pub const TEST_ISSUER: &str = "https://login.microsoftonline.com/contoso.onmicrosoft.com/v2.0";
