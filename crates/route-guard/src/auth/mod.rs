//! Bearer token authentication.
//!
//! - `bearer` - `Authorization` header parsing
//! - `discovery` - cached identity provider metadata and signing keys
//! - `verifier` - signature verification capability
//! - `jwt` - full token validation
//! - `claims` - the validated claim set

pub mod bearer;
pub mod claims;
pub mod discovery;
pub mod jwt;
pub mod verifier;

pub use bearer::{extract_bearer, BearerToken};
pub use claims::ClaimSet;
pub use discovery::{DiscoveryCache, DiscoveryDocument, DiscoveryError, RefreshPolicy};
pub use jwt::{JwtValidator, ValidationFailure, ValidationOutcome};
pub use verifier::{JsonWebTokenVerifier, JwtVerifier, SignatureAlgorithm, VerifyError};
