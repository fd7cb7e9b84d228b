//! Secret types for protecting sensitive values from accidental logging.
//!
//! This module re-exports types from the [`secrecy`] crate. Bearer tokens are
//! credentials in their own right (whoever holds one can replay it), so they are
//! carried as [`SecretString`] from the moment they leave the `Authorization`
//! header until the validator needs the raw text.
//!
//! `SecretString` implements `Debug` with redaction, so any struct deriving
//! `Debug` that holds one gets safe logging behavior for free. Reading the value
//! requires an explicit `expose_secret()` call, which keeps every place that
//! touches raw token text greppable.
//!
//! # Example
//!
//! ```rust
//! use common::secret::{ExposeSecret, SecretString};
//!
//! #[derive(Debug)]
//! struct Presented {
//!     scheme: &'static str,
//!     credential: SecretString,
//! }
//!
//! let presented = Presented {
//!     scheme: "Bearer",
//!     credential: SecretString::from("eyJhbGciOi..."),
//! };
//!
//! // Safe: the credential is redacted
//! assert!(!format!("{presented:?}").contains("eyJ"));
//!
//! let raw: &str = presented.credential.expose_secret();
//! assert!(raw.starts_with("eyJ"));
//! ```

pub use secrecy::{ExposeSecret, SecretString};
