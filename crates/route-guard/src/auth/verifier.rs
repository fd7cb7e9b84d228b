//! Signature verification capability.
//!
//! The validator only needs "check this token's signature with this key and
//! hand back the payload". [`JwtVerifier`] is that seam; the production
//! implementation is backed by `jsonwebtoken`.

use crate::auth::discovery::{KeyMaterial, SigningKey};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde_json::{Map, Value};
use std::collections::HashSet;
use thiserror::Error;

/// Signature algorithms accepted for access tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureAlgorithm {
    Rs256,
    Rs384,
    Rs512,
    Ps256,
    Ps384,
    Ps512,
}

impl SignatureAlgorithm {
    /// Parse a JOSE `alg` name. Returns `None` for anything outside the
    /// RSA family, including `none` and HMAC algorithms.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "RS256" => Some(Self::Rs256),
            "RS384" => Some(Self::Rs384),
            "RS512" => Some(Self::Rs512),
            "PS256" => Some(Self::Ps256),
            "PS384" => Some(Self::Ps384),
            "PS512" => Some(Self::Ps512),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Rs256 => "RS256",
            Self::Rs384 => "RS384",
            Self::Rs512 => "RS512",
            Self::Ps256 => "PS256",
            Self::Ps384 => "PS384",
            Self::Ps512 => "PS512",
        }
    }
}

/// Errors from signature verification.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum VerifyError {
    #[error("Token structure or payload is malformed")]
    Malformed,

    #[error("Token signature is invalid")]
    BadSignature,

    #[error("Signing key is unusable: {0}")]
    InvalidKey(String),

    #[error("Cryptographic failure: {0}")]
    Crypto(String),
}

/// Verifies a compact JWT's signature and returns its payload claims.
///
/// Implementations check the signature only; lifetime, issuer and audience
/// are the validator's job.
pub trait JwtVerifier: Send + Sync {
    fn verify(
        &self,
        token: &str,
        algorithm: SignatureAlgorithm,
        key: &SigningKey,
    ) -> Result<Map<String, Value>, VerifyError>;
}

/// [`JwtVerifier`] backed by the `jsonwebtoken` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonWebTokenVerifier;

impl JwtVerifier for JsonWebTokenVerifier {
    fn verify(
        &self,
        token: &str,
        algorithm: SignatureAlgorithm,
        key: &SigningKey,
    ) -> Result<Map<String, Value>, VerifyError> {
        let KeyMaterial::Rsa { n, e } = &key.material;
        let decoding_key = DecodingKey::from_rsa_components(n, e)
            .map_err(|err| VerifyError::InvalidKey(err.to_string()))?;

        // Signature only; claims are checked by the validator.
        let mut validation = Validation::new(to_jsonwebtoken(algorithm));
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.validate_aud = false;
        validation.required_spec_claims = HashSet::new();

        decode::<Map<String, Value>>(token, &decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|err| match err.kind() {
                ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => {
                    VerifyError::BadSignature
                }
                ErrorKind::InvalidToken
                | ErrorKind::Base64(_)
                | ErrorKind::Json(_)
                | ErrorKind::Utf8(_) => VerifyError::Malformed,
                ErrorKind::InvalidRsaKey(_) | ErrorKind::InvalidKeyFormat => {
                    VerifyError::InvalidKey(err.to_string())
                }
                _ => VerifyError::Crypto(err.to_string()),
            })
    }
}

fn to_jsonwebtoken(algorithm: SignatureAlgorithm) -> Algorithm {
    match algorithm {
        SignatureAlgorithm::Rs256 => Algorithm::RS256,
        SignatureAlgorithm::Rs384 => Algorithm::RS384,
        SignatureAlgorithm::Rs512 => Algorithm::RS512,
        SignatureAlgorithm::Ps256 => Algorithm::PS256,
        SignatureAlgorithm::Ps384 => Algorithm::PS384,
        SignatureAlgorithm::Ps512 => Algorithm::PS512,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use rg_test_utils::crypto_fixtures::{primary_key, secondary_key};
    use serde_json::json;

    fn signing_key(n: &str, e: &str) -> SigningKey {
        SigningKey {
            kid: "test".to_string(),
            algorithm: None,
            material: KeyMaterial::Rsa {
                n: n.to_string(),
                e: e.to_string(),
            },
        }
    }

    #[test]
    fn test_algorithm_names() {
        for name in ["RS256", "RS384", "RS512", "PS256", "PS384", "PS512"] {
            assert_eq!(SignatureAlgorithm::from_name(name).unwrap().name(), name);
        }
        for name in ["none", "HS256", "ES256", "EdDSA", "rs256", ""] {
            assert!(SignatureAlgorithm::from_name(name).is_none(), "{name}");
        }
    }

    #[test]
    fn test_verifies_signature_and_returns_claims() {
        let key = primary_key();
        let token = key
            .sign(jsonwebtoken::Algorithm::RS256, &json!({"sub": "user", "exp": 1}))
            .unwrap();

        let claims = JsonWebTokenVerifier
            .verify(&token, SignatureAlgorithm::Rs256, &signing_key(key.n, key.e))
            .unwrap();

        assert_eq!(claims.get("sub"), Some(&json!("user")));
        assert_eq!(claims.get("exp"), Some(&json!(1)));
    }

    #[test]
    fn test_ps256_signature() {
        let key = primary_key();
        let token = key
            .sign(jsonwebtoken::Algorithm::PS256, &json!({"sub": "user"}))
            .unwrap();

        assert!(JsonWebTokenVerifier
            .verify(&token, SignatureAlgorithm::Ps256, &signing_key(key.n, key.e))
            .is_ok());
    }

    #[test]
    fn test_wrong_key_is_bad_signature() {
        let token = primary_key()
            .sign(jsonwebtoken::Algorithm::RS256, &json!({"sub": "user"}))
            .unwrap();
        let other = secondary_key();

        let result =
            JsonWebTokenVerifier.verify(&token, SignatureAlgorithm::Rs256, &signing_key(other.n, other.e));
        assert_eq!(result, Err(VerifyError::BadSignature));
    }

    #[test]
    fn test_algorithm_mismatch_is_bad_signature() {
        let key = primary_key();
        let token = key
            .sign(jsonwebtoken::Algorithm::RS256, &json!({"sub": "user"}))
            .unwrap();

        let result =
            JsonWebTokenVerifier.verify(&token, SignatureAlgorithm::Rs512, &signing_key(key.n, key.e));
        assert_eq!(result, Err(VerifyError::BadSignature));
    }

    #[test]
    fn test_tampered_signature_is_rejected() {
        let key = primary_key();
        let token = key
            .sign(jsonwebtoken::Algorithm::RS256, &json!({"sub": "user"}))
            .unwrap();
        let (head, _) = token.rsplit_once('.').unwrap();
        let tampered = format!("{head}.AAAA");

        let result =
            JsonWebTokenVerifier.verify(&tampered, SignatureAlgorithm::Rs256, &signing_key(key.n, key.e));
        assert_eq!(result, Err(VerifyError::BadSignature));
    }

    #[test]
    fn test_garbage_token_is_malformed() {
        let key = primary_key();
        let result = JsonWebTokenVerifier.verify(
            "not-a-jwt",
            SignatureAlgorithm::Rs256,
            &signing_key(key.n, key.e),
        );
        assert_eq!(result, Err(VerifyError::Malformed));
    }
}
