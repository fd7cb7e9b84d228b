//! Validated JWT claim set.
//!
//! A [`ClaimSet`] is only constructed by the validator after signature,
//! issuer and audience checks have passed. Claim values identify a user, so
//! the `Debug` implementation prints claim names only.

use serde_json::{Map, Value};
use std::fmt;

/// Claims from a validated token, keyed by claim name.
#[derive(Clone, PartialEq)]
pub struct ClaimSet(Map<String, Value>);

/// Custom Debug implementation that lists claim names without values.
impl fmt::Debug for ClaimSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClaimSet")
            .field("claims", &self.0.keys().collect::<Vec<_>>())
            .field("values", &"[REDACTED]")
            .finish()
    }
}

impl ClaimSet {
    pub(crate) fn new(claims: Map<String, Value>) -> Self {
        Self(claims)
    }

    /// Raw claim value by name.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    fn get_str(&self, name: &str) -> Option<&str> {
        self.0.get(name).and_then(Value::as_str)
    }

    /// NumericDate claims may be sent as floats; fractions are truncated.
    fn get_i64(&self, name: &str) -> Option<i64> {
        let value = self.0.get(name)?;
        value
            .as_i64()
            .or_else(|| value.as_f64().map(|secs| secs as i64))
    }

    /// Subject (`sub`).
    pub fn subject(&self) -> Option<&str> {
        self.get_str("sub")
    }

    /// Name shown to callers: `name`, then `unique_name`, then `sub`.
    pub fn display_name(&self) -> Option<&str> {
        ["name", "unique_name", "sub"]
            .into_iter()
            .find_map(|claim| self.get_str(claim).filter(|v| !v.is_empty()))
    }

    /// Issuer (`iss`).
    pub fn issuer(&self) -> Option<&str> {
        self.get_str("iss")
    }

    /// Audiences. `aud` may be a single string or an array of strings.
    pub fn audiences(&self) -> Vec<&str> {
        match self.0.get("aud") {
            Some(Value::String(aud)) => vec![aud.as_str()],
            Some(Value::Array(values)) => values.iter().filter_map(Value::as_str).collect(),
            _ => Vec::new(),
        }
    }

    /// Expiry (`exp`) as Unix seconds.
    pub fn expires_at(&self) -> Option<i64> {
        self.get_i64("exp")
    }

    /// Not-before (`nbf`) as Unix seconds.
    pub fn not_before(&self) -> Option<i64> {
        self.get_i64("nbf")
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn claims(value: Value) -> ClaimSet {
        ClaimSet::new(value.as_object().cloned().unwrap())
    }

    #[test]
    fn test_debug_hides_claim_values() {
        let set = claims(json!({
            "sub": "secret-user-id",
            "name": "Alice Example",
            "iss": "https://login.microsoftonline.com/contoso/v2.0",
        }));

        let debug_str = format!("{:?}", set);

        assert!(debug_str.contains("sub"), "claim names are listed");
        assert!(debug_str.contains("[REDACTED]"));
        assert!(!debug_str.contains("secret-user-id"));
        assert!(!debug_str.contains("Alice"));
        assert!(!debug_str.contains("contoso"));
    }

    #[test]
    fn test_display_name_precedence() {
        let set = claims(json!({"sub": "s", "unique_name": "u", "name": "n"}));
        assert_eq!(set.display_name(), Some("n"));

        let set = claims(json!({"sub": "s", "unique_name": "u"}));
        assert_eq!(set.display_name(), Some("u"));

        let set = claims(json!({"sub": "s", "name": ""}));
        assert_eq!(set.display_name(), Some("s"));

        let set = claims(json!({"iss": "x"}));
        assert_eq!(set.display_name(), None);
    }

    #[test]
    fn test_audiences_string_or_array() {
        assert_eq!(claims(json!({"aud": "api"})).audiences(), vec!["api"]);
        assert_eq!(
            claims(json!({"aud": ["a", 7, "b"]})).audiences(),
            vec!["a", "b"]
        );
        assert!(claims(json!({"aud": 42})).audiences().is_empty());
        assert!(claims(json!({})).audiences().is_empty());
    }

    #[test]
    fn test_time_accessors() {
        let set = claims(json!({"exp": 1_700_000_000, "nbf": 1_699_999_000, "iss": "i", "sub": "s"}));

        assert_eq!(set.expires_at(), Some(1_700_000_000));
        assert_eq!(set.not_before(), Some(1_699_999_000));
        assert_eq!(set.issuer(), Some("i"));
        assert_eq!(set.subject(), Some("s"));
        assert!(set.get("missing").is_none());
    }

    #[test]
    fn test_float_numeric_dates_are_truncated() {
        let set = claims(json!({"exp": 1_700_000_000.75, "nbf": "soon"}));

        assert_eq!(set.expires_at(), Some(1_700_000_000));
        assert_eq!(set.not_before(), None);
    }
}
