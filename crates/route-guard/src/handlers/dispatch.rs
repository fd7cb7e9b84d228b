//! Route dispatcher for `/api/{route}`.
//!
//! The route segment selects one of three behaviours:
//!
//! - `anonymous` - 200 with body `anonymous`, no token handling
//! - `authenticated` - bearer token validation; 200 with the caller's
//!   display name, or 401 with an empty body and a `Bearer` challenge
//! - anything else - 200 echoing the segment as received
//!
//! Matching is case-insensitive. The echo is not.

use crate::auth::bearer::{extract_bearer, BearerToken};
use crate::auth::claims::ClaimSet;
use crate::auth::jwt::{ValidationFailure, ValidationOutcome};
use crate::errors::ApiError;
use crate::routes::AppState;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use std::sync::Arc;
use tracing::instrument;

/// Which handler a route segment selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteKind<'a> {
    Anonymous,
    Authenticated,
    Unrecognized(&'a str),
}

impl<'a> RouteKind<'a> {
    pub fn parse(route: &'a str) -> Self {
        if route.eq_ignore_ascii_case("anonymous") {
            RouteKind::Anonymous
        } else if route.eq_ignore_ascii_case("authenticated") {
            RouteKind::Authenticated
        } else {
            RouteKind::Unrecognized(route)
        }
    }
}

/// Handler for GET and POST /api/{route}
#[instrument(skip_all, name = "rg.handlers.dispatch")]
pub async fn dispatch(
    State(state): State<Arc<AppState>>,
    Path(route): Path<String>,
    headers: HeaderMap,
) -> Response {
    match RouteKind::parse(&route) {
        RouteKind::Anonymous => {
            tracing::debug!(target: "rg.handlers.dispatch", "Anonymous route");
            "anonymous".into_response()
        }
        RouteKind::Authenticated => authenticated(&state, &headers).await.into_response(),
        RouteKind::Unrecognized(other) => {
            tracing::debug!(target: "rg.handlers.dispatch", "Unrecognized route, echoing");
            other.to_string().into_response()
        }
    }
}

async fn authenticated(state: &AppState, headers: &HeaderMap) -> Result<String, ApiError> {
    // A missing or non-Bearer header is validated as an empty token, which is
    // rejected as malformed and counted like any other failure.
    let token = extract_bearer(headers).unwrap_or_else(|| {
        tracing::debug!(target: "rg.handlers.dispatch", "No bearer token in Authorization header");
        BearerToken::empty()
    });

    match state.jwt_validator.validate(token.expose()).await {
        ValidationOutcome::Valid(claims) => Ok(display_name(&claims)),
        ValidationOutcome::Invalid(failure) => {
            if failure == ValidationFailure::FetchError {
                tracing::warn!(
                    target: "rg.handlers.dispatch",
                    "Rejecting request: identity provider metadata unavailable"
                );
            }
            Err(ApiError::Unauthorized)
        }
    }
}

/// The caller's display name, or an empty string when the token carries
/// none of `name`, `unique_name` or `sub`.
fn display_name(claims: &ClaimSet) -> String {
    match claims.display_name() {
        Some(name) => name.to_string(),
        None => {
            tracing::debug!(
                target: "rg.handlers.dispatch",
                "Valid token has no name, unique_name or sub claim; responding with empty body"
            );
            String::new()
        }
    }
}
