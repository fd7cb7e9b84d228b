//! Route dispatch tests.
//!
//! Drives the real router in-process with `tower::ServiceExt::oneshot`.

// Test code is allowed to use expect/unwrap for assertions
#![allow(clippy::unwrap_used, clippy::expect_used)]

use anyhow::Result;
use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use rg_test_utils::{metrics_handle, primary_key, test_vars, MockIdentityProvider, TestTokenBuilder};
use route_guard::config::Config;
use route_guard::routes::{build_routes, AppState};
use std::sync::Arc;
use tower::ServiceExt;

async fn app() -> (MockIdentityProvider, Router) {
    let idp = MockIdentityProvider::start(&[primary_key()]).await;
    let config = Config::from_vars(&test_vars(&idp.discovery_url())).unwrap();
    let router = build_routes(Arc::new(AppState::from_config(&config)), metrics_handle());
    (idp, router)
}

async fn send(
    router: Router,
    method: Method,
    uri: &str,
    authorization: Option<&str>,
) -> Result<(StatusCode, String)> {
    let mut request = Request::builder().method(method).uri(uri);
    if let Some(value) = authorization {
        request = request.header(header::AUTHORIZATION, value);
    }
    let response = router.oneshot(request.body(Body::empty())?).await?;
    let status = response.status();
    let body = response.into_body().collect().await?.to_bytes();
    Ok((status, String::from_utf8(body.to_vec())?))
}

#[tokio::test]
async fn test_anonymous_route() -> Result<()> {
    let (_idp, router) = app().await;

    for uri in ["/api/anonymous", "/api/Anonymous", "/api/ANONYMOUS"] {
        let (status, body) = send(router.clone(), Method::GET, uri, None).await?;
        assert_eq!(status, StatusCode::OK, "{uri}");
        assert_eq!(body, "anonymous", "{uri}");
    }
    Ok(())
}

#[tokio::test]
async fn test_anonymous_route_ignores_authorization() -> Result<()> {
    let (_idp, router) = app().await;

    let (status, body) = send(router, Method::GET, "/api/anonymous", Some("Basic abc123")).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "anonymous");
    Ok(())
}

#[tokio::test]
async fn test_unrecognized_route_is_echoed_verbatim() -> Result<()> {
    let (_idp, router) = app().await;

    for (uri, expected) in [
        ("/api/foo", "foo"),
        ("/api/FooBar", "FooBar"),
        ("/api/hello%20world", "hello world"),
    ] {
        let (status, body) = send(router.clone(), Method::GET, uri, None).await?;
        assert_eq!(status, StatusCode::OK, "{uri}");
        assert_eq!(body, expected, "{uri}");
    }
    Ok(())
}

#[tokio::test]
async fn test_post_dispatches_like_get() -> Result<()> {
    let (_idp, router) = app().await;

    let (status, body) = send(router.clone(), Method::POST, "/api/anonymous", None).await?;
    assert_eq!((status, body.as_str()), (StatusCode::OK, "anonymous"));

    let (status, body) = send(router, Method::POST, "/api/foo", None).await?;
    assert_eq!((status, body.as_str()), (StatusCode::OK, "foo"));
    Ok(())
}

#[tokio::test]
async fn test_authenticated_route_is_case_insensitive() -> Result<()> {
    let (_idp, router) = app().await;
    let token = TestTokenBuilder::new()
        .with_name("Case Tester")
        .sign_with(&primary_key())?;
    let bearer = format!("Bearer {token}");

    for uri in [
        "/api/authenticated",
        "/api/Authenticated",
        "/api/AUTHENTICATED",
    ] {
        let (status, body) = send(router.clone(), Method::GET, uri, Some(&bearer)).await?;
        assert_eq!(status, StatusCode::OK, "{uri}");
        assert_eq!(body, "Case Tester", "{uri}");
    }
    Ok(())
}

#[tokio::test]
async fn test_authenticated_route_without_token() -> Result<()> {
    let (_idp, router) = app().await;

    for authorization in [None, Some("Basic abc123")] {
        let response = router
            .clone()
            .oneshot({
                let mut request = Request::builder().uri("/api/AUTHENTICATED");
                if let Some(value) = authorization {
                    request = request.header(header::AUTHORIZATION, value);
                }
                request.body(Body::empty())?
            })
            .await?;

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            response.headers().get(header::WWW_AUTHENTICATE).unwrap(),
            "Bearer"
        );
        let body = response.into_body().collect().await?.to_bytes();
        assert!(body.is_empty());
    }
    Ok(())
}

#[tokio::test]
async fn test_unsupported_method_and_paths() -> Result<()> {
    let (_idp, router) = app().await;

    let (status, _) = send(router.clone(), Method::PUT, "/api/anonymous", None).await?;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);

    let (status, _) = send(router.clone(), Method::GET, "/api/", None).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(router, Method::GET, "/api/a/b", None).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    Ok(())
}
