mod common;

use std::sync::Arc;
use std::time::Duration;

use axum::http::{Method, StatusCode};
use common::{TestApp, ORDER_READ};
use gemstore_api::{
    auth::{AuthConfig, AuthService},
    cache::InMemoryCache,
};

#[tokio::test]
async fn logout_revokes_the_presented_token() {
    let app = TestApp::new().await;
    let token = app.token_with(&[ORDER_READ]).await;

    let (status, _) = app
        .send(Method::GET, "/api/order?admin=true", None, Some(&token))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app
        .send(Method::POST, "/api/auth/logout", None, Some(&token))
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["message"], "Successfully logged out");

    let (status, body) = app
        .send(Method::GET, "/api/order?admin=true", None, Some(&token))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "AUTH_REVOKED_TOKEN");
}

#[tokio::test]
async fn logout_without_a_token_is_unauthorized() {
    let app = TestApp::new().await;
    let (status, body) = app.send(Method::POST, "/api/auth/logout", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn garbage_tokens_are_rejected() {
    let app = TestApp::new().await;
    let (status, body) = app
        .send(
            Method::GET,
            "/api/coupon",
            None,
            Some("definitely.not.a-jwt"),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "AUTH_INVALID_TOKEN");
}

#[tokio::test]
async fn tokens_signed_with_another_secret_are_rejected() {
    let app = TestApp::new().await;
    let impostor = AuthService::new(
        AuthConfig::new(
            "an-entirely-different-secret-value-used-only-by-this-impostor-test".into(),
            app.state.config.auth_audience.clone(),
            app.state.config.auth_issuer.clone(),
            Duration::from_secs(600),
        ),
        Arc::new(InMemoryCache::new()),
    );
    let forged = impostor
        .issue_token("intruder", vec!["admin".into()], vec![])
        .await
        .unwrap();

    let (status, body) = app
        .send(Method::GET, "/api/coupon", None, Some(&forged.access_token))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "AUTH_INVALID_TOKEN");
}

#[tokio::test]
async fn tokens_without_a_live_session_are_rejected() {
    let app = TestApp::new().await;
    // same secret, but the session was registered in a cache the server never sees
    let detached = AuthService::new(
        AuthConfig::from(&app.state.config),
        Arc::new(InMemoryCache::new()),
    );
    let token = detached
        .issue_token("cli-user", vec!["admin".into()], vec![])
        .await
        .unwrap();

    let (status, body) = app
        .send(Method::GET, "/api/coupon", None, Some(&token.access_token))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "AUTH_REVOKED_TOKEN");
}

#[tokio::test]
async fn admin_role_passes_every_permission_check() {
    let app = TestApp::new().await;
    for uri in ["/api/coupon", "/api/order?admin=true"] {
        let (status, body) = app
            .send(Method::GET, uri, None, Some(app.admin_token()))
            .await;
        assert_eq!(status, StatusCode::OK, "{uri}: {body}");
    }
}

#[tokio::test]
async fn health_reports_database_and_cache() {
    let app = TestApp::new().await;
    let response = app.request(Method::GET, "/health", None, None).await;
    assert!(response.headers().contains_key("x-request-id"));

    let (status, body) = app.send(Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "healthy");
    assert_eq!(body["data"]["checks"]["database"], "healthy");
    assert_eq!(body["data"]["checks"]["cache"], "healthy");
}

#[tokio::test]
async fn openapi_document_is_served() {
    let app = TestApp::new().await;
    let (status, body) = app
        .send(Method::GET, "/api-docs/openapi.json", None, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["info"]["title"], "Gemstore API");
    assert!(body["paths"].get("/api/order").is_some());
}
