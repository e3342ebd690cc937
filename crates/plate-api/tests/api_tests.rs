//! API Integration Tests
//!
//! Drive the full router with in-memory account and revocation stores.

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use plate_api::create_router;
use plate_api::testing::{test_config, test_state, InMemoryAccountRepository};
use plate_core::{AppConfig, Role};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

const EMAIL: &str = "manajer@example.com";
const PASSWORD: &str = "Bakso#Urat7";

/// Helper to create a test request
fn create_json_request(method: &str, uri: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("Content-Type", "application/json");

    match body {
        Some(json_body) => builder
            .body(Body::from(serde_json::to_string(&json_body).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

fn session_request(method: &str, uri: &str, access: &str, refresh: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("Authorization", format!("Bearer {access}"))
        .header("RF-Token", refresh)
        .body(Body::empty())
        .unwrap()
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).unwrap()
    };
    (status, json)
}

async fn setup() -> (Router, Arc<InMemoryAccountRepository>) {
    setup_with(test_config()).await
}

async fn setup_with(config: AppConfig) -> (Router, Arc<InMemoryAccountRepository>) {
    let (state, accounts, _) = test_state(config);
    accounts.seed(EMAIL, PASSWORD, Role::Admin).await;
    (create_router(state), accounts)
}

async fn login(app: &Router) -> (String, String) {
    let (status, json) = send(
        app,
        create_json_request(
            "POST",
            "/api/v1/auth/login",
            Some(json!({ "email": EMAIL, "password": PASSWORD })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    (
        json["access_token"].as_str().unwrap().to_string(),
        json["refresh_token"].as_str().unwrap().to_string(),
    )
}

// =============================================================================
// Health Check Tests
// =============================================================================

#[tokio::test]
async fn test_health_check() {
    let (app, _) = setup().await;

    let (status, json) = send(
        &app,
        Request::builder().uri("/health").body(Body::empty()).unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
    assert!(json["version"].is_string());
}

#[tokio::test]
async fn test_readiness_check() {
    let (app, _) = setup().await;

    let (status, json) = send(
        &app,
        Request::builder().uri("/ready").body(Body::empty()).unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["ready"], true);
    assert_eq!(json["checks"]["revocation_backend"], "memory");
}

#[tokio::test]
async fn test_openapi_document() {
    let (app, _) = setup().await;

    let (status, json) = send(
        &app,
        Request::builder()
            .uri("/api-docs/openapi.json")
            .body(Body::empty())
            .unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert!(json["paths"]["/api/v1/auth/login"].is_object());
    assert!(json["components"]["securitySchemes"]["bearer_auth"].is_object());
    assert_eq!(
        json["components"]["securitySchemes"]["refresh_token"]["name"],
        "RF-Token"
    );
}

// =============================================================================
// Login Tests
// =============================================================================

#[tokio::test]
async fn test_login_success() {
    let (app, _) = setup().await;

    let (status, json) = send(
        &app,
        create_json_request(
            "POST",
            "/api/v1/auth/login",
            Some(json!({ "email": EMAIL, "password": PASSWORD })),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["account"]["email"], EMAIL);
    assert_eq!(json["account"]["role"], "admin");
    assert!(json["account"].get("password").is_none());
    assert!(json["access_token"].is_string());
    assert!(json["refresh_token"].is_string());
}

#[tokio::test]
async fn test_login_wrong_password() {
    let (app, _) = setup().await;

    let (status, json) = send(
        &app,
        create_json_request(
            "POST",
            "/api/v1/auth/login",
            Some(json!({ "email": EMAIL, "password": "Salah#Kata1" })),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["code"], "INVALID_CREDENTIALS");
}

#[tokio::test]
async fn test_login_unknown_email_looks_the_same() {
    let (app, _) = setup().await;

    let (status, json) = send(
        &app,
        create_json_request(
            "POST",
            "/api/v1/auth/login",
            Some(json!({ "email": "ghost@example.com", "password": PASSWORD })),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["code"], "INVALID_CREDENTIALS");
}

#[tokio::test]
async fn test_login_invalid_body() {
    let (app, _) = setup().await;

    let (status, json) = send(
        &app,
        create_json_request("POST", "/api/v1/auth/login", Some(json!({ "email": EMAIL }))),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "INVALID_ARGUMENT");

    let (status, _) = send(
        &app,
        create_json_request(
            "POST",
            "/api/v1/auth/login",
            Some(json!({ "email": "not-an-email", "password": PASSWORD })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// =============================================================================
// Logout / Refresh Tests
// =============================================================================

#[tokio::test]
async fn test_logout_then_reuse_is_rejected() {
    let (app, _) = setup().await;
    let (access, refresh) = login(&app).await;

    let me = || {
        Request::builder()
            .uri("/api/v1/accounts/me")
            .header("Authorization", format!("Bearer {access}"))
            .body(Body::empty())
            .unwrap()
    };

    let (status, _) = send(&app, me()).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(
        &app,
        session_request("POST", "/api/v1/auth/logout", &access, &refresh),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, json) = send(&app, me()).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["code"], "UNAUTHENTICATED");

    // refresh token is revoked too
    let (status, _) = send(
        &app,
        session_request("POST", "/api/v1/auth/refresh", &access, &refresh),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_login_after_logout_works() {
    let (app, _) = setup().await;
    let (access, refresh) = login(&app).await;

    let (status, _) = send(
        &app,
        session_request("POST", "/api/v1/auth/logout", &access, &refresh),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (access, refresh) = login(&app).await;
    let (status, _) = send(
        &app,
        session_request("POST", "/api/v1/auth/refresh", &access, &refresh),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_logout_requires_refresh_header() {
    let (app, _) = setup().await;
    let (access, _) = login(&app).await;

    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/auth/logout")
        .header("Authorization", format!("Bearer {access}"))
        .body(Body::empty())
        .unwrap();

    let (status, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_refresh_issues_new_access_token() {
    let (app, accounts) = setup().await;
    let (access, refresh) = login(&app).await;

    let account_id = {
        let (_, json) = send(
            &app,
            Request::builder()
                .uri("/api/v1/accounts/me")
                .header("Authorization", format!("Bearer {access}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        json["id"].as_str().unwrap().parse().unwrap()
    };
    accounts.set_role(account_id, Role::Superadmin).await;

    let (status, json) = send(
        &app,
        session_request("POST", "/api/v1/auth/refresh", &access, &refresh),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["refresh_token"], refresh.as_str());
    assert_ne!(json["access_token"], access.as_str());
    assert_eq!(json["account"]["role"], "superadmin");
}

#[tokio::test]
async fn test_refresh_with_expired_access_token() {
    let mut config = test_config();
    config.auth.access.ttl_secs = -1;
    let (app, _) = setup_with(config).await;
    let (access, refresh) = login(&app).await;

    let (status, _) = send(
        &app,
        Request::builder()
            .uri("/api/v1/accounts/me")
            .header("Authorization", format!("Bearer {access}"))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, json) = send(
        &app,
        session_request("POST", "/api/v1/auth/refresh", &access, &refresh),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["refresh_token"], refresh.as_str());
}

#[tokio::test]
async fn test_custom_refresh_header() {
    let mut config = test_config();
    config.auth.refresh_header = "X-Refresh-Token".to_string();
    let (app, _) = setup_with(config).await;
    let (access, refresh) = login(&app).await;

    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/auth/refresh")
        .header("Authorization", format!("Bearer {access}"))
        .header("X-Refresh-Token", refresh)
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);

    let (_, doc) = send(
        &app,
        Request::builder()
            .uri("/api-docs/openapi.json")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(
        doc["components"]["securitySchemes"]["refresh_token"]["name"],
        "X-Refresh-Token"
    );
}

#[tokio::test]
async fn test_refresh_rejects_tokens_of_different_accounts() {
    let (app, accounts) = setup().await;
    accounts
        .seed("kedua@example.com", PASSWORD, Role::User)
        .await;

    let (access, _) = login(&app).await;
    let (_, json) = send(
        &app,
        create_json_request(
            "POST",
            "/api/v1/auth/login",
            Some(json!({ "email": "kedua@example.com", "password": PASSWORD })),
        ),
    )
    .await;
    let other_refresh = json["refresh_token"].as_str().unwrap().to_string();

    let (status, _) = send(
        &app,
        session_request("POST", "/api/v1/auth/refresh", &access, &other_refresh),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

// =============================================================================
// Account Tests
// =============================================================================

#[tokio::test]
async fn test_register_and_login() {
    let (app, _) = setup().await;

    let (status, json) = send(
        &app,
        create_json_request(
            "POST",
            "/api/v1/accounts/register",
            Some(json!({
                "firstname": "Sari",
                "lastname": "Wulandari",
                "email": "sari@example.com",
                "password": "Gado#Gado88",
                "phone": "+6285712345678"
            })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["role"], "user");

    let (status, _) = send(
        &app,
        create_json_request(
            "POST",
            "/api/v1/auth/login",
            Some(json!({ "email": "sari@example.com", "password": "Gado#Gado88" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_register_duplicate_email() {
    let (app, _) = setup().await;

    let (status, json) = send(
        &app,
        create_json_request(
            "POST",
            "/api/v1/accounts/register",
            Some(json!({
                "firstname": "Dup",
                "lastname": "Licate",
                "email": EMAIL,
                "password": "Gado#Gado88",
                "phone": "+6285712345678"
            })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["code"], "ALREADY_EXISTS");
}

#[tokio::test]
async fn test_change_password() {
    let (app, _) = setup().await;
    let (access, _) = login(&app).await;

    let request = Request::builder()
        .method("PUT")
        .uri("/api/v1/accounts/change-password")
        .header("Authorization", format!("Bearer {access}"))
        .header("Content-Type", "application/json")
        .body(Body::from(
            json!({ "old_password": PASSWORD, "new_password": "Soto#Betawi5" }).to_string(),
        ))
        .unwrap();
    let (status, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(
        &app,
        create_json_request(
            "POST",
            "/api/v1/auth/login",
            Some(json!({ "email": EMAIL, "password": "Soto#Betawi5" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_me_requires_authentication() {
    let (app, _) = setup().await;

    let (status, _) = send(
        &app,
        Request::builder()
            .uri("/api/v1/accounts/me")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
