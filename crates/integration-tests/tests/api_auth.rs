//! Integration tests for signed-request authentication on `/api/v1`.

mod common;

use axum::{body::Body, http::StatusCode};
use chrono::{Duration, Utc};
use dropship_api::middleware::hmac_auth::MAX_SIGNED_BODY_BYTES;
use common::{
    API_KEY, API_SECRET, app_with_key, json_body, key_record, relaxed_ip_security, request, send,
    signed, state, with_peer,
};

fn app_state() -> dropship_api::state::AppState {
    state(common::config(relaxed_ip_security()))
}

// =============================================================================
// Health
// =============================================================================

#[tokio::test]
async fn test_health_needs_no_auth() {
    let app = dropship_api::routes::app(app_state());

    let response = send(&app, request("GET", "/health").body(Body::empty()).unwrap()).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));
}

// =============================================================================
// Header Checks
// =============================================================================

#[tokio::test]
async fn test_missing_api_key_is_unauthorized() {
    let app = app_with_key(app_state(), key_record(vec![], None)).await;

    let response = send(
        &app,
        with_peer(request("GET", "/api/v1/me").body(Body::empty()).unwrap()),
    )
    .await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = json_body(response).await;
    assert!(body["error"].as_str().unwrap().contains("X-Api-Key"));
}

#[tokio::test]
async fn test_signature_without_timestamp_is_unauthorized() {
    let app = app_with_key(app_state(), key_record(vec![], None)).await;

    let response = send(
        &app,
        with_peer(
            request("GET", "/api/v1/me")
                .header("x-api-key", API_KEY)
                .header("x-signature", "00")
                .body(Body::empty())
                .unwrap(),
        ),
    )
    .await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_secret_header_rejected_when_fallback_disabled() {
    let app = app_with_key(app_state(), key_record(vec![], None)).await;

    let response = send(
        &app,
        with_peer(
            request("GET", "/api/v1/me")
                .header("x-api-key", API_KEY)
                .header("x-api-secret", API_SECRET)
                .body(Body::empty())
                .unwrap(),
        ),
    )
    .await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_secret_header_accepted_when_fallback_enabled() {
    let mut config = common::config(relaxed_ip_security());
    config.auth.allow_secret_fallback = true;
    let app = app_with_key(state(config), key_record(vec![], None)).await;

    let response = send(
        &app,
        with_peer(
            request("GET", "/api/v1/me")
                .header("x-api-key", API_KEY)
                .header("x-api-secret", API_SECRET)
                .body(Body::empty())
                .unwrap(),
        ),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
}

// =============================================================================
// Signatures
// =============================================================================

#[tokio::test]
async fn test_valid_signature_authenticates() {
    let app = app_with_key(app_state(), key_record(vec![], None)).await;

    let response = send(&app, signed("GET", "/api/v1/me", "", Utc::now().timestamp())).await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["user_id"], 42);
    assert_eq!(body["api_key_id"], 7);
    assert_eq!(body["role"], "dropshipper");
}

#[tokio::test]
async fn test_stale_timestamp_is_rejected() {
    let app = app_with_key(app_state(), key_record(vec![], None)).await;
    let stale = Utc::now().timestamp() - 3600;

    let response = send(&app, signed("GET", "/api/v1/me", "", stale)).await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = json_body(response).await;
    assert!(body["error"].as_str().unwrap().contains("timestamp"));
}

#[tokio::test]
async fn test_tampered_path_is_rejected() {
    let app = app_with_key(app_state(), key_record(vec![], None)).await;
    let mut request = signed("GET", "/api/v1/me", "", Utc::now().timestamp());
    *request.uri_mut() = "/api/v1/wallet".parse().unwrap();

    let response = send(&app, request).await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_replayed_signature_is_rejected() {
    let app = app_with_key(app_state(), key_record(vec![], None)).await;
    let now = Utc::now().timestamp();

    let first = send(&app, signed("GET", "/api/v1/me", "", now)).await;
    let replay = send(&app, signed("GET", "/api/v1/me", "", now)).await;

    assert_eq!(first.status(), StatusCode::OK);
    assert_eq!(replay.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_unknown_key_is_rejected() {
    // Malformed keys never reach the database.
    let app = app_with_key(app_state(), key_record(vec![], None)).await;

    let response = send(
        &app,
        with_peer(
            request("GET", "/api/v1/me")
                .header("x-api-key", "not-a-key")
                .header("x-timestamp", Utc::now().timestamp().to_string())
                .header("x-signature", "00")
                .body(Body::empty())
                .unwrap(),
        ),
    )
    .await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

// =============================================================================
// Key State
// =============================================================================

#[tokio::test]
async fn test_revoked_key_is_rejected() {
    let mut record = key_record(vec![], None);
    record.status = dropship_core::ApiKeyStatus::Revoked;
    let app = app_with_key(app_state(), record).await;

    let response = send(&app, signed("GET", "/api/v1/me", "", Utc::now().timestamp())).await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_expired_key_is_rejected() {
    let record = key_record(vec![], Some(Utc::now() - Duration::minutes(1)));
    let app = app_with_key(app_state(), record).await;

    let response = send(&app, signed("GET", "/api/v1/me", "", Utc::now().timestamp())).await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_ip_allowlist_is_enforced() {
    let record = key_record(vec!["203.0.113.7".parse().unwrap()], None);
    let app = app_with_key(app_state(), record).await;

    let response = send(&app, signed("GET", "/api/v1/me", "", Utc::now().timestamp())).await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_ip_allowlist_admits_listed_address() {
    let record = key_record(vec!["10.0.0.5".parse().unwrap()], None);
    let app = app_with_key(app_state(), record).await;

    let response = send(&app, signed("GET", "/api/v1/me", "", Utc::now().timestamp())).await;

    assert_eq!(response.status(), StatusCode::OK);
}

// =============================================================================
// Request Validation
// =============================================================================

#[tokio::test]
async fn test_empty_order_is_unprocessable() {
    let app = app_with_key(app_state(), key_record(vec![], None)).await;
    let body = r#"{"customer_name":"A","customer_phone":"1","shipping_address":"X","items":[]}"#;

    let response = send(&app, signed("POST", "/api/v1/orders", body, Utc::now().timestamp())).await;

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_oversized_signed_body_is_rejected() {
    let app = app_with_key(app_state(), key_record(vec![], None)).await;
    let body = "x".repeat(MAX_SIGNED_BODY_BYTES + 1);

    let response = send(&app, signed("POST", "/api/v1/orders", &body, Utc::now().timestamp())).await;

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn test_body_at_limit_reaches_handler() {
    let app = app_with_key(app_state(), key_record(vec![], None)).await;
    let body = "x".repeat(MAX_SIGNED_BODY_BYTES);

    let response = send(&app, signed("POST", "/api/v1/orders", &body, Utc::now().timestamp())).await;

    // Authenticated; the handler rejects the body itself.
    assert_ne!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_ne!(response.status(), StatusCode::UNAUTHORIZED);
}
