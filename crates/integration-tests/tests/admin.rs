//! Integration tests for operator authentication and validation on `/admin`.
//!
//! Only paths that reject before touching the database are covered here.

mod common;

use axum::{body::Body, http::StatusCode};
use common::{ADMIN_TOKEN, json_body, relaxed_ip_security, request, send, state, with_peer};
use dropship_api::routes;

fn app() -> axum::Router {
    routes::app(state(common::config(relaxed_ip_security())))
}

fn admin_request(method: &str, uri: &str, token: Option<&str>, body: &str) -> axum::http::Request<Body> {
    let mut builder = request(method, uri).header("content-type", "application/json");
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    with_peer(builder.body(Body::from(body.to_owned())).unwrap())
}

#[tokio::test]
async fn test_missing_token_is_unauthorized() {
    let response = send(&app(), admin_request("GET", "/admin/ip-blocks", None, "")).await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = json_body(response).await;
    assert_eq!(body["error"], "Unauthorized: admin token required");
}

#[tokio::test]
async fn test_wrong_token_is_unauthorized() {
    let response = send(
        &app(),
        admin_request("GET", "/admin/api-keys", Some("definitely-not-the-token"), ""),
    )
    .await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_out_of_range_rates_are_unprocessable() {
    let body = r#"{"dropshipper":"150","sub_dropshipper":"7","sub_sub_dropshipper":"5"}"#;

    let response = send(
        &app(),
        admin_request("PUT", "/admin/settings/commission-rates", Some(ADMIN_TOKEN), body),
    )
    .await;

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_block_without_reason_is_bad_request() {
    let body = r#"{"ip":"198.51.100.9","reason":"  "}"#;

    let response = send(
        &app(),
        admin_request("POST", "/admin/ip-blocks", Some(ADMIN_TOKEN), body),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_zero_duration_block_is_bad_request() {
    let body = r#"{"ip":"198.51.100.9","reason":"abuse","duration_secs":0}"#;

    let response = send(
        &app(),
        admin_request("POST", "/admin/ip-blocks", Some(ADMIN_TOKEN), body),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_admin_failures_count_toward_ip_block() {
    let ip_security = dropship_api::config::IpSecurityConfig {
        max_failed_attempts: 2,
        ..relaxed_ip_security()
    };
    let app = routes::app(state(common::config(ip_security)));

    for _ in 0..2 {
        let response = send(&app, admin_request("GET", "/admin/ip-blocks", Some("wrong"), "")).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    let response = send(&app, admin_request("GET", "/admin/ip-blocks", Some(ADMIN_TOKEN), "")).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}
