//! Integration tests for the IP guard: rate limiting and automatic blocks.

mod common;

use std::num::NonZeroU32;

use axum::{body::Body, http::StatusCode};
use common::{request, send, state, with_peer};
use dropship_api::config::IpSecurityConfig;
use dropship_api::routes;

fn unsigned_me() -> axum::http::Request<Body> {
    with_peer(request("GET", "/api/v1/me").body(Body::empty()).unwrap())
}

#[tokio::test]
async fn test_rate_limit_returns_429_with_retry_after() {
    let ip_security = IpSecurityConfig {
        rate_limit_per_minute: NonZeroU32::new(1).unwrap(),
        rate_limit_burst: NonZeroU32::new(2).unwrap(),
        max_failed_attempts: 1000,
        ..IpSecurityConfig::default()
    };
    let app = routes::app(state(common::config(ip_security)));

    assert_eq!(send(&app, unsigned_me()).await.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(send(&app, unsigned_me()).await.status(), StatusCode::UNAUTHORIZED);

    let limited = send(&app, unsigned_me()).await;
    assert_eq!(limited.status(), StatusCode::TOO_MANY_REQUESTS);
    let retry_after: u64 = limited.headers()["retry-after"].to_str().unwrap().parse().unwrap();
    assert!(retry_after >= 1);
}

#[tokio::test]
async fn test_repeated_auth_failures_block_the_ip() {
    let ip_security = IpSecurityConfig {
        max_failed_attempts: 3,
        ..common::relaxed_ip_security()
    };
    let app = routes::app(state(common::config(ip_security)));

    for _ in 0..3 {
        assert_eq!(send(&app, unsigned_me()).await.status(), StatusCode::UNAUTHORIZED);
    }

    let blocked = send(&app, unsigned_me()).await;
    assert_eq!(blocked.status(), StatusCode::FORBIDDEN);

    // The block covers the admin API too.
    let admin = send(
        &app,
        with_peer(request("GET", "/admin/ip-blocks").body(Body::empty()).unwrap()),
    )
    .await;
    assert_eq!(admin.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_health_is_outside_the_ip_guard() {
    let ip_security = IpSecurityConfig {
        max_failed_attempts: 1,
        ..common::relaxed_ip_security()
    };
    let app = routes::app(state(common::config(ip_security)));

    assert_eq!(send(&app, unsigned_me()).await.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(send(&app, unsigned_me()).await.status(), StatusCode::FORBIDDEN);

    let health = send(
        &app,
        with_peer(request("GET", "/health").body(Body::empty()).unwrap()),
    )
    .await;
    assert_eq!(health.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_missing_peer_address_is_bad_request() {
    let app = routes::app(state(common::config(common::relaxed_ip_security())));

    let response = send(&app, request("GET", "/api/v1/me").body(Body::empty()).unwrap()).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
