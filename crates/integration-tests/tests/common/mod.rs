//! Shared fixtures: an app wired to a lazy pool that never connects.
//!
//! Everything exercised here must be decided before the database is
//! touched. Background writes (IP logs, `last_used_at`) fail quietly.

#![allow(dead_code, clippy::unwrap_used)]

use std::net::{IpAddr, SocketAddr};
use std::num::NonZeroU32;
use std::time::Duration;

use axum::{
    Router,
    body::Body,
    extract::ConnectInfo,
    http::{Request, Response},
};
use chrono::{DateTime, Utc};
use dropship_api::config::{ApiConfig, AuthConfig, IpSecurityConfig};
use dropship_api::models::ApiKeyRecord;
use dropship_api::routes;
use dropship_api::state::AppState;
use dropship_core::signing::{self, SignedRequest};
use dropship_core::{ApiKeyId, ApiKeyStatus, DropshipperTier, UserId, UserRole};
use secrecy::SecretString;
use sqlx::postgres::PgPoolOptions;
use tower::ServiceExt;

pub const ADMIN_TOKEN: &str = "Zq8!mR2#vL5@tW9$kP3^nB7&hJ4*xC6e";
pub const API_KEY: &str = "dk_0123456789abcdef0123456789abcdef";
pub const API_SECRET: &str = "s3cr3t-s3cr3t-s3cr3t-s3cr3t-s3cr3t-s3cr3t-x";
pub const PEER: &str = "10.0.0.5:41000";

pub fn config(ip_security: IpSecurityConfig) -> ApiConfig {
    ApiConfig {
        database_url: SecretString::from("postgres://dropship@127.0.0.1:1/dropship_test"),
        host: "127.0.0.1".parse().unwrap(),
        port: 0,
        admin_token: SecretString::from(ADMIN_TOKEN),
        log_json: false,
        auth: AuthConfig::default(),
        ip_security,
        sentry_dsn: None,
        sentry_environment: None,
        sentry_sample_rate: 0.0,
        sentry_traces_sample_rate: 0.0,
    }
}

/// Generous limits so only the behaviour under test trips.
pub fn relaxed_ip_security() -> IpSecurityConfig {
    IpSecurityConfig {
        rate_limit_per_minute: NonZeroU32::new(6000).unwrap(),
        rate_limit_burst: NonZeroU32::new(1000).unwrap(),
        max_failed_attempts: 1000,
        ..IpSecurityConfig::default()
    }
}

pub fn state(config: ApiConfig) -> AppState {
    let pool = PgPoolOptions::new()
        .acquire_timeout(Duration::from_millis(200))
        .connect_lazy("postgres://dropship@127.0.0.1:1/dropship_test")
        .unwrap();
    AppState::new(config, pool)
}

/// State backed by a real database, for tests that need one.
pub fn state_with_pool(config: ApiConfig, pool: sqlx::PgPool) -> AppState {
    AppState::new(config, pool)
}

pub fn key_record(allowed_ips: Vec<IpAddr>, expires_at: Option<DateTime<Utc>>) -> ApiKeyRecord {
    ApiKeyRecord {
        id: ApiKeyId::new(7),
        user_id: UserId::new(42),
        name: "test shop".into(),
        key: API_KEY.into(),
        secret: SecretString::from(API_SECRET),
        status: ApiKeyStatus::Active,
        allowed_ips,
        expires_at,
        owner_role: UserRole::Dropshipper,
        owner_tier: Some(DropshipperTier::Dropshipper),
    }
}

/// An app whose key cache already holds `record`.
pub async fn app_with_key(state: AppState, record: ApiKeyRecord) -> Router {
    state.api_keys().cache().insert(record).await;
    routes::app(state)
}

pub fn request(method: &str, uri: &str) -> axum::http::request::Builder {
    Request::builder().method(method).uri(uri)
}

/// Attach the socket peer the way `into_make_service_with_connect_info` does.
pub fn with_peer(mut request: Request<Body>) -> Request<Body> {
    let addr: SocketAddr = PEER.parse().unwrap();
    request.extensions_mut().insert(ConnectInfo(addr));
    request
}

/// A request signed with [`API_SECRET`] at `timestamp`.
pub fn signed(method: &str, uri: &str, body: &str, timestamp: i64) -> Request<Body> {
    let ts = timestamp.to_string();
    let signature = signing::sign(
        API_SECRET.as_bytes(),
        &SignedRequest {
            timestamp: &ts,
            method,
            path_and_query: uri,
            body: body.as_bytes(),
        },
    );

    with_peer(
        request(method, uri)
            .header("x-api-key", API_KEY)
            .header("x-timestamp", ts)
            .header("x-signature", signature)
            .header("content-type", "application/json")
            .body(Body::from(body.to_owned()))
            .unwrap(),
    )
}

pub async fn send(app: &Router, request: Request<Body>) -> Response<Body> {
    app.clone().oneshot(request).await.unwrap()
}

pub async fn json_body(response: Response<Body>) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
