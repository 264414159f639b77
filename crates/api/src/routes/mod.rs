//! HTTP route handlers.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                          - Liveness check
//! GET  /health/ready                    - Database readiness check
//!
//! # Integration API (IP guard + signed requests)
//! GET  /api/v1/me                       - Authenticated client
//! GET  /api/v1/products                 - Active products priced for the caller
//! GET  /api/v1/products/{id}            - Product detail
//! POST /api/v1/orders                   - Place an order
//! GET  /api/v1/orders                   - Caller's orders
//! GET  /api/v1/orders/{id}              - Caller's order with items
//! GET  /api/v1/wallet                   - Wallet balance
//! GET  /api/v1/wallet/transactions      - Wallet ledger
//! POST /api/v1/wallet/withdrawals       - Withdraw from the wallet
//!
//! # Operator API (IP guard + bearer ADMIN_TOKEN)
//! GET    /admin/settings/commission-rates
//! PUT    /admin/settings/commission-rates
//! PUT    /admin/orders/{id}/status
//! POST   /admin/orders/{id}/commissions   - Re-run distribution (idempotent)
//! POST   /admin/wallets/{user_id}/adjustments
//! GET    /admin/api-keys?user_id=
//! POST   /admin/api-keys
//! DELETE /admin/api-keys/{id}
//! GET    /admin/ip-blocks
//! POST   /admin/ip-blocks
//! DELETE /admin/ip-blocks/{ip}
//! ```

pub mod admin;
pub mod health;
pub mod v1;

use axum::{Router, http::Request, middleware::from_fn, middleware::from_fn_with_state, routing::get};
use serde::Deserialize;
use tower_http::trace::{DefaultOnResponse, OnResponse, TraceLayer};
use tracing::Span;

use crate::middleware::{hmac_auth_middleware, ip_guard_middleware, request_id_middleware};
use crate::state::AppState;

const DEFAULT_PER_PAGE: u32 = 20;
const MAX_PER_PAGE: u32 = 100;

/// `?page=&per_page=` query parameters. Pages start at 1.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PaginationQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

impl PaginationQuery {
    /// `per_page` clamped to `1..=100`.
    #[must_use]
    pub fn limit(self) -> i64 {
        i64::from(self.per_page.unwrap_or(DEFAULT_PER_PAGE).clamp(1, MAX_PER_PAGE))
    }

    #[must_use]
    pub fn offset(self) -> i64 {
        i64::from(self.page.unwrap_or(1).max(1) - 1) * self.limit()
    }
}

/// Build the full application router. Sentry layers are added in `main`.
pub fn app(state: AppState) -> Router {
    let signed = v1::routes().layer(from_fn_with_state(state.clone(), hmac_auth_middleware));

    let api = Router::new()
        .nest("/v1", signed)
        .layer(from_fn_with_state(state.clone(), ip_guard_middleware));

    let admin = admin::routes().layer(from_fn_with_state(state.clone(), ip_guard_middleware));

    Router::new()
        .route("/health", get(health::health))
        .route("/health/ready", get(health::readiness))
        .nest("/api", api)
        .nest("/admin", admin)
        .layer(from_fn(request_id_middleware))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        uri = %request.uri(),
                        request_id = tracing::field::Empty,
                        status = tracing::field::Empty,
                        latency_ms = tracing::field::Empty,
                    )
                })
                .on_response(
                    |response: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &Span| {
                        span.record("status", response.status().as_u16());
                        span.record(
                            "latency_ms",
                            u64::try_from(latency.as_millis()).unwrap_or(u64::MAX),
                        );
                        DefaultOnResponse::default().on_response(response, latency, span);
                    },
                ),
        )
        .with_state(state)
}
