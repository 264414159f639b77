//! Operator API.
//!
//! Every handler takes [`RequireAdmin`](crate::middleware::RequireAdmin),
//! so a missing or wrong bearer token is rejected before any work is done.

pub mod api_keys;
pub mod ip_blocks;
pub mod orders;
pub mod settings;
pub mod wallets;

use axum::{
    Router,
    routing::{delete, get, post, put},
};

use crate::state::AppState;

/// Routes mounted at `/admin`.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/settings/commission-rates",
            get(settings::commission_rates).put(settings::update_commission_rates),
        )
        .route("/orders/{id}/status", put(orders::update_status))
        .route("/orders/{id}/commissions", post(orders::distribute_commissions))
        .route("/wallets/{user_id}/adjustments", post(wallets::adjust))
        .route("/api-keys", get(api_keys::index).post(api_keys::create))
        .route("/api-keys/{id}", delete(api_keys::revoke))
        .route("/ip-blocks", get(ip_blocks::index).post(ip_blocks::create))
        .route("/ip-blocks/{ip}", delete(ip_blocks::remove))
}
