//! Integration API for dropshippers.
//!
//! Every handler here runs behind [`crate::middleware::hmac_auth_middleware`]
//! and takes the caller as an [`crate::models::AuthenticatedClient`].

pub mod me;
pub mod orders;
pub mod products;
pub mod wallet;

use axum::{
    Router,
    routing::{get, post},
};

use crate::state::AppState;

/// Routes mounted at `/api/v1`.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/me", get(me::show))
        .route("/products", get(products::index))
        .route("/products/{id}", get(products::show))
        .route("/orders", get(orders::index).post(orders::create))
        .route("/orders/{id}", get(orders::show))
        .route("/wallet", get(wallet::show))
        .route("/wallet/transactions", get(wallet::transactions))
        .route("/wallet/withdrawals", post(wallet::withdraw))
}
