//! Database operations for the dropship API.
//!
//! ## Tables
//!
//! - `users` - Customers, dropshippers and admins; `parent_id` is the referrer
//! - `products` - Catalog with retail, purchase and dropshipper prices
//! - `orders` / `order_items` - Dropshipper orders with price snapshots
//! - `wallets` / `wallet_transactions` - Balances and their signed ledger
//! - `api_keys` - Integration keys and signing secrets
//! - `ip_logs` / `ip_blocks` - IP security events and the blocklist
//! - `settings` - Application settings (JSONB)
//!
//! # Migrations
//!
//! Migrations are stored in `crates/api/migrations/` and run via:
//! ```bash
//! cargo run -p dropship-cli -- migrate
//! ```
//!
//! Reads go through the repository structs, which borrow the pool. Writes
//! that must share a transaction are free functions taking a
//! `&mut PgConnection` so callers can pass `&mut *tx`.

pub mod api_keys;
pub mod ip_security;
pub mod orders;
pub mod products;
pub mod settings;
pub mod users;
pub mod wallets;

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

pub use api_keys::ApiKeyRepository;
pub use ip_security::IpSecurityRepository;
pub use orders::OrderRepository;
pub use products::ProductRepository;
pub use settings::SettingsRepository;
pub use users::UserRepository;
pub use wallets::WalletRepository;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., duplicate key).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

/// Map a unique violation to `Conflict`, anything else to `Database`.
pub(crate) fn conflict_on_unique(e: sqlx::Error, message: &str) -> RepositoryError {
    if let sqlx::Error::Database(ref db_err) = e
        && db_err.is_unique_violation()
    {
        return RepositoryError::Conflict(message.to_owned());
    }
    RepositoryError::Database(e)
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}
