//! Database migration command.
//!
//! # Usage
//!
//! ```bash
//! ds-cli migrate
//! ```
//!
//! # Environment Variables
//!
//! - `API_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//!
//! Migrations live in `crates/api/migrations/` and are embedded at build time.

use super::{CliError, connect};

/// Run all pending migrations.
///
/// # Errors
///
/// Returns an error if the connection or any migration fails.
pub async fn run() -> Result<(), CliError> {
    let pool = connect().await?;

    tracing::info!("Running migrations...");
    sqlx::migrate!("../api/migrations").run(&pool).await?;

    tracing::info!("Migrations complete!");
    Ok(())
}
