//! Command implementations.

pub mod api_keys;
pub mod commissions;
pub mod ip_blocks;
pub mod migrate;
pub mod rates;

use std::time::Duration;

use dropship_api::db::{self, RepositoryError};
use dropship_api::services::{ApiKeyError, DistributionError};
use dropship_core::commission::CommissionError;
use secrecy::SecretString;
use serde::Serialize;
use sqlx::PgPool;
use thiserror::Error;

/// Errors surfaced by CLI commands.
#[derive(Debug, Error)]
pub enum CliError {
    /// Required environment variable is missing.
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    ApiKey(#[from] ApiKeyError),

    #[error(transparent)]
    Distribution(#[from] DistributionError),

    #[error("Invalid commission rates: {0}")]
    Rates(#[from] CommissionError),

    #[error("Output error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Connect using `API_DATABASE_URL`, falling back to `DATABASE_URL`.
pub(crate) async fn connect() -> Result<PgPool, CliError> {
    dotenvy::dotenv().ok();

    let database_url = std::env::var("API_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .map(SecretString::from)
        .map_err(|_| CliError::MissingEnvVar("API_DATABASE_URL"))?;

    tracing::info!("Connecting to database...");
    Ok(db::create_pool(&database_url).await?)
}

/// Print a value as pretty JSON on stdout.
pub(crate) fn print_json<T: Serialize>(value: &T) -> Result<(), CliError> {
    let rendered = serde_json::to_string_pretty(value)?;
    #[allow(clippy::print_stdout)]
    {
        println!("{rendered}");
    }
    Ok(())
}

/// CLI processes are short-lived; cached API keys never outlive them.
pub(crate) const KEY_CACHE_TTL: Duration = Duration::from_secs(1);
