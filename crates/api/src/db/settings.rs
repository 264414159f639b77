//! Application settings stored as JSONB.

use serde_json::Value as JsonValue;
use sqlx::{PgConnection, PgPool};

use dropship_core::commission::CommissionRates;

use super::RepositoryError;

/// Settings key holding the tier commission percentages.
pub const COMMISSION_RATES_KEY: &str = "commission_rates";

/// Repository for settings.
pub struct SettingsRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> SettingsRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Current commission rates, or the defaults when none are stored.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if the stored JSON is malformed.
    pub async fn commission_rates(&self) -> Result<CommissionRates, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        commission_rates(&mut conn).await
    }

    /// Store commission rates. Callers validate first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the upsert fails.
    pub async fn set_commission_rates(&self, rates: &CommissionRates) -> Result<(), RepositoryError> {
        let value = serde_json::to_value(rates)
            .map_err(|e| RepositoryError::DataCorruption(format!("unserializable rates: {e}")))?;
        set(self.pool, COMMISSION_RATES_KEY, &value).await
    }
}

/// Read commission rates on an existing connection.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
/// Returns `RepositoryError::DataCorruption` if the stored JSON is malformed.
pub async fn commission_rates(conn: &mut PgConnection) -> Result<CommissionRates, RepositoryError> {
    let value: Option<JsonValue> = sqlx::query_scalar("SELECT value FROM settings WHERE key = $1")
        .bind(COMMISSION_RATES_KEY)
        .fetch_optional(conn)
        .await?;

    value.map_or_else(
        || Ok(CommissionRates::default()),
        |v| {
            serde_json::from_value(v).map_err(|e| {
                RepositoryError::DataCorruption(format!("invalid {COMMISSION_RATES_KEY} setting: {e}"))
            })
        },
    )
}

async fn set(pool: &PgPool, key: &str, value: &JsonValue) -> Result<(), RepositoryError> {
    sqlx::query(
        r"
        INSERT INTO settings (key, value)
        VALUES ($1, $2)
        ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value, updated_at = NOW()
        ",
    )
    .bind(key)
    .bind(value)
    .execute(pool)
    .await?;

    Ok(())
}
