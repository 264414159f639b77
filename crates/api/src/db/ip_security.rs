//! IP security log and blocklist.

use std::net::IpAddr;

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use dropship_core::{ApiKeyId, IpEvent};

use super::RepositoryError;
use crate::models::IpBlock;

#[derive(sqlx::FromRow)]
struct IpBlockRow {
    ip: String,
    reason: String,
    blocked_until: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl TryFrom<IpBlockRow> for IpBlock {
    type Error = RepositoryError;

    fn try_from(row: IpBlockRow) -> Result<Self, Self::Error> {
        let ip = row
            .ip
            .parse()
            .map_err(|e| RepositoryError::DataCorruption(format!("invalid blocked ip {:?}: {e}", row.ip)))?;

        Ok(Self {
            ip,
            reason: row.reason,
            blocked_until: row.blocked_until,
            created_at: row.created_at,
        })
    }
}

/// A security event about to be logged.
#[derive(Debug, Clone)]
pub struct IpLogEntry {
    pub ip: IpAddr,
    pub event: IpEvent,
    pub api_key_id: Option<ApiKeyId>,
    pub path: String,
    pub detail: String,
}

/// Repository for IP security data.
pub struct IpSecurityRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> IpSecurityRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Append a security event.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn log(&self, entry: &IpLogEntry) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            INSERT INTO ip_logs (ip, event, api_key_id, path, detail)
            VALUES ($1, $2, $3, $4, $5)
            ",
        )
        .bind(entry.ip.to_string())
        .bind(entry.event)
        .bind(entry.api_key_id)
        .bind(&entry.path)
        .bind(&entry.detail)
        .execute(self.pool)
        .await?;

        Ok(())
    }

    /// Blocks that have not expired at `now`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if a stored address is invalid.
    pub async fn active_blocks(&self, now: DateTime<Utc>) -> Result<Vec<IpBlock>, RepositoryError> {
        let rows = sqlx::query_as::<_, IpBlockRow>(
            r"
            SELECT ip, reason, blocked_until, created_at
            FROM ip_blocks
            WHERE blocked_until IS NULL OR blocked_until > $1
            ORDER BY created_at DESC
            ",
        )
        .bind(now)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(IpBlock::try_from).collect()
    }

    /// Block `ip`, replacing any existing block.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the upsert fails.
    pub async fn upsert_block(
        &self,
        ip: IpAddr,
        reason: &str,
        blocked_until: Option<DateTime<Utc>>,
    ) -> Result<IpBlock, RepositoryError> {
        let row = sqlx::query_as::<_, IpBlockRow>(
            r"
            INSERT INTO ip_blocks (ip, reason, blocked_until)
            VALUES ($1, $2, $3)
            ON CONFLICT (ip) DO UPDATE
            SET reason = EXCLUDED.reason, blocked_until = EXCLUDED.blocked_until, created_at = NOW()
            RETURNING ip, reason, blocked_until, created_at
            ",
        )
        .bind(ip.to_string())
        .bind(reason)
        .bind(blocked_until)
        .fetch_one(self.pool)
        .await?;

        IpBlock::try_from(row)
    }

    /// Lift a block. Returns whether one existed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the delete fails.
    pub async fn delete_block(&self, ip: IpAddr) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM ip_blocks WHERE ip = $1")
            .bind(ip.to_string())
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
