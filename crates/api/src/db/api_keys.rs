//! API key storage.

use std::net::IpAddr;

use chrono::{DateTime, Utc};
use secrecy::SecretString;
use sqlx::PgPool;

use dropship_core::{ApiKeyId, ApiKeyStatus, DropshipperTier, UserId, UserRole};

use super::{RepositoryError, conflict_on_unique};
use crate::models::{ApiKeyRecord, ApiKeySummary};

#[derive(sqlx::FromRow)]
struct ApiKeyRow {
    id: ApiKeyId,
    user_id: UserId,
    name: String,
    key: String,
    secret: String,
    status: ApiKeyStatus,
    allowed_ips: Vec<String>,
    expires_at: Option<DateTime<Utc>>,
    role: UserRole,
    dropshipper_tier: Option<DropshipperTier>,
}

impl TryFrom<ApiKeyRow> for ApiKeyRecord {
    type Error = RepositoryError;

    fn try_from(row: ApiKeyRow) -> Result<Self, Self::Error> {
        let allowed_ips = row
            .allowed_ips
            .iter()
            .map(|ip| {
                ip.parse::<IpAddr>().map_err(|e| {
                    RepositoryError::DataCorruption(format!("invalid allowed ip {ip:?} on key {}: {e}", row.id))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            id: row.id,
            user_id: row.user_id,
            name: row.name,
            key: row.key,
            secret: SecretString::from(row.secret),
            status: row.status,
            allowed_ips,
            expires_at: row.expires_at,
            owner_role: row.role,
            owner_tier: row.dropshipper_tier,
        })
    }
}

/// Fields for a key about to be stored.
#[derive(Debug, Clone)]
pub struct NewApiKey<'a> {
    pub user_id: UserId,
    pub name: &'a str,
    pub key: &'a str,
    pub secret: &'a str,
    pub allowed_ips: &'a [IpAddr],
    pub expires_at: Option<DateTime<Utc>>,
}

/// Repository for API key operations.
pub struct ApiKeyRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ApiKeyRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Resolve a public key to its record, joined with the owner.
    ///
    /// Revoked keys are returned too; the caller decides what is usable.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if an allowlist entry is invalid.
    pub async fn find_by_key(&self, key: &str) -> Result<Option<ApiKeyRecord>, RepositoryError> {
        let row = sqlx::query_as::<_, ApiKeyRow>(
            r"
            SELECT k.id, k.user_id, k.name, k.key, k.secret, k.status, k.allowed_ips,
                   k.expires_at, u.role, u.dropshipper_tier
            FROM api_keys k
            JOIN users u ON u.id = k.user_id
            WHERE k.key = $1
            ",
        )
        .bind(key)
        .fetch_optional(self.pool)
        .await?;

        row.map(ApiKeyRecord::try_from).transpose()
    }

    /// Store a new key.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the generated key already exists.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn create(&self, new: &NewApiKey<'_>) -> Result<ApiKeySummary, RepositoryError> {
        let allowed_ips: Vec<String> = new.allowed_ips.iter().map(ToString::to_string).collect();

        sqlx::query_as::<_, ApiKeySummary>(
            r"
            INSERT INTO api_keys (user_id, name, key, secret, allowed_ips, expires_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, user_id, name, key, status, allowed_ips, expires_at,
                      last_used_at, created_at, revoked_at
            ",
        )
        .bind(new.user_id)
        .bind(new.name)
        .bind(new.key)
        .bind(new.secret)
        .bind(allowed_ips)
        .bind(new.expires_at)
        .fetch_one(self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, "api key already exists"))
    }

    /// Revoke a key. Revoking an already revoked key keeps the first timestamp.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no such key exists.
    pub async fn revoke(&self, id: ApiKeyId) -> Result<ApiKeySummary, RepositoryError> {
        sqlx::query_as::<_, ApiKeySummary>(
            r"
            UPDATE api_keys
            SET status = 'revoked', revoked_at = COALESCE(revoked_at, NOW())
            WHERE id = $1
            RETURNING id, user_id, name, key, status, allowed_ips, expires_at,
                      last_used_at, created_at, revoked_at
            ",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)
    }

    /// List keys, optionally for one user, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, user_id: Option<UserId>) -> Result<Vec<ApiKeySummary>, RepositoryError> {
        let keys = sqlx::query_as::<_, ApiKeySummary>(
            r"
            SELECT id, user_id, name, key, status, allowed_ips, expires_at,
                   last_used_at, created_at, revoked_at
            FROM api_keys
            WHERE $1::BIGINT IS NULL OR user_id = $1
            ORDER BY created_at DESC, id DESC
            ",
        )
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;

        Ok(keys)
    }

    /// Record that a key was just used.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn touch(&self, id: ApiKeyId, at: DateTime<Utc>) -> Result<(), RepositoryError> {
        sqlx::query("UPDATE api_keys SET last_used_at = $2 WHERE id = $1")
            .bind(id)
            .bind(at)
            .execute(self.pool)
            .await?;

        Ok(())
    }
}
