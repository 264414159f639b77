//! API key issuance, lookup caching and replay protection.

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, Utc};
use moka::future::Cache;
use rand::RngCore;
use sqlx::PgPool;
use thiserror::Error;
use tracing::{info, instrument, warn};

use dropship_core::{ApiKeyId, UserId, UserRole};

use crate::db::api_keys::NewApiKey;
use crate::db::{ApiKeyRepository, RepositoryError, UserRepository};
use crate::models::{ApiKeyRecord, ApiKeySummary, IssuedApiKey};

/// Prefix that makes keys easy to spot in logs and secret scanners.
pub const KEY_PREFIX: &str = "dk_";
const KEY_RANDOM_BYTES: usize = 16;
const SECRET_RANDOM_BYTES: usize = 32;
const MAX_NAME_LEN: usize = 100;
const MAX_ALLOWED_IPS: usize = 50;
const REPLAY_CAPACITY: u64 = 1_000_000;

/// Errors from API key management.
#[derive(Debug, Error)]
pub enum ApiKeyError {
    #[error("{0}")]
    Invalid(String),

    #[error("user not found")]
    UserNotFound,

    #[error("only dropshippers can hold API keys")]
    NotDropshipper,

    #[error("API key not found")]
    NotFound,

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Generate a public key: `dk_` followed by 32 hex characters.
#[must_use]
pub fn generate_key() -> String {
    let mut bytes = [0u8; KEY_RANDOM_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    format!("{KEY_PREFIX}{}", hex::encode(bytes))
}

/// Generate a signing secret: 256 random bits as unpadded base64url (43 chars).
#[must_use]
pub fn generate_secret() -> String {
    let mut bytes = [0u8; SECRET_RANDOM_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Shape check for a presented key, so junk never reaches the database.
#[must_use]
pub fn is_well_formed_key(key: &str) -> bool {
    key.strip_prefix(KEY_PREFIX).is_some_and(|rest| {
        rest.len() == KEY_RANDOM_BYTES * 2 && rest.bytes().all(|b| b.is_ascii_hexdigit())
    })
}

/// Resolved keys, cached by public key.
#[derive(Clone)]
pub struct ApiKeyCache {
    inner: Cache<String, Arc<ApiKeyRecord>>,
}

impl ApiKeyCache {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        let inner = Cache::builder()
            .max_capacity(10_000)
            .time_to_live(ttl)
            .build();
        Self { inner }
    }

    pub async fn get(&self, key: &str) -> Option<Arc<ApiKeyRecord>> {
        self.inner.get(key).await
    }

    pub async fn insert(&self, record: ApiKeyRecord) -> Arc<ApiKeyRecord> {
        let record = Arc::new(record);
        self.inner.insert(record.key.clone(), Arc::clone(&record)).await;
        record
    }

    pub async fn invalidate(&self, key: &str) {
        self.inner.invalidate(key).await;
    }
}

/// Result of recording a signature with [`ReplayGuard`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplayCheck {
    Fresh,
    Replayed,
    /// The guard is full and cannot remember another signature.
    Saturated,
}

/// Remembers verified signatures for the replay window.
///
/// A signature covers the timestamp, so once the window has passed the
/// timestamp check rejects the request on its own and the entry can expire.
/// Entries are never evicted early: once roughly `capacity` signatures are
/// held, new ones are refused until old ones expire.
#[derive(Clone)]
pub struct ReplayGuard {
    seen: Cache<String, ()>,
    capacity: u64,
}

impl ReplayGuard {
    #[must_use]
    pub fn new(window: Duration) -> Self {
        Self::with_capacity(window, REPLAY_CAPACITY)
    }

    #[must_use]
    pub fn with_capacity(window: Duration, capacity: u64) -> Self {
        let seen = Cache::builder()
            .time_to_live(window.saturating_mul(2))
            .build();
        Self { seen, capacity }
    }

    /// Record `signature` for `key`.
    pub async fn record(&self, key: &str, signature: &str) -> ReplayCheck {
        let id = format!("{key}:{}", signature.to_ascii_lowercase());
        if self.seen.contains_key(&id) {
            return ReplayCheck::Replayed;
        }

        if self.seen.entry_count() >= self.capacity {
            // The count lags behind writes and expirations.
            self.seen.run_pending_tasks().await;
            if self.seen.entry_count() >= self.capacity {
                warn!(capacity = self.capacity, "Replay guard full; refusing signed request");
                return ReplayCheck::Saturated;
            }
        }

        if self.seen.entry(id).or_insert(()).await.is_fresh() {
            ReplayCheck::Fresh
        } else {
            ReplayCheck::Replayed
        }
    }
}

/// Service for API key management.
#[derive(Clone)]
pub struct ApiKeyService {
    pool: PgPool,
    cache: ApiKeyCache,
}

impl ApiKeyService {
    #[must_use]
    pub const fn new(pool: PgPool, cache: ApiKeyCache) -> Self {
        Self { pool, cache }
    }

    /// Issue a key to a dropshipper. The secret is only ever returned here.
    ///
    /// # Errors
    ///
    /// Returns `Invalid` for a bad name, allowlist or expiry,
    /// `UserNotFound`, `NotDropshipper`, or `Repository` on database failure.
    #[instrument(skip(self, allowed_ips), fields(user_id = %user_id))]
    pub async fn issue(
        &self,
        user_id: UserId,
        name: &str,
        allowed_ips: &[IpAddr],
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<IssuedApiKey, ApiKeyError> {
        let name = name.trim();
        if name.is_empty() || name.len() > MAX_NAME_LEN {
            return Err(ApiKeyError::Invalid(format!(
                "name is required and must be at most {MAX_NAME_LEN} characters"
            )));
        }
        if allowed_ips.len() > MAX_ALLOWED_IPS {
            return Err(ApiKeyError::Invalid(format!(
                "at most {MAX_ALLOWED_IPS} allowed IPs per key"
            )));
        }
        if expires_at.is_some_and(|at| at <= Utc::now()) {
            return Err(ApiKeyError::Invalid("expires_at must be in the future".into()));
        }

        let user = UserRepository::new(&self.pool)
            .get_by_id(user_id)
            .await?
            .ok_or(ApiKeyError::UserNotFound)?;
        if user.role != UserRole::Dropshipper {
            return Err(ApiKeyError::NotDropshipper);
        }

        let key = generate_key();
        let secret = generate_secret();
        let summary = ApiKeyRepository::new(&self.pool)
            .create(&NewApiKey {
                user_id,
                name,
                key: &key,
                secret: &secret,
                allowed_ips,
                expires_at,
            })
            .await?;

        info!(api_key_id = %summary.id, "API key issued");
        Ok(IssuedApiKey { summary, secret })
    }

    /// Revoke a key and drop it from the cache.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown id or `Repository` on database failure.
    #[instrument(skip(self), fields(api_key_id = %id))]
    pub async fn revoke(&self, id: ApiKeyId) -> Result<ApiKeySummary, ApiKeyError> {
        let summary = ApiKeyRepository::new(&self.pool)
            .revoke(id)
            .await
            .map_err(|e| match e {
                RepositoryError::NotFound => ApiKeyError::NotFound,
                other => ApiKeyError::Repository(other),
            })?;

        self.cache.invalidate(&summary.key).await;
        info!("API key revoked");
        Ok(summary)
    }

    /// List keys, optionally for one user.
    ///
    /// # Errors
    ///
    /// Returns `Repository` on database failure.
    pub async fn list(&self, user_id: Option<UserId>) -> Result<Vec<ApiKeySummary>, ApiKeyError> {
        Ok(ApiKeyRepository::new(&self.pool).list(user_id).await?)
    }

    /// Resolve a presented key through the cache, falling back to the database.
    ///
    /// # Errors
    ///
    /// Returns `Repository` on database failure.
    pub async fn resolve(&self, key: &str) -> Result<Option<Arc<ApiKeyRecord>>, ApiKeyError> {
        if let Some(record) = self.cache.get(key).await {
            return Ok(Some(record));
        }
        if !is_well_formed_key(key) {
            return Ok(None);
        }

        match ApiKeyRepository::new(&self.pool).find_by_key(key).await? {
            Some(record) => Ok(Some(self.cache.insert(record).await)),
            None => Ok(None),
        }
    }

    /// Record a successful use in the background.
    pub fn touch_in_background(&self, id: ApiKeyId) {
        let pool = self.pool.clone();
        tokio::spawn(async move {
            if let Err(e) = ApiKeyRepository::new(&pool).touch(id, Utc::now()).await {
                tracing::warn!(api_key_id = %id, error = %e, "Failed to update API key last_used_at");
            }
        });
    }

    #[must_use]
    pub const fn cache(&self) -> &ApiKeyCache {
        &self.cache
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_key_shape() {
        let key = generate_key();
        assert_eq!(key.len(), KEY_PREFIX.len() + 32);
        assert!(is_well_formed_key(&key));
        assert_ne!(key, generate_key());
    }

    #[test]
    fn test_generated_secret_shape() {
        let secret = generate_secret();
        assert_eq!(secret.len(), 43);
        assert!(
            secret
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
        );
    }

    #[test]
    fn test_malformed_keys() {
        assert!(!is_well_formed_key(""));
        assert!(!is_well_formed_key("dk_short"));
        assert!(!is_well_formed_key("xx_0123456789abcdef0123456789abcdef"));
        assert!(!is_well_formed_key("dk_0123456789abcdef0123456789abcdeg"));
    }

    #[tokio::test]
    async fn test_replay_guard_rejects_second_use() {
        let guard = ReplayGuard::new(Duration::from_secs(300));
        assert_eq!(guard.record("dk_a", "abc123").await, ReplayCheck::Fresh);
        assert_eq!(guard.record("dk_a", "ABC123").await, ReplayCheck::Replayed);
        assert_eq!(guard.record("dk_b", "abc123").await, ReplayCheck::Fresh);
    }

    #[tokio::test]
    async fn test_full_replay_guard_keeps_old_signatures() {
        let guard = ReplayGuard::with_capacity(Duration::from_secs(300), 2);
        assert_eq!(guard.record("dk_a", "sig1").await, ReplayCheck::Fresh);
        assert_eq!(guard.record("dk_a", "sig2").await, ReplayCheck::Fresh);
        guard.seen.run_pending_tasks().await;

        // A flood of new signatures is refused instead of evicting old ones.
        for n in 3..50 {
            assert_eq!(
                guard.record("dk_b", &format!("sig{n}")).await,
                ReplayCheck::Saturated
            );
        }
        assert_eq!(guard.record("dk_a", "sig1").await, ReplayCheck::Replayed);
        assert_eq!(guard.record("dk_a", "sig2").await, ReplayCheck::Replayed);
    }

    #[tokio::test]
    async fn test_replay_guard_accepts_again_after_expiry() {
        let guard = ReplayGuard::with_capacity(Duration::from_millis(25), 1);
        assert_eq!(guard.record("dk_a", "sig1").await, ReplayCheck::Fresh);
        guard.seen.run_pending_tasks().await;
        assert_eq!(guard.record("dk_a", "sig2").await, ReplayCheck::Saturated);

        tokio::time::sleep(Duration::from_millis(120)).await;
        assert_eq!(guard.record("dk_a", "sig2").await, ReplayCheck::Fresh);
    }
}
