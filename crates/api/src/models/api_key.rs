//! Integration API keys.

use std::net::IpAddr;

use chrono::{DateTime, Utc};
use dropship_core::pricing::Buyer;
use dropship_core::{ApiKeyId, ApiKeyStatus, DropshipperTier, UserId, UserRole};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;

/// Why a stored key cannot be used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyUnusable {
    Revoked,
    Expired,
    OwnerNotDropshipper,
}

impl KeyUnusable {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Revoked => "API key has been revoked",
            Self::Expired => "API key has expired",
            Self::OwnerNotDropshipper => "API key owner is not a dropshipper",
        }
    }
}

/// A key with everything the gateway needs to authenticate a request.
///
/// Implements `Debug` manually to redact the secret.
#[derive(Clone)]
pub struct ApiKeyRecord {
    pub id: ApiKeyId,
    pub user_id: UserId,
    pub name: String,
    pub key: String,
    pub secret: SecretString,
    pub status: ApiKeyStatus,
    /// Empty means any address may use the key.
    pub allowed_ips: Vec<IpAddr>,
    pub expires_at: Option<DateTime<Utc>>,
    pub owner_role: UserRole,
    pub owner_tier: Option<DropshipperTier>,
}

impl std::fmt::Debug for ApiKeyRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiKeyRecord")
            .field("id", &self.id)
            .field("user_id", &self.user_id)
            .field("name", &self.name)
            .field("key", &self.key)
            .field("secret", &"[REDACTED]")
            .field("status", &self.status)
            .field("allowed_ips", &self.allowed_ips)
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}

impl ApiKeyRecord {
    /// Check the key is active, unexpired and owned by a dropshipper.
    ///
    /// # Errors
    ///
    /// Returns the first reason the key cannot be used.
    pub fn check_usable(&self, now: DateTime<Utc>) -> Result<(), KeyUnusable> {
        if self.status == ApiKeyStatus::Revoked {
            return Err(KeyUnusable::Revoked);
        }
        if self.expires_at.is_some_and(|at| at <= now) {
            return Err(KeyUnusable::Expired);
        }
        if self.owner_role != UserRole::Dropshipper {
            return Err(KeyUnusable::OwnerNotDropshipper);
        }
        Ok(())
    }

    #[must_use]
    pub fn allows_ip(&self, ip: IpAddr) -> bool {
        self.allowed_ips.is_empty() || self.allowed_ips.contains(&ip)
    }

    #[must_use]
    pub fn secret(&self) -> &str {
        self.secret.expose_secret()
    }

    #[must_use]
    pub fn client(&self) -> AuthenticatedClient {
        AuthenticatedClient {
            api_key_id: self.id,
            user_id: self.user_id,
            role: self.owner_role,
            tier: self.owner_tier,
        }
    }
}

/// The caller of a successfully authenticated request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AuthenticatedClient {
    pub api_key_id: ApiKeyId,
    pub user_id: UserId,
    pub role: UserRole,
    pub tier: Option<DropshipperTier>,
}

impl AuthenticatedClient {
    #[must_use]
    pub fn buyer(&self) -> Buyer {
        Buyer::from_role(self.role, self.tier)
    }
}

/// Key metadata safe to list (no secret).
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ApiKeySummary {
    pub id: ApiKeyId,
    pub user_id: UserId,
    pub name: String,
    pub key: String,
    pub status: ApiKeyStatus,
    pub allowed_ips: Vec<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub last_used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
}

/// A freshly issued key; the only time the secret is shown.
#[derive(Debug, Clone, Serialize)]
pub struct IssuedApiKey {
    #[serde(flatten)]
    pub summary: ApiKeySummary,
    pub secret: String,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn record() -> ApiKeyRecord {
        ApiKeyRecord {
            id: ApiKeyId::new(1),
            user_id: UserId::new(10),
            name: "warehouse-sync".to_string(),
            key: "dk_0123456789abcdef0123456789abcdef".to_string(),
            secret: SecretString::from("very-secret-value"),
            status: ApiKeyStatus::Active,
            allowed_ips: Vec::new(),
            expires_at: None,
            owner_role: UserRole::Dropshipper,
            owner_tier: Some(DropshipperTier::SubDropshipper),
        }
    }

    #[test]
    fn test_usable_key() {
        assert_eq!(record().check_usable(Utc::now()), Ok(()));
    }

    #[test]
    fn test_revoked_expired_and_wrong_owner() {
        let now = Utc::now();

        let revoked = ApiKeyRecord {
            status: ApiKeyStatus::Revoked,
            ..record()
        };
        assert_eq!(revoked.check_usable(now), Err(KeyUnusable::Revoked));

        let expired = ApiKeyRecord {
            expires_at: Some(now - Duration::minutes(1)),
            ..record()
        };
        assert_eq!(expired.check_usable(now), Err(KeyUnusable::Expired));

        let customer = ApiKeyRecord {
            owner_role: UserRole::Customer,
            ..record()
        };
        assert_eq!(customer.check_usable(now), Err(KeyUnusable::OwnerNotDropshipper));
    }

    #[test]
    fn test_ip_allowlist() {
        let open = record();
        assert!(open.allows_ip("203.0.113.9".parse().unwrap()));

        let pinned = ApiKeyRecord {
            allowed_ips: vec!["198.51.100.7".parse().unwrap()],
            ..record()
        };
        assert!(pinned.allows_ip("198.51.100.7".parse().unwrap()));
        assert!(!pinned.allows_ip("203.0.113.9".parse().unwrap()));
    }

    #[test]
    fn test_debug_redacts_secret() {
        let output = format!("{:?}", record());
        assert!(output.contains("[REDACTED]"));
        assert!(!output.contains("very-secret-value"));
    }
}
