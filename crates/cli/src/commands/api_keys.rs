//! API key management commands.
//!
//! # Usage
//!
//! ```bash
//! ds-cli api-key issue --user 42 --name "Shop integration" --allow-ip 203.0.113.7
//! ds-cli api-key list --user 42
//! ds-cli api-key revoke 7
//! ```

use std::net::IpAddr;

use chrono::{DateTime, Utc};
use dropship_api::services::{ApiKeyCache, ApiKeyService};
use dropship_core::{ApiKeyId, UserId};

use super::{CliError, KEY_CACHE_TTL, connect, print_json};

async fn service() -> Result<ApiKeyService, CliError> {
    let pool = connect().await?;
    Ok(ApiKeyService::new(pool, ApiKeyCache::new(KEY_CACHE_TTL)))
}

/// Issue a key and print it with its secret.
///
/// # Errors
///
/// Returns an error if the user cannot hold keys or the insert fails.
pub async fn issue(
    user_id: UserId,
    name: &str,
    allowed_ips: &[IpAddr],
    expires_at: Option<DateTime<Utc>>,
) -> Result<(), CliError> {
    let issued = service()
        .await?
        .issue(user_id, name, allowed_ips, expires_at)
        .await?;

    print_json(&issued)?;
    tracing::warn!("Store the secret now; it cannot be shown again.");
    Ok(())
}

/// Revoke a key.
///
/// # Errors
///
/// Returns an error if the key does not exist.
pub async fn revoke(id: ApiKeyId) -> Result<(), CliError> {
    let summary = service().await?.revoke(id).await?;
    print_json(&summary)
}

/// List keys, optionally for one user.
///
/// # Errors
///
/// Returns an error if the query fails.
pub async fn list(user_id: Option<UserId>) -> Result<(), CliError> {
    let keys = service().await?.list(user_id).await?;
    print_json(&keys)
}
