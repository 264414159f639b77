//! IP blocklist commands.
//!
//! Changes are written to the database; a running server picks them up on
//! its next blocklist reload (`IP_BLOCKLIST_REFRESH_SECS`).

use std::net::IpAddr;

use chrono::{TimeDelta, Utc};
use dropship_api::db::IpSecurityRepository;

use super::{CliError, connect, print_json};

/// Block `ip`, for `duration_secs` or until lifted.
///
/// # Errors
///
/// Returns `InvalidArgument` for a bad reason or duration, or a database error.
pub async fn block(ip: IpAddr, reason: &str, duration_secs: Option<u64>) -> Result<(), CliError> {
    let reason = reason.trim();
    if reason.is_empty() {
        return Err(CliError::InvalidArgument("reason is required".into()));
    }

    let until = duration_secs
        .map(|secs| {
            i64::try_from(secs)
                .ok()
                .filter(|s| *s > 0)
                .and_then(TimeDelta::try_seconds)
                .and_then(|delta| Utc::now().checked_add_signed(delta))
                .ok_or_else(|| CliError::InvalidArgument(format!("invalid duration: {secs}")))
        })
        .transpose()?;

    let pool = connect().await?;
    let block = IpSecurityRepository::new(&pool)
        .upsert_block(ip, reason, until)
        .await?;
    print_json(&block)
}

/// Lift a block.
///
/// # Errors
///
/// Returns a database error if the delete fails.
pub async fn unblock(ip: IpAddr) -> Result<(), CliError> {
    let pool = connect().await?;
    if IpSecurityRepository::new(&pool).delete_block(ip).await? {
        tracing::info!(%ip, "IP unblocked");
    } else {
        tracing::warn!(%ip, "No block found");
    }
    Ok(())
}

/// Print the blocks currently in force.
///
/// # Errors
///
/// Returns a database error if the query fails.
pub async fn list() -> Result<(), CliError> {
    let pool = connect().await?;
    let blocks = IpSecurityRepository::new(&pool).active_blocks(Utc::now()).await?;
    print_json(&blocks)
}
