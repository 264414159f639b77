//! Manual IP blocklist management.

use std::net::IpAddr;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use chrono::{TimeDelta, Utc};
use serde::Deserialize;

use crate::db::IpSecurityRepository;
use crate::error::AppError;
use crate::middleware::RequireAdmin;
use crate::models::IpBlock;
use crate::state::AppState;

const MAX_REASON_LEN: usize = 500;

#[derive(Debug, Deserialize)]
pub struct BlockRequest {
    pub ip: IpAddr,
    pub reason: String,
    /// Omit to block until lifted.
    #[serde(default)]
    pub duration_secs: Option<u64>,
}

/// Blocks currently in force.
pub async fn index(
    _admin: RequireAdmin,
    State(state): State<AppState>,
) -> Result<Json<Vec<IpBlock>>, AppError> {
    let blocks = IpSecurityRepository::new(state.pool())
        .active_blocks(Utc::now())
        .await?;
    Ok(Json(blocks))
}

/// Block an address, replacing any existing block on it.
pub async fn create(
    _admin: RequireAdmin,
    State(state): State<AppState>,
    Json(request): Json<BlockRequest>,
) -> Result<(StatusCode, Json<IpBlock>), AppError> {
    let reason = request.reason.trim();
    if reason.is_empty() || reason.len() > MAX_REASON_LEN {
        return Err(AppError::BadRequest(format!(
            "reason is required and must be at most {MAX_REASON_LEN} characters"
        )));
    }

    let until = match request.duration_secs {
        None => None,
        Some(0) => return Err(AppError::BadRequest("duration_secs must be positive".into())),
        Some(secs) => {
            let delta = i64::try_from(secs)
                .ok()
                .and_then(TimeDelta::try_seconds)
                .ok_or_else(|| AppError::BadRequest("duration_secs is too large".into()))?;
            Some(
                Utc::now()
                    .checked_add_signed(delta)
                    .ok_or_else(|| AppError::BadRequest("duration_secs is too large".into()))?,
            )
        }
    };

    let block = IpSecurityRepository::new(state.pool())
        .upsert_block(request.ip, reason, until)
        .await?;
    state.ip_guard().apply_block(&block);

    tracing::info!(ip = %block.ip, until = ?block.blocked_until, "IP blocked by operator");
    Ok((StatusCode::CREATED, Json(block)))
}

/// Lift a block.
pub async fn remove(
    _admin: RequireAdmin,
    State(state): State<AppState>,
    Path(ip): Path<IpAddr>,
) -> Result<StatusCode, AppError> {
    let existed = IpSecurityRepository::new(state.pool()).delete_block(ip).await?;
    state.ip_guard().unblock(ip);

    if existed {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound(format!("no block for {ip}")))
    }
}
