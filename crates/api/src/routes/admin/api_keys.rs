//! API key management.

use std::net::IpAddr;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use chrono::{DateTime, Utc};
use dropship_core::{ApiKeyId, UserId};
use serde::Deserialize;

use crate::error::AppError;
use crate::middleware::RequireAdmin;
use crate::models::{ApiKeySummary, IssuedApiKey};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub user_id: Option<UserId>,
}

#[derive(Debug, Deserialize)]
pub struct IssueRequest {
    pub user_id: UserId,
    pub name: String,
    /// Empty allows any address.
    #[serde(default)]
    pub allowed_ips: Vec<IpAddr>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

pub async fn index(
    _admin: RequireAdmin,
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<ApiKeySummary>>, AppError> {
    Ok(Json(state.api_keys().list(query.user_id).await?))
}

/// Issue a key. The response is the only time the secret is shown.
pub async fn create(
    _admin: RequireAdmin,
    State(state): State<AppState>,
    Json(request): Json<IssueRequest>,
) -> Result<(StatusCode, Json<IssuedApiKey>), AppError> {
    let issued = state
        .api_keys()
        .issue(
            request.user_id,
            &request.name,
            &request.allowed_ips,
            request.expires_at,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(issued)))
}

pub async fn revoke(
    _admin: RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<ApiKeyId>,
) -> Result<Json<ApiKeySummary>, AppError> {
    Ok(Json(state.api_keys().revoke(id).await?))
}
