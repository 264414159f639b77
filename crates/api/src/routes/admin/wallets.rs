use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use dropship_core::{Money, UserId};
use serde::Deserialize;

use crate::error::AppError;
use crate::middleware::RequireAdmin;
use crate::models::WalletTransaction;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct AdjustmentRequest {
    /// Positive credits, negative debits.
    pub amount: Money,
    pub note: String,
}

pub async fn adjust(
    _admin: RequireAdmin,
    State(state): State<AppState>,
    Path(user_id): Path<UserId>,
    Json(request): Json<AdjustmentRequest>,
) -> Result<(StatusCode, Json<WalletTransaction>), AppError> {
    let transaction = state
        .wallets()
        .adjust(user_id, request.amount, &request.note)
        .await?;
    Ok((StatusCode::CREATED, Json(transaction)))
}
