//! The caller's commission wallet.

use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
};
use dropship_core::Money;
use serde::Deserialize;

use super::super::PaginationQuery;
use crate::error::AppError;
use crate::models::{AuthenticatedClient, WalletTransaction};
use crate::services::WalletBalance;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct WithdrawalRequest {
    pub amount: Money,
}

pub async fn show(
    State(state): State<AppState>,
    client: AuthenticatedClient,
) -> Result<Json<WalletBalance>, AppError> {
    Ok(Json(state.wallets().balance(client.user_id).await?))
}

pub async fn transactions(
    State(state): State<AppState>,
    client: AuthenticatedClient,
    Query(page): Query<PaginationQuery>,
) -> Result<Json<Vec<WalletTransaction>>, AppError> {
    let lines = state
        .wallets()
        .transactions(client.user_id, page.limit(), page.offset())
        .await?;
    Ok(Json(lines))
}

/// Withdraw from the wallet. Responds 422 when the balance does not cover it.
pub async fn withdraw(
    State(state): State<AppState>,
    client: AuthenticatedClient,
    Json(request): Json<WithdrawalRequest>,
) -> Result<(StatusCode, Json<WalletTransaction>), AppError> {
    let transaction = state.wallets().withdraw(client.user_id, request.amount).await?;
    Ok((StatusCode::CREATED, Json(transaction)))
}
