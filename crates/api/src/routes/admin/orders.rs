//! Order lifecycle for operators.

use axum::{
    Json,
    extract::{Path, State},
};
use dropship_core::{OrderId, OrderStatus};
use serde::Deserialize;

use crate::error::AppError;
use crate::middleware::RequireAdmin;
use crate::services::{DistributionOutcome, TransitionOutcome};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct StatusUpdate {
    pub status: OrderStatus,
}

/// Move an order to a new status.
///
/// Moving to `delivered` pays commissions in the same transaction; the
/// outcome is included in the response.
pub async fn update_status(
    _admin: RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<OrderId>,
    Json(update): Json<StatusUpdate>,
) -> Result<Json<TransitionOutcome>, AppError> {
    let outcome = state.orders().transition(id, update.status).await?;
    Ok(Json(outcome))
}

/// Re-run commission distribution for a delivered order.
pub async fn distribute_commissions(
    _admin: RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<OrderId>,
) -> Result<Json<DistributionOutcome>, AppError> {
    let outcome = state.commissions().distribute_for_order(id).await?;
    Ok(Json(outcome))
}
