//! Order placement and history for the caller.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use dropship_core::OrderId;

use super::super::PaginationQuery;
use crate::db::OrderRepository;
use crate::error::AppError;
use crate::models::{AuthenticatedClient, Order, OrderWithItems};
use crate::services::PlaceOrderRequest;
use crate::state::AppState;

/// Place an order.
///
/// Responds 201 for a new order and 200 when `external_reference` matched
/// an earlier one.
pub async fn create(
    State(state): State<AppState>,
    client: AuthenticatedClient,
    Json(request): Json<PlaceOrderRequest>,
) -> Result<(StatusCode, Json<OrderWithItems>), AppError> {
    let placed = state.orders().place(&client, request).await?;
    let status = if placed.created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(placed.order)))
}

/// The caller's orders, newest first.
pub async fn index(
    State(state): State<AppState>,
    client: AuthenticatedClient,
    Query(page): Query<PaginationQuery>,
) -> Result<Json<Vec<Order>>, AppError> {
    let orders = OrderRepository::new(state.pool())
        .list_for_dropshipper(client.user_id, page.limit(), page.offset())
        .await?;
    Ok(Json(orders))
}

/// One of the caller's orders. Other dropshippers' orders are reported as missing.
pub async fn show(
    State(state): State<AppState>,
    client: AuthenticatedClient,
    Path(id): Path<OrderId>,
) -> Result<Json<OrderWithItems>, AppError> {
    OrderRepository::new(state.pool())
        .get_with_items(id)
        .await?
        .filter(|o| o.order.dropshipper_id == client.user_id)
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("order {id}")))
}
