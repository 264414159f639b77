//! Catalog as seen by the caller.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use chrono::Utc;
use dropship_core::ProductId;

use super::super::PaginationQuery;
use crate::db::ProductRepository;
use crate::error::AppError;
use crate::models::{AuthenticatedClient, PricedProduct};
use crate::state::AppState;

/// Active products with the caller's price.
pub async fn index(
    State(state): State<AppState>,
    client: AuthenticatedClient,
    Query(page): Query<PaginationQuery>,
) -> Result<Json<Vec<PricedProduct>>, AppError> {
    let products = ProductRepository::new(state.pool())
        .list_active(page.limit(), page.offset())
        .await?;

    let now = Utc::now();
    let buyer = client.buyer();
    Ok(Json(
        products.iter().map(|p| p.priced_for(buyer, now)).collect(),
    ))
}

/// A single active product.
pub async fn show(
    State(state): State<AppState>,
    client: AuthenticatedClient,
    Path(id): Path<ProductId>,
) -> Result<Json<PricedProduct>, AppError> {
    let product = ProductRepository::new(state.pool())
        .get_active(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("product {id}")))?;

    Ok(Json(product.priced_for(client.buyer(), Utc::now())))
}
