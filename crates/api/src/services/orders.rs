//! Placing orders and moving them through their lifecycle.

use std::collections::{HashMap, HashSet};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use thiserror::Error;
use tracing::{info, instrument, warn};

use dropship_core::{Money, OrderId, OrderStatus, ProductId};

use super::commission::{self, DistributionError, DistributionOutcome};
use crate::db::{RepositoryError, orders, products};
use crate::models::{AuthenticatedClient, NewOrder, NewOrderItem, Order, OrderWithItems};

const MAX_LINES_PER_ORDER: usize = 100;
const MAX_REFERENCE_LEN: usize = 128;
const MAX_TEXT_FIELD_LEN: usize = 500;

/// Errors from order operations.
#[derive(Debug, Error)]
pub enum OrderError {
    #[error("{0}")]
    Invalid(String),

    #[error("product {0} is not available")]
    ProductUnavailable(ProductId),

    #[error("insufficient stock for product {product_id} (available: {available})")]
    InsufficientStock { product_id: ProductId, available: i32 },

    #[error("order not found")]
    NotFound,

    #[error("cannot move order from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    #[error(transparent)]
    Distribution(#[from] DistributionError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl From<sqlx::Error> for OrderError {
    fn from(e: sqlx::Error) -> Self {
        Self::Repository(RepositoryError::Database(e))
    }
}

/// Order placement request from an integration client.
#[derive(Debug, Clone, Deserialize)]
pub struct PlaceOrderRequest {
    /// Client-side order id; repeating it returns the original order.
    #[serde(default)]
    pub external_reference: Option<String>,
    pub customer_name: String,
    pub customer_phone: String,
    pub shipping_address: String,
    pub items: Vec<OrderLineRequest>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct OrderLineRequest {
    pub product_id: ProductId,
    pub quantity: i32,
}

/// Result of placing an order.
#[derive(Debug, Clone)]
pub struct PlacedOrder {
    pub order: OrderWithItems,
    /// `false` when an earlier order with the same external reference was returned.
    pub created: bool,
}

/// Result of a status change.
#[derive(Debug, Clone, Serialize)]
pub struct TransitionOutcome {
    pub order: Order,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commissions: Option<DistributionOutcome>,
}

impl PlaceOrderRequest {
    /// Check shape before touching the database.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::Invalid` describing the first problem found.
    pub fn validate(&self) -> Result<(), OrderError> {
        if self.items.is_empty() {
            return Err(OrderError::Invalid("order must contain at least one item".into()));
        }
        if self.items.len() > MAX_LINES_PER_ORDER {
            return Err(OrderError::Invalid(format!(
                "order may contain at most {MAX_LINES_PER_ORDER} lines"
            )));
        }

        let mut seen = HashSet::with_capacity(self.items.len());
        for line in &self.items {
            if line.quantity <= 0 {
                return Err(OrderError::Invalid(format!(
                    "quantity for product {} must be positive",
                    line.product_id
                )));
            }
            if !seen.insert(line.product_id) {
                return Err(OrderError::Invalid(format!(
                    "product {} appears more than once",
                    line.product_id
                )));
            }
        }

        for (field, value) in [
            ("customer_name", &self.customer_name),
            ("customer_phone", &self.customer_phone),
            ("shipping_address", &self.shipping_address),
        ] {
            if value.trim().is_empty() {
                return Err(OrderError::Invalid(format!("{field} is required")));
            }
            if value.len() > MAX_TEXT_FIELD_LEN {
                return Err(OrderError::Invalid(format!(
                    "{field} must be at most {MAX_TEXT_FIELD_LEN} characters"
                )));
            }
        }

        if let Some(reference) = self.reference()
            && reference.len() > MAX_REFERENCE_LEN
        {
            return Err(OrderError::Invalid(format!(
                "external_reference must be at most {MAX_REFERENCE_LEN} characters"
            )));
        }

        Ok(())
    }

    /// Trimmed external reference; blank counts as absent.
    #[must_use]
    pub fn reference(&self) -> Option<&str> {
        self.external_reference
            .as_deref()
            .map(str::trim)
            .filter(|r| !r.is_empty())
    }
}

/// Service for dropshipper orders.
#[derive(Clone)]
pub struct OrderService {
    pool: PgPool,
}

impl OrderService {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Place an order on behalf of `client`.
    ///
    /// Products are locked, priced for the caller and their stock taken in a
    /// single transaction.
    ///
    /// # Errors
    ///
    /// Returns `Invalid`, `ProductUnavailable` or `InsufficientStock` for bad
    /// requests and `Repository` on database failure.
    #[instrument(skip(self, request), fields(user_id = %client.user_id, lines = request.items.len()))]
    pub async fn place(
        &self,
        client: &AuthenticatedClient,
        request: PlaceOrderRequest,
    ) -> Result<PlacedOrder, OrderError> {
        request.validate()?;
        let reference = request.reference().map(str::to_owned);

        let mut tx = self.pool.begin().await?;

        if let Some(reference) = reference.as_deref()
            && let Some(existing) = orders::find_by_reference(&mut tx, client.user_id, reference).await?
        {
            let items = orders::items(&mut tx, existing.id).await?;
            tx.commit().await?;
            return Ok(PlacedOrder {
                order: OrderWithItems {
                    order: existing,
                    items,
                },
                created: false,
            });
        }

        let ids: Vec<ProductId> = request.items.iter().map(|l| l.product_id).collect();
        let locked: HashMap<ProductId, _> = products::lock_for_update(&mut tx, &ids)
            .await?
            .into_iter()
            .map(|p| (p.id, p))
            .collect();

        let now = Utc::now();
        let buyer = client.buyer();
        let mut lines = Vec::with_capacity(request.items.len());
        let mut subtotal = Money::ZERO;

        for line in &request.items {
            let product = locked
                .get(&line.product_id)
                .filter(|p| p.is_purchasable())
                .ok_or(OrderError::ProductUnavailable(line.product_id))?;
            if product.stock < line.quantity {
                return Err(OrderError::InsufficientStock {
                    product_id: product.id,
                    available: product.stock.max(0),
                });
            }

            let unit_price = product.prices.price_for(buyer, now);
            // quantity was validated positive
            subtotal += unit_price * line.quantity.unsigned_abs();
            lines.push(NewOrderItem {
                product_id: product.id,
                quantity: line.quantity,
                unit_price,
                retail_price: product.prices.retail_price(now),
                purchase_price: product.prices.purchase_price,
            });

            products::adjust_stock(&mut tx, product.id, -line.quantity).await?;
        }

        let new_order = NewOrder {
            dropshipper_id: client.user_id,
            external_reference: reference.clone(),
            customer_name: request.customer_name.trim().to_owned(),
            customer_phone: request.customer_phone.trim().to_owned(),
            shipping_address: request.shipping_address.trim().to_owned(),
            subtotal,
        };

        let placed = match orders::insert(&mut tx, &new_order, &lines).await {
            Ok(placed) => placed,
            Err(RepositoryError::Conflict(_)) if reference.is_some() => {
                // Lost a race with a concurrent request using the same reference.
                tx.rollback().await?;
                return self.existing_by_reference(client, reference.as_deref()).await;
            }
            Err(e) => return Err(e.into()),
        };

        tx.commit().await?;

        info!(
            order_id = %placed.order.id,
            subtotal = %placed.order.subtotal,
            "Order placed"
        );

        Ok(PlacedOrder {
            order: placed,
            created: true,
        })
    }

    async fn existing_by_reference(
        &self,
        client: &AuthenticatedClient,
        reference: Option<&str>,
    ) -> Result<PlacedOrder, OrderError> {
        let mut conn = self.pool.acquire().await?;
        let reference = reference.unwrap_or_default();

        let order = orders::find_by_reference(&mut conn, client.user_id, reference)
            .await?
            .ok_or(OrderError::NotFound)?;
        let items = orders::items(&mut conn, order.id).await?;

        Ok(PlacedOrder {
            order: OrderWithItems { order, items },
            created: false,
        })
    }

    /// Move an order to `next`.
    ///
    /// Cancelling puts the stock back. Delivering pays commissions in the
    /// same transaction.
    ///
    /// # Errors
    ///
    /// Returns `NotFound`, `InvalidTransition`, `Distribution` if commissions
    /// cannot be paid, or `Repository` on database failure.
    #[instrument(skip(self), fields(order_id = %order_id, next = %next))]
    pub async fn transition(
        &self,
        order_id: OrderId,
        next: OrderStatus,
    ) -> Result<TransitionOutcome, OrderError> {
        let mut tx = self.pool.begin().await?;

        let current = orders::lock(&mut tx, order_id)
            .await?
            .ok_or(OrderError::NotFound)?;

        if !current.status.can_transition_to(next) {
            warn!(from = %current.status, to = %next, "Rejected order transition");
            return Err(OrderError::InvalidTransition {
                from: current.status,
                to: next,
            });
        }

        if current.status.restocks_on(next) {
            for item in orders::items(&mut tx, order_id).await? {
                products::adjust_stock(&mut tx, item.product_id, item.quantity).await?;
            }
        }

        let order = orders::set_status(&mut tx, order_id, next).await?;

        let commissions = if next == OrderStatus::Delivered {
            Some(commission::distribute_locked(&mut tx, &order, Utc::now()).await?)
        } else {
            None
        };

        tx.commit().await?;

        info!(from = %current.status, to = %next, "Order status changed");

        Ok(TransitionOutcome { order, commissions })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn request(items: Vec<OrderLineRequest>) -> PlaceOrderRequest {
        PlaceOrderRequest {
            external_reference: None,
            customer_name: "Grace Hopper".to_string(),
            customer_phone: "+1 555 0100".to_string(),
            shipping_address: "1 Navy Way, Arlington".to_string(),
            items,
        }
    }

    fn line(product_id: i64, quantity: i32) -> OrderLineRequest {
        OrderLineRequest {
            product_id: ProductId::new(product_id),
            quantity,
        }
    }

    #[test]
    fn test_validate_accepts_normal_order() {
        assert!(request(vec![line(1, 2), line(2, 1)]).validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_empty_order() {
        assert!(matches!(request(vec![]).validate(), Err(OrderError::Invalid(_))));
    }

    #[test]
    fn test_validate_rejects_non_positive_quantity() {
        assert!(matches!(
            request(vec![line(1, 0)]).validate(),
            Err(OrderError::Invalid(_))
        ));
        assert!(matches!(
            request(vec![line(1, -3)]).validate(),
            Err(OrderError::Invalid(_))
        ));
    }

    #[test]
    fn test_validate_rejects_duplicate_products() {
        let err = request(vec![line(7, 1), line(7, 2)]).validate().unwrap_err();
        assert!(err.to_string().contains("more than once"));
    }

    #[test]
    fn test_validate_requires_customer_fields() {
        let mut req = request(vec![line(1, 1)]);
        req.shipping_address = "   ".to_string();
        let err = req.validate().unwrap_err();
        assert_eq!(err.to_string(), "shipping_address is required");
    }

    #[test]
    fn test_blank_reference_is_absent() {
        let mut req = request(vec![line(1, 1)]);
        req.external_reference = Some("  ".to_string());
        assert_eq!(req.reference(), None);

        req.external_reference = Some(" PO-1001 ".to_string());
        assert_eq!(req.reference(), Some("PO-1001"));

        req.external_reference = Some("x".repeat(MAX_REFERENCE_LEN + 1));
        assert!(req.validate().is_err());
    }
}
