//! Orders and order items.

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};

use dropship_core::{OrderId, OrderStatus, UserId};

use super::{RepositoryError, conflict_on_unique};
use crate::models::{NewOrder, NewOrderItem, Order, OrderItem, OrderWithItems};

/// Repository for order reads.
pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List a dropshipper's orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_dropshipper(
        &self,
        dropshipper_id: UserId,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Order>, RepositoryError> {
        let orders = sqlx::query_as::<_, Order>(
            r"
            SELECT id, dropshipper_id, external_reference, status, customer_name,
                   customer_phone, shipping_address, subtotal,
                   commissions_distributed_at, created_at, updated_at
            FROM orders
            WHERE dropshipper_id = $1
            ORDER BY created_at DESC, id DESC
            LIMIT $2 OFFSET $3
            ",
        )
        .bind(dropshipper_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool)
        .await?;

        Ok(orders)
    }

    /// Get an order with its items.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn get_with_items(&self, id: OrderId) -> Result<Option<OrderWithItems>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;

        let Some(order) = get(&mut conn, id).await? else {
            return Ok(None);
        };
        let items = items(&mut conn, id).await?;

        Ok(Some(OrderWithItems { order, items }))
    }
}

/// Get an order by ID.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn get(conn: &mut PgConnection, id: OrderId) -> Result<Option<Order>, RepositoryError> {
    let order = sqlx::query_as::<_, Order>(
        r"
        SELECT id, dropshipper_id, external_reference, status, customer_name,
               customer_phone, shipping_address, subtotal,
               commissions_distributed_at, created_at, updated_at
        FROM orders
        WHERE id = $1
        ",
    )
    .bind(id)
    .fetch_optional(conn)
    .await?;

    Ok(order)
}

/// Lock an order row for the rest of the transaction.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn lock(conn: &mut PgConnection, id: OrderId) -> Result<Option<Order>, RepositoryError> {
    let order = sqlx::query_as::<_, Order>(
        r"
        SELECT id, dropshipper_id, external_reference, status, customer_name,
               customer_phone, shipping_address, subtotal,
               commissions_distributed_at, created_at, updated_at
        FROM orders
        WHERE id = $1
        FOR UPDATE
        ",
    )
    .bind(id)
    .fetch_optional(conn)
    .await?;

    Ok(order)
}

/// Find a dropshipper's order by their idempotency reference.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn find_by_reference(
    conn: &mut PgConnection,
    dropshipper_id: UserId,
    reference: &str,
) -> Result<Option<Order>, RepositoryError> {
    let order = sqlx::query_as::<_, Order>(
        r"
        SELECT id, dropshipper_id, external_reference, status, customer_name,
               customer_phone, shipping_address, subtotal,
               commissions_distributed_at, created_at, updated_at
        FROM orders
        WHERE dropshipper_id = $1 AND external_reference = $2
        ",
    )
    .bind(dropshipper_id)
    .bind(reference)
    .fetch_optional(conn)
    .await?;

    Ok(order)
}

/// Items of an order, in insertion order.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn items(conn: &mut PgConnection, order_id: OrderId) -> Result<Vec<OrderItem>, RepositoryError> {
    let items = sqlx::query_as::<_, OrderItem>(
        r"
        SELECT id, order_id, product_id, quantity, unit_price, retail_price, purchase_price
        FROM order_items
        WHERE order_id = $1
        ORDER BY id
        ",
    )
    .bind(order_id)
    .fetch_all(conn)
    .await?;

    Ok(items)
}

/// Insert an order and its items.
///
/// # Errors
///
/// Returns `RepositoryError::Conflict` if the dropshipper already used the
/// external reference.
/// Returns `RepositoryError::Database` for other database errors.
pub async fn insert(
    conn: &mut PgConnection,
    order: &NewOrder,
    lines: &[NewOrderItem],
) -> Result<OrderWithItems, RepositoryError> {
    let created = sqlx::query_as::<_, Order>(
        r"
        INSERT INTO orders (dropshipper_id, external_reference, customer_name,
                            customer_phone, shipping_address, subtotal)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING id, dropshipper_id, external_reference, status, customer_name,
                  customer_phone, shipping_address, subtotal,
                  commissions_distributed_at, created_at, updated_at
        ",
    )
    .bind(order.dropshipper_id)
    .bind(order.external_reference.as_deref())
    .bind(&order.customer_name)
    .bind(&order.customer_phone)
    .bind(&order.shipping_address)
    .bind(order.subtotal)
    .fetch_one(&mut *conn)
    .await
    .map_err(|e| conflict_on_unique(e, "external reference already used"))?;

    let mut items = Vec::with_capacity(lines.len());
    for line in lines {
        let item = sqlx::query_as::<_, OrderItem>(
            r"
            INSERT INTO order_items (order_id, product_id, quantity, unit_price,
                                     retail_price, purchase_price)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, order_id, product_id, quantity, unit_price, retail_price, purchase_price
            ",
        )
        .bind(created.id)
        .bind(line.product_id)
        .bind(line.quantity)
        .bind(line.unit_price)
        .bind(line.retail_price)
        .bind(line.purchase_price)
        .fetch_one(&mut *conn)
        .await
        .map_err(|e| conflict_on_unique(e, "duplicate product line"))?;
        items.push(item);
    }

    Ok(OrderWithItems {
        order: created,
        items,
    })
}

/// Set an order's status.
///
/// # Errors
///
/// Returns `RepositoryError::NotFound` if the order does not exist.
pub async fn set_status(
    conn: &mut PgConnection,
    id: OrderId,
    status: OrderStatus,
) -> Result<Order, RepositoryError> {
    sqlx::query_as::<_, Order>(
        r"
        UPDATE orders
        SET status = $2, updated_at = NOW()
        WHERE id = $1
        RETURNING id, dropshipper_id, external_reference, status, customer_name,
                  customer_phone, shipping_address, subtotal,
                  commissions_distributed_at, created_at, updated_at
        ",
    )
    .bind(id)
    .bind(status)
    .fetch_optional(conn)
    .await?
    .ok_or(RepositoryError::NotFound)
}

/// Record that commissions have been paid for an order.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn mark_commissions_distributed(
    conn: &mut PgConnection,
    id: OrderId,
    at: DateTime<Utc>,
) -> Result<(), RepositoryError> {
    sqlx::query("UPDATE orders SET commissions_distributed_at = $2, updated_at = NOW() WHERE id = $1")
        .bind(id)
        .bind(at)
        .execute(conn)
        .await?;

    Ok(())
}
