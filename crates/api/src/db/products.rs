//! Catalog reads and stock movements.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};

use dropship_core::pricing::{Discount, DiscountKind, PriceList};
use dropship_core::{Money, ProductId, ProductStatus};

use super::RepositoryError;
use crate::models::Product;

#[derive(sqlx::FromRow)]
struct ProductRow {
    id: ProductId,
    sku: String,
    name: String,
    description: Option<String>,
    price: Money,
    purchase_price: Money,
    dropshipper_price: Option<Money>,
    discount_kind: Option<DiscountKind>,
    discount_value: Option<Decimal>,
    discount_starts_at: Option<DateTime<Utc>>,
    discount_ends_at: Option<DateTime<Utc>>,
    stock: i32,
    status: ProductStatus,
    updated_at: DateTime<Utc>,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        let discount = match (row.discount_kind, row.discount_value) {
            (Some(kind), Some(value)) => Some(Discount {
                kind,
                value,
                starts_at: row.discount_starts_at,
                ends_at: row.discount_ends_at,
            }),
            _ => None,
        };

        Self {
            id: row.id,
            sku: row.sku,
            name: row.name,
            description: row.description,
            prices: PriceList {
                price: row.price,
                purchase_price: row.purchase_price,
                dropshipper_price: row.dropshipper_price,
                discount,
            },
            stock: row.stock,
            status: row.status,
            updated_at: row.updated_at,
        }
    }
}

/// Repository for catalog reads.
pub struct ProductRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ProductRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List active products, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_active(&self, limit: i64, offset: i64) -> Result<Vec<Product>, RepositoryError> {
        let rows = sqlx::query_as::<_, ProductRow>(
            r"
            SELECT id, sku, name, description, price, purchase_price, dropshipper_price,
                   discount_kind, discount_value, discount_starts_at, discount_ends_at,
                   stock, status, updated_at
            FROM products
            WHERE status = 'active'
            ORDER BY id DESC
            LIMIT $1 OFFSET $2
            ",
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Product::from).collect())
    }

    /// Get an active product by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_active(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(
            r"
            SELECT id, sku, name, description, price, purchase_price, dropshipper_price,
                   discount_kind, discount_value, discount_starts_at, discount_ends_at,
                   stock, status, updated_at
            FROM products
            WHERE id = $1 AND status = 'active'
            ",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Product::from))
    }
}

/// Lock the given products for the rest of the transaction.
///
/// Rows are locked in id order so concurrent orders touching the same
/// products cannot deadlock. Missing ids are simply absent from the result.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn lock_for_update(
    conn: &mut PgConnection,
    ids: &[ProductId],
) -> Result<Vec<Product>, RepositoryError> {
    let raw: Vec<i64> = ids.iter().map(ProductId::as_i64).collect();

    let rows = sqlx::query_as::<_, ProductRow>(
        r"
        SELECT id, sku, name, description, price, purchase_price, dropshipper_price,
               discount_kind, discount_value, discount_starts_at, discount_ends_at,
               stock, status, updated_at
        FROM products
        WHERE id = ANY($1)
        ORDER BY id
        FOR UPDATE
        ",
    )
    .bind(raw)
    .fetch_all(conn)
    .await?;

    Ok(rows.into_iter().map(Product::from).collect())
}

/// Add `delta` (negative to take) to a product's stock.
///
/// # Errors
///
/// Returns `RepositoryError::Conflict` if stock would go negative.
/// Returns `RepositoryError::NotFound` if the product does not exist.
pub async fn adjust_stock(
    conn: &mut PgConnection,
    id: ProductId,
    delta: i32,
) -> Result<i32, RepositoryError> {
    let stock: Option<i32> = sqlx::query_scalar(
        r"
        UPDATE products
        SET stock = stock + $2, updated_at = NOW()
        WHERE id = $1 AND stock + $2 >= 0
        RETURNING stock
        ",
    )
    .bind(id)
    .bind(delta)
    .fetch_optional(&mut *conn)
    .await?;

    if let Some(stock) = stock {
        return Ok(stock);
    }

    let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM products WHERE id = $1)")
        .bind(id)
        .fetch_one(conn)
        .await?;

    if exists {
        Err(RepositoryError::Conflict(format!("insufficient stock for product {id}")))
    } else {
        Err(RepositoryError::NotFound)
    }
}
