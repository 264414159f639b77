//! Orders and their line items.

use chrono::{DateTime, Utc};
use dropship_core::commission::LineItem;
use dropship_core::{Money, OrderId, OrderItemId, OrderStatus, ProductId, UserId};
use serde::Serialize;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Order {
    pub id: OrderId,
    pub dropshipper_id: UserId,
    pub external_reference: Option<String>,
    pub status: OrderStatus,
    pub customer_name: String,
    pub customer_phone: String,
    pub shipping_address: String,
    pub subtotal: Money,
    pub commissions_distributed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct OrderItem {
    pub id: OrderItemId,
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub quantity: i32,
    pub unit_price: Money,
    pub retail_price: Money,
    #[serde(skip_serializing)]
    pub purchase_price: Money,
}

impl OrderItem {
    #[must_use]
    pub fn line_item(&self) -> LineItem {
        LineItem {
            product_id: self.product_id,
            // quantity > 0 is enforced by a CHECK constraint
            quantity: u32::try_from(self.quantity).unwrap_or_default(),
            retail_price: self.retail_price,
            purchase_price: self.purchase_price,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderWithItems {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItem>,
}

/// A validated order ready to be written.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub dropshipper_id: UserId,
    pub external_reference: Option<String>,
    pub customer_name: String,
    pub customer_phone: String,
    pub shipping_address: String,
    pub subtotal: Money,
}

/// A priced line ready to be written.
#[derive(Debug, Clone, Copy)]
pub struct NewOrderItem {
    pub product_id: ProductId,
    pub quantity: i32,
    pub unit_price: Money,
    pub retail_price: Money,
    pub purchase_price: Money,
}
