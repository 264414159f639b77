//! Catalog products and their per-buyer presentation.

use chrono::{DateTime, Utc};
use dropship_core::pricing::{Buyer, PriceList};
use dropship_core::{Money, ProductId, ProductStatus};
use serde::Serialize;

#[derive(Debug, Clone)]
pub struct Product {
    pub id: ProductId,
    pub sku: String,
    pub name: String,
    pub description: Option<String>,
    pub prices: PriceList,
    pub stock: i32,
    pub status: ProductStatus,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    #[must_use]
    pub fn is_purchasable(&self) -> bool {
        self.status == ProductStatus::Active
    }

    /// Present this product with prices for `buyer` at `now`.
    #[must_use]
    pub fn priced_for(&self, buyer: Buyer, now: DateTime<Utc>) -> PricedProduct {
        PricedProduct {
            id: self.id,
            sku: self.sku.clone(),
            name: self.name.clone(),
            description: self.description.clone(),
            price: self.prices.price_for(buyer, now),
            retail_price: self.prices.retail_price(now),
            stock: self.stock.max(0),
        }
    }
}

/// A product as returned to an integration client.
#[derive(Debug, Clone, Serialize)]
pub struct PricedProduct {
    pub id: ProductId,
    pub sku: String,
    pub name: String,
    pub description: Option<String>,
    /// What the caller pays.
    pub price: Money,
    /// Suggested resale price.
    pub retail_price: Money,
    pub stock: i32,
}
