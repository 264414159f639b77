//! Price a product for a particular buyer.
//!
//! Retail buyers pay the list price less any running discount. Dropshippers
//! of every tier pay the wholesale (dropshipper) price when one is set, but
//! never more than the current retail price.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::{DropshipperTier, Money, UserRole};

/// How a discount reduces the list price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "discount_kind", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum DiscountKind {
    /// `value` is a percentage of the list price.
    Percent,
    /// `value` is an absolute amount off the list price.
    Flat,
}

/// A time-boxed discount on a product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Discount {
    pub kind: DiscountKind,
    pub value: Decimal,
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
}

impl Discount {
    /// Whether the discount applies at `now` (both bounds inclusive).
    #[must_use]
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.starts_at.is_none_or(|start| start <= now) && self.ends_at.is_none_or(|end| now <= end)
    }

    fn apply(&self, price: Money) -> Money {
        let reduced = match self.kind {
            DiscountKind::Percent => {
                let pct = self.value.clamp(Decimal::ZERO, Decimal::ONE_HUNDRED);
                Money::new(price.amount() - price.amount() * pct / Decimal::ONE_HUNDRED)
            }
            DiscountKind::Flat => Money::new(price.amount() - self.value.max(Decimal::ZERO)),
        };
        reduced.non_negative().round()
    }
}

/// Who is buying, as far as pricing is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Buyer {
    Guest,
    Customer,
    Admin,
    Dropshipper(DropshipperTier),
}

impl Buyer {
    /// Derive the buyer class from a stored role and optional tier.
    ///
    /// A user with the dropshipper role but no tier is priced as a top-level
    /// dropshipper.
    #[must_use]
    pub fn from_role(role: UserRole, tier: Option<DropshipperTier>) -> Self {
        match role {
            UserRole::Customer => Self::Customer,
            UserRole::Admin => Self::Admin,
            UserRole::Dropshipper => Self::Dropshipper(tier.unwrap_or(DropshipperTier::Dropshipper)),
        }
    }
}

/// Pricing fields of a product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceList {
    /// List (retail) price.
    pub price: Money,
    /// What the platform paid for one unit.
    pub purchase_price: Money,
    /// Wholesale price offered to dropshippers.
    pub dropshipper_price: Option<Money>,
    pub discount: Option<Discount>,
}

impl PriceList {
    /// Retail price at `now`, after any active discount.
    #[must_use]
    pub fn retail_price(&self, now: DateTime<Utc>) -> Money {
        match self.discount {
            Some(discount) if discount.is_active(now) => discount.apply(self.price),
            _ => self.price.round(),
        }
    }

    /// Price `buyer` pays at `now`.
    #[must_use]
    pub fn price_for(&self, buyer: Buyer, now: DateTime<Utc>) -> Money {
        let retail = self.retail_price(now);
        match (buyer, self.dropshipper_price) {
            (Buyer::Dropshipper(_), Some(wholesale)) => wholesale.round().min(retail),
            _ => retail,
        }
    }
}
