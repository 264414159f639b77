//! Status and role enums.
//!
//! With the `postgres` feature each enum maps onto a Postgres enum type of
//! the same `snake_case` spelling (see `crates/api/migrations`).

use serde::{Deserialize, Serialize};

/// Role of a platform user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "user_role", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    #[default]
    Customer,
    Dropshipper,
    Admin,
}

/// Position of a dropshipper in the referral hierarchy.
///
/// A `Dropshipper` recruits `SubDropshipper`s, who in turn recruit
/// `SubSubDropshipper`s. Each tier earns its own profit-share percentage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "dropshipper_tier", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum DropshipperTier {
    Dropshipper,
    SubDropshipper,
    SubSubDropshipper,
}

impl DropshipperTier {
    pub const ALL: [Self; 3] = [Self::Dropshipper, Self::SubDropshipper, Self::SubSubDropshipper];

    /// Distance from the top of the hierarchy (0 for `Dropshipper`).
    #[must_use]
    pub const fn seniority(self) -> u8 {
        match self {
            Self::Dropshipper => 0,
            Self::SubDropshipper => 1,
            Self::SubSubDropshipper => 2,
        }
    }

    /// Whether `self` sits strictly above `other` in the hierarchy.
    #[must_use]
    pub const fn is_senior_to(self, other: Self) -> bool {
        self.seniority() < other.seniority()
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Dropshipper => "dropshipper",
            Self::SubDropshipper => "sub_dropshipper",
            Self::SubSubDropshipper => "sub_sub_dropshipper",
        }
    }
}

impl std::fmt::Display for DropshipperTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DropshipperTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|tier| tier.as_str() == s)
            .ok_or_else(|| format!("invalid dropshipper tier: {s}"))
    }
}

/// Order lifecycle status.
///
/// ```text
/// pending ──▶ processing ──▶ shipped ──▶ delivered
///    │            │
///    └────────────┴──▶ cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "order_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    Pending,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Processing | Self::Cancelled)
                | (Self::Processing, Self::Shipped | Self::Cancelled)
                | (Self::Shipped, Self::Delivered)
        )
    }

    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Delivered | Self::Cancelled)
    }

    /// Whether moving to `next` puts the ordered stock back on the shelf.
    #[must_use]
    pub const fn restocks_on(self, next: Self) -> bool {
        matches!(next, Self::Cancelled) && self.can_transition_to(next)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Shipped => "shipped",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Catalog visibility of a product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "product_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum ProductStatus {
    #[default]
    Draft,
    Active,
    Archived,
}

/// Kind of wallet ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "wallet_transaction_kind", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum WalletTransactionKind {
    /// Profit share credited when an order is delivered.
    Commission,
    /// Payout requested by the wallet owner.
    Withdrawal,
    /// Manual correction by an operator (either sign).
    Adjustment,
}

/// Lifecycle of an integration API key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "api_key_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum ApiKeyStatus {
    #[default]
    Active,
    Revoked,
}

/// Security event recorded against a client IP.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "ip_event", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum IpEvent {
    AuthFailure,
    RateLimited,
    Blocked,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_order_transitions() {
        use OrderStatus::*;

        assert!(Pending.can_transition_to(Processing));
        assert!(Pending.can_transition_to(Cancelled));
        assert!(Processing.can_transition_to(Shipped));
        assert!(Shipped.can_transition_to(Delivered));

        assert!(!Pending.can_transition_to(Delivered));
        assert!(!Shipped.can_transition_to(Cancelled));
        assert!(!Delivered.can_transition_to(Pending));
        assert!(!Cancelled.can_transition_to(Processing));
        assert!(!Pending.can_transition_to(Pending));
    }

    #[test]
    fn test_terminal_and_restock() {
        assert!(OrderStatus::Delivered.is_terminal());
        assert!(OrderStatus::Cancelled.is_terminal());
        assert!(!OrderStatus::Shipped.is_terminal());

        assert!(OrderStatus::Processing.restocks_on(OrderStatus::Cancelled));
        assert!(!OrderStatus::Shipped.restocks_on(OrderStatus::Cancelled));
        assert!(!OrderStatus::Pending.restocks_on(OrderStatus::Processing));
    }

    #[test]
    fn test_tier_seniority() {
        use DropshipperTier::*;

        assert!(Dropshipper.is_senior_to(SubDropshipper));
        assert!(SubDropshipper.is_senior_to(SubSubDropshipper));
        assert!(!SubDropshipper.is_senior_to(SubDropshipper));
        assert!(!SubSubDropshipper.is_senior_to(Dropshipper));

        assert_eq!(Dropshipper.seniority(), 0);
        assert_eq!(SubDropshipper.seniority(), 1);
        assert_eq!(SubSubDropshipper.seniority(), 2);
    }

    #[test]
    fn test_tier_parse_and_serde() {
        for tier in DropshipperTier::ALL {
            assert_eq!(tier.to_string().parse::<DropshipperTier>().unwrap(), tier);
            let json = serde_json::to_string(&tier).unwrap();
            assert_eq!(json, format!("\"{tier}\""));
        }
        assert!("reseller".parse::<DropshipperTier>().is_err());
    }
}
