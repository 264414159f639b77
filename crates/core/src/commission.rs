//! Three-level profit-pool commission split.
//!
//! When an order is delivered, the profit it generated (retail minus cost,
//! per line) is shared between the dropshipper who sold it and up to two
//! members of their upline. Each member earns the percentage configured for
//! their tier; whatever is left stays with the platform.
//!
//! ```text
//! sub_sub_dropshipper (seller, level 1) ──parent──▶ sub_dropshipper (level 2)
//!                                        ──parent──▶ dropshipper     (level 3)
//! ```

use std::collections::HashSet;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::{DropshipperTier, Money, ProductId, UserId};

/// Maximum number of people paid on a single order.
pub const MAX_COMMISSION_LEVELS: usize = 3;

/// Errors produced by the commission rules.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommissionError {
    #[error("invalid commission rates: {0}")]
    InvalidRates(String),
}

/// Profit-share percentage for each tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommissionRates {
    pub dropshipper: Decimal,
    pub sub_dropshipper: Decimal,
    pub sub_sub_dropshipper: Decimal,
}

impl Default for CommissionRates {
    fn default() -> Self {
        Self {
            dropshipper: Decimal::new(10, 0),
            sub_dropshipper: Decimal::new(7, 0),
            sub_sub_dropshipper: Decimal::new(5, 0),
        }
    }
}

impl CommissionRates {
    #[must_use]
    pub const fn rate_for(&self, tier: DropshipperTier) -> Decimal {
        match tier {
            DropshipperTier::Dropshipper => self.dropshipper,
            DropshipperTier::SubDropshipper => self.sub_dropshipper,
            DropshipperTier::SubSubDropshipper => self.sub_sub_dropshipper,
        }
    }

    /// Check every rate is within 0–100 and together they never hand out
    /// more than the whole pool.
    ///
    /// # Errors
    ///
    /// Returns `CommissionError::InvalidRates` naming the offending value.
    pub fn validate(&self) -> Result<(), CommissionError> {
        for tier in DropshipperTier::ALL {
            let rate = self.rate_for(tier);
            if rate < Decimal::ZERO || rate > Decimal::ONE_HUNDRED {
                return Err(CommissionError::InvalidRates(format!(
                    "{tier} rate {rate} must be between 0 and 100"
                )));
            }
        }

        let total: Decimal = DropshipperTier::ALL.iter().map(|t| self.rate_for(*t)).sum();
        if total > Decimal::ONE_HUNDRED {
            return Err(CommissionError::InvalidRates(format!(
                "rates add up to {total}%, more than the whole profit pool"
            )));
        }

        Ok(())
    }
}

/// One order line as seen by the commission engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineItem {
    pub product_id: ProductId,
    pub quantity: u32,
    /// Retail unit price at the time the order was placed.
    pub retail_price: Money,
    /// Cost (purchase) unit price at the time the order was placed.
    pub purchase_price: Money,
}

impl LineItem {
    /// Profit on this line; never negative.
    #[must_use]
    pub fn profit(&self) -> Money {
        ((self.retail_price - self.purchase_price) * self.quantity).non_negative()
    }
}

/// Total profit available for commissions on an order.
#[must_use]
pub fn profit_pool(items: &[LineItem]) -> Money {
    items.iter().map(LineItem::profit).sum()
}

/// A member of the referral chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainMember {
    pub user_id: UserId,
    pub tier: DropshipperTier,
}

/// The seller and their paid upline, seller first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReferralChain {
    members: Vec<ChainMember>,
}

impl ReferralChain {
    /// Build the chain from the seller and their successive parents.
    ///
    /// `parents` yields the seller's parent first, then that parent's parent,
    /// and so on; `None` marks an upline user who is not a dropshipper. The
    /// walk stops at the first member that would break the chain: a
    /// non-dropshipper, someone not strictly senior to the previous member
    /// (so each tier is paid at most once), a repeated user, or the level cap.
    #[must_use]
    pub fn resolve<I>(seller: ChainMember, parents: I) -> Self
    where
        I: IntoIterator<Item = Option<ChainMember>>,
    {
        let mut members = vec![seller];
        let mut seen = HashSet::from([seller.user_id]);

        for parent in parents {
            if members.len() >= MAX_COMMISSION_LEVELS {
                break;
            }
            let Some(parent) = parent else { break };
            let Some(previous) = members.last() else { break };
            if !parent.tier.is_senior_to(previous.tier) || !seen.insert(parent.user_id) {
                break;
            }
            members.push(parent);
        }

        Self { members }
    }

    #[must_use]
    pub fn members(&self) -> &[ChainMember] {
        &self.members
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// Amount credited to one chain member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommissionShare {
    pub user_id: UserId,
    pub tier: DropshipperTier,
    /// 1 for the seller, 2 for their parent, 3 for the grandparent.
    pub level: u8,
    pub rate: Decimal,
    pub amount: Money,
}

/// Result of splitting an order's profit pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommissionSplit {
    pub pool: Money,
    pub shares: Vec<CommissionShare>,
    pub platform_remainder: Money,
}

impl CommissionSplit {
    #[must_use]
    pub fn total_paid(&self) -> Money {
        self.shares.iter().map(|s| s.amount).sum()
    }
}

/// Split the profit pool of `items` across `chain` using `rates`.
///
/// Zero-amount shares are dropped. Each share is truncated to cents, so the
/// shares never add up to more than the pool.
#[must_use]
pub fn distribute(
    items: &[LineItem],
    chain: &ReferralChain,
    rates: &CommissionRates,
) -> CommissionSplit {
    let pool = profit_pool(items);

    let shares: Vec<CommissionShare> = chain
        .members()
        .iter()
        .zip(1_u8..)
        .map(|(member, level)| {
            let rate = rates.rate_for(member.tier);
            CommissionShare {
                user_id: member.user_id,
                tier: member.tier,
                level,
                rate,
                amount: pool.percent(rate),
            }
        })
        .filter(|share| share.amount.is_positive())
        .collect();

    let paid: Money = shares.iter().map(|s| s.amount).sum();

    CommissionSplit {
        pool,
        platform_remainder: pool - paid,
        shares,
    }
}
