//! Paying commissions on delivered orders.
//!
//! The split itself is computed by `dropship_core::commission`; this service
//! loads the inputs, credits the wallets and stamps the order, all inside one
//! transaction. A stamped order is never paid twice, and the ledger carries a
//! unique (order, wallet) index for commission lines as a second guard.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{PgConnection, PgPool};
use thiserror::Error;
use tracing::{info, instrument};

use dropship_core::commission::{
    self, CommissionError, CommissionSplit, MAX_COMMISSION_LEVELS, ReferralChain,
};
use dropship_core::{OrderId, OrderStatus, WalletTransactionKind};

use crate::db::wallets::LedgerEntry;
use crate::db::{RepositoryError, orders, settings, users, wallets};
use crate::models::{Order, User};

/// Errors from commission distribution.
#[derive(Debug, Error)]
pub enum DistributionError {
    #[error("order not found")]
    OrderNotFound,

    #[error("order is {0}; commissions are paid on delivered orders")]
    NotDelivered(OrderStatus),

    #[error(transparent)]
    Rates(#[from] CommissionError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl From<sqlx::Error> for DistributionError {
    fn from(e: sqlx::Error) -> Self {
        Self::Repository(RepositoryError::Database(e))
    }
}

/// What a distribution run did.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DistributionOutcome {
    Distributed {
        order_id: OrderId,
        #[serde(flatten)]
        split: CommissionSplit,
    },
    AlreadyDistributed {
        order_id: OrderId,
        distributed_at: DateTime<Utc>,
    },
}

/// Service for commission runs outside an order transition.
#[derive(Clone)]
pub struct CommissionService {
    pool: PgPool,
}

impl CommissionService {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Distribute commissions for a delivered order. Safe to call repeatedly.
    ///
    /// # Errors
    ///
    /// Returns `OrderNotFound`, `NotDelivered`, `Rates` when the stored rates
    /// are invalid, or `Repository` on database failure.
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn distribute_for_order(
        &self,
        order_id: OrderId,
    ) -> Result<DistributionOutcome, DistributionError> {
        let mut tx = self.pool.begin().await?;

        let order = orders::lock(&mut tx, order_id)
            .await?
            .ok_or(DistributionError::OrderNotFound)?;
        let outcome = distribute_locked(&mut tx, &order, Utc::now()).await?;

        tx.commit().await?;
        Ok(outcome)
    }
}

/// Distribute commissions for an order whose row the caller has locked.
///
/// # Errors
///
/// See [`CommissionService::distribute_for_order`].
pub async fn distribute_locked(
    conn: &mut PgConnection,
    order: &Order,
    now: DateTime<Utc>,
) -> Result<DistributionOutcome, DistributionError> {
    if let Some(done) = check_distributable(order)? {
        return Ok(done);
    }

    let rates = settings::commission_rates(conn).await?;
    rates.validate()?;

    let items: Vec<_> = orders::items(conn, order.id)
        .await?
        .iter()
        .map(crate::models::OrderItem::line_item)
        .collect();
    let chain = resolve_chain(conn, order).await?;
    let split = commission::distribute(&items, &chain, &rates);

    // Lock wallets in user id order.
    let mut shares = split.shares.clone();
    shares.sort_by_key(|s| s.user_id);

    for share in &shares {
        let wallet = wallets::get_or_create_locked(conn, share.user_id).await?;
        let description = format!("Level {} commission for order #{}", share.level, order.id);
        wallets::post(
            conn,
            &wallet,
            &LedgerEntry {
                kind: WalletTransactionKind::Commission,
                amount: share.amount,
                order_id: Some(order.id),
                commission_level: Some(i16::from(share.level)),
                description: &description,
            },
        )
        .await?;
    }

    orders::mark_commissions_distributed(conn, order.id, now).await?;

    info!(
        order_id = %order.id,
        pool = %split.pool,
        paid = %split.total_paid(),
        platform = %split.platform_remainder,
        levels = split.shares.len(),
        "Commissions distributed"
    );

    Ok(DistributionOutcome::Distributed {
        order_id: order.id,
        split,
    })
}

/// Whether `order` may be paid now.
///
/// `Ok(Some(..))` when it was paid earlier, `Ok(None)` when it is ready.
///
/// # Errors
///
/// Returns `NotDelivered` for any order that is not delivered.
pub fn check_distributable(order: &Order) -> Result<Option<DistributionOutcome>, DistributionError> {
    if order.status != OrderStatus::Delivered {
        return Err(DistributionError::NotDelivered(order.status));
    }
    Ok(order
        .commissions_distributed_at
        .map(|distributed_at| DistributionOutcome::AlreadyDistributed {
            order_id: order.id,
            distributed_at,
        }))
}

async fn resolve_chain(conn: &mut PgConnection, order: &Order) -> Result<ReferralChain, RepositoryError> {
    let Some(seller) = users::get_by_id(conn, order.dropshipper_id)
        .await?
        .as_ref()
        .and_then(User::chain_member)
    else {
        return Ok(ReferralChain::default());
    };

    let upline = users::upline(conn, seller.user_id, MAX_COMMISSION_LEVELS - 1).await?;
    Ok(ReferralChain::resolve(seller, upline.iter().map(User::chain_member)))
}

#[cfg(test)]
mod tests {
    use dropship_core::{Money, UserId};

    use super::*;

    fn order(status: OrderStatus, distributed_at: Option<DateTime<Utc>>) -> Order {
        let now = Utc::now();
        Order {
            id: OrderId::new(11),
            dropshipper_id: UserId::new(3),
            external_reference: None,
            status,
            customer_name: "Rina".into(),
            customer_phone: "0800".into(),
            shipping_address: "Jl. Merdeka 1".into(),
            subtotal: Money::ZERO,
            commissions_distributed_at: distributed_at,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_undelivered_orders_are_not_paid() {
        for status in [
            OrderStatus::Pending,
            OrderStatus::Processing,
            OrderStatus::Shipped,
            OrderStatus::Cancelled,
        ] {
            let result = check_distributable(&order(status, None));
            assert!(matches!(result, Err(DistributionError::NotDelivered(s)) if s == status));
        }
    }

    #[test]
    fn test_stamped_order_reports_earlier_run() {
        let stamped = Utc::now();
        let result = check_distributable(&order(OrderStatus::Delivered, Some(stamped)));

        match result {
            Ok(Some(DistributionOutcome::AlreadyDistributed { order_id, distributed_at })) => {
                assert_eq!(order_id, OrderId::new(11));
                assert_eq!(distributed_at, stamped);
            }
            other => panic!("expected AlreadyDistributed, got {other:?}"),
        }
    }

    #[test]
    fn test_unstamped_delivered_order_is_ready() {
        assert!(matches!(
            check_distributable(&order(OrderStatus::Delivered, None)),
            Ok(None)
        ));
    }
}
