//! Wallets and their ledger.

use chrono::{DateTime, Utc};
use dropship_core::{Money, OrderId, UserId, WalletId, WalletTransactionId, WalletTransactionKind};
use serde::Serialize;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Wallet {
    pub id: WalletId,
    pub user_id: UserId,
    pub balance: Money,
    pub updated_at: DateTime<Utc>,
}

/// One ledger line. `amount` is signed: credits positive, debits negative.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct WalletTransaction {
    pub id: WalletTransactionId,
    pub wallet_id: WalletId,
    pub kind: WalletTransactionKind,
    pub amount: Money,
    pub balance_after: Money,
    pub order_id: Option<OrderId>,
    pub commission_level: Option<i16>,
    pub description: String,
    pub created_at: DateTime<Utc>,
}
