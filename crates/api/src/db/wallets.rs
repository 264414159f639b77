//! Wallet balances and the ledger.
//!
//! Every balance change goes through [`post`], which moves the balance and
//! writes the matching ledger line on the same connection. Callers hold the
//! wallet row lock (see [`get_or_create_locked`]) for the whole transaction.

use sqlx::{PgConnection, PgPool};

use dropship_core::{Money, OrderId, UserId, WalletTransactionKind};

use super::{RepositoryError, conflict_on_unique};
use crate::models::{Wallet, WalletTransaction};

/// A ledger entry to post against a wallet.
#[derive(Debug, Clone)]
pub struct LedgerEntry<'a> {
    pub kind: WalletTransactionKind,
    /// Signed: credits positive, debits negative.
    pub amount: Money,
    pub order_id: Option<OrderId>,
    pub commission_level: Option<i16>,
    pub description: &'a str,
}

/// Repository for wallet reads.
pub struct WalletRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> WalletRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get a user's wallet, if one has been opened.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_user(&self, user_id: UserId) -> Result<Option<Wallet>, RepositoryError> {
        let wallet = sqlx::query_as::<_, Wallet>(
            "SELECT id, user_id, balance, updated_at FROM wallets WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(self.pool)
        .await?;

        Ok(wallet)
    }

    /// A user's ledger, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn transactions(
        &self,
        user_id: UserId,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<WalletTransaction>, RepositoryError> {
        let rows = sqlx::query_as::<_, WalletTransaction>(
            r"
            SELECT t.id, t.wallet_id, t.kind, t.amount, t.balance_after, t.order_id,
                   t.commission_level, t.description, t.created_at
            FROM wallet_transactions t
            JOIN wallets w ON w.id = t.wallet_id
            WHERE w.user_id = $1
            ORDER BY t.created_at DESC, t.id DESC
            LIMIT $2 OFFSET $3
            ",
        )
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool)
        .await?;

        Ok(rows)
    }
}

/// Open the user's wallet if needed and lock it.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if a query fails.
pub async fn get_or_create_locked(
    conn: &mut PgConnection,
    user_id: UserId,
) -> Result<Wallet, RepositoryError> {
    sqlx::query("INSERT INTO wallets (user_id) VALUES ($1) ON CONFLICT (user_id) DO NOTHING")
        .bind(user_id)
        .execute(&mut *conn)
        .await?;

    let wallet = sqlx::query_as::<_, Wallet>(
        "SELECT id, user_id, balance, updated_at FROM wallets WHERE user_id = $1 FOR UPDATE",
    )
    .bind(user_id)
    .fetch_one(conn)
    .await?;

    Ok(wallet)
}

/// Apply `entry` to a locked wallet and record it in the ledger.
///
/// # Errors
///
/// Returns `RepositoryError::Conflict` if the balance would go negative or a
/// commission for the same order was already credited to this wallet.
/// Returns `RepositoryError::Database` for other database errors.
pub async fn post(
    conn: &mut PgConnection,
    wallet: &Wallet,
    entry: &LedgerEntry<'_>,
) -> Result<WalletTransaction, RepositoryError> {
    let balance: Option<Money> = sqlx::query_scalar(
        r"
        UPDATE wallets
        SET balance = balance + $2, updated_at = NOW()
        WHERE id = $1 AND balance + $2 >= 0
        RETURNING balance
        ",
    )
    .bind(wallet.id)
    .bind(entry.amount)
    .fetch_optional(&mut *conn)
    .await?;

    let balance_after = balance.ok_or_else(|| RepositoryError::Conflict("insufficient funds".to_owned()))?;

    let transaction = sqlx::query_as::<_, WalletTransaction>(
        r"
        INSERT INTO wallet_transactions (wallet_id, kind, amount, balance_after, order_id,
                                         commission_level, description)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING id, wallet_id, kind, amount, balance_after, order_id,
                  commission_level, description, created_at
        ",
    )
    .bind(wallet.id)
    .bind(entry.kind)
    .bind(entry.amount)
    .bind(balance_after)
    .bind(entry.order_id)
    .bind(entry.commission_level)
    .bind(entry.description)
    .fetch_one(conn)
    .await
    .map_err(|e| conflict_on_unique(e, "commission already credited for this order"))?;

    Ok(transaction)
}
