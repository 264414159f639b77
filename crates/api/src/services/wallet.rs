//! Wallet balances, withdrawals and operator adjustments.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use thiserror::Error;
use tracing::{info, instrument};

use dropship_core::{Money, UserId, WalletTransactionKind};

use crate::db::wallets::{self, LedgerEntry};
use crate::db::{RepositoryError, UserRepository, WalletRepository};
use crate::models::WalletTransaction;

const MAX_NOTE_LEN: usize = 500;

/// Errors from wallet operations.
#[derive(Debug, Error)]
pub enum WalletError {
    #[error("{0}")]
    InvalidAmount(String),

    #[error("insufficient funds (balance: {balance})")]
    InsufficientFunds { balance: Money },

    #[error("user not found")]
    UserNotFound,

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl From<sqlx::Error> for WalletError {
    fn from(e: sqlx::Error) -> Self {
        Self::Repository(RepositoryError::Database(e))
    }
}

/// A user's balance. Users who never earned anything have a zero balance.
#[derive(Debug, Clone, Serialize)]
pub struct WalletBalance {
    pub user_id: UserId,
    pub balance: Money,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Reject amounts with sub-cent precision.
fn check_precision(amount: Money) -> Result<(), WalletError> {
    if amount.round() != amount {
        return Err(WalletError::InvalidAmount(
            "amount must have at most two decimal places".into(),
        ));
    }
    Ok(())
}

/// Service for wallet operations.
#[derive(Clone)]
pub struct WalletService {
    pool: PgPool,
}

impl WalletService {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Current balance of `user_id`.
    ///
    /// # Errors
    ///
    /// Returns `Repository` on database failure.
    pub async fn balance(&self, user_id: UserId) -> Result<WalletBalance, WalletError> {
        let wallet = WalletRepository::new(&self.pool).get_by_user(user_id).await?;

        Ok(wallet.map_or(
            WalletBalance {
                user_id,
                balance: Money::ZERO,
                updated_at: None,
            },
            |w| WalletBalance {
                user_id,
                balance: w.balance,
                updated_at: Some(w.updated_at),
            },
        ))
    }

    /// Ledger lines for `user_id`, newest first.
    ///
    /// # Errors
    ///
    /// Returns `Repository` on database failure.
    pub async fn transactions(
        &self,
        user_id: UserId,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<WalletTransaction>, WalletError> {
        Ok(WalletRepository::new(&self.pool)
            .transactions(user_id, limit, offset)
            .await?)
    }

    /// Withdraw a positive `amount` from the user's wallet.
    ///
    /// # Errors
    ///
    /// Returns `InvalidAmount` for non-positive or sub-cent amounts and
    /// `InsufficientFunds` when the balance does not cover it.
    #[instrument(skip(self), fields(user_id = %user_id, amount = %amount))]
    pub async fn withdraw(
        &self,
        user_id: UserId,
        amount: Money,
    ) -> Result<WalletTransaction, WalletError> {
        if !amount.is_positive() {
            return Err(WalletError::InvalidAmount("amount must be positive".into()));
        }
        check_precision(amount)?;

        let mut tx = self.pool.begin().await?;
        let wallet = wallets::get_or_create_locked(&mut tx, user_id).await?;
        if wallet.balance < amount {
            return Err(WalletError::InsufficientFunds {
                balance: wallet.balance,
            });
        }

        let transaction = wallets::post(
            &mut tx,
            &wallet,
            &LedgerEntry {
                kind: WalletTransactionKind::Withdrawal,
                amount: Money::ZERO - amount,
                order_id: None,
                commission_level: None,
                description: "Withdrawal",
            },
        )
        .await?;
        tx.commit().await?;

        info!(balance_after = %transaction.balance_after, "Withdrawal recorded");
        Ok(transaction)
    }

    /// Apply a signed operator adjustment. The balance never goes below zero.
    ///
    /// # Errors
    ///
    /// Returns `InvalidAmount` for a zero amount or a missing note,
    /// `UserNotFound` for an unknown user and `InsufficientFunds` when a
    /// debit exceeds the balance.
    #[instrument(skip(self, note), fields(user_id = %user_id, amount = %amount))]
    pub async fn adjust(
        &self,
        user_id: UserId,
        amount: Money,
        note: &str,
    ) -> Result<WalletTransaction, WalletError> {
        if amount.is_zero() {
            return Err(WalletError::InvalidAmount("amount must not be zero".into()));
        }
        check_precision(amount)?;
        let note = note.trim();
        if note.is_empty() || note.len() > MAX_NOTE_LEN {
            return Err(WalletError::InvalidAmount(format!(
                "note is required and must be at most {MAX_NOTE_LEN} characters"
            )));
        }

        if UserRepository::new(&self.pool).get_by_id(user_id).await?.is_none() {
            return Err(WalletError::UserNotFound);
        }

        let mut tx = self.pool.begin().await?;
        let wallet = wallets::get_or_create_locked(&mut tx, user_id).await?;
        if (wallet.balance + amount).is_negative() {
            return Err(WalletError::InsufficientFunds {
                balance: wallet.balance,
            });
        }

        let transaction = wallets::post(
            &mut tx,
            &wallet,
            &LedgerEntry {
                kind: WalletTransactionKind::Adjustment,
                amount,
                order_id: None,
                commission_level: None,
                description: note,
            },
        )
        .await?;
        tx.commit().await?;

        info!(balance_after = %transaction.balance_after, "Wallet adjusted");
        Ok(transaction)
    }
}
