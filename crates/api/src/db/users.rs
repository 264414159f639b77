//! User lookups, including the referral upline walk.

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};

use dropship_core::{DropshipperTier, Email, UserId, UserRole};

use super::RepositoryError;
use crate::models::User;

#[derive(sqlx::FromRow)]
struct UserRow {
    id: UserId,
    name: String,
    email: String,
    role: UserRole,
    dropshipper_tier: Option<DropshipperTier>,
    parent_id: Option<UserId>,
    created_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = RepositoryError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let email = Email::parse(&row.email).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid email in database: {e}"))
        })?;

        Ok(Self {
            id: row.id,
            name: row.name,
            email,
            role: row.role,
            tier: row.dropshipper_tier,
            parent_id: row.parent_id,
            created_at: row.created_at,
        })
    }
}

/// Repository for user database operations.
pub struct UserRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> UserRepository<'a> {
    /// Create a new user repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get a user by their ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if the stored email is invalid.
    pub async fn get_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        get_by_id(&mut conn, id).await
    }
}

/// Get a user by ID on an existing connection.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
/// Returns `RepositoryError::DataCorruption` if the stored email is invalid.
pub async fn get_by_id(conn: &mut PgConnection, id: UserId) -> Result<Option<User>, RepositoryError> {
    let row = sqlx::query_as::<_, UserRow>(
        r"
        SELECT id, name, email, role, dropshipper_tier, parent_id, created_at
        FROM users
        WHERE id = $1
        ",
    )
    .bind(id)
    .fetch_optional(conn)
    .await?;

    row.map(User::try_from).transpose()
}

/// Walk `parent_id` upward from `user_id`, returning up to `limit` ancestors
/// nearest first.
///
/// Bounded by `limit` even if the referral links contain a cycle.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if a query fails.
pub async fn upline(
    conn: &mut PgConnection,
    user_id: UserId,
    limit: usize,
) -> Result<Vec<User>, RepositoryError> {
    let mut ancestors = Vec::with_capacity(limit);
    let mut next = get_by_id(conn, user_id).await?.and_then(|u| u.parent_id);

    while let Some(parent_id) = next {
        if ancestors.len() >= limit {
            break;
        }
        let Some(parent) = get_by_id(conn, parent_id).await? else {
            break;
        };
        next = parent.parent_id;
        ancestors.push(parent);
    }

    Ok(ancestors)
}
