//! Platform users as seen by the commission engine.

use chrono::{DateTime, Utc};
use dropship_core::commission::ChainMember;
use dropship_core::{DropshipperTier, Email, UserId, UserRole};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: Email,
    pub role: UserRole,
    pub tier: Option<DropshipperTier>,
    /// Referrer, if any.
    pub parent_id: Option<UserId>,
    pub created_at: DateTime<Utc>,
}

impl User {
    #[must_use]
    pub fn is_dropshipper(&self) -> bool {
        self.role == UserRole::Dropshipper
    }

    /// This user as a commission chain member, or `None` for non-dropshippers.
    ///
    /// Dropshippers without an explicit tier count as top-level.
    #[must_use]
    pub fn chain_member(&self) -> Option<ChainMember> {
        self.is_dropshipper().then(|| ChainMember {
            user_id: self.id,
            tier: self.tier.unwrap_or(DropshipperTier::Dropshipper),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn user(role: UserRole, tier: Option<DropshipperTier>) -> User {
        User {
            id: UserId::new(5),
            name: "Ada".to_string(),
            email: Email::parse("ada@shop.test").unwrap(),
            role,
            tier,
            parent_id: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_chain_member_for_dropshipper() {
        let member = user(UserRole::Dropshipper, Some(DropshipperTier::SubDropshipper))
            .chain_member()
            .unwrap();
        assert_eq!(member.tier, DropshipperTier::SubDropshipper);

        let untiered = user(UserRole::Dropshipper, None).chain_member().unwrap();
        assert_eq!(untiered.tier, DropshipperTier::Dropshipper);
    }

    #[test]
    fn test_customers_are_not_chain_members() {
        assert!(user(UserRole::Customer, None).chain_member().is_none());
        assert!(user(UserRole::Admin, None).chain_member().is_none());
    }
}
