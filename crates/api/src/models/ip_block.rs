//! Blocked client addresses.

use std::net::IpAddr;

use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct IpBlock {
    pub ip: IpAddr,
    pub reason: String,
    /// `None` blocks until an operator lifts it.
    pub blocked_until: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl IpBlock {
    #[must_use]
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.blocked_until.is_none_or(|until| until > now)
    }
}
