//! Per-IP rate limiting, failure tracking and blocking.
//!
//! All decisions are made in memory. The blocklist is loaded from
//! `ip_blocks` at startup, reloaded on an interval so blocks added or lifted
//! from the CLI take effect, and written through on every change. Security
//! events are appended to `ip_logs` from background tasks so a slow or
//! failing database never holds up (or fails) the request.

use std::collections::{HashMap, VecDeque};
use std::net::IpAddr;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use governor::clock::{Clock, DefaultClock};
use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};
use moka::sync::Cache;
use sqlx::PgPool;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use dropship_core::{ApiKeyId, IpEvent};

use crate::config::IpSecurityConfig;
use crate::db::ip_security::IpLogEntry;
use crate::db::{IpSecurityRepository, RepositoryError};
use crate::models::IpBlock;

/// Upper bound on addresses with recent failures held in memory.
const MAX_TRACKED_IPS: u64 = 100_000;

type FailureLog = Arc<Mutex<VecDeque<DateTime<Utc>>>>;

/// Why a request was turned away before reaching a handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IpRejection {
    Blocked,
    RateLimited { retry_after: Duration },
}

/// Shared IP guard. Cheap to clone.
#[derive(Clone)]
pub struct IpGuard {
    inner: Arc<IpGuardInner>,
}

struct IpGuardInner {
    config: IpSecurityConfig,
    limiter: DefaultKeyedRateLimiter<IpAddr>,
    /// `None` blocks until lifted.
    blocked: RwLock<HashMap<IpAddr, Option<DateTime<Utc>>>>,
    /// Entries idle for a whole failure window are dropped.
    failures: Cache<IpAddr, FailureLog>,
    pool: Option<PgPool>,
}

impl IpGuard {
    /// Build a guard. Without a pool nothing is persisted.
    #[must_use]
    pub fn new(config: IpSecurityConfig, pool: Option<PgPool>) -> Self {
        let quota = Quota::per_minute(config.rate_limit_per_minute).allow_burst(config.rate_limit_burst);
        let failures = Cache::builder()
            .max_capacity(MAX_TRACKED_IPS)
            .time_to_idle(config.failure_window)
            .build();

        Self {
            inner: Arc::new(IpGuardInner {
                config,
                limiter: RateLimiter::keyed(quota),
                blocked: RwLock::new(HashMap::new()),
                failures,
                pool,
            }),
        }
    }

    /// Replace the in-memory blocklist with the active blocks in the database.
    ///
    /// On error the current blocklist is left untouched.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the blocks cannot be read.
    pub async fn load_blocks(&self) -> Result<usize, RepositoryError> {
        let Some(pool) = &self.inner.pool else {
            return Ok(0);
        };
        let blocks = IpSecurityRepository::new(pool).active_blocks(Utc::now()).await?;
        Ok(self.replace_blocks(blocks))
    }

    /// Swap the blocklist for `blocks`. Addresses not listed are unblocked.
    pub fn replace_blocks(&self, blocks: Vec<IpBlock>) -> usize {
        let fresh: HashMap<_, _> = blocks
            .into_iter()
            .map(|block| (block.ip, block.blocked_until))
            .collect();
        let count = fresh.len();

        *self.inner.blocked.write().unwrap_or_else(PoisonError::into_inner) = fresh;
        count
    }

    /// Reload the blocklist from the database every `period`.
    ///
    /// Returns `None` when there is no pool or `period` is zero.
    pub fn spawn_refresh(&self, period: Duration) -> Option<JoinHandle<()>> {
        if self.inner.pool.is_none() || period.is_zero() {
            return None;
        }

        let guard = self.clone();
        Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately; startup already loaded.
            ticker.tick().await;

            loop {
                ticker.tick().await;
                match guard.load_blocks().await {
                    Ok(count) => debug!(count, "Reloaded IP blocklist"),
                    Err(e) => warn!(error = %e, "Failed to reload IP blocklist; keeping current entries"),
                }
            }
        }))
    }

    /// Decide whether a request from `ip` may proceed.
    ///
    /// # Errors
    ///
    /// Returns the reason the request must be rejected.
    pub fn check(&self, ip: IpAddr, path: &str) -> Result<(), IpRejection> {
        if self.is_blocked(ip, Utc::now()) {
            self.log_event(ip, IpEvent::Blocked, None, path, "request from blocked ip");
            return Err(IpRejection::Blocked);
        }

        if let Err(not_until) = self.inner.limiter.check_key(&ip) {
            let retry_after = not_until.wait_time_from(DefaultClock::default().now());
            self.log_event(ip, IpEvent::RateLimited, None, path, "rate limit exceeded");
            return Err(IpRejection::RateLimited { retry_after });
        }

        Ok(())
    }

    /// Whether `ip` is blocked at `now`. Expired entries are dropped lazily.
    #[must_use]
    pub fn is_blocked(&self, ip: IpAddr, now: DateTime<Utc>) -> bool {
        let until = {
            let blocked = self.inner.blocked.read().unwrap_or_else(PoisonError::into_inner);
            match blocked.get(&ip) {
                None => return false,
                Some(until) => *until,
            }
        };

        if until.is_none_or(|until| until > now) {
            return true;
        }

        self.inner
            .blocked
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&ip);
        false
    }

    /// Record an authentication failure; blocks the IP once the threshold is hit.
    ///
    /// Returns `true` if this failure caused a block.
    pub fn record_failure(
        &self,
        ip: IpAddr,
        api_key_id: Option<ApiKeyId>,
        path: &str,
        detail: &str,
    ) -> bool {
        self.log_event(ip, IpEvent::AuthFailure, api_key_id, path, detail);

        let max = self.inner.config.max_failed_attempts;
        if max == 0 {
            return false;
        }

        let now = Utc::now();
        let window = chrono::Duration::from_std(self.inner.config.failure_window)
            .unwrap_or(chrono::Duration::MAX);
        let log = self.inner.failures.get_with(ip, FailureLog::default);
        let count = {
            let mut entries = log.lock().unwrap_or_else(PoisonError::into_inner);
            entries.push_back(now);
            while entries.front().is_some_and(|at| now - *at > window) {
                entries.pop_front();
            }
            entries.len()
        };

        if u32::try_from(count).unwrap_or(u32::MAX) < max {
            return false;
        }

        let until = chrono::Duration::from_std(self.inner.config.block_duration)
            .ok()
            .and_then(|d| now.checked_add_signed(d));
        let reason = format!("{count} failed authentication attempts");
        warn!(ip = %ip, failures = count, "Blocking IP after repeated auth failures");
        self.block(ip, until, &reason);
        true
    }

    /// Block `ip` in memory and persist the block in the background.
    pub fn block(&self, ip: IpAddr, until: Option<DateTime<Utc>>, reason: &str) {
        self.inner
            .blocked
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(ip, until);
        self.inner.failures.invalidate(&ip);

        if let Some(pool) = self.inner.pool.clone() {
            let reason = reason.to_owned();
            tokio::spawn(async move {
                if let Err(e) = IpSecurityRepository::new(&pool).upsert_block(ip, &reason, until).await {
                    warn!(ip = %ip, error = %e, "Failed to persist IP block");
                }
            });
        }
    }

    /// Apply a block that has already been stored.
    pub fn apply_block(&self, block: &IpBlock) {
        self.inner
            .blocked
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(block.ip, block.blocked_until);
    }

    /// Lift a block in memory and forget past failures.
    pub fn unblock(&self, ip: IpAddr) {
        self.inner
            .blocked
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&ip);
        self.inner.failures.invalidate(&ip);
        info!(ip = %ip, "IP unblocked");
    }

    fn log_event(
        &self,
        ip: IpAddr,
        event: IpEvent,
        api_key_id: Option<ApiKeyId>,
        path: &str,
        detail: &str,
    ) {
        let Some(pool) = self.inner.pool.clone() else {
            return;
        };
        let entry = IpLogEntry {
            ip,
            event,
            api_key_id,
            path: path.to_owned(),
            detail: detail.to_owned(),
        };
        tokio::spawn(async move {
            if let Err(e) = IpSecurityRepository::new(&pool).log(&entry).await {
                warn!(ip = %entry.ip, error = %e, "Failed to write IP security log");
            }
        });
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::num::NonZeroU32;

    use super::*;

    fn config(per_minute: u32, burst: u32, max_failed: u32) -> IpSecurityConfig {
        IpSecurityConfig {
            rate_limit_per_minute: NonZeroU32::new(per_minute).unwrap(),
            rate_limit_burst: NonZeroU32::new(burst).unwrap(),
            max_failed_attempts: max_failed,
            ..IpSecurityConfig::default()
        }
    }

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[test]
    fn test_rate_limit_per_ip() {
        let guard = IpGuard::new(config(60, 2, 10), None);
        let a = ip("203.0.113.1");
        let b = ip("203.0.113.2");

        assert!(guard.check(a, "/api/v1/me").is_ok());
        assert!(guard.check(a, "/api/v1/me").is_ok());
        let rejection = guard.check(a, "/api/v1/me").unwrap_err();
        assert!(matches!(rejection, IpRejection::RateLimited { retry_after } if retry_after > Duration::ZERO));

        // Other addresses have their own bucket.
        assert!(guard.check(b, "/api/v1/me").is_ok());
    }

    #[test]
    fn test_failures_trigger_block() {
        let guard = IpGuard::new(config(600, 100, 3), None);
        let addr = ip("198.51.100.20");

        assert!(!guard.record_failure(addr, None, "/api/v1/me", "bad signature"));
        assert!(!guard.record_failure(addr, None, "/api/v1/me", "bad signature"));
        assert!(guard.record_failure(addr, None, "/api/v1/me", "bad signature"));

        assert!(guard.is_blocked(addr, Utc::now()));
        assert_eq!(guard.check(addr, "/api/v1/me"), Err(IpRejection::Blocked));
    }

    #[test]
    fn test_block_expires() {
        let guard = IpGuard::new(IpSecurityConfig::default(), None);
        let addr = ip("2001:db8::1");
        let now = Utc::now();

        guard.block(addr, Some(now + chrono::Duration::minutes(5)), "manual");
        assert!(guard.is_blocked(addr, now));
        assert!(!guard.is_blocked(addr, now + chrono::Duration::minutes(6)));
        // The expired entry was removed.
        assert!(!guard.is_blocked(addr, now));
    }

    #[test]
    fn test_unblock_clears_state() {
        let guard = IpGuard::new(config(600, 100, 2), None);
        let addr = ip("192.0.2.55");

        guard.record_failure(addr, None, "/api/v1/me", "unknown key");
        guard.record_failure(addr, None, "/api/v1/me", "unknown key");
        assert!(guard.is_blocked(addr, Utc::now()));

        guard.unblock(addr);
        assert!(!guard.is_blocked(addr, Utc::now()));
        assert!(!guard.record_failure(addr, None, "/api/v1/me", "unknown key"));
    }

    #[test]
    fn test_permanent_block() {
        let guard = IpGuard::new(IpSecurityConfig::default(), None);
        let addr = ip("192.0.2.99");
        guard.apply_block(&IpBlock {
            ip: addr,
            reason: "abuse".to_string(),
            blocked_until: None,
            created_at: Utc::now(),
        });
        assert!(guard.is_blocked(addr, Utc::now() + chrono::Duration::days(365)));
    }

    #[test]
    fn test_reload_drops_lifted_blocks() {
        let guard = IpGuard::new(IpSecurityConfig::default(), None);
        let lifted = ip("192.0.2.10");
        let kept = ip("192.0.2.11");
        let added = ip("192.0.2.12");
        let stored = |addr| IpBlock {
            ip: addr,
            reason: "manual".to_string(),
            blocked_until: None,
            created_at: Utc::now(),
        };

        guard.block(lifted, None, "manual");
        guard.block(kept, None, "manual");

        // Another process removed `lifted` and added `added`.
        assert_eq!(guard.replace_blocks(vec![stored(kept), stored(added)]), 2);

        let now = Utc::now();
        assert!(!guard.is_blocked(lifted, now));
        assert!(guard.is_blocked(kept, now));
        assert!(guard.is_blocked(added, now));

        assert_eq!(guard.replace_blocks(Vec::new()), 0);
        assert!(!guard.is_blocked(kept, now));
    }

    #[test]
    fn test_failure_tracking_forgets_idle_addresses() {
        let guard = IpGuard::new(
            IpSecurityConfig {
                failure_window: Duration::from_millis(50),
                ..config(6000, 1000, 1000)
            },
            None,
        );

        for n in 0..200u32 {
            let addr = IpAddr::from(std::net::Ipv4Addr::from(0x0a00_0000 + n));
            guard.record_failure(addr, None, "/api/v1/me", "unknown key");
        }
        guard.inner.failures.run_pending_tasks();
        assert_eq!(guard.inner.failures.entry_count(), 200);

        std::thread::sleep(Duration::from_millis(200));
        guard.inner.failures.run_pending_tasks();
        assert_eq!(guard.inner.failures.entry_count(), 0);
    }

    #[test]
    fn test_failures_outside_window_do_not_count() {
        let guard = IpGuard::new(
            IpSecurityConfig {
                failure_window: Duration::from_millis(50),
                ..config(600, 100, 2)
            },
            None,
        );
        let addr = ip("198.51.100.77");

        assert!(!guard.record_failure(addr, None, "/api/v1/me", "bad signature"));
        std::thread::sleep(Duration::from_millis(120));
        assert!(!guard.record_failure(addr, None, "/api/v1/me", "bad signature"));
        assert!(guard.record_failure(addr, None, "/api/v1/me", "bad signature"));
    }
}
