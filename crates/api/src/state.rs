//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::ApiConfig;
use crate::services::{
    ApiKeyCache, ApiKeyService, CommissionService, IpGuard, OrderService, ReplayGuard,
    WalletService,
};

/// Application state shared across all handlers.
///
/// Cheaply cloneable via `Arc`.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: ApiConfig,
    pool: PgPool,
    api_keys: ApiKeyService,
    replay_guard: ReplayGuard,
    ip_guard: IpGuard,
    orders: OrderService,
    wallets: WalletService,
    commissions: CommissionService,
}

impl AppState {
    /// Create the application state and its services.
    ///
    /// The IP guard starts with an empty blocklist; call
    /// [`IpGuard::load_blocks`] once the database is reachable.
    #[must_use]
    pub fn new(config: ApiConfig, pool: PgPool) -> Self {
        let cache = ApiKeyCache::new(config.auth.key_cache_ttl);
        let replay_guard = ReplayGuard::new(config.auth.replay_window);
        let ip_guard = IpGuard::new(config.ip_security.clone(), Some(pool.clone()));

        Self {
            inner: Arc::new(AppStateInner {
                api_keys: ApiKeyService::new(pool.clone(), cache),
                orders: OrderService::new(pool.clone()),
                wallets: WalletService::new(pool.clone()),
                commissions: CommissionService::new(pool.clone()),
                replay_guard,
                ip_guard,
                config,
                pool,
            }),
        }
    }

    #[must_use]
    pub fn config(&self) -> &ApiConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    #[must_use]
    pub fn api_keys(&self) -> &ApiKeyService {
        &self.inner.api_keys
    }

    #[must_use]
    pub fn replay_guard(&self) -> &ReplayGuard {
        &self.inner.replay_guard
    }

    #[must_use]
    pub fn ip_guard(&self) -> &IpGuard {
        &self.inner.ip_guard
    }

    #[must_use]
    pub fn orders(&self) -> &OrderService {
        &self.inner.orders
    }

    #[must_use]
    pub fn wallets(&self) -> &WalletService {
        &self.inner.wallets
    }

    #[must_use]
    pub fn commissions(&self) -> &CommissionService {
        &self.inner.commissions
    }
}
