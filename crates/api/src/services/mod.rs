//! Business logic services.
//!
//! # Services
//!
//! - `api_keys` - Key issuance, the key lookup cache and the replay guard
//! - `commission` - Pay commissions on delivered orders
//! - `ip_guard` - Per-IP rate limiting, failure tracking and blocking
//! - `orders` - Place orders and move them through their lifecycle
//! - `wallet` - Balances, withdrawals and operator adjustments

pub mod api_keys;
pub mod commission;
pub mod ip_guard;
pub mod orders;
pub mod wallet;

pub use api_keys::{ApiKeyCache, ApiKeyError, ApiKeyService, ReplayCheck, ReplayGuard};
pub use commission::{CommissionService, DistributionError, DistributionOutcome};
pub use ip_guard::{IpGuard, IpRejection};
pub use orders::{OrderError, OrderService, PlaceOrderRequest, PlacedOrder, TransitionOutcome};
pub use wallet::{WalletBalance, WalletError, WalletService};
