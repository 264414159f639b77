//! Domain models for the API.
//!
//! These are validated types built from database rows; the row structs and
//! their conversions live next to the queries in [`crate::db`].

pub mod api_key;
pub mod ip_block;
pub mod order;
pub mod product;
pub mod user;
pub mod wallet;

pub use api_key::{ApiKeyRecord, ApiKeySummary, AuthenticatedClient, IssuedApiKey};
pub use ip_block::IpBlock;
pub use order::{NewOrder, NewOrderItem, Order, OrderItem, OrderWithItems};
pub use product::{PricedProduct, Product};
pub use user::User;
pub use wallet::{Wallet, WalletTransaction};
