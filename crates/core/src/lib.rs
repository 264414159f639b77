//! Dropship Core - domain types and pure business rules.
//!
//! This crate is shared by the API server and the operator CLI:
//! - `api` - Signed-request REST API for dropshipper integrations
//! - `cli` - Migrations, API key management and commission re-runs
//!
//! # Architecture
//!
//! Nothing in here performs I/O. Prices, commission splits and request
//! signatures are computed from plain values so they can be tested without a
//! database or a running server.
//!
//! # Modules
//!
//! - [`types`] - Newtype ids, email, money and status enums
//! - [`pricing`] - Price a product for a given buyer
//! - [`commission`] - Three-level profit-pool commission split
//! - [`signing`] - HMAC-SHA256 request signing and verification

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod commission;
pub mod pricing;
pub mod signing;
pub mod types;

pub use types::*;
