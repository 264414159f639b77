//! Dropship API library.
//!
//! The HTTP server for dropshipper integrations and operators, exposed as a
//! library so the CLI and integration tests can reuse its services.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
