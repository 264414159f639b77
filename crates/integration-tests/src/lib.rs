//! Integration tests for the dropship API.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p dropship-integration-tests
//! ```
//!
//! The tests drive the full router in-process with `tower::ServiceExt::oneshot`
//! and need no running database: keys are seeded into the API key cache and
//! every asserted response is decided before a query would run.
//!
//! # Test Files
//!
//! - `api_auth` - signed-request authentication
//! - `ip_security` - rate limiting and automatic blocking
//! - `admin` - operator authentication and input validation
