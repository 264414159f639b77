//! HTTP middleware stack.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (hub per request, transaction capture)
//! 2. `TraceLayer` (request span with status and latency)
//! 3. Request ID (propagate or generate `x-request-id`)
//! 4. IP guard (client address, blocklist, per-IP rate limit) on `/api` and `/admin`
//! 5. HMAC auth (signed requests) on `/api/v1`; `RequireAdmin` extractor on `/admin`

pub mod admin_auth;
pub mod hmac_auth;
pub mod ip_security;
pub mod request_id;

pub use admin_auth::RequireAdmin;
pub use hmac_auth::hmac_auth_middleware;
pub use ip_security::{ClientIp, ip_guard_middleware};
pub use request_id::request_id_middleware;
