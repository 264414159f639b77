//! IP guard middleware: client address, blocklist and rate limit.
//!
//! Runs in front of every signed and admin route. The resolved address is
//! stored in the request extensions as [`ClientIp`] for the layers behind it.

use std::net::{IpAddr, SocketAddr};

use axum::{
    extract::{ConnectInfo, FromRequestParts, Request, State},
    http::{HeaderMap, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::error::AppError;
use crate::services::IpRejection;
use crate::state::AppState;

/// The caller's address as resolved by [`ip_guard_middleware`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientIp(pub IpAddr);

/// Proxy headers in order of preference.
///
/// `cf-connecting-ip` is set by Cloudflare, `fly-client-ip` by Fly.io.
/// `x-forwarded-for` may hold a chain; the first entry is the client.
fn ip_from_proxy_headers(headers: &HeaderMap) -> Option<IpAddr> {
    let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());

    header("cf-connecting-ip")
        .and_then(|s| s.trim().parse().ok())
        .or_else(|| {
            header("x-forwarded-for")
                .and_then(|s| s.split(',').next())
                .and_then(|s| s.trim().parse().ok())
        })
        .or_else(|| header("x-real-ip").and_then(|s| s.trim().parse().ok()))
        .or_else(|| header("fly-client-ip").and_then(|s| s.trim().parse().ok()))
}

/// Resolve the client address.
///
/// Proxy headers are only believed when `trust_proxy_headers` is set;
/// otherwise the socket peer address is used.
#[must_use]
pub fn resolve_client_ip(
    headers: &HeaderMap,
    peer: Option<SocketAddr>,
    trust_proxy_headers: bool,
) -> Option<IpAddr> {
    if trust_proxy_headers && let Some(ip) = ip_from_proxy_headers(headers) {
        return Some(ip);
    }
    peer.map(|addr| addr.ip())
}

/// Reject blocked and rate-limited addresses.
pub async fn ip_guard_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let trust = state.config().ip_security.trust_proxy_headers;

    let Some(ip) = resolve_client_ip(request.headers(), peer, trust) else {
        return AppError::BadRequest("could not determine client address".into()).into_response();
    };

    match state.ip_guard().check(ip, request.uri().path()) {
        Ok(()) => {}
        Err(IpRejection::Blocked) => {
            tracing::info!(ip = %ip, "Rejected request from blocked IP");
            return AppError::Forbidden("access from this address is blocked".into()).into_response();
        }
        Err(IpRejection::RateLimited { retry_after }) => {
            tracing::info!(ip = %ip, "Rate limited");
            let retry_after_secs = retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0);
            return AppError::TooManyRequests {
                retry_after_secs: retry_after_secs.max(1),
            }
            .into_response();
        }
    }

    request.extensions_mut().insert(ClientIp(ip));
    next.run(request).await
}

impl<S> FromRequestParts<S> for ClientIp
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Self>()
            .copied()
            .ok_or_else(|| AppError::Internal("client ip missing; ip guard not installed".into()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_static(value));
        }
        map
    }

    fn peer() -> Option<SocketAddr> {
        Some("10.0.0.5:41000".parse().unwrap())
    }

    #[test]
    fn test_peer_address_when_proxies_untrusted() {
        let h = headers(&[("x-forwarded-for", "203.0.113.7")]);
        assert_eq!(
            resolve_client_ip(&h, peer(), false),
            Some("10.0.0.5".parse().unwrap())
        );
    }

    #[test]
    fn test_proxy_header_preference() {
        let h = headers(&[
            ("x-real-ip", "198.51.100.3"),
            ("x-forwarded-for", "203.0.113.7, 10.0.0.1"),
            ("cf-connecting-ip", "192.0.2.44"),
        ]);
        assert_eq!(
            resolve_client_ip(&h, peer(), true),
            Some("192.0.2.44".parse().unwrap())
        );

        let h = headers(&[("x-forwarded-for", "203.0.113.7, 10.0.0.1")]);
        assert_eq!(
            resolve_client_ip(&h, peer(), true),
            Some("203.0.113.7".parse().unwrap())
        );

        let h = headers(&[("fly-client-ip", "2001:db8::9")]);
        assert_eq!(
            resolve_client_ip(&h, None, true),
            Some("2001:db8::9".parse().unwrap())
        );
    }

    #[test]
    fn test_garbage_headers_fall_back_to_peer() {
        let h = headers(&[("x-forwarded-for", "not-an-ip")]);
        assert_eq!(
            resolve_client_ip(&h, peer(), true),
            Some("10.0.0.5".parse().unwrap())
        );
        assert_eq!(resolve_client_ip(&h, None, true), None);
    }
}
