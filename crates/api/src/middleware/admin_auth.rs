//! Operator authentication for `/admin` routes.
//!
//! Operators authenticate with `Authorization: Bearer <ADMIN_TOKEN>`.

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};

use dropship_core::signing::secrets_match;

use super::ip_security::ClientIp;
use crate::error::AppError;
use crate::state::AppState;

/// Extractor that requires the admin bearer token.
///
/// # Example
///
/// ```rust,ignore
/// async fn handler(_admin: RequireAdmin) -> impl IntoResponse {
///     "operators only"
/// }
/// ```
#[derive(Debug, Clone, Copy)]
pub struct RequireAdmin;

fn bearer_token(parts: &Parts) -> Option<&str> {
    let value = parts.headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    scheme
        .eq_ignore_ascii_case("bearer")
        .then(|| token.trim())
        .filter(|t| !t.is_empty())
}

impl FromRequestParts<AppState> for RequireAdmin {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let valid = bearer_token(parts).is_some_and(|token| secrets_match(state.config().admin_token(), token));
        if valid {
            return Ok(Self);
        }

        if let Some(ClientIp(ip)) = parts.extensions.get::<ClientIp>() {
            state
                .ip_guard()
                .record_failure(*ip, None, parts.uri.path(), "invalid admin token");
        }
        Err(AppError::Unauthorized("admin token required".into()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::Request;

    use super::*;

    fn parts(authorization: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/admin/ip-blocks");
        if let Some(value) = authorization {
            builder = builder.header(AUTHORIZATION, value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn test_bearer_token_parsing() {
        assert_eq!(bearer_token(&parts(Some("Bearer abc123"))), Some("abc123"));
        assert_eq!(bearer_token(&parts(Some("bearer  abc123 "))), Some("abc123"));
        assert_eq!(bearer_token(&parts(Some("Basic abc123"))), None);
        assert_eq!(bearer_token(&parts(Some("Bearer "))), None);
        assert_eq!(bearer_token(&parts(None)), None);
    }
}
