//! Signed-request authentication for integration clients.
//!
//! # Headers
//!
//! - `X-Api-Key` - public key (`dk_...`)
//! - `X-Timestamp` - unix seconds, within the replay window of server time
//! - `X-Signature` - hex HMAC-SHA256 over the canonical request
//!   (see `dropship_core::signing`)
//! - `X-Api-Secret` - the raw secret instead of a signature; only accepted
//!   when `API_ALLOW_SECRET_FALLBACK=true`
//!
//! Every 401 and 403 produced here counts as an authentication failure
//! against the client IP.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::{
    body::{Body, Bytes},
    extract::{ConnectInfo, FromRequestParts, OriginalUri, Request, State},
    http::{HeaderMap, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::Utc;

use dropship_core::ApiKeyId;
use dropship_core::signing::{self, SignatureError, SignedRequest};

use super::ip_security::{ClientIp, resolve_client_ip};
use crate::error::AppError;
use crate::models::{ApiKeyRecord, AuthenticatedClient};
use crate::services::ReplayCheck;
use crate::state::AppState;

pub const API_KEY_HEADER: &str = "x-api-key";
pub const TIMESTAMP_HEADER: &str = "x-timestamp";
pub const SIGNATURE_HEADER: &str = "x-signature";
pub const API_SECRET_HEADER: &str = "x-api-secret";

/// Largest body a signed request may carry.
pub const MAX_SIGNED_BODY_BYTES: usize = 1024 * 1024;

/// How the caller proved possession of the secret.
enum Credential {
    Signature { timestamp: String, signature: String },
    Secret(String),
}

struct AuthFailure {
    error: AppError,
    api_key_id: Option<ApiKeyId>,
}

impl AuthFailure {
    fn unauthorized(message: &str, api_key_id: Option<ApiKeyId>) -> Self {
        Self {
            error: AppError::Unauthorized(message.to_owned()),
            api_key_id,
        }
    }

    /// Whether this failure is a rejected credential rather than a bad request.
    const fn counts_against_ip(&self) -> bool {
        matches!(self.error, AppError::Unauthorized(_) | AppError::Forbidden(_))
    }
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Authenticate a signed request and attach [`AuthenticatedClient`].
pub async fn hmac_auth_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let ip = match request.extensions().get::<ClientIp>() {
        Some(ClientIp(ip)) => Some(*ip),
        None => {
            let peer = request
                .extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| *addr);
            resolve_client_ip(
                request.headers(),
                peer,
                state.config().ip_security.trust_proxy_headers,
            )
        }
    };
    let Some(ip) = ip else {
        return AppError::BadRequest("could not determine client address".into()).into_response();
    };
    let path = request.uri().path().to_owned();

    match authenticate(&state, ip, request).await {
        Ok(request) => next.run(request).await,
        Err(failure) => {
            if failure.counts_against_ip() {
                tracing::info!(ip = %ip, path = %path, error = %failure.error, "Signed request rejected");
                state
                    .ip_guard()
                    .record_failure(ip, failure.api_key_id, &path, &failure.error.to_string());
            }
            failure.error.into_response()
        }
    }
}

async fn authenticate(state: &AppState, ip: IpAddr, request: Request) -> Result<Request, AuthFailure> {
    let auth = &state.config().auth;
    let headers = request.headers();

    let key = header(headers, API_KEY_HEADER)
        .ok_or_else(|| AuthFailure::unauthorized("missing X-Api-Key header", None))?
        .to_owned();

    let credential = match (
        header(headers, SIGNATURE_HEADER),
        header(headers, API_SECRET_HEADER),
    ) {
        (Some(signature), _) => {
            let timestamp = header(headers, TIMESTAMP_HEADER)
                .ok_or_else(|| AuthFailure::unauthorized("missing X-Timestamp header", None))?;
            Credential::Signature {
                timestamp: timestamp.to_owned(),
                signature: signature.to_owned(),
            }
        }
        (None, Some(secret)) if auth.allow_secret_fallback => Credential::Secret(secret.to_owned()),
        _ => {
            return Err(AuthFailure::unauthorized("missing X-Signature header", None));
        }
    };

    // Stale or future timestamps are rejected before any lookup.
    if let Credential::Signature { timestamp, .. } = &credential {
        signing::check_timestamp(timestamp, Utc::now().timestamp(), auth.replay_window.as_secs())
            .map_err(|e| AuthFailure::unauthorized(timestamp_message(&e), None))?;
    }

    let record = resolve_key(state, &key).await?;
    let key_id = Some(record.id);

    if let Err(reason) = record.check_usable(Utc::now()) {
        return Err(AuthFailure::unauthorized(reason.as_str(), key_id));
    }
    if !record.allows_ip(ip) {
        return Err(AuthFailure {
            error: AppError::Forbidden("client address not allowed for this API key".into()),
            api_key_id: key_id,
        });
    }

    let (parts, body) = request.into_parts();

    let mut request = match credential {
        Credential::Secret(secret) => {
            if !signing::secrets_match(record.secret(), &secret) {
                return Err(AuthFailure::unauthorized("invalid API secret", key_id));
            }
            Request::from_parts(parts, body)
        }
        Credential::Signature {
            timestamp,
            signature,
        } => {
            let bytes = buffer_body(body).await.map_err(|error| AuthFailure {
                error,
                api_key_id: key_id,
            })?;

            let path_and_query = signed_path(&parts);
            let signed = SignedRequest {
                timestamp: &timestamp,
                method: parts.method.as_str(),
                path_and_query: &path_and_query,
                body: &bytes,
            };
            signing::verify(record.secret().as_bytes(), &signed, &signature)
                .map_err(|_| AuthFailure::unauthorized("invalid signature", key_id))?;

            match state.replay_guard().record(&record.key, &signature).await {
                ReplayCheck::Fresh => {}
                ReplayCheck::Replayed => {
                    return Err(AuthFailure::unauthorized("request has already been used", key_id));
                }
                ReplayCheck::Saturated => {
                    return Err(AuthFailure {
                        error: AppError::TooManyRequests { retry_after_secs: 1 },
                        api_key_id: key_id,
                    });
                }
            }

            Request::from_parts(parts, Body::from(bytes))
        }
    };

    request.extensions_mut().insert(record.client());
    state.api_keys().touch_in_background(record.id);

    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(record.user_id.to_string()),
            ..Default::default()
        }));
    });
    tracing::debug!(api_key_id = %record.id, user_id = %record.user_id, "Signed request authenticated");
    Ok(request)
}

const fn timestamp_message(e: &SignatureError) -> &'static str {
    match e {
        SignatureError::InvalidTimestamp => "invalid X-Timestamp header",
        _ => "request timestamp outside the allowed window",
    }
}

async fn resolve_key(state: &AppState, key: &str) -> Result<Arc<ApiKeyRecord>, AuthFailure> {
    match state.api_keys().resolve(key).await {
        Ok(Some(record)) => Ok(record),
        Ok(None) => Err(AuthFailure::unauthorized("invalid API key", None)),
        Err(e) => Err(AuthFailure {
            error: e.into(),
            api_key_id: None,
        }),
    }
}

async fn buffer_body(body: Body) -> Result<Bytes, AppError> {
    axum::body::to_bytes(body, MAX_SIGNED_BODY_BYTES)
        .await
        .map_err(|_| AppError::PayloadTooLarge)
}

/// The path and query the client signed, before any router nesting.
fn signed_path(parts: &Parts) -> String {
    let uri = parts
        .extensions
        .get::<OriginalUri>()
        .map_or(&parts.uri, |OriginalUri(uri)| uri);
    uri.path_and_query()
        .map_or_else(|| uri.path().to_owned(), |pq| pq.as_str().to_owned())
}

impl<S> FromRequestParts<S> for AuthenticatedClient
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Self>()
            .copied()
            .ok_or_else(|| AppError::Unauthorized("signed request required".into()))
    }
}
