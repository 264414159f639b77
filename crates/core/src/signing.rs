//! HMAC-SHA256 request signing.
//!
//! Integration clients sign every request with the secret issued alongside
//! their API key. The signed message binds the timestamp, method, path and a
//! digest of the body:
//!
//! ```text
//! {timestamp}\n{METHOD}\n{path_and_query}\n{hex(sha256(body))}
//! ```
//!
//! The signature travels as lowercase hex in `X-Signature`, the timestamp
//! (unix seconds) in `X-Timestamp`.

use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

type HmacSha256 = Hmac<Sha256>;

/// Default tolerance between client and server clocks, in seconds.
pub const DEFAULT_REPLAY_WINDOW_SECS: u64 = 300;

/// Errors from signature and timestamp checks.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignatureError {
    #[error("timestamp is not a unix time in seconds")]
    InvalidTimestamp,
    #[error("timestamp is outside the allowed window")]
    Expired,
    #[error("signature mismatch")]
    Mismatch,
}

/// The parts of an HTTP request covered by the signature.
#[derive(Debug, Clone, Copy)]
pub struct SignedRequest<'a> {
    /// Timestamp exactly as sent in the header.
    pub timestamp: &'a str,
    pub method: &'a str,
    pub path_and_query: &'a str,
    pub body: &'a [u8],
}

impl SignedRequest<'_> {
    /// The message that gets MACed.
    #[must_use]
    pub fn canonical_string(&self) -> String {
        format!(
            "{}\n{}\n{}\n{}",
            self.timestamp,
            self.method.to_ascii_uppercase(),
            self.path_and_query,
            hex::encode(Sha256::digest(self.body)),
        )
    }

    fn mac(&self, secret: &[u8]) -> HmacSha256 {
        let mut mac = <HmacSha256 as Mac>::new_from_slice(secret)
            .unwrap_or_else(|_| unreachable!("HMAC accepts keys of any length"));
        mac.update(self.canonical_string().as_bytes());
        mac
    }
}

/// Compute the hex signature for `request`.
#[must_use]
pub fn sign(secret: &[u8], request: &SignedRequest<'_>) -> String {
    hex::encode(request.mac(secret).finalize().into_bytes())
}

/// Verify a hex `signature` in constant time.
///
/// # Errors
///
/// Returns `SignatureError::Mismatch` for a wrong or malformed signature.
pub fn verify(secret: &[u8], request: &SignedRequest<'_>, signature: &str) -> Result<(), SignatureError> {
    let provided = hex::decode(signature.trim()).map_err(|_| SignatureError::Mismatch)?;
    request
        .mac(secret)
        .verify_slice(&provided)
        .map_err(|_| SignatureError::Mismatch)
}

/// Check a unix-seconds `timestamp` header against `now`.
///
/// Both clock skew directions are tolerated up to `window_secs`.
///
/// # Errors
///
/// Returns `InvalidTimestamp` when the header does not parse and `Expired`
/// when it is outside the window.
pub fn check_timestamp(timestamp: &str, now: i64, window_secs: u64) -> Result<i64, SignatureError> {
    let ts: i64 = timestamp
        .trim()
        .parse()
        .map_err(|_| SignatureError::InvalidTimestamp)?;

    if now.abs_diff(ts) > window_secs {
        return Err(SignatureError::Expired);
    }
    Ok(ts)
}

/// Constant-time comparison for the shared-secret fallback mode.
#[must_use]
pub fn secrets_match(expected: &str, provided: &str) -> bool {
    if expected.len() != provided.len() {
        return false;
    }

    expected
        .bytes()
        .zip(provided.bytes())
        .fold(0_u8, |acc, (x, y)| acc | (x ^ y))
        == 0
}
