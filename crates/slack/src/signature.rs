//! Slack request signing.
//!
//! Slack signs every Events API request with the app's signing secret:
//!
//! 1. base string = `v0:{X-Slack-Request-Timestamp}:{raw body}`
//! 2. digest = `HMAC-SHA256(signing_secret, base string)`
//! 3. `X-Slack-Signature` = `v0={lowercase hex digest}`
//!
//! Requests whose timestamp is further than the replay window from the
//! current time are rejected before the digest is checked.

use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use slack2doc_core::ApplicationError;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_VERSION: &str = "v0";
pub const TIMESTAMP_HEADER: &str = "x-slack-request-timestamp";
pub const SIGNATURE_HEADER: &str = "x-slack-signature";
pub const DEFAULT_REPLAY_WINDOW_SECS: u64 = 300;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("missing `{0}` header")]
    MissingHeader(&'static str),
    #[error("request timestamp `{0}` is not a unix timestamp")]
    InvalidTimestamp(String),
    #[error("request timestamp is {age_secs}s away from now (window {window_secs}s)")]
    StaleTimestamp { age_secs: u64, window_secs: u64 },
    #[error("signature header is not a `v0=` hex digest")]
    MalformedSignature,
    #[error("signature does not match request")]
    Mismatch,
}

/// The signed parts of an inbound request, borrowed for one verification.
#[derive(Clone, Copy, Debug)]
pub struct SignedRequest<'a> {
    pub timestamp: Option<&'a str>,
    pub signature: Option<&'a str>,
    pub body: &'a [u8],
}

#[derive(Clone, Debug)]
pub struct SignatureVerifier {
    signing_secret: SecretString,
    replay_window_secs: u64,
}

impl SignatureVerifier {
    pub fn new(signing_secret: SecretString, replay_window_secs: u64) -> Self {
        Self { signing_secret, replay_window_secs }
    }

    pub fn replay_window_secs(&self) -> u64 {
        self.replay_window_secs
    }

    /// Verify `request` against the wall clock.
    pub fn verify_now(&self, request: &SignedRequest<'_>) -> Result<(), SignatureError> {
        self.verify(request, chrono::Utc::now().timestamp())
    }

    /// Verify `request` as of `now` (unix seconds).
    pub fn verify(&self, request: &SignedRequest<'_>, now: i64) -> Result<(), SignatureError> {
        let timestamp = request.timestamp.ok_or(SignatureError::MissingHeader(TIMESTAMP_HEADER))?;
        let signature = request.signature.ok_or(SignatureError::MissingHeader(SIGNATURE_HEADER))?;

        let issued_at = parse_timestamp(timestamp)?;
        let age_secs = now.abs_diff(issued_at);
        if age_secs > self.replay_window_secs {
            return Err(SignatureError::StaleTimestamp {
                age_secs,
                window_secs: self.replay_window_secs,
            });
        }

        let provided = decode_signature(signature)?;
        let mac = keyed_mac(self.signing_secret.expose_secret().as_bytes(), timestamp, request.body)?;
        mac.verify_slice(&provided).map_err(|_| SignatureError::Mismatch)
    }
}

/// Compute the `X-Slack-Signature` value Slack would send for `body`.
pub fn compute_signature(
    signing_secret: &str,
    timestamp: &str,
    body: &[u8],
) -> Result<String, SignatureError> {
    let mac = keyed_mac(signing_secret.as_bytes(), timestamp, body)?;
    Ok(format!("{SIGNATURE_VERSION}={}", hex::encode(mac.finalize().into_bytes())))
}

fn keyed_mac(secret: &[u8], timestamp: &str, body: &[u8]) -> Result<HmacSha256, SignatureError> {
    let mut mac = HmacSha256::new_from_slice(secret).map_err(|_| SignatureError::Mismatch)?;
    mac.update(SIGNATURE_VERSION.as_bytes());
    mac.update(b":");
    mac.update(timestamp.as_bytes());
    mac.update(b":");
    mac.update(body);
    Ok(mac)
}

fn parse_timestamp(raw: &str) -> Result<i64, SignatureError> {
    if raw.is_empty() || !raw.bytes().all(|byte| byte.is_ascii_digit()) {
        return Err(SignatureError::InvalidTimestamp(raw.to_string()));
    }
    raw.parse::<i64>().map_err(|_| SignatureError::InvalidTimestamp(raw.to_string()))
}

// Lowercase only: `hex::decode` also accepts uppercase, which would let a
// case-flipped header verify.
fn decode_signature(raw: &str) -> Result<Vec<u8>, SignatureError> {
    let digest = raw
        .strip_prefix(SIGNATURE_VERSION)
        .and_then(|rest| rest.strip_prefix('='))
        .ok_or(SignatureError::MalformedSignature)?;

    if !digest.bytes().all(|byte| matches!(byte, b'0'..=b'9' | b'a'..=b'f')) {
        return Err(SignatureError::MalformedSignature);
    }
    hex::decode(digest).map_err(|_| SignatureError::MalformedSignature)
}

impl From<SignatureError> for ApplicationError {
    fn from(error: SignatureError) -> Self {
        ApplicationError::Unauthorized(error.to_string())
    }
}
