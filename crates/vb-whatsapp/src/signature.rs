//! Webhook authentication
//!
//! Deliveries carry `X-Hub-Signature-256: sha256=<hex>`, an HMAC-SHA256 of
//! the exact raw body keyed by the app secret.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::warn;

use crate::error::{Result, WhatsAppError};

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the delivery signature
pub const SIGNATURE_HEADER: &str = "x-hub-signature-256";

const SIGNATURE_PREFIX: &str = "sha256=";

/// Verify a delivery signature over the raw body.
///
/// The digest comparison is constant-time (`Mac::verify_slice`).
pub fn verify_signature(app_secret: &str, body: &[u8], signature_header: &str) -> Result<()> {
    let hex_sig = signature_header
        .trim()
        .strip_prefix(SIGNATURE_PREFIX)
        .ok_or_else(|| {
            warn!("invalid signature header format (missing sha256= prefix)");
            WhatsAppError::SignatureVerificationFailed
        })?;

    let expected = hex::decode(hex_sig).map_err(|_| WhatsAppError::SignatureVerificationFailed)?;

    let mut mac = HmacSha256::new_from_slice(app_secret.as_bytes())
        .map_err(|_| WhatsAppError::SignatureVerificationFailed)?;
    mac.update(body);

    mac.verify_slice(&expected)
        .map_err(|_| WhatsAppError::SignatureVerificationFailed)
}

/// Compute the header value for `body`
#[cfg(test)]
pub(crate) fn sign(app_secret: &str, body: &[u8]) -> String {
    // HMAC accepts keys of any length
    let mut mac = match HmacSha256::new_from_slice(app_secret.as_bytes()) {
        Ok(m) => m,
        Err(_) => return String::new(),
    };
    mac.update(body);
    format!("{}{}", SIGNATURE_PREFIX, hex::encode(mac.finalize().into_bytes()))
}

/// Constant-time comparison for the handshake verify token.
///
/// An unset expected token never matches.
pub fn verify_token_matches(expected: &str, provided: &str) -> bool {
    if expected.is_empty() || expected.len() != provided.len() {
        return false;
    }
    expected
        .bytes()
        .zip(provided.bytes())
        .fold(0, |acc, (x, y)| acc | (x ^ y))
        == 0
}
