//! GitHub webhook signature verification (HMAC-SHA256).
//!
//! GitHub sends `X-Hub-Signature-256: sha256=<hex>` computed over the raw
//! request body with the shared webhook secret.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Header GitHub carries the signature in
pub const SIGNATURE_HEADER: &str = "x-hub-signature-256";

/// Parse `sha256=<hex>` into digest bytes.
///
/// Returns `None` for a missing prefix, another algorithm, bad hex or a
/// digest that is not 32 bytes long.
pub fn parse_signature_header(header: &str) -> Option<Vec<u8>> {
    let hex_sig = header.trim().strip_prefix("sha256=")?;
    let bytes = hex::decode(hex_sig).ok()?;
    if bytes.len() != 32 {
        return None;
    }
    Some(bytes)
}

/// Verify a webhook body against its signature header.
///
/// An empty secret never verifies: unsigned deliveries are not accepted.
/// The digest comparison is constant time.
pub fn verify(payload: &[u8], signature_header: &str, secret: &[u8]) -> bool {
    if secret.is_empty() {
        return false;
    }

    let expected = match parse_signature_header(signature_header) {
        Some(sig) => sig,
        None => return false,
    };

    let mut mac = match HmacSha256::new_from_slice(secret) {
        Ok(mac) => mac,
        Err(_) => return false,
    };
    mac.update(payload);
    mac.verify_slice(&expected).is_ok()
}
