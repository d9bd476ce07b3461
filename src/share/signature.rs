//! HMAC-SHA256 signatures over `"<path>:<expires_at>"`.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Sign `path` until `expires_at` (unix seconds).
///
/// Returns `<path>?exp=<expires_at>&sig=<digest>`.
pub fn sign(path: &str, expires_at: i64, secret: &[u8]) -> String {
    let signature = compute_signature(path, expires_at, secret);
    format!("{}?exp={}&sig={}", path, expires_at, signature)
}

/// Check that `signature` was produced for this path and expiry.
///
/// Freshness is not checked here.
pub fn validate(path: &str, expires_at: i64, signature: &str, secret: &[u8]) -> bool {
    let expected = compute_signature(path, expires_at, secret);
    expected.as_bytes().ct_eq(signature.as_bytes()).into()
}

/// Base64url (unpadded) HMAC-SHA256 of `"<path>:<expires_at>"`
pub fn compute_signature(path: &str, expires_at: i64, secret: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC accepts keys of any length");
    mac.update(path.as_bytes());
    mac.update(b":");
    mac.update(expires_at.to_string().as_bytes());
    URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes())
}
