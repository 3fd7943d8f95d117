use hmac::{Hmac, Mac};
use sha2::Sha256;

/// Header carrying the HMAC-SHA256 of the raw webhook body
pub const SIGNATURE_HEADER: &str = "x-hub-signature-256";

type HmacSha256 = Hmac<Sha256>;

/// Check a `sha256=<hex>` signature against the raw request body
pub fn verify_signature(app_secret: &str, body: &[u8], header_value: &str) -> bool {
    let Some(hex_digest) = header_value.trim().strip_prefix("sha256=") else {
        return false;
    };
    let Ok(expected) = hex::decode(hex_digest) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(app_secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&expected).is_ok()
}

/// Compute the header value Meta would send for `body`
pub fn sign_payload(app_secret: &str, body: &[u8]) -> String {
    match HmacSha256::new_from_slice(app_secret.as_bytes()) {
        Ok(mut mac) => {
            mac.update(body);
            format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
        }
        Err(_) => String::new(),
    }
}
