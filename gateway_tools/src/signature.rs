use hmac::{Hmac, Mac};
use log::*;
use sha2::Sha512;

type HmacSha512 = Hmac<Sha512>;

/// Calculates the hex-encoded HMAC-SHA512 of `body`, which is how the gateway signs its webhook payloads.
pub fn calculate_signature(secret: &str, body: &[u8]) -> String {
    // HMAC accepts keys of any length, so this cannot fail
    let mut mac = match HmacSha512::new_from_slice(secret.as_bytes()) {
        Ok(m) => m,
        Err(_) => return String::default(),
    };
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}

/// Checks a hex-encoded signature against the body in constant time.
pub fn verify_signature(secret: &str, body: &[u8], signature: &str) -> bool {
    let expected = match hex::decode(signature.trim()) {
        Ok(v) => v,
        Err(e) => {
            debug!("🔐️ Signature is not valid hex. {e}");
            return false;
        },
    };
    let Ok(mut mac) = HmacSha512::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&expected).is_ok()
}
