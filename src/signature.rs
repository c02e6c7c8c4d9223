//! HMAC-SHA256 signing of delivery payloads

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Header names used on outgoing deliveries
pub mod headers {
    /// The signature header name
    pub const SIGNATURE: &str = "X-Webhook-Signature";

    /// Webhook ID header
    pub const WEBHOOK_ID: &str = "X-Webhook-ID";

    /// Event ID header
    pub const EVENT_ID: &str = "X-Event-ID";

    /// Event type header
    pub const EVENT_TYPE: &str = "X-Event-Type";
}

/// Signs delivery payloads with a per-webhook secret
#[derive(Debug, Clone)]
pub struct Signer {
    secret: String,
}

impl Signer {
    /// Create a new signer with the given secret
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// Generate the signature for a payload: `sha256=<hex HMAC-SHA256>`
    pub fn sign(&self, payload: &[u8]) -> String {
        let mut mac =
            HmacSha256::new_from_slice(self.secret.as_bytes()).expect("HMAC can take any size key");
        mac.update(payload);
        format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
    }

    /// Verify a signature against a payload
    ///
    /// Recomputes the signature and compares in constant time.
    pub fn verify(&self, payload: &[u8], signature: &str) -> bool {
        constant_time_compare(&self.sign(payload), signature)
    }
}

/// Constant-time string comparison to prevent timing attacks
fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }
    result == 0
}
