use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

pub const DEFAULT_TOLERANCE_SECS: u64 = 300;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WebhookSignatureError {
    #[error("webhook signing secret is not configured")]
    MissingSecret,
    #[error("missing timestamp in stripe-signature")]
    MissingTimestamp,
    #[error("missing v1 in stripe-signature")]
    MissingSignature,
    #[error("timestamp outside the tolerance window")]
    TimestampOutsideTolerance,
    #[error("no signature matches the payload")]
    NoMatchingSignature,
}

/// Checks a `Stripe-Signature` header (`t=<unix>,v1=<hex>[,v1=<hex>...]`) against the
/// raw payload. https://stripe.com/docs/webhooks/signatures
pub fn verify_signature(
    secret: &str,
    payload: &[u8],
    signature_header: &str,
    tolerance_secs: u64,
    now_unix: i64,
) -> Result<(), WebhookSignatureError> {
    if secret.is_empty() {
        return Err(WebhookSignatureError::MissingSecret);
    }

    let mut timestamp: Option<i64> = None;
    let mut signatures: Vec<Vec<u8>> = Vec::new();

    for part in signature_header.split(',') {
        let part = part.trim();
        if let Some(rest) = part.strip_prefix("t=") {
            timestamp = rest.parse().ok();
        } else if let Some(rest) = part.strip_prefix("v1=") {
            // Undecodable entries can never match; skip them.
            if let Ok(bytes) = hex::decode(rest) {
                signatures.push(bytes);
            }
        }
    }

    let timestamp = timestamp.ok_or(WebhookSignatureError::MissingTimestamp)?;
    if signatures.is_empty() {
        return Err(WebhookSignatureError::MissingSignature);
    }

    if now_unix.abs_diff(timestamp) > tolerance_secs {
        return Err(WebhookSignatureError::TimestampOutsideTolerance);
    }

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| WebhookSignatureError::MissingSecret)?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);

    // verify_slice compares in constant time.
    let matched = signatures
        .iter()
        .any(|candidate| mac.clone().verify_slice(candidate).is_ok());

    if matched {
        Ok(())
    } else {
        Err(WebhookSignatureError::NoMatchingSignature)
    }
}

#[cfg(test)]
pub(crate) fn sign_payload(secret: &str, payload: &[u8], timestamp: i64) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
    mac.update(format!("{timestamp}.").as_bytes());
    mac.update(payload);
    format!("t={},v1={}", timestamp, hex::encode(mac.finalize().into_bytes()))
}
