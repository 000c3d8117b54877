//! Webhook signature scheme.
//!
//! The processor sends `Stripe-Signature: t=<unix>,v1=<hex>[,v1=<hex>...]`
//! where each `v1` is an HMAC-SHA256 of `"{t}.{body}"` keyed by the
//! endpoint's signing secret.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::SignatureError;

type HmacSha256 = Hmac<Sha256>;

/// Maximum distance between the signed timestamp and now.
pub const SIGNATURE_TOLERANCE_SECS: i64 = 300;

fn signed_mac(secret: &str, timestamp: &str, payload: &[u8]) -> Result<HmacSha256, SignatureError> {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| SignatureError::InvalidKey)?;
    mac.update(timestamp.as_bytes());
    mac.update(b".");
    mac.update(payload);
    Ok(mac)
}

/// Verifies a signature header against the raw request body.
///
/// Any one matching `v1` entry is accepted, so the processor can roll
/// secrets. Comparison is constant-time.
pub fn verify_signature(
    payload: &[u8],
    header: &str,
    secret: &str,
    now: DateTime<Utc>,
) -> Result<(), SignatureError> {
    if header.trim().is_empty() {
        return Err(SignatureError::MissingHeader);
    }

    let mut timestamp = None;
    let mut signatures = Vec::new();
    for part in header.split(',') {
        let part = part.trim();
        if let Some(t) = part.strip_prefix("t=") {
            timestamp = Some(t);
        } else if let Some(v) = part.strip_prefix("v1=") {
            signatures.push(v);
        }
    }

    let timestamp = timestamp.ok_or(SignatureError::MalformedHeader)?;
    if signatures.is_empty() {
        return Err(SignatureError::MalformedHeader);
    }
    let signed_at: i64 = timestamp
        .parse()
        .map_err(|_| SignatureError::MalformedHeader)?;

    let mac = signed_mac(secret, timestamp, payload)?;
    let matched = signatures.iter().any(|sig| {
        hex::decode(sig).is_ok_and(|bytes| mac.clone().verify_slice(&bytes).is_ok())
    });
    if !matched {
        return Err(SignatureError::Mismatch);
    }

    let age_secs = now.timestamp() - signed_at;
    if age_secs.abs() > SIGNATURE_TOLERANCE_SECS {
        return Err(SignatureError::OutsideTolerance { age_secs });
    }

    Ok(())
}

/// Produces a signature header for `payload`, as the processor would.
///
/// Used by the in-memory processor and by tests.
pub fn sign_payload(
    payload: &[u8],
    secret: &str,
    timestamp: DateTime<Utc>,
) -> Result<String, SignatureError> {
    let t = timestamp.timestamp().to_string();
    let mac = signed_mac(secret, &t, payload)?;
    Ok(format!("t={t},v1={}", hex::encode(mac.finalize().into_bytes())))
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    const SECRET: &str = "whsec_test";
    const BODY: &[u8] = br#"{"type":"charge.succeeded"}"#;

    #[test]
    fn test_valid_signature() {
        let now = Utc::now();
        let header = sign_payload(BODY, SECRET, now).unwrap();
        assert!(verify_signature(BODY, &header, SECRET, now).is_ok());
    }

    #[test]
    fn test_tampered_body_is_rejected() {
        let now = Utc::now();
        let header = sign_payload(BODY, SECRET, now).unwrap();
        let result = verify_signature(br#"{"type":"charge.failed"}"#, &header, SECRET, now);
        assert!(matches!(result, Err(SignatureError::Mismatch)));
    }

    #[test]
    fn test_wrong_secret_is_rejected() {
        let now = Utc::now();
        let header = sign_payload(BODY, "whsec_other", now).unwrap();
        assert!(matches!(
            verify_signature(BODY, &header, SECRET, now),
            Err(SignatureError::Mismatch)
        ));
    }

    #[test]
    fn test_stale_timestamp_is_rejected() {
        let signed_at = Utc::now() - Duration::minutes(10);
        let header = sign_payload(BODY, SECRET, signed_at).unwrap();
        assert!(matches!(
            verify_signature(BODY, &header, SECRET, Utc::now()),
            Err(SignatureError::OutsideTolerance { .. })
        ));
    }

    #[test]
    fn test_any_matching_v1_is_accepted() {
        let now = Utc::now();
        let header = sign_payload(BODY, SECRET, now).unwrap();
        let rolled = header.replace("v1=", "v1=deadbeef,v1=");
        assert!(verify_signature(BODY, &rolled, SECRET, now).is_ok());
    }

    #[test]
    fn test_malformed_headers() {
        let now = Utc::now();
        assert!(matches!(
            verify_signature(BODY, "", SECRET, now),
            Err(SignatureError::MissingHeader)
        ));
        assert!(matches!(
            verify_signature(BODY, "v1=abcd", SECRET, now),
            Err(SignatureError::MalformedHeader)
        ));
        assert!(matches!(
            verify_signature(BODY, "t=123", SECRET, now),
            Err(SignatureError::MalformedHeader)
        ));
        assert!(matches!(
            verify_signature(BODY, "t=abc,v1=00", SECRET, now),
            Err(SignatureError::MalformedHeader)
        ));
        assert!(matches!(
            verify_signature(BODY, "t=123,v1=not-hex", SECRET, now),
            Err(SignatureError::Mismatch)
        ));
    }
}
