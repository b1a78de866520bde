//! Webhook Event Verification
//!
//! Recomputes the provider signature over the raw payload and parses the
//! payload into a `PaymentEvent`. Pure check; a forged event never reaches
//! the applier.

use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;

use crate::error::{LedgerError, Result};

type HmacSha256 = Hmac<Sha256>;

/// Default timestamp tolerance window (seconds)
const DEFAULT_TOLERANCE_SECS: i64 = 300;

/// A verified payment-confirmation event
///
/// `plan` stays a raw string here; the applier resolves it against the
/// plan table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PaymentEvent {
    /// Provider-assigned unique event id
    pub event_id: String,

    /// Canonical user identity the credit applies to
    pub user_key: String,

    /// Raw plan name from the provider
    pub plan: String,
}

/// Wire shape of the provider payload
#[derive(Debug, Deserialize)]
struct WireEvent {
    id: String,
    #[serde(default)]
    data: WireData,
}

#[derive(Debug, Default, Deserialize)]
struct WireData {
    #[serde(default)]
    user_key: String,
    #[serde(default)]
    plan: String,
}

/// Validates inbound provider events against the shared secret
///
/// The signature header is `t=<unix>,v1=<hex>` where `<hex>` is HMAC-SHA256
/// over `"{t}.{payload}"`. Signatures outside the tolerance window are
/// rejected even when the digest matches.
pub struct EventVerifier {
    secret: String,
    tolerance_secs: i64,
}

impl EventVerifier {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            tolerance_secs: DEFAULT_TOLERANCE_SECS,
        }
    }

    /// Override the timestamp tolerance window
    pub fn with_tolerance(mut self, tolerance_secs: i64) -> Self {
        self.tolerance_secs = tolerance_secs;
        self
    }

    /// Verify the signature header against `payload` and parse the event
    pub fn verify(&self, payload: &[u8], signature_header: &str) -> Result<PaymentEvent> {
        let (timestamp, digest) = parse_signature_header(signature_header)?;

        let age = (chrono::Utc::now().timestamp() - timestamp).abs();
        if age > self.tolerance_secs {
            return Err(LedgerError::InvalidSignature(format!(
                "timestamp outside tolerance ({age}s)"
            )));
        }

        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .map_err(|e| LedgerError::InvalidSignature(e.to_string()))?;
        mac.update(format!("{timestamp}.").as_bytes());
        mac.update(payload);
        mac.verify_slice(&digest)
            .map_err(|_| LedgerError::InvalidSignature("digest mismatch".into()))?;

        parse_event(payload)
    }
}

/// Split `t=<unix>,v1=<hex>` into its parts
fn parse_signature_header(header: &str) -> Result<(i64, Vec<u8>)> {
    let mut timestamp = None;
    let mut digest = None;

    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => {
                timestamp = value.parse::<i64>().ok();
            }
            Some(("v1", value)) => {
                digest = hex::decode(value).ok();
            }
            _ => {}
        }
    }

    match (timestamp, digest) {
        (Some(t), Some(d)) => Ok((t, d)),
        _ => Err(LedgerError::InvalidSignature(
            "missing t= or v1= component".into(),
        )),
    }
}

fn parse_event(payload: &[u8]) -> Result<PaymentEvent> {
    let wire: WireEvent = serde_json::from_slice(payload)
        .map_err(|e| LedgerError::MalformedPayload(e.to_string()))?;

    if wire.id.trim().is_empty() {
        return Err(LedgerError::MalformedPayload("empty event id".into()));
    }

    Ok(PaymentEvent {
        event_id: wire.id,
        user_key: wire.data.user_key,
        plan: wire.data.plan,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test123secret456";

    fn sign(payload: &[u8], secret: &str, timestamp: i64) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(format!("{timestamp}.").as_bytes());
        mac.update(payload);
        format!(
            "t={timestamp},v1={}",
            hex::encode(mac.finalize().into_bytes())
        )
    }

    fn event_payload() -> Vec<u8> {
        serde_json::json!({
            "id": "evt_1",
            "type": "payment.confirmed",
            "data": { "user_key": "u1", "plan": "pro" },
        })
        .to_string()
        .into_bytes()
    }

    #[test]
    fn test_valid_signature_parses_event() {
        let verifier = EventVerifier::new(SECRET);
        let payload = event_payload();
        let header = sign(&payload, SECRET, chrono::Utc::now().timestamp());

        let event = verifier.verify(&payload, &header).unwrap();
        assert_eq!(event.event_id, "evt_1");
        assert_eq!(event.user_key, "u1");
        assert_eq!(event.plan, "pro");
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let verifier = EventVerifier::new(SECRET);
        let payload = event_payload();
        let header = sign(&payload, "wrong_secret", chrono::Utc::now().timestamp());

        match verifier.verify(&payload, &header) {
            Err(LedgerError::InvalidSignature(_)) => {}
            other => panic!("expected InvalidSignature, got {other:?}"),
        }
    }

    #[test]
    fn test_modified_payload_rejected() {
        let verifier = EventVerifier::new(SECRET);
        let payload = event_payload();
        let header = sign(&payload, SECRET, chrono::Utc::now().timestamp());

        let mut tampered = payload.clone();
        tampered.extend_from_slice(b" ");
        assert!(verifier.verify(&tampered, &header).is_err());
    }

    #[test]
    fn test_stale_timestamp_rejected() {
        let verifier = EventVerifier::new(SECRET);
        let payload = event_payload();
        // 10 minutes ago, beyond the 5-minute tolerance
        let header = sign(&payload, SECRET, chrono::Utc::now().timestamp() - 600);

        match verifier.verify(&payload, &header) {
            Err(LedgerError::InvalidSignature(reason)) => {
                assert!(reason.contains("tolerance"), "{reason}");
            }
            other => panic!("expected InvalidSignature, got {other:?}"),
        }
    }

    #[test]
    fn test_malformed_header_rejected() {
        let verifier = EventVerifier::new(SECRET);
        let payload = event_payload();

        assert!(verifier.verify(&payload, "garbage").is_err());
        assert!(verifier.verify(&payload, "t=notanumber,v1=00").is_err());
        assert!(verifier.verify(&payload, "v1=00ff").is_err());
    }

    #[test]
    fn test_signed_junk_is_malformed_payload() {
        let verifier = EventVerifier::new(SECRET);
        let payload = b"[1, 2, 3]".to_vec();
        let header = sign(&payload, SECRET, chrono::Utc::now().timestamp());

        match verifier.verify(&payload, &header) {
            Err(LedgerError::MalformedPayload(_)) => {}
            other => panic!("expected MalformedPayload, got {other:?}"),
        }
    }

    #[test]
    fn test_empty_event_id_rejected() {
        let verifier = EventVerifier::new(SECRET);
        let payload = serde_json::json!({
            "id": "",
            "data": { "user_key": "u1", "plan": "pro" },
        })
        .to_string()
        .into_bytes();
        let header = sign(&payload, SECRET, chrono::Utc::now().timestamp());

        match verifier.verify(&payload, &header) {
            Err(LedgerError::MalformedPayload(_)) => {}
            other => panic!("expected MalformedPayload, got {other:?}"),
        }
    }
}
