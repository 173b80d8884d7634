use crate::error::{AppError, AppResult};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Verifies `Stripe-Signature` headers (`t=<unix ts>,v1=<hex hmac>[,v1=...]`)
/// against the exact bytes of the request body.
#[derive(Clone)]
pub struct WebhookVerifier {
    secret: String,
    tolerance_secs: i64,
}

impl WebhookVerifier {
    pub fn new(secret: impl Into<String>, tolerance_secs: i64) -> Self {
        Self {
            secret: secret.into(),
            tolerance_secs,
        }
    }

    pub fn verify(&self, payload: &[u8], header: &str, now_ts: i64) -> AppResult<()> {
        let mut timestamp: Option<&str> = None;
        let mut signatures: Vec<&str> = Vec::new();
        for part in header.split(',') {
            let mut kv = part.trim().splitn(2, '=');
            match (kv.next(), kv.next()) {
                (Some("t"), Some(v)) => timestamp = Some(v),
                (Some("v1"), Some(v)) => signatures.push(v),
                _ => {}
            }
        }

        let timestamp = timestamp
            .ok_or_else(|| AppError::WebhookSignature("Missing timestamp".to_string()))?;
        if signatures.is_empty() {
            return Err(AppError::WebhookSignature("Missing v1 signature".to_string()));
        }
        let ts: i64 = timestamp
            .parse()
            .map_err(|_| AppError::WebhookSignature("Malformed timestamp".to_string()))?;
        if (now_ts - ts).abs() > self.tolerance_secs {
            return Err(AppError::WebhookSignature(
                "Timestamp outside the tolerance window".to_string(),
            ));
        }

        let expected = self.sign(timestamp, payload)?;
        let matched = signatures
            .iter()
            .any(|sig| bool::from(expected.as_bytes().ct_eq(sig.as_bytes())));
        if matched {
            Ok(())
        } else {
            Err(AppError::WebhookSignature("Signature mismatch".to_string()))
        }
    }

    /// Hex HMAC-SHA256 over `<timestamp>.<payload>`.
    pub fn sign(&self, timestamp: &str, payload: &[u8]) -> AppResult<String> {
        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .map_err(|e| AppError::InternalError(format!("Invalid webhook secret: {e}")))?;
        mac.update(timestamp.as_bytes());
        mac.update(b".");
        mac.update(payload);
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    /// Builds a full header value; used by tests and local webhook replays.
    pub fn header_for(&self, payload: &[u8], ts: i64) -> AppResult<String> {
        let sig = self.sign(&ts.to_string(), payload)?;
        Ok(format!("t={ts},v1={sig}"))
    }
}
