//! Verification of the `Stripe-Signature` header sent with every webhook delivery.
//!
//! The header has the form `t=1492774577,v1=5257a869e7ecebeda32affa62cdca3fa51cad7e77a0e56ff536d0ce8e108d8bd`. The
//! `v1` value is the hex-encoded HMAC-SHA256 of `"{t}.{payload}"` keyed with the endpoint's signing secret. More
//! than one `v1` entry may be present while a secret is being rolled; any match is accepted.
use hmac::{Hmac, Mac};
use log::*;
use sha2::Sha256;

use crate::StripeApiError;

type HmacSha256 = Hmac<Sha256>;

pub const DEFAULT_SIGNATURE_TOLERANCE_SECS: i64 = 300;

pub fn verify_webhook_signature(
    payload: &[u8],
    header: &str,
    secret: &str,
    tolerance_secs: i64,
    now: i64,
) -> Result<(), StripeApiError> {
    if secret.is_empty() {
        return Err(StripeApiError::InvalidSignature("No webhook signing secret is configured".into()));
    }
    let mut timestamp = None;
    let mut signatures = Vec::new();
    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", v)) => timestamp = v.parse::<i64>().ok(),
            Some(("v1", v)) => signatures.push(v),
            _ => {},
        }
    }
    let timestamp = timestamp.ok_or_else(|| StripeApiError::InvalidSignature("Missing timestamp".into()))?;
    if signatures.is_empty() {
        return Err(StripeApiError::InvalidSignature("No v1 signature present".into()));
    }
    if (now - timestamp).abs() > tolerance_secs {
        warn!("💳️ Webhook timestamp {timestamp} is outside the tolerance window (now = {now})");
        return Err(StripeApiError::InvalidSignature("Timestamp outside the tolerance window".into()));
    }
    let matched = signatures.into_iter().filter_map(|s| hex::decode(s).ok()).any(|expected| {
        let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
            return false;
        };
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload);
        mac.verify_slice(&expected).is_ok()
    });
    if matched {
        trace!("💳️ Webhook signature verified ✅️");
        Ok(())
    } else {
        Err(StripeApiError::InvalidSignature("Signature mismatch".into()))
    }
}
