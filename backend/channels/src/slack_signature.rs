//! Slack request signing
//!
//! Verifies `X-Slack-Signature` (HMAC-SHA256 over `v0:{timestamp}:{body}`)
//! and rejects stale timestamps.

use axum::http::HeaderMap;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::debug;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "x-slack-signature";
pub const TIMESTAMP_HEADER: &str = "x-slack-request-timestamp";
const VERSION: &str = "v0";

/// Decides whether an inbound webhook really came from the platform.
pub trait SignatureVerifier: Send + Sync {
    fn is_valid(&self, body: &[u8], headers: &HeaderMap) -> bool;
}

/// Signing-secret verifier for the Slack Events API.
#[derive(Clone)]
pub struct SlackSignatureVerifier {
    signing_secret: String,
    tolerance_secs: u64,
}

impl SlackSignatureVerifier {
    pub fn new(signing_secret: impl Into<String>) -> Self {
        Self {
            signing_secret: signing_secret.into(),
            tolerance_secs: 300,
        }
    }

    pub fn with_tolerance(mut self, tolerance_secs: u64) -> Self {
        self.tolerance_secs = tolerance_secs;
        self
    }

    /// Same as [`SignatureVerifier::is_valid`] with an explicit clock.
    pub fn is_valid_at(&self, body: &[u8], headers: &HeaderMap, now: i64) -> bool {
        let Some(ts) = header_str(headers, TIMESTAMP_HEADER) else {
            debug!("Missing Slack timestamp header");
            return false;
        };
        let Some(sig) = header_str(headers, SIGNATURE_HEADER) else {
            debug!("Missing Slack signature header");
            return false;
        };
        let Ok(ts_secs) = ts.parse::<i64>() else {
            debug!(timestamp = %ts, "Non-numeric Slack timestamp");
            return false;
        };
        if now.abs_diff(ts_secs) > self.tolerance_secs {
            debug!(timestamp = ts_secs, now, "Stale Slack timestamp");
            return false;
        }
        let Some(expected) = sig
            .strip_prefix("v0=")
            .and_then(|hex_sig| hex::decode(hex_sig).ok())
        else {
            debug!("Malformed Slack signature header");
            return false;
        };

        let Ok(mac) = self.mac(ts, body) else {
            return false;
        };
        mac.verify_slice(&expected).is_ok()
    }

    /// `v0=<hex>` signature for `body` at `timestamp`; what Slack would send.
    pub fn sign(&self, timestamp: &str, body: &[u8]) -> String {
        match self.mac(timestamp, body) {
            Ok(mac) => format!("{VERSION}={}", hex::encode(mac.finalize().into_bytes())),
            Err(_) => String::new(),
        }
    }

    fn mac(&self, timestamp: &str, body: &[u8]) -> Result<HmacSha256, hmac::digest::InvalidLength> {
        let mut mac = HmacSha256::new_from_slice(self.signing_secret.as_bytes())?;
        mac.update(VERSION.as_bytes());
        mac.update(b":");
        mac.update(timestamp.as_bytes());
        mac.update(b":");
        mac.update(body);
        Ok(mac)
    }
}

impl SignatureVerifier for SlackSignatureVerifier {
    fn is_valid(&self, body: &[u8], headers: &HeaderMap) -> bool {
        self.is_valid_at(body, headers, chrono::Utc::now().timestamp())
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}
