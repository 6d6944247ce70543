// libs/payment-cell/src/services/signature.rs
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use tracing::{debug, warn};

type HmacSha256 = Hmac<Sha256>;

/// Parsed `ts=<unix>;h1=<hex>[;h1=<hex>...]` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureHeader<'a> {
    pub timestamp: &'a str,
    pub signatures: Vec<&'a str>,
}

impl<'a> SignatureHeader<'a> {
    /// `None` unless a timestamp and at least one signature are present.
    pub fn parse(header: &'a str) -> Option<Self> {
        let mut timestamp = None;
        let mut signatures = Vec::new();

        for part in header.split(';').map(str::trim) {
            if let Some(ts) = part.strip_prefix("ts=") {
                timestamp = Some(ts);
            } else if let Some(h1) = part.strip_prefix("h1=") {
                if !h1.is_empty() {
                    signatures.push(h1);
                }
            }
        }

        match timestamp {
            Some(timestamp) if !timestamp.is_empty() && !signatures.is_empty() => Some(Self {
                timestamp,
                signatures,
            }),
            _ => None,
        }
    }
}

/// Timestamped HMAC-SHA256 webhook authentication. Several `h1` candidates
/// may be sent while the processor rotates secrets; any match is accepted.
#[derive(Clone)]
pub struct SignatureVerifier {
    secret: String,
    tolerance: Option<Duration>,
}

impl SignatureVerifier {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            tolerance: None,
        }
    }

    /// Reject timestamps further than `tolerance` from the current time.
    pub fn with_tolerance(mut self, tolerance: Option<Duration>) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn verify(&self, raw_body: &[u8], header: &str) -> bool {
        self.verify_at(Utc::now().timestamp(), raw_body, header)
    }

    /// Never panics; any missing or malformed input yields `false`.
    pub fn verify_at(&self, now_unix: i64, raw_body: &[u8], header: &str) -> bool {
        if self.secret.is_empty() {
            warn!("Webhook signature check attempted without a secret");
            return false;
        }

        let Some(parsed) = SignatureHeader::parse(header) else {
            debug!("Webhook signature header is malformed");
            return false;
        };

        let Ok(timestamp) = parsed.timestamp.parse::<i64>() else {
            debug!("Webhook signature timestamp is not numeric");
            return false;
        };

        if let Some(tolerance) = self.tolerance {
            let skew = now_unix.abs_diff(timestamp);
            if skew > tolerance.num_seconds().unsigned_abs() {
                warn!("Webhook rejected: timestamp {} is {}s away from now", timestamp, skew);
                return false;
            }
        }

        let Some(expected) = self.sign(parsed.timestamp, raw_body) else {
            return false;
        };
        let expected_bytes = expected.as_bytes();

        // No early exit: every candidate is compared.
        let mut matched = false;
        for candidate in parsed.signatures {
            let candidate = candidate.to_ascii_lowercase();
            if candidate.len() == expected_bytes.len() {
                matched |= bool::from(candidate.as_bytes().ct_eq(expected_bytes));
            }
        }

        if !matched {
            debug!("No webhook signature candidate matched");
        }
        matched
    }

    /// Hex HMAC over `"{timestamp}:{raw_body}"`.
    pub fn sign(&self, timestamp: &str, raw_body: &[u8]) -> Option<String> {
        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes()).ok()?;
        mac.update(timestamp.as_bytes());
        mac.update(b":");
        mac.update(raw_body);
        Some(hex::encode(mac.finalize().into_bytes()))
    }
}
