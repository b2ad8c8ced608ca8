//! sipgate-style webhook signature validation: HMAC-SHA256 over
//! `timestamp + "." + body`, hex-encoded, plus a replay-window check on the
//! timestamp itself.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::error::{Result, SecurityError};
use crate::timestamp::TimestampValidator;

type HmacSha256 = Hmac<Sha256>;

/// Validates `X-Sipgate-Signature` / `X-Sipgate-Timestamp` header pairs.
pub struct SipgateSignatureValidator {
    api_token: String,
    timestamp: TimestampValidator,
}

impl SipgateSignatureValidator {
    pub fn new(api_token: impl Into<String>, tolerance_seconds: i64) -> Self {
        Self {
            api_token: api_token.into(),
            timestamp: TimestampValidator::new(tolerance_seconds),
        }
    }

    /// `timestamp` is the raw header value (Unix seconds as a string);
    /// `now` is the caller's notion of current time (injected so tests can
    /// control it without depending on wall-clock `Clock` here).
    pub fn validate(&self, signature: &str, timestamp: &str, body: &[u8], now_unix: i64) -> Result<()> {
        if self.api_token.is_empty() {
            return Err(SecurityError::MissingSecret);
        }

        self.timestamp.validate_str(timestamp, now_unix)?;

        let mut data = Vec::with_capacity(timestamp.len() + 1 + body.len());
        data.extend_from_slice(timestamp.as_bytes());
        data.push(b'.');
        data.extend_from_slice(body);

        let mut mac = HmacSha256::new_from_slice(self.api_token.as_bytes())
            .expect("HMAC accepts keys of any length");
        mac.update(&data);
        let expected = hex::encode(mac.finalize().into_bytes());

        if expected.as_bytes().ct_eq(signature.as_bytes()).into() {
            Ok(())
        } else {
            Err(SecurityError::InvalidSignature)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signature_for(token: &str, timestamp: &str, body: &[u8]) -> String {
        let mut mac = HmacSha256::new_from_slice(token.as_bytes()).unwrap();
        mac.update(timestamp.as_bytes());
        mac.update(b".");
        mac.update(body);
        hex::encode(mac.finalize().into_bytes())
    }

    #[test]
    fn accepts_matching_signature_within_tolerance() {
        let validator = SipgateSignatureValidator::new("token", 300);
        let now = 1_700_000_000i64;
        let timestamp = now.to_string();
        let body = b"{\"event\":\"incoming\"}";
        let signature = signature_for("token", &timestamp, body);

        validator.validate(&signature, &timestamp, body, now).unwrap();
    }

    #[test]
    fn rejects_timestamp_301_seconds_old_with_300_second_tolerance() {
        let validator = SipgateSignatureValidator::new("token", 300);
        let now = 1_700_000_301i64;
        let timestamp = "1700000000".to_string();
        let body = b"payload";
        let signature = signature_for("token", &timestamp, body);

        let result = validator.validate(&signature, &timestamp, body, now);
        assert!(matches!(result, Err(SecurityError::TimestampOutOfTolerance { .. })));
    }
}
