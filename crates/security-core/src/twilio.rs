//! Twilio-style webhook signature validation: HMAC-SHA1 over the request
//! URL with sorted POST parameters appended, base64-encoded.
//!
//! See <https://www.twilio.com/docs/usage/security>.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use hmac::{Hmac, Mac};
use sha1::Sha1;
use subtle::ConstantTimeEq;

use crate::error::{Result, SecurityError};

type HmacSha1 = Hmac<Sha1>;

/// Validates `X-Twilio-Signature` headers against an auth token.
pub struct TwilioSignatureValidator {
    auth_token: String,
}

impl TwilioSignatureValidator {
    pub fn new(auth_token: impl Into<String>) -> Self {
        Self { auth_token: auth_token.into() }
    }

    /// Validate a presented signature against `url` and the sorted POST
    /// parameters. `params` is consumed as `(key, value)` pairs; order does
    /// not matter, sorting happens here.
    pub fn validate<'a, I>(&self, signature: &str, url: &str, params: I) -> Result<()>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        if self.auth_token.is_empty() {
            return Err(SecurityError::MissingSecret);
        }

        let mut sorted: Vec<(&str, &str)> = params.into_iter().collect();
        sorted.sort_by(|a, b| a.0.cmp(b.0));

        let mut data = String::from(url);
        for (key, value) in sorted {
            data.push_str(key);
            data.push_str(value);
        }

        let mut mac = HmacSha1::new_from_slice(self.auth_token.as_bytes())
            .expect("HMAC accepts keys of any length");
        mac.update(data.as_bytes());
        let expected = STANDARD.encode(mac.finalize().into_bytes());

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

    // Official Twilio documentation test vector.
    const AUTH_TOKEN: &str = "12345";
    const URL: &str = "https://mycompany.com/myapp.php?foo=1&bar=2";
    const EXPECTED_SIGNATURE: &str = "RSOYDt4T1cUTdK1PDd93/VVr8B8=";

    fn vector_params() -> Vec<(&'static str, &'static str)> {
        vec![
            ("CallSid", "CA1234567890ABCDE"),
            ("Caller", "+14158675309"),
            ("Digits", "1234"),
            ("From", "+14158675309"),
            ("To", "+18005551212"),
        ]
    }

    #[test]
    fn accepts_official_test_vector() {
        let validator = TwilioSignatureValidator::new(AUTH_TOKEN);
        validator
            .validate(EXPECTED_SIGNATURE, URL, vector_params())
            .expect("official vector must validate");
    }

    #[test]
    fn rejects_single_byte_mutation() {
        let validator = TwilioSignatureValidator::new(AUTH_TOKEN);
        let mut mutated = EXPECTED_SIGNATURE.as_bytes().to_vec();
        let last = mutated.len() - 1;
        mutated[last] ^= 0x01;
        let mutated = String::from_utf8(mutated).unwrap();

        let result = validator.validate(&mutated, URL, vector_params());
        assert_eq!(result, Err(SecurityError::InvalidSignature));
    }

    #[test]
    fn rejects_with_no_auth_token_configured() {
        let validator = TwilioSignatureValidator::new("");
        let result = validator.validate(EXPECTED_SIGNATURE, URL, vector_params());
        assert_eq!(result, Err(SecurityError::MissingSecret));
    }

    #[test]
    fn param_order_does_not_affect_validation() {
        let validator = TwilioSignatureValidator::new(AUTH_TOKEN);
        let mut shuffled = vector_params();
        shuffled.reverse();
        validator.validate(EXPECTED_SIGNATURE, URL, shuffled).unwrap();
    }
}
