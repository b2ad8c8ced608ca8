//! Error types for webhook signature validation.

use thiserror::Error;

/// Result type alias for this crate.
pub type Result<T> = std::result::Result<T, SecurityError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SecurityError {
    #[error("signature validation failed")]
    InvalidSignature,

    #[error("request timestamp outside replay tolerance: age {age_seconds}s > {tolerance_seconds}s")]
    TimestampOutOfTolerance { age_seconds: i64, tolerance_seconds: i64 },

    #[error("missing or unparsable timestamp")]
    InvalidTimestamp,

    #[error("unsupported HMAC algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("signing secret not configured")]
    MissingSecret,

    #[error("unparsable client IP: {0}")]
    InvalidIp(String),
}
