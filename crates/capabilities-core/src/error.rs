//! Error type shared by every capability interface.

use thiserror::Error;

/// Errors a capability implementation may report. Adapters are expected to
/// map provider-specific failures onto this small set rather than leaking
/// their own error types across the injection boundary.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CapabilityError {
    /// Retryable: network blip, rate limit, provider hiccup.
    #[error("transient capability failure: {0}")]
    Transient(String),

    /// Not retryable: bad config, auth failure, unsupported input.
    #[error("fatal capability failure: {0}")]
    Fatal(String),

    /// The caller cancelled the in-flight operation (e.g. barge-in).
    #[error("capability call cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, CapabilityError>;
