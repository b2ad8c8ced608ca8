//! Error types for codec operations.

use thiserror::Error;

/// Result type alias for codec operations.
pub type Result<T> = std::result::Result<T, CodecError>;

/// Errors that can occur while encoding, decoding, or resampling audio.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// The input sample rate isn't one this codec/resampler supports.
    #[error("unsupported sample rate: {rate}Hz (supported: {supported:?})")]
    UnsupportedSampleRate { rate: u32, supported: Vec<u32> },

    /// Encoded payload was truncated or otherwise malformed.
    #[error("malformed payload: {details}")]
    MalformedPayload { details: String },

    /// Decode/encode was asked to process an empty frame.
    #[error("empty input")]
    EmptyInput,
}
