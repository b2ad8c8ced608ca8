//! Error types for RTP/RTCP parsing and sessions.

use thiserror::Error;

/// Result type alias for this crate.
pub type Result<T> = std::result::Result<T, RtpError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RtpError {
    #[error("buffer too small: need {required} bytes, have {available}")]
    BufferTooSmall { required: usize, available: usize },

    #[error("unsupported RTP version: {0}")]
    UnsupportedVersion(u8),

    #[error("unknown RTCP packet type: {0}")]
    UnknownRtcpType(u8),

    #[error("malformed packet: {details}")]
    Malformed { details: String },
}
