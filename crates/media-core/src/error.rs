//! Error types for the codec pipeline and audio bridge.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, MediaError>;

#[derive(Error, Debug)]
pub enum MediaError {
    #[error("codec error: {0}")]
    Codec(#[from] callcore_codec::CodecError),

    #[error("bridge I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unknown call id: {0}")]
    UnknownCall(u64),

    #[error("bridge is closed")]
    BridgeClosed,
}
