//! Error types for the WebSocket audio adapter.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, WsError>;

#[derive(Error, Debug)]
pub enum WsError {
    #[error("codec/media error: {0}")]
    Media(#[from] callcore_media::MediaError),

    #[error("WebSocket transport error: {0}")]
    Transport(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid JSON control message: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("invalid base64 audio payload")]
    InvalidBase64,

    #[error("unknown session: {0}")]
    UnknownSession(String),

    #[error("connection limit reached")]
    ConnectionLimitReached,
}
