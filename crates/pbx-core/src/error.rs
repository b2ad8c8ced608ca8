use thiserror::Error;

pub type Result<T> = std::result::Result<T, PbxError>;

#[derive(Error, Debug)]
pub enum PbxError {
    #[error("not connected")]
    NotConnected,

    #[error("connection closed before a reply arrived")]
    ConnectionClosed,

    #[error("authentication rejected")]
    AuthFailed,

    #[error("command failed: {0}")]
    CommandFailed(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
