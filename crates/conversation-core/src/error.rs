//! Errors surfaced by the conversation engine.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ConversationError>;

#[derive(Error, Debug)]
pub enum ConversationError {
    #[error("no conversation with id {0}")]
    UnknownCall(u64),

    #[error("conversation {0} already ended")]
    AlreadyEnded(u64),

    #[error("capability failure: {0}")]
    Capability(#[from] callcore_capabilities::CapabilityError),
}
