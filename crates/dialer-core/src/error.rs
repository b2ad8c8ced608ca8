use thiserror::Error;

pub type Result<T> = std::result::Result<T, DialerError>;

#[derive(Error, Debug)]
pub enum DialerError {
    #[error("no queued call with id {0}")]
    UnknownCall(uuid::Uuid),

    #[error("pbx command failed: {0}")]
    Pbx(#[from] callcore_pbx::PbxError),

    #[error("capability failure: {0}")]
    Capability(#[from] callcore_capabilities::CapabilityError),
}
