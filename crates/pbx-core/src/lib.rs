//! Event-socket PBX control client (C7): connect/auth/subscribe handshake,
//! line-based command/event framing, call-control commands, and best-effort
//! event dispatch with automatic reconnection.

mod client;
mod error;
mod protocol;
mod types;

pub use client::{handler, EventHandler, EventHandlerResult, PbxClient, PbxConfig};
pub use error::{PbxError, Result};
pub use protocol::{parse_event, read_frame, Frame};
pub use types::{ChannelState, ChannelUuid, ConnectionStatus, HangupCause, OriginateRequest, PbxEvent, TransferType};

pub mod prelude {
    pub use crate::{handler, ChannelState, ConnectionStatus, HangupCause, OriginateRequest, PbxClient, PbxConfig, PbxEvent, TransferType};
}
