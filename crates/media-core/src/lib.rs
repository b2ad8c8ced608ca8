//! Codec pipeline and concurrent audio bridge: the seam between telephony
//! wire audio and the AI-facing float32 frames the conversation engine uses.

mod bridge;
mod error;
mod pipeline;

pub use bridge::{AudioBridge, AudioBridgeConfig, AudioPayload, CallId};
pub use error::{MediaError, Result};
pub use pipeline::CodecPipeline;

pub mod prelude {
    pub use crate::{AudioBridge, AudioBridgeConfig, AudioPayload, CallId, CodecPipeline, MediaError};
}
