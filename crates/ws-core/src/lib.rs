//! WebSocket audio adapter (C11): the browser/Twilio-MediaStreams variant
//! of the audio bridge, carrying JSON control plus binary/base64 audio
//! over a WebSocket transport instead of a raw TCP telephony stream.

mod adapter;
mod error;
mod media_streams;
mod protocol;

pub use adapter::{SessionId, WsAdapterConfig, WsAudioAdapter};
pub use error::{Result, WsError};
pub use media_streams::{MediaStreamEvent, MediaStreamsAdapter, StreamSid};
pub use protocol::{f32_to_pcm16le, pcm16le_to_f32, AudioFrame, ClientMessage, ServerMessage};

pub mod prelude {
    pub use crate::{
        AudioFrame, ClientMessage, MediaStreamEvent, MediaStreamsAdapter, ServerMessage,
        SessionId, StreamSid, WsAdapterConfig, WsAudioAdapter, WsError,
    };
}
