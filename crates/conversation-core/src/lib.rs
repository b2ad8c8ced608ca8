//! Per-call conversation engine (C6): sequences STT -> LLM -> TTS for a
//! single call, including streaming sentence synthesis and barge-in.

mod engine;
mod error;
mod state;

pub use engine::{ConversationConfig, ConversationEngine, ProcessedTurn, StreamingTurn};
pub use error::{ConversationError, Result};
pub use state::{CallId, CallPhase, ConversationState};

pub mod prelude {
    pub use crate::{CallId, CallPhase, ConversationConfig, ConversationEngine, ConversationError, ProcessedTurn, StreamingTurn};
}
