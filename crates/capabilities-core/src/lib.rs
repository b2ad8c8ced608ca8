//! External capability interfaces (C12): small, abstract contracts for
//! everything the core treats as an injected collaborator rather than
//! something it implements itself — STT, LLM, TTS, SMS, consent, audit,
//! clock, and per-industry repositories — plus the bounded model-instance
//! cache the dialect-routed STT use case requires.
//!
//! Every trait method is async and `Send + Sync`-bound so implementations
//! may block on network I/O; callers that need to cancel an in-flight call
//! (barge-in cancelling TTS) do so by dropping the future.

mod audit;
mod clock;
mod consent;
mod error;
mod llm;
mod model_cache;
mod repository;
mod sms;
mod stt;
mod tts;

pub use audit::{AuditEntry, AuditLog};
pub use clock::{Clock, SystemClock};
pub use consent::{ConsentKind, ConsentStore};
pub use error::{CapabilityError, Result};
pub use llm::{Conversational, GenerateOptions, Role, SingleTurn, SingleTurnAdapter, TokenStream, Turn};
pub use model_cache::ModelCache;
pub use repository::{Entity, Repository};
pub use sms::{SmsGateway, SmsMessage, SmsResult};
pub use stt::{Stt, Transcription};
pub use tts::{SynthesizeOptions, SynthesizedAudio, Tts};

pub mod prelude {
    pub use crate::{
        AuditEntry, AuditLog, CapabilityError, Clock, ConsentKind, ConsentStore, Conversational,
        Entity, GenerateOptions, ModelCache, Repository, Role, SingleTurn, SingleTurnAdapter,
        SmsGateway, SmsMessage, SmsResult, Stt, SynthesizeOptions, SynthesizedAudio, SystemClock,
        Transcription, Tts, Turn,
    };
}
