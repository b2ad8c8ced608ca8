//! Per-call conversation state and the state-machine phases it moves
//! through.

use callcore_capabilities::Turn;
use tokio_util::sync::CancellationToken;

/// `NEW -> GREETING -> LISTENING <-> PROCESSING -> SPEAKING -> LISTENING`,
/// with any state able to fall through to `ENDED`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallPhase {
    New,
    Greeting,
    Listening,
    Processing,
    Speaking,
    Ended,
}

pub type CallId = u64;

/// Running state for one live call. History always starts with exactly one
/// system turn, appended in [`super::engine::ConversationEngine::start_conversation`].
pub struct ConversationState {
    pub id: CallId,
    pub phase: CallPhase,
    pub turns: Vec<Turn>,
    pub detected_dialect: Option<String>,
    pub target_language: Option<String>,
    pub triage_outcome: Option<String>,
    pub terminal: bool,
    /// Cancels in-flight TTS synthesis and drops queued output audio on barge-in.
    pub(crate) speaking_cancel: Option<CancellationToken>,
    /// Consecutive incoming-audio frames whose RMS exceeded the barge-in
    /// threshold while SPEAKING. Reset whenever a frame falls back below it.
    pub(crate) barge_in_streak: u32,
}

impl ConversationState {
    pub fn new(id: CallId, system_prompt: impl Into<String>) -> Self {
        Self {
            id,
            phase: CallPhase::New,
            turns: vec![Turn::system(system_prompt)],
            detected_dialect: None,
            target_language: None,
            triage_outcome: None,
            terminal: false,
            speaking_cancel: None,
            barge_in_streak: 0,
        }
    }
}
