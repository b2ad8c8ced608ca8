//! Per-call state machine sequencing STT -> LLM -> TTS.
//!
//! ```text
//!   NEW -> GREETING -> LISTENING <-> PROCESSING -> SPEAKING -> LISTENING
//!                                                        \-> ENDED
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use callcore_capabilities::{Conversational, GenerateOptions, Stt, Tts, Turn};
use dashmap::DashMap;
use tokio::sync::Mutex as AsyncMutex;
use tokio_util::sync::CancellationToken;
use tracing::{info, info_span, warn, Instrument};

use crate::error::{ConversationError, Result};
use crate::state::{CallId, CallPhase, ConversationState};

#[derive(Debug, Clone)]
pub struct ConversationConfig {
    pub system_prompt: String,
    pub greeting: String,
    pub fallback_apology: String,
    pub farewell: String,
    /// Case-insensitive substrings that, when present in a transcript, end the call.
    pub exit_phrases: Vec<String>,
    pub sentence_terminators: Vec<char>,
    /// RMS energy (samples normalized to [-1.0, 1.0]) above which an
    /// incoming frame counts toward a barge-in.
    pub barge_in_rms_threshold: f32,
    /// Consecutive over-threshold frames required to trigger barge-in.
    pub barge_in_sustained_frames: u32,
    pub default_language: Option<String>,
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            system_prompt: "You are a helpful telephony assistant.".to_string(),
            greeting: "Hello, how can I help you today?".to_string(),
            fallback_apology: "I'm sorry, I'm having trouble right now.".to_string(),
            farewell: "Thank you, goodbye.".to_string(),
            exit_phrases: vec!["goodbye".to_string(), "hang up".to_string()],
            sentence_terminators: vec!['.', '!', '?'],
            barge_in_rms_threshold: 0.1,
            barge_in_sustained_frames: 3,
            default_language: None,
        }
    }
}

/// Result of the non-streaming `process_audio` call.
#[derive(Debug, Clone, Default)]
pub struct ProcessedTurn {
    pub reply_text: String,
    pub reply_audio: Vec<u8>,
}

/// Result of `process_audio_streaming`: the user's transcript and the full
/// assistant reply, assembled from the sentences handed to `on_sentence_ready`.
#[derive(Debug, Clone, Default)]
pub struct StreamingTurn {
    pub user_text: String,
    pub full_reply: String,
}

struct Inner {
    config: ConversationConfig,
    stt: Arc<dyn Stt>,
    llm: Arc<dyn Conversational>,
    tts: Arc<dyn Tts>,
    calls: DashMap<CallId, AsyncMutex<ConversationState>>,
    next_id: AtomicU64,
}

/// Owns every live call's conversation state. Cheaply `Clone`; clones share
/// state, mirroring the audio bridge's `Arc<Inner>` shape.
#[derive(Clone)]
pub struct ConversationEngine {
    inner: Arc<Inner>,
}

fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_sq: f32 = samples.iter().map(|s| s * s).sum();
    (sum_sq / samples.len() as f32).sqrt()
}

fn contains_exit_phrase(transcript: &str, phrases: &[String]) -> bool {
    let lower = transcript.to_lowercase();
    phrases.iter().any(|p| lower.contains(&p.to_lowercase()))
}

impl ConversationEngine {
    pub fn new(config: ConversationConfig, stt: Arc<dyn Stt>, llm: Arc<dyn Conversational>, tts: Arc<dyn Tts>) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                stt,
                llm,
                tts,
                calls: DashMap::new(),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// NEW -> GREETING -> LISTENING: synthesize the configured greeting and
    /// return the call id plus its audio so the caller's writer can emit it.
    pub async fn start_conversation(&self) -> (CallId, Vec<u8>) {
        self.start_conversation_with_greeting(None).await
    }

    /// Same as [`Self::start_conversation`], but speaks `greeting` instead of
    /// the configured one when given. Lets a caller driving a scripted
    /// dialog (e.g. an outbound campaign opener) reuse this engine's STT,
    /// barge-in, and TTS plumbing for its first line too.
    pub async fn start_conversation_with_greeting(&self, greeting: Option<String>) -> (CallId, Vec<u8>) {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let state = ConversationState::new(id, self.inner.config.system_prompt.clone());
        self.inner.calls.insert(id, AsyncMutex::new(state));

        let greeting_text = greeting.unwrap_or_else(|| self.inner.config.greeting.clone());
        let greeting_audio = match self.inner.tts.synthesize(&greeting_text, &Default::default()).await {
            Ok(audio) => audio.pcm,
            Err(err) => {
                warn!(call_id = id, %err, "greeting synthesis failed");
                Vec::new()
            }
        };

        if let Some(entry) = self.inner.calls.get(&id) {
            let mut state = entry.lock().await;
            state.phase = CallPhase::Listening;
            state.turns.push(Turn::assistant(greeting_text));
        }

        info!(call_id = id, "conversation started");
        (id, greeting_audio)
    }

    /// Idempotent: a second call for an already-removed id is a no-op.
    pub fn end_conversation(&self, id: CallId) {
        self.inner.calls.remove(&id);
    }

    pub fn phase(&self, id: CallId) -> Option<CallPhase> {
        self.inner.calls.get(&id).map(|e| futures::executor::block_on(e.lock()).phase)
    }

    /// Called by the audio bridge while SPEAKING to report incoming energy.
    /// Returns `true` if this call triggered a barge-in (caller must stop
    /// writing queued TTS audio immediately).
    pub async fn report_incoming_audio(&self, id: CallId, samples: &[f32]) -> bool {
        let Some(entry) = self.inner.calls.get(&id) else {
            return false;
        };
        let mut state = entry.lock().await;
        if state.phase != CallPhase::Speaking {
            state.barge_in_streak = 0;
            return false;
        }

        if rms(samples) >= self.inner.config.barge_in_rms_threshold {
            state.barge_in_streak += 1;
        } else {
            state.barge_in_streak = 0;
        }

        if state.barge_in_streak >= self.inner.config.barge_in_sustained_frames {
            if let Some(token) = state.speaking_cancel.take() {
                token.cancel();
            }
            state.phase = CallPhase::Listening;
            state.barge_in_streak = 0;
            info!(call_id = id, "barge-in detected, cancelling TTS playback");
            return true;
        }
        false
    }

    /// Non-streaming turn: LISTENING -> PROCESSING -> (SPEAKING) -> LISTENING.
    pub async fn process_audio(&self, id: CallId, samples: &[f32], sample_rate: u32) -> Result<ProcessedTurn> {
        let span = info_span!("conversation_turn", call_id = id);
        async move {
            let entry = self.inner.calls.get(&id).ok_or(ConversationError::UnknownCall(id))?;

            {
                let mut state = entry.lock().await;
                if state.terminal {
                    return Err(ConversationError::AlreadyEnded(id));
                }
                state.phase = CallPhase::Processing;
            }

            let language_hint = entry.lock().await.target_language.clone();
            let transcription = self
                .inner
                .stt
                .transcribe(samples, sample_rate, language_hint.as_deref())
                .await
                .unwrap_or_else(|err| {
                    warn!(call_id = id, %err, "STT failed, continuing to listen");
                    callcore_capabilities::Transcription::empty()
                });

            if transcription.is_empty() {
                entry.lock().await.phase = CallPhase::Listening;
                return Ok(ProcessedTurn::default());
            }

            self.maybe_route_dialect(&entry, &transcription).await;

            if contains_exit_phrase(&transcription.text, &self.inner.config.exit_phrases) {
                let mut state = entry.lock().await;
                state.phase = CallPhase::Ended;
                state.terminal = true;
                drop(state);
                let audio = self.synthesize_or_empty(id, &self.inner.config.farewell.clone()).await;
                return Ok(ProcessedTurn {
                    reply_text: self.inner.config.farewell.clone(),
                    reply_audio: audio,
                });
            }

            let history = {
                let mut state = entry.lock().await;
                state.turns.push(Turn::user(transcription.text.clone()));
                state.phase = CallPhase::Speaking;
                state.turns.clone()
            };

            let reply_text = match self.inner.llm.generate(&history, &GenerateOptions::default()).await {
                Ok(text) => text,
                Err(err) => {
                    warn!(call_id = id, %err, "LLM failed, speaking fallback apology");
                    self.inner.config.fallback_apology.clone()
                }
            };

            entry.lock().await.turns.push(Turn::assistant(reply_text.clone()));
            let reply_audio = self.synthesize_or_empty(id, &reply_text).await;
            entry.lock().await.phase = CallPhase::Listening;

            Ok(ProcessedTurn { reply_text, reply_audio })
        }
        .instrument(span)
        .await
    }

    /// Streaming turn: splits the LLM's output into sentences and invokes
    /// `on_sentence_ready` in production order, one at a time. Barge-in
    /// (observed via [`Self::report_incoming_audio`]) stops remaining
    /// sentences from being synthesized or emitted.
    pub async fn process_audio_streaming<F>(
        &self,
        id: CallId,
        samples: &[f32],
        sample_rate: u32,
        mut on_sentence_ready: F,
    ) -> Result<StreamingTurn>
    where
        F: FnMut(String, Vec<u8>),
    {
        let entry = self.inner.calls.get(&id).ok_or(ConversationError::UnknownCall(id))?;

        {
            let mut state = entry.lock().await;
            if state.terminal {
                return Err(ConversationError::AlreadyEnded(id));
            }
            state.phase = CallPhase::Processing;
        }

        let language_hint = entry.lock().await.target_language.clone();
        let transcription = self
            .inner
            .stt
            .transcribe(samples, sample_rate, language_hint.as_deref())
            .await
            .unwrap_or_else(|err| {
                warn!(call_id = id, %err, "STT failed, continuing to listen");
                callcore_capabilities::Transcription::empty()
            });

        if transcription.is_empty() {
            entry.lock().await.phase = CallPhase::Listening;
            return Ok(StreamingTurn::default());
        }

        self.maybe_route_dialect(&entry, &transcription).await;

        let history = {
            let mut state = entry.lock().await;
            state.turns.push(Turn::user(transcription.text.clone()));
            state.phase = CallPhase::Speaking;
            state.turns.clone()
        };

        let cancel = CancellationToken::new();
        entry.lock().await.speaking_cancel = Some(cancel.clone());

        let mut stream = match self.inner.llm.generate_stream(&history, &GenerateOptions::default()).await {
            Ok(stream) => stream,
            Err(err) => {
                warn!(call_id = id, %err, "streaming LLM failed, speaking fallback apology");
                let apology = self.inner.config.fallback_apology.clone();
                let audio = self.synthesize_or_empty(id, &apology).await;
                on_sentence_ready(apology.clone(), audio);
                entry.lock().await.turns.push(Turn::assistant(apology.clone()));
                entry.lock().await.phase = CallPhase::Listening;
                return Ok(StreamingTurn { user_text: transcription.text, full_reply: apology });
            }
        };

        let mut buffer = String::new();
        let mut full_reply = String::new();
        let terminators = &self.inner.config.sentence_terminators;

        use futures::StreamExt;
        while let Some(chunk) = stream.next().await {
            if cancel.is_cancelled() {
                break;
            }
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(err) => {
                    warn!(call_id = id, %err, "token stream error, stopping early");
                    break;
                }
            };
            buffer.push_str(&chunk);

            while let Some(split_at) = buffer.find(|c: char| terminators.contains(&c)) {
                if cancel.is_cancelled() {
                    break;
                }
                let sentence: String = buffer.drain(..=split_at).collect();
                let sentence = sentence.trim().to_string();
                if sentence.is_empty() {
                    continue;
                }
                full_reply.push_str(&sentence);
                full_reply.push(' ');
                let audio = self.synthesize_or_empty(id, &sentence).await;
                if cancel.is_cancelled() {
                    break;
                }
                on_sentence_ready(sentence, audio);
            }
        }

        if !cancel.is_cancelled() {
            let remainder = buffer.trim().to_string();
            if !remainder.is_empty() {
                full_reply.push_str(&remainder);
                let audio = self.synthesize_or_empty(id, &remainder).await;
                if !cancel.is_cancelled() {
                    on_sentence_ready(remainder, audio);
                }
            }
        }

        let full_reply = full_reply.trim().to_string();
        {
            let mut state = entry.lock().await;
            state.turns.push(Turn::assistant(full_reply.clone()));
            state.phase = CallPhase::Listening;
            state.speaking_cancel = None;
        }

        Ok(StreamingTurn { user_text: transcription.text, full_reply })
    }

    async fn synthesize_or_empty(&self, id: CallId, text: &str) -> Vec<u8> {
        match self.inner.tts.synthesize(text, &Default::default()).await {
            Ok(audio) => audio.pcm,
            Err(err) => {
                warn!(call_id = id, %err, "TTS failed, omitting audio for this turn");
                Vec::new()
            }
        }
    }

    /// Routes the conversation to a detected language the first time the
    /// STT capability reports one. Applied only once, before the next turn,
    /// so detection never re-routes mid-sentence.
    async fn maybe_route_dialect(
        &self,
        entry: &dashmap::mapref::one::Ref<'_, CallId, AsyncMutex<ConversationState>>,
        transcription: &callcore_capabilities::Transcription,
    ) {
        let mut state = entry.lock().await;
        if state.detected_dialect.is_none() {
            if let Some(language) = &transcription.detected_language {
                state.detected_dialect = Some(language.clone());
                state.target_language = Some(language.clone());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use callcore_capabilities::{CapabilityError, SynthesizedAudio, SynthesizeOptions, TokenStream, Transcription};
    use futures::stream;
    use std::sync::atomic::AtomicUsize;

    struct FakeStt(String);

    #[async_trait]
    impl Stt for FakeStt {
        async fn transcribe(&self, _audio: &[f32], _sample_rate: u32, _language_hint: Option<&str>) -> callcore_capabilities::Result<Transcription> {
            Ok(Transcription { text: self.0.clone(), detected_language: None, language_confidence: None })
        }
    }

    struct FakeLlm(String);

    #[async_trait]
    impl Conversational for FakeLlm {
        async fn generate(&self, _history: &[Turn], _options: &GenerateOptions) -> callcore_capabilities::Result<String> {
            Ok(self.0.clone())
        }

        async fn generate_stream(&self, _history: &[Turn], _options: &GenerateOptions) -> callcore_capabilities::Result<TokenStream> {
            Ok(stream::iter(vec![Ok(self.0.clone())]).boxed())
        }
    }

    struct FailingLlm;

    #[async_trait]
    impl Conversational for FailingLlm {
        async fn generate(&self, _history: &[Turn], _options: &GenerateOptions) -> callcore_capabilities::Result<String> {
            Err(CapabilityError::Transient("down".into()))
        }

        async fn generate_stream(&self, _history: &[Turn], _options: &GenerateOptions) -> callcore_capabilities::Result<TokenStream> {
            Err(CapabilityError::Transient("down".into()))
        }
    }

    struct FakeTts;

    #[async_trait]
    impl Tts for FakeTts {
        async fn synthesize(&self, text: &str, _options: &SynthesizeOptions) -> callcore_capabilities::Result<SynthesizedAudio> {
            Ok(SynthesizedAudio { pcm: text.as_bytes().to_vec(), sample_rate_hz: 16000 })
        }
    }

    fn engine_with(stt_text: &str, llm_text: &str) -> ConversationEngine {
        ConversationEngine::new(
            ConversationConfig::default(),
            Arc::new(FakeStt(stt_text.to_string())),
            Arc::new(FakeLlm(llm_text.to_string())),
            Arc::new(FakeTts),
        )
    }

    #[tokio::test]
    async fn start_then_end_conversation_is_idempotent() {
        let engine = engine_with("hi", "hello");
        let (id, _greeting) = engine.start_conversation().await;
        engine.end_conversation(id);
        engine.end_conversation(id); // no panic, no error
        assert!(engine.phase(id).is_none());
    }

    #[tokio::test]
    async fn empty_transcript_produces_no_reply_and_no_user_turn() {
        let engine = engine_with("   ", "should not be called");
        let (id, _) = engine.start_conversation().await;
        let result = engine.process_audio(id, &[0.0; 160], 16000).await.unwrap();
        assert!(result.reply_text.is_empty());
        assert!(result.reply_audio.is_empty());
    }

    #[tokio::test]
    async fn llm_failure_speaks_fallback_apology() {
        let engine = ConversationEngine::new(
            ConversationConfig::default(),
            Arc::new(FakeStt("what's up".to_string())),
            Arc::new(FailingLlm),
            Arc::new(FakeTts),
        );
        let (id, _) = engine.start_conversation().await;
        let result = engine.process_audio(id, &[0.1; 160], 16000).await.unwrap();
        assert_eq!(result.reply_text, ConversationConfig::default().fallback_apology);
    }

    #[tokio::test]
    async fn streaming_splits_into_sentences_in_order() {
        let engine = engine_with("hi", "Hallo. Wie geht es Ihnen?");
        let (id, _) = engine.start_conversation().await;

        let sentences = Arc::new(AsyncMutex::new(Vec::new()));
        let sentences_clone = sentences.clone();
        engine
            .process_audio_streaming(id, &[0.1; 160], 16000, move |text, _audio| {
                sentences_clone.try_lock().unwrap().push(text);
            })
            .await
            .unwrap();

        let sentences = sentences.lock().await;
        assert_eq!(sentences.as_slice(), ["Hallo.", "Wie geht es Ihnen?"]);
    }

    #[tokio::test]
    async fn barge_in_stops_remaining_sentences() {
        let engine = engine_with("hi", "One. Two. Three.");
        let (id, _) = engine.start_conversation().await;

        let emitted = Arc::new(AtomicUsize::new(0));
        let engine_clone = engine.clone();
        let emitted_clone = emitted.clone();

        engine
            .process_audio_streaming(id, &[0.1; 160], 16000, move |_text, _audio| {
                let count = emitted_clone.fetch_add(1, Ordering::SeqCst);
                if count == 0 {
                    // Fire barge-in after the first sentence is emitted.
                    let engine = engine_clone.clone();
                    futures::executor::block_on(engine.report_incoming_audio(id, &[1.0; 160]));
                    futures::executor::block_on(engine.report_incoming_audio(id, &[1.0; 160]));
                    futures::executor::block_on(engine.report_incoming_audio(id, &[1.0; 160]));
                }
            })
            .await
            .unwrap();

        assert_eq!(emitted.load(Ordering::SeqCst), 1, "sentences after barge-in must not be emitted");
    }
}
