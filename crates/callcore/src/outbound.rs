//! Drives an outbound call's audio through the same [`ConversationEngine`]
//! inbound calls use, but with replies scripted by an [`OutboundPolicy`]
//! instead of a free-form language model.
//!
//! [`DispatchingLlm`] wraps the real [`Conversational`] capability: when a
//! call is running under an outbound policy, a [`tokio::task_local!`] slot
//! (set for the lifetime of that call's own task, so concurrent outbound
//! calls never see each other's policy) intercepts `generate`/`generate_stream`
//! and answers from the policy instead of the model. This lets the engine's
//! STT, sentence-streaming TTS, and barge-in detection run unmodified for
//! outbound conversations.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use callcore_capabilities::{Conversational, GenerateOptions, Result as CapResult, Role, TokenStream, Turn};
use callcore_dialer::{OutboundCallDriver, OutboundOutcome, OutboundPolicy, QueuedCall};
use callcore_media::{AudioBridge, AudioPayload, CallId};
use futures::stream::{self, StreamExt};
use tokio::sync::{mpsc, Mutex as AsyncMutex};
use tokio::time::timeout;
use tracing::{info, warn};

use crate::audio_router::AudioRouter;
use crate::audio_turn::UtteranceAccumulator;

#[derive(Debug, Clone, Copy, Default)]
struct PolicyStatus {
    should_end_call: bool,
    outcome: Option<OutboundOutcome>,
}

struct PolicyHandle {
    policy: AsyncMutex<OutboundPolicy>,
    status: AsyncMutex<PolicyStatus>,
}

tokio::task_local! {
    static ACTIVE_POLICY: Arc<PolicyHandle>;
}

/// `Conversational` that answers from the calling task's active
/// [`OutboundPolicy`] when one is set, and otherwise forwards to the real
/// model. The same instance is handed to [`callcore_conversation::ConversationEngine`]
/// that inbound calls use.
pub struct DispatchingLlm {
    fallback: Arc<dyn Conversational>,
}

impl DispatchingLlm {
    pub fn new(fallback: Arc<dyn Conversational>) -> Self {
        Self { fallback }
    }

    async fn scripted_reply(handle: &PolicyHandle, history: &[Turn]) -> Option<String> {
        let last_user_text = history.iter().rev().find(|t| t.role == Role::User)?.content.clone();
        let response = handle.policy.lock().await.process_input(&last_user_text);
        *handle.status.lock().await = PolicyStatus { should_end_call: response.should_end_call, outcome: response.outcome };
        Some(response.message)
    }
}

#[async_trait]
impl Conversational for DispatchingLlm {
    async fn generate(&self, history: &[Turn], options: &GenerateOptions) -> CapResult<String> {
        if let Ok(handle) = ACTIVE_POLICY.try_with(Arc::clone) {
            if let Some(reply) = Self::scripted_reply(&handle, history).await {
                return Ok(reply);
            }
        }
        self.fallback.generate(history, options).await
    }

    async fn generate_stream(&self, history: &[Turn], options: &GenerateOptions) -> CapResult<TokenStream> {
        if let Ok(handle) = ACTIVE_POLICY.try_with(Arc::clone) {
            if let Some(reply) = Self::scripted_reply(&handle, history).await {
                return Ok(stream::iter(vec![Ok(reply)]).boxed());
            }
        }
        self.fallback.generate_stream(history, options).await
    }
}

/// Correlates a PBX-originated channel with the next connection the audio
/// bridge accepts. `AudioBridge` only keeps one `on_connection` callback, so
/// this installs the only one and re-dispatches: while an outbound call is
/// waiting on [`Self::next`], the next connection is routed here instead of
/// to the inbound handler. That is a correct correlation only when at most
/// one outbound call is ever in flight, which holds for the dialer's default
/// `max_concurrent_calls = 1`. A deployment that raises that limit needs a
/// real correlation key instead (e.g. a channel uuid exchanged over the
/// media socket's own handshake).
pub struct BridgeConnectionMailbox {
    rx: AsyncMutex<mpsc::UnboundedReceiver<CallId>>,
    expecting: Arc<AtomicBool>,
}

impl BridgeConnectionMailbox {
    pub fn install<F>(bridge: &AudioBridge, on_inbound_connection: F) -> Arc<Self>
    where
        F: Fn(CallId) + Send + Sync + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let expecting = Arc::new(AtomicBool::new(false));
        let expecting_for_callback = expecting.clone();
        bridge.on_connection(move |call_id| {
            if expecting_for_callback.swap(false, Ordering::AcqRel) {
                let _ = tx.send(call_id);
            } else {
                on_inbound_connection(call_id);
            }
        });
        Arc::new(Self { rx: AsyncMutex::new(rx), expecting })
    }

    async fn next(&self, wait: Duration) -> Option<CallId> {
        self.expecting.store(true, Ordering::Release);
        let result = timeout(wait, self.rx.lock().await.recv()).await.ok().flatten();
        self.expecting.store(false, Ordering::Release);
        result
    }
}

/// Drives one outbound call's conversation once the PBX reports it answered:
/// waits for the matching media connection, speaks the policy's opening
/// line, then alternates listening and scripted replies until the policy
/// ends the call or the caller hangs up.
pub struct ConversationOutboundDriver {
    engine: callcore_conversation::ConversationEngine,
    bridge: Arc<AudioBridge>,
    router: Arc<AudioRouter>,
    mailbox: Arc<BridgeConnectionMailbox>,
    barge_in_rms_threshold: f32,
    utterance_silence_ms: u32,
    connect_wait: Duration,
}

impl ConversationOutboundDriver {
    pub fn new(
        engine: callcore_conversation::ConversationEngine,
        bridge: Arc<AudioBridge>,
        router: Arc<AudioRouter>,
        mailbox: Arc<BridgeConnectionMailbox>,
        barge_in_rms_threshold: f32,
        utterance_silence_ms: u32,
    ) -> Self {
        Self { engine, bridge, router, mailbox, barge_in_rms_threshold, utterance_silence_ms, connect_wait: Duration::from_secs(10) }
    }

    async fn speak_sentences(&self, media_id: CallId, sentences: Vec<(String, Vec<u8>)>) {
        for (text, pcm) in sentences {
            if pcm.is_empty() {
                continue;
            }
            let samples = callcore_ws::pcm16le_to_f32(&pcm);
            if !self.bridge.send_audio(media_id, AudioPayload::Samples(samples)).await {
                warn!(call_id = media_id, %text, "failed to write outbound audio frame");
            }
        }
    }
}

#[async_trait]
impl OutboundCallDriver for ConversationOutboundDriver {
    async fn run(&self, call: &QueuedCall, channel_uuid: &str, mut policy: OutboundPolicy) -> OutboundOutcome {
        let Some(media_id) = self.mailbox.next(self.connect_wait).await else {
            warn!(%channel_uuid, "no media connection arrived for answered outbound call");
            return OutboundOutcome::ConversationFailed;
        };

        let opening_line = policy.start();
        let handle = Arc::new(PolicyHandle { policy: AsyncMutex::new(policy), status: AsyncMutex::new(PolicyStatus::default()) });

        ACTIVE_POLICY
            .scope(handle.clone(), self.drive_call(call, media_id, opening_line, handle.clone()))
            .await
    }
}

impl ConversationOutboundDriver {
    async fn drive_call(&self, call: &QueuedCall, media_id: CallId, opening_line: String, handle: Arc<PolicyHandle>) -> OutboundOutcome {
        let (engine_id, greeting_audio) = self.engine.start_conversation_with_greeting(Some(opening_line)).await;
        self.bridge
            .send_audio(media_id, AudioPayload::Samples(callcore_ws::pcm16le_to_f32(&greeting_audio)))
            .await;

        let mut audio_rx = self.router.claim(media_id);
        let mut accumulator = UtteranceAccumulator::new(self.barge_in_rms_threshold, self.utterance_silence_ms, 20);
        let outcome = loop {
            {
                let status = handle.status.lock().await;
                if status.should_end_call {
                    break status.outcome.unwrap_or(OutboundOutcome::ConversationFailed);
                }
            }

            let Some(frame) = audio_rx.recv().await else {
                info!(call_id = engine_id, "media connection closed before outbound policy concluded");
                break OutboundOutcome::PatientHungUp;
            };
            self.engine.report_incoming_audio(engine_id, &frame).await;

            let Some(utterance) = accumulator.push(&frame) else {
                continue;
            };

            let mut sentences = Vec::new();
            match self
                .engine
                .process_audio_streaming(engine_id, &utterance, 16_000, |text, pcm| sentences.push((text, pcm)))
                .await
            {
                Ok(_) => self.speak_sentences(media_id, std::mem::take(&mut sentences)).await,
                Err(err) => {
                    warn!(call_id = engine_id, %err, "outbound turn failed");
                    break OutboundOutcome::ConversationFailed;
                }
            }
        };

        self.router.release(media_id);
        self.engine.end_conversation(engine_id);
        info!(patient_id = %call.patient_id, ?outcome, "outbound conversation concluded");
        outcome
    }
}
