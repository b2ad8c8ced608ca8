//! Reference capability implementations. Real deployments inject real STT,
//! LLM, TTS, SMS, consent, and audit providers; these exist so the
//! composition root runs end-to-end without any external dependency,
//! exercising the full call path with audibly fake but well-formed output.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use callcore_capabilities::{
    AuditEntry, AuditLog, Conversational, ConsentKind, ConsentStore, GenerateOptions,
    Result as CapResult, SmsGateway, SmsMessage, SmsResult, Stt, SynthesizeOptions,
    SynthesizedAudio, Transcription, Tts, Turn,
};
use futures::stream::{self, StreamExt};
use tracing::info;

/// Treats any frame with measurable energy as one fixed utterance. A real
/// provider would return an actual transcript; this returns a placeholder
/// so the conversation state machine has something to route on.
pub struct PlaceholderStt;

fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_sq: f32 = samples.iter().map(|s| s * s).sum();
    (sum_sq / samples.len() as f32).sqrt()
}

#[async_trait]
impl Stt for PlaceholderStt {
    async fn transcribe(&self, audio: &[f32], _sample_rate: u32, _language_hint: Option<&str>) -> CapResult<Transcription> {
        if rms(audio) < 0.01 {
            return Ok(Transcription::empty());
        }
        Ok(Transcription { text: "[caller audio]".to_string(), detected_language: None, language_confidence: None })
    }
}

/// Cycles a handful of canned replies. Stands in for a real chat model.
pub struct PlaceholderLlm {
    replies: Vec<String>,
    next: AtomicUsize,
}

impl Default for PlaceholderLlm {
    fn default() -> Self {
        Self {
            replies: vec![
                "I understand. Could you tell me more?".to_string(),
                "Thank you for sharing that. Is there anything else?".to_string(),
                "Got it. Let me see what I can do.".to_string(),
            ],
            next: AtomicUsize::new(0),
        }
    }
}

impl PlaceholderLlm {
    fn next_reply(&self) -> String {
        let idx = self.next.fetch_add(1, Ordering::Relaxed) % self.replies.len();
        self.replies[idx].clone()
    }
}

#[async_trait]
impl Conversational for PlaceholderLlm {
    async fn generate(&self, _history: &[Turn], _options: &GenerateOptions) -> CapResult<String> {
        Ok(self.next_reply())
    }

    async fn generate_stream(&self, _history: &[Turn], _options: &GenerateOptions) -> CapResult<callcore_capabilities::TokenStream> {
        let reply = self.next_reply();
        let words: Vec<CapResult<String>> = reply.split(' ').map(|w| Ok(format!("{w} "))).collect();
        Ok(stream::iter(words).boxed())
    }
}

/// Synthesizes silence sized to roughly match spoken duration at a fixed
/// rate, so downstream codec/bridge plumbing has real bytes to push
/// without depending on an external voice.
pub struct PlaceholderTts {
    pub sample_rate_hz: u32,
}

impl Default for PlaceholderTts {
    fn default() -> Self {
        Self { sample_rate_hz: 16_000 }
    }
}

#[async_trait]
impl Tts for PlaceholderTts {
    async fn synthesize(&self, text: &str, options: &SynthesizeOptions) -> CapResult<SynthesizedAudio> {
        if text.trim().is_empty() {
            return Ok(SynthesizedAudio { pcm: Vec::new(), sample_rate_hz: self.sample_rate_hz });
        }
        let rate = options.sample_rate_hz.unwrap_or(self.sample_rate_hz);
        // ~70ms of audio per character, capped, as a stand-in for real
        // synthesis timing.
        let millis = (text.chars().count() as u64 * 70).min(8_000);
        let sample_count = (rate as u64 * millis / 1000) as usize;
        let mut pcm = Vec::with_capacity(sample_count * 2);
        for i in 0..sample_count {
            let t = i as f32 / rate as f32;
            let sample = (t * 220.0 * std::f32::consts::TAU).sin() * 0.2;
            let clamped = (sample * 32767.0) as i16;
            pcm.extend_from_slice(&clamped.to_le_bytes());
        }
        Ok(SynthesizedAudio { pcm, sample_rate_hz: rate })
    }
}

/// Grants every request. A real deployment checks a compliance-managed
/// consent ledger instead.
pub struct AllowAllConsent;

#[async_trait]
impl ConsentStore for AllowAllConsent {
    async fn has_consent(&self, _subject_id: &str, _kind: &ConsentKind) -> CapResult<bool> {
        Ok(true)
    }
}

/// Writes audit entries to the tracing log. A real deployment persists
/// them to a compliance-grade, append-only store.
pub struct TracingAuditLog;

#[async_trait]
impl AuditLog for TracingAuditLog {
    async fn record(&self, entry: AuditEntry) {
        info!(
            actor_id = %entry.actor_id,
            action = %entry.action,
            resource_type = %entry.resource_type,
            resource_id = %entry.resource_id,
            details = ?entry.details,
            "audit entry"
        );
    }
}

/// Logs the message instead of sending it. A real deployment wires an
/// actual SMS provider here.
pub struct LoggingSmsGateway;

#[async_trait]
impl SmsGateway for LoggingSmsGateway {
    async fn send(&self, message: SmsMessage) -> CapResult<SmsResult> {
        info!(to = %message.to, body = %message.body, "SMS (not actually sent, no gateway configured)");
        Ok(SmsResult { success: true, message_id: Some(format!("log-{}", message.reference.unwrap_or_default())), error: None })
    }
}
