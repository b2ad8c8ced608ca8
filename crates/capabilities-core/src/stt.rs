//! Speech-to-text capability.

use async_trait::async_trait;

use crate::error::Result;

/// Result of a transcription attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct Transcription {
    pub text: String,
    pub detected_language: Option<String>,
    pub language_confidence: Option<f32>,
}

impl Transcription {
    pub fn empty() -> Self {
        Self {
            text: String::new(),
            detected_language: None,
            language_confidence: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// Speech-to-text. Implementations must tolerate short (<=100ms) and silent
/// inputs by returning an empty transcription rather than erroring.
#[async_trait]
pub trait Stt: Send + Sync {
    async fn transcribe(
        &self,
        audio: &[f32],
        sample_rate: u32,
        language_hint: Option<&str>,
    ) -> Result<Transcription>;
}
