//! Text-to-speech capability.

use async_trait::async_trait;

use crate::error::Result;

#[derive(Debug, Clone, Default)]
pub struct SynthesizeOptions {
    pub voice: Option<String>,
    pub sample_rate_hz: Option<u32>,
}

/// Text-to-speech. `synthesize` returns 16-bit linear PCM at the rate
/// declared in the returned [`SynthesizedAudio`]. Cancellable: long
/// syntheses should poll for cancellation so barge-in can stop them
/// promptly.
#[async_trait]
pub trait Tts: Send + Sync {
    async fn synthesize(&self, text: &str, options: &SynthesizeOptions) -> Result<SynthesizedAudio>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesizedAudio {
    pub pcm: Vec<u8>,
    pub sample_rate_hz: u32,
}
