//! Core types shared by every codec implementation.

use crate::error::Result;

/// Identifies a telephony/AI audio codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CodecKind {
    /// G.711 mu-law, 8kHz.
    Pcmu,
    /// G.711 A-law, 8kHz.
    Pcma,
    /// G.722 wideband SB-ADPCM, nominally 16kHz.
    G722,
    /// Linear 16-bit PCM passthrough.
    L16,
}

/// Static facts about a codec: sample rate, bit depth, nominal frame size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodecInfo {
    pub kind: CodecKind,
    /// Native sample rate in Hz.
    pub sample_rate: u32,
    /// Bits per sample of the *decoded* PCM.
    pub bits_per_sample: u8,
    /// Nominal frame duration in milliseconds (20ms is standard telephony framing).
    pub frame_duration_ms: u32,
}

impl CodecKind {
    /// Static facts about this codec.
    pub fn info(self) -> CodecInfo {
        match self {
            CodecKind::Pcmu => CodecInfo {
                kind: self,
                sample_rate: 8000,
                bits_per_sample: 16,
                frame_duration_ms: 20,
            },
            CodecKind::Pcma => CodecInfo {
                kind: self,
                sample_rate: 8000,
                bits_per_sample: 16,
                frame_duration_ms: 20,
            },
            CodecKind::G722 => CodecInfo {
                kind: self,
                sample_rate: 16000,
                bits_per_sample: 16,
                frame_duration_ms: 20,
            },
            CodecKind::L16 => CodecInfo {
                kind: self,
                sample_rate: 8000,
                bits_per_sample: 16,
                frame_duration_ms: 20,
            },
        }
    }
}

/// Stateless encode/decode contract every codec in this crate implements.
///
/// Implementations are required to be `Send + Sync`: callers share a single
/// codec instance across connections rather than constructing one per frame.
pub trait AudioCodec: Send + Sync {
    /// Encode linear PCM samples into the codec's wire format.
    fn encode(&self, pcm: &[i16]) -> Result<Vec<u8>>;

    /// Decode wire-format bytes back into linear PCM samples.
    fn decode(&self, data: &[u8]) -> Result<Vec<i16>>;

    /// Static facts about this codec (sample rate, frame size, ...).
    fn info(&self) -> CodecInfo;
}
