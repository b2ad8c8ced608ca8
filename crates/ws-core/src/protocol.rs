//! Generic WebSocket protocol: JSON control messages plus audio as either
//! raw binary PCM16LE frames or a base64-wrapped JSON envelope.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::error::{Result, WsError};

/// Inbound control/audio message from the client.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Start,
    Stop,
    Status,
    Audio(AudioFrame),
}

/// Outbound message to the client.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Connected { session_id: String, sample_rate: u32, frame_duration_ms: u32 },
    AudioStart,
    AudioEnd,
    Status { session_id: String, audio_started: bool, bytes_received: u64, bytes_sent: u64, frames_received: u64, frames_sent: u64 },
    Transcript { text: String, is_final: bool },
    Response { text: String },
    Audio(AudioFrame),
    Error { error: String },
}

/// JSON-wrapped audio frame: 16-bit PCM, base64-encoded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioFrame {
    pub data: String,
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
    #[serde(default = "default_channels")]
    pub channels: u8,
    #[serde(default = "default_bits_per_sample")]
    pub bits_per_sample: u8,
    #[serde(default)]
    pub timestamp_ms: u64,
}

fn default_sample_rate() -> u32 {
    16_000
}
fn default_channels() -> u8 {
    1
}
fn default_bits_per_sample() -> u8 {
    16
}

impl AudioFrame {
    pub fn from_pcm16(pcm: &[u8], sample_rate: u32, timestamp_ms: u64) -> Self {
        Self {
            data: STANDARD.encode(pcm),
            sample_rate,
            channels: 1,
            bits_per_sample: 16,
            timestamp_ms,
        }
    }

    pub fn decode_pcm16(&self) -> Result<Vec<u8>> {
        STANDARD.decode(&self.data).map_err(|_| WsError::InvalidBase64)
    }
}

/// Converts little-endian PCM16 bytes to normalized `f32` samples.
pub fn pcm16le_to_f32(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(2)
        .map(|c| i16::from_le_bytes([c[0], c[1]]) as f32 / 32768.0)
        .collect()
}

/// Converts normalized `f32` samples to little-endian PCM16 bytes.
pub fn f32_to_pcm16le(samples: &[f32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(samples.len() * 2);
    for &s in samples {
        let clamped = (s * 32767.0).clamp(i16::MIN as f32, i16::MAX as f32) as i16;
        out.extend_from_slice(&clamped.to_le_bytes());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pcm16_round_trips_through_base64_frame() {
        let samples = [0.5f32, -0.5, 0.0, 0.25];
        let bytes = f32_to_pcm16le(&samples);
        let frame = AudioFrame::from_pcm16(&bytes, 16_000, 0);
        let decoded = frame.decode_pcm16().unwrap();
        assert_eq!(decoded, bytes);
        let back = pcm16le_to_f32(&decoded);
        for (a, b) in samples.iter().zip(back.iter()) {
            assert!((a - b).abs() < 1e-3);
        }
    }

    #[test]
    fn parses_start_stop_status_control_messages() {
        let start: ClientMessage = serde_json::from_str(r#"{"type":"start"}"#).unwrap();
        assert!(matches!(start, ClientMessage::Start));
        let stop: ClientMessage = serde_json::from_str(r#"{"type":"stop"}"#).unwrap();
        assert!(matches!(stop, ClientMessage::Stop));
        let status: ClientMessage = serde_json::from_str(r#"{"type":"status"}"#).unwrap();
        assert!(matches!(status, ClientMessage::Status));
    }

    #[test]
    fn parses_json_wrapped_audio_message() {
        let json = r#"{"type":"audio","data":"AAA=","sample_rate":16000,"channels":1,"bits_per_sample":16,"timestamp_ms":10}"#;
        let msg: ClientMessage = serde_json::from_str(json).unwrap();
        match msg {
            ClientMessage::Audio(frame) => assert_eq!(frame.sample_rate, 16_000),
            other => panic!("expected audio message, got {other:?}"),
        }
    }
}
