//! Top-level application configuration: one struct per wired component,
//! loaded from `callcore.toml` plus `CALLCORE_*` environment overrides via
//! [`callcore_infra::FileConfigProvider`].

use std::net::SocketAddr;
use std::time::Duration;

use callcore_codec::CodecKind;
use serde::Deserialize;

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    pub level: String,
    pub json: bool,
    pub spans: bool,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self { level: "info".to_string(), json: false, spans: false }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MediaSection {
    pub bind_addr: SocketAddr,
    pub codec: String,
    pub frame_bytes: usize,
    pub buffer_chunks: usize,
    pub read_timeout_secs: u64,
}

impl Default for MediaSection {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:9000".parse().expect("valid default socket addr"),
            codec: "pcmu".to_string(),
            frame_bytes: 160,
            buffer_chunks: 1,
            read_timeout_secs: 30,
        }
    }
}

impl MediaSection {
    pub fn codec_kind(&self) -> CodecKind {
        match self.codec.to_lowercase().as_str() {
            "pcma" => CodecKind::Pcma,
            "g722" => CodecKind::G722,
            "l16" => CodecKind::L16,
            _ => CodecKind::Pcmu,
        }
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ConversationSection {
    pub system_prompt: String,
    pub greeting: String,
    pub fallback_apology: String,
    pub farewell: String,
    pub exit_phrases: Vec<String>,
    pub barge_in_rms_threshold: f32,
    pub barge_in_sustained_frames: u32,
}

impl Default for ConversationSection {
    fn default() -> Self {
        let defaults = callcore_conversation::ConversationConfig::default();
        Self {
            system_prompt: defaults.system_prompt,
            greeting: defaults.greeting,
            fallback_apology: defaults.fallback_apology,
            farewell: defaults.farewell,
            exit_phrases: defaults.exit_phrases,
            barge_in_rms_threshold: defaults.barge_in_rms_threshold,
            barge_in_sustained_frames: defaults.barge_in_sustained_frames,
        }
    }
}

impl ConversationSection {
    pub fn into_engine_config(self) -> callcore_conversation::ConversationConfig {
        callcore_conversation::ConversationConfig {
            system_prompt: self.system_prompt,
            greeting: self.greeting,
            fallback_apology: self.fallback_apology,
            farewell: self.farewell,
            exit_phrases: self.exit_phrases,
            sentence_terminators: vec!['.', '!', '?'],
            barge_in_rms_threshold: self.barge_in_rms_threshold,
            barge_in_sustained_frames: self.barge_in_sustained_frames,
            default_language: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WsSection {
    pub enabled: bool,
    pub bind_addr: SocketAddr,
    pub max_connections: usize,
}

impl Default for WsSection {
    fn default() -> Self {
        Self { enabled: false, bind_addr: "0.0.0.0:9001".parse().expect("valid default socket addr"), max_connections: 10 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MediaStreamsSection {
    pub enabled: bool,
    pub bind_addr: SocketAddr,
}

impl Default for MediaStreamsSection {
    fn default() -> Self {
        Self { enabled: false, bind_addr: "0.0.0.0:9002".parse().expect("valid default socket addr") }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PbxSection {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
    pub password: String,
    #[serde(default = "default_true")]
    pub reconnect: bool,
}

impl Default for PbxSection {
    fn default() -> Self {
        Self { enabled: false, host: "127.0.0.1".to_string(), port: 8021, password: String::new(), reconnect: true }
    }
}

impl PbxSection {
    pub fn into_pbx_config(self) -> callcore_pbx::PbxConfig {
        callcore_pbx::PbxConfig {
            host: self.host,
            port: self.port,
            password: self.password,
            reconnect: self.reconnect,
            reconnect_delay: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DialerSection {
    pub enabled: bool,
    pub max_concurrent_calls: usize,
    pub caller_id: String,
    pub gateway: String,
    pub weekdays_only: bool,
    pub max_attempts: u32,
    pub sms_after_failed_attempts: u32,
}

impl Default for DialerSection {
    fn default() -> Self {
        let defaults = callcore_dialer::DialerConfig::default();
        Self {
            enabled: false,
            max_concurrent_calls: defaults.max_concurrent_calls,
            caller_id: defaults.caller_id,
            gateway: defaults.gateway,
            weekdays_only: defaults.weekdays_only,
            max_attempts: defaults.max_attempts,
            sms_after_failed_attempts: defaults.sms_after_failed_attempts,
        }
    }
}

impl DialerSection {
    pub fn into_dialer_config(self) -> callcore_dialer::DialerConfig {
        callcore_dialer::DialerConfig {
            max_concurrent_calls: self.max_concurrent_calls,
            caller_id: self.caller_id,
            gateway: self.gateway,
            weekdays_only: self.weekdays_only,
            max_attempts: self.max_attempts,
            sms_after_failed_attempts: self.sms_after_failed_attempts,
            ..callcore_dialer::DialerConfig::default()
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub practice_name: String,
    pub logging: LoggingSection,
    pub media: MediaSection,
    pub conversation: ConversationSection,
    pub ws: WsSection,
    pub media_streams: MediaStreamsSection,
    pub pbx: PbxSection,
    pub dialer: DialerSection,
}
