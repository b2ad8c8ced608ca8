//! PBX-provider Media-Streams protocol variant: JSON events carrying
//! base64 mu-law audio at 8kHz, the shape used by Twilio-style
//! `<Stream>` media streams. Audio transits `callcore_media::CodecPipeline`
//! in both directions so it rejoins the same telephony codec path C5 uses.

use std::net::SocketAddr;
use std::sync::Arc;

use callcore_codec::CodecKind;
use callcore_media::CodecPipeline;
use dashmap::DashMap;
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex as AsyncMutex;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::WebSocketStream;
use tracing::{debug, error, warn};

use crate::error::{Result, WsError};

type WsSink = SplitSink<WebSocketStream<TcpStream>, WsMessage>;

/// Inbound Media-Streams event, tagged by `event`.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum MediaStreamEvent {
    Connected,
    Start { #[serde(rename = "streamSid")] stream_sid: String, start: StreamStart },
    Media { #[serde(rename = "streamSid")] stream_sid: String, media: MediaPayload },
    Mark { #[serde(rename = "streamSid")] stream_sid: String },
    Stop { #[serde(rename = "streamSid")] stream_sid: Option<String> },
}

#[derive(Debug, Clone, Deserialize)]
pub struct StreamStart {
    #[serde(rename = "callSid")]
    pub call_sid: Option<String>,
    #[serde(rename = "accountSid")]
    pub account_sid: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MediaPayload {
    pub payload: String,
}

/// Outbound Media-Streams `media` event.
#[derive(Debug, Clone, Serialize)]
pub struct OutboundMedia {
    pub event: &'static str,
    #[serde(rename = "streamSid")]
    pub stream_sid: String,
    pub media: OutboundMediaPayload,
}

#[derive(Debug, Clone, Serialize)]
pub struct OutboundMediaPayload {
    pub payload: String,
}

pub type StreamSid = String;

type AudioCallback = Arc<dyn Fn(StreamSid, Vec<f32>) + Send + Sync>;

#[derive(Default)]
struct Callbacks {
    on_audio: Option<AudioCallback>,
}

#[derive(Default)]
struct Inner {
    streams: DashMap<StreamSid, Arc<AsyncMutex<WsSink>>>,
    callbacks: std::sync::RwLock<Callbacks>,
}

/// Accepts Media-Streams WebSocket connections, one per call leg (the
/// provider opens a fresh socket per stream). Outbound audio is addressed
/// by `streamSid`, mirroring how `AudioBridge::send_audio` addresses a
/// `CallId`.
#[derive(Clone, Default)]
pub struct MediaStreamsAdapter {
    inner: Arc<Inner>,
}

impl MediaStreamsAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_audio<F: Fn(StreamSid, Vec<f32>) + Send + Sync + 'static>(&self, f: F) {
        self.inner.callbacks.write().expect("callbacks lock poisoned").on_audio = Some(Arc::new(f));
    }

    pub async fn listen(&self, bind_addr: SocketAddr) -> Result<SocketAddr> {
        let listener = TcpListener::bind(bind_addr).await?;
        let local_addr = listener.local_addr()?;

        let adapter = self.clone();
        tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((stream, peer)) => {
                        let adapter = adapter.clone();
                        tokio::spawn(async move {
                            if let Err(err) = adapter.handle_connection(stream).await {
                                warn!(%peer, %err, "media-streams connection failed");
                            }
                        });
                    }
                    Err(err) => error!(%err, "media-streams accept failed"),
                }
            }
        });

        Ok(local_addr)
    }

    async fn handle_connection(&self, stream: TcpStream) -> Result<()> {
        let ws_stream = tokio_tungstenite::accept_async(stream).await?;
        let (sink, mut incoming) = ws_stream.split();
        let sink = Arc::new(AsyncMutex::new(sink));
        let pipeline = CodecPipeline::new(CodecKind::Pcmu);
        let mut current_sid: Option<StreamSid> = None;

        while let Some(msg) = incoming.next().await {
            let msg = match msg {
                Ok(m) => m,
                Err(err) => {
                    warn!(%err, "media-streams read error");
                    break;
                }
            };
            let WsMessage::Text(text) = msg else {
                if matches!(msg, WsMessage::Close(_)) {
                    break;
                }
                continue;
            };

            let Ok(event) = serde_json::from_str::<MediaStreamEvent>(&text) else {
                warn!("unparsable media-streams event");
                continue;
            };

            match event {
                MediaStreamEvent::Connected => debug!("media-streams connected"),
                MediaStreamEvent::Start { stream_sid, start } => {
                    debug!(stream_sid, call_sid = ?start.call_sid, "media-streams started");
                    self.inner.streams.insert(stream_sid.clone(), sink.clone());
                    current_sid = Some(stream_sid);
                }
                MediaStreamEvent::Media { stream_sid, media } => {
                    current_sid.get_or_insert_with(|| stream_sid.clone());
                    if let Err(err) = self.handle_media(&pipeline, stream_sid, media) {
                        warn!(%err, "media-streams codec error, dropping frame");
                    }
                }
                MediaStreamEvent::Mark { .. } => {}
                MediaStreamEvent::Stop { stream_sid } => {
                    let sid = stream_sid.or_else(|| current_sid.clone());
                    if let Some(sid) = sid {
                        self.inner.streams.remove(&sid);
                    }
                    break;
                }
            }
        }

        if let Some(sid) = current_sid {
            self.inner.streams.remove(&sid);
        }
        Ok(())
    }

    fn handle_media(&self, pipeline: &CodecPipeline, stream_sid: StreamSid, media: MediaPayload) -> Result<()> {
        use base64::engine::general_purpose::STANDARD;
        use base64::Engine;

        let raw = STANDARD.decode(media.payload).map_err(|_| WsError::InvalidBase64)?;
        let samples = pipeline.decode_for_ai(&raw)?;

        if let Some(cb) = self.inner.callbacks.read().expect("callbacks lock poisoned").on_audio.clone() {
            cb(stream_sid, samples);
        }
        Ok(())
    }

    /// Encode 16kHz float32 samples back to mu-law and send as a `media`
    /// event addressed to `stream_sid`. Returns `false` if the stream is
    /// unknown or the encode/write fails.
    pub async fn send_audio(&self, stream_sid: &str, samples: &[f32]) -> bool {
        let Some(sink) = self.inner.streams.get(stream_sid).map(|s| s.clone()) else {
            return false;
        };

        let pipeline = CodecPipeline::new(CodecKind::Pcmu);
        let mulaw = match pipeline.encode_for_telephony(samples) {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!(%err, "media-streams encode failed");
                return false;
            }
        };

        use base64::engine::general_purpose::STANDARD;
        use base64::Engine;
        let payload = STANDARD.encode(mulaw);

        let event = OutboundMedia {
            event: "media",
            stream_sid: stream_sid.to_string(),
            media: OutboundMediaPayload { payload },
        };
        let Ok(text) = serde_json::to_string(&event) else {
            return false;
        };

        let mut writer = sink.lock().await;
        writer.send(WsMessage::Text(text)).await.is_ok()
    }

    pub fn active_streams(&self) -> usize {
        self.inner.streams.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::{SinkExt as _, StreamExt as _};

    #[tokio::test]
    async fn delivers_decoded_audio_from_media_events() {
        let adapter = MediaStreamsAdapter::new();
        let received = Arc::new(std::sync::Mutex::new(Vec::new()));
        let received_clone = received.clone();
        adapter.on_audio(move |sid, samples| {
            received_clone.lock().unwrap().push((sid, samples.len()));
        });

        let addr = adapter.listen("127.0.0.1:0".parse().unwrap()).await.unwrap();
        let (mut ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}")).await.unwrap();

        ws.send(WsMessage::Text(r#"{"event":"connected"}"#.to_string())).await.unwrap();
        ws.send(WsMessage::Text(
            r#"{"event":"start","streamSid":"MZ123","start":{"callSid":"CA1","accountSid":"AC1"}}"#.to_string(),
        ))
        .await
        .unwrap();

        use base64::engine::general_purpose::STANDARD;
        use base64::Engine;
        let payload = STANDARD.encode(vec![0xFFu8; 160]);
        let media_event = format!(r#"{{"event":"media","streamSid":"MZ123","media":{{"payload":"{payload}"}}}}"#);
        ws.send(WsMessage::Text(media_event)).await.unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        let got = received.lock().unwrap();
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].0, "MZ123");
        assert!(got[0].1 > 0);
    }
}
