//! Generic WebSocket audio adapter: the browser/demo variant of the audio
//! bridge. Accepts many concurrent WebSocket sessions, each carrying raw
//! 16-bit PCM at 16kHz mono (binary frames preferred, JSON+base64
//! accepted), with JSON control messages for start/stop/status.
//!
//! Mirrors `callcore_media::AudioBridge`'s `Arc<Inner>` + `DashMap`
//! connection-table shape, generalized to a WebSocket transport.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use futures::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex as AsyncMutex;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::WebSocketStream;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::Result;
use crate::protocol::{f32_to_pcm16le, pcm16le_to_f32, AudioFrame, ClientMessage, ServerMessage};

pub type SessionId = Uuid;

/// Connection refused with WebSocket close code 1013 ("try again later")
/// once this many sessions are already active.
const CONNECTION_LIMIT_CLOSE_CODE: u16 = 1013;

#[derive(Debug, Clone)]
pub struct WsAdapterConfig {
    pub bind_addr: SocketAddr,
    pub sample_rate: u32,
    pub frame_duration_ms: u32,
    pub max_connections: usize,
}

impl Default for WsAdapterConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:0".parse().expect("valid default socket addr"),
            sample_rate: 16_000,
            frame_duration_ms: 20,
            max_connections: 10,
        }
    }
}

struct Session {
    writer: AsyncMutex<futures::stream::SplitSink<WebSocketStream<TcpStream>, WsMessage>>,
    audio_started: std::sync::atomic::AtomicBool,
    bytes_received: AtomicU64,
    bytes_sent: AtomicU64,
    frames_received: AtomicU64,
    frames_sent: AtomicU64,
}

type AudioCallback = Arc<dyn Fn(SessionId, Vec<f32>) + Send + Sync>;
type SessionCallback = Arc<dyn Fn(SessionId) + Send + Sync>;

#[derive(Default)]
struct Callbacks {
    on_connection: Option<SessionCallback>,
    on_audio_received: Option<AudioCallback>,
    on_disconnection: Option<SessionCallback>,
}

struct Inner {
    config: WsAdapterConfig,
    sessions: DashMap<SessionId, Arc<Session>>,
    callbacks: std::sync::RwLock<Callbacks>,
}

/// Accepts browser/generic WebSocket audio connections, one task per
/// session. Cheaply `Clone`; clones share state.
#[derive(Clone)]
pub struct WsAudioAdapter {
    inner: Arc<Inner>,
}

impl WsAudioAdapter {
    pub fn new(config: WsAdapterConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                sessions: DashMap::new(),
                callbacks: std::sync::RwLock::new(Callbacks::default()),
            }),
        }
    }

    pub fn on_connection<F: Fn(SessionId) + Send + Sync + 'static>(&self, f: F) {
        self.inner.callbacks.write().expect("callbacks lock poisoned").on_connection = Some(Arc::new(f));
    }

    pub fn on_audio_received<F: Fn(SessionId, Vec<f32>) + Send + Sync + 'static>(&self, f: F) {
        self.inner.callbacks.write().expect("callbacks lock poisoned").on_audio_received = Some(Arc::new(f));
    }

    pub fn on_disconnection<F: Fn(SessionId) + Send + Sync + 'static>(&self, f: F) {
        self.inner.callbacks.write().expect("callbacks lock poisoned").on_disconnection = Some(Arc::new(f));
    }

    pub async fn start(&self) -> Result<SocketAddr> {
        let listener = TcpListener::bind(self.inner.config.bind_addr).await?;
        let local_addr = listener.local_addr()?;
        info!(%local_addr, "websocket audio adapter listening");

        let adapter = self.clone();
        tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((stream, peer)) => {
                        let adapter = adapter.clone();
                        tokio::spawn(async move {
                            if let Err(err) = adapter.accept_connection(stream, peer).await {
                                warn!(%peer, %err, "websocket handshake failed");
                            }
                        });
                    }
                    Err(err) => error!(%err, "websocket adapter accept failed"),
                }
            }
        });

        Ok(local_addr)
    }

    async fn accept_connection(&self, stream: TcpStream, peer: SocketAddr) -> Result<()> {
        let ws_stream = tokio_tungstenite::accept_async(stream).await?;

        if self.inner.sessions.len() >= self.inner.config.max_connections {
            let (mut sink, _) = ws_stream.split();
            let _ = sink
                .send(WsMessage::Close(Some(tokio_tungstenite::tungstenite::protocol::CloseFrame {
                    code: tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode::from(CONNECTION_LIMIT_CLOSE_CODE),
                    reason: "max connections reached".into(),
                })))
                .await;
            debug!(%peer, "websocket connection rejected: at capacity");
            return Ok(());
        }

        let session_id = Uuid::new_v4();
        let (sink, mut stream) = ws_stream.split();
        let session = Arc::new(Session {
            writer: AsyncMutex::new(sink),
            audio_started: std::sync::atomic::AtomicBool::new(false),
            bytes_received: AtomicU64::new(0),
            bytes_sent: AtomicU64::new(0),
            frames_received: AtomicU64::new(0),
            frames_sent: AtomicU64::new(0),
        });
        self.inner.sessions.insert(session_id, session.clone());
        debug!(%session_id, %peer, "websocket session connected");

        self.send_json(
            &session,
            &ServerMessage::Connected {
                session_id: session_id.to_string(),
                sample_rate: self.inner.config.sample_rate,
                frame_duration_ms: self.inner.config.frame_duration_ms,
            },
        )
        .await;

        if let Some(cb) = self.inner.callbacks.read().expect("callbacks lock poisoned").on_connection.clone() {
            cb(session_id);
        }

        while let Some(msg) = stream.next().await {
            match msg {
                Ok(WsMessage::Binary(bytes)) => self.handle_binary(session_id, &session, &bytes).await,
                Ok(WsMessage::Text(text)) => self.handle_text(session_id, &session, &text).await,
                Ok(WsMessage::Close(_)) => break,
                Ok(_) => {}
                Err(err) => {
                    warn!(%session_id, %err, "websocket read error");
                    break;
                }
            }
        }

        self.inner.sessions.remove(&session_id);
        if let Some(cb) = self.inner.callbacks.read().expect("callbacks lock poisoned").on_disconnection.clone() {
            cb(session_id);
        }
        debug!(%session_id, "websocket session disconnected");
        Ok(())
    }

    async fn handle_binary(&self, session_id: SessionId, session: &Arc<Session>, bytes: &[u8]) {
        session.audio_started.store(true, Ordering::Relaxed);
        session.bytes_received.fetch_add(bytes.len() as u64, Ordering::Relaxed);
        session.frames_received.fetch_add(1, Ordering::Relaxed);

        let samples = pcm16le_to_f32(bytes);
        if let Some(cb) = self.inner.callbacks.read().expect("callbacks lock poisoned").on_audio_received.clone() {
            cb(session_id, samples);
        }
    }

    async fn handle_text(&self, session_id: SessionId, session: &Arc<Session>, text: &str) {
        let parsed: std::result::Result<ClientMessage, _> = serde_json::from_str(text);
        match parsed {
            Ok(ClientMessage::Start) => {
                session.audio_started.store(true, Ordering::Relaxed);
                self.send_json(session, &ServerMessage::AudioStart).await;
            }
            Ok(ClientMessage::Stop) => {
                session.audio_started.store(false, Ordering::Relaxed);
                self.send_json(session, &ServerMessage::AudioEnd).await;
            }
            Ok(ClientMessage::Status) => {
                self.send_json(
                    session,
                    &ServerMessage::Status {
                        session_id: session_id.to_string(),
                        audio_started: session.audio_started.load(Ordering::Relaxed),
                        bytes_received: session.bytes_received.load(Ordering::Relaxed),
                        bytes_sent: session.bytes_sent.load(Ordering::Relaxed),
                        frames_received: session.frames_received.load(Ordering::Relaxed),
                        frames_sent: session.frames_sent.load(Ordering::Relaxed),
                    },
                )
                .await;
            }
            Ok(ClientMessage::Audio(frame)) => match frame.decode_pcm16() {
                Ok(pcm) => self.handle_binary(session_id, session, &pcm).await,
                Err(err) => {
                    self.send_json(session, &ServerMessage::Error { error: err.to_string() }).await;
                }
            },
            Err(err) => {
                warn!(%session_id, %err, "invalid websocket control message");
                self.send_json(session, &ServerMessage::Error { error: "invalid JSON".to_string() }).await;
            }
        }
    }

    async fn send_json(&self, session: &Arc<Session>, message: &ServerMessage) {
        let text = match serde_json::to_string(message) {
            Ok(t) => t,
            Err(err) => {
                warn!(%err, "failed to serialize outbound websocket message");
                return;
            }
        };
        let mut writer = session.writer.lock().await;
        if writer.send(WsMessage::Text(text)).await.is_err() {
            warn!("websocket send failed");
        }
    }

    /// Send audio to a session, either as a binary PCM16 frame or, when
    /// `as_binary` is false, wrapped in a JSON envelope.
    pub async fn send_audio(&self, session_id: SessionId, samples: &[f32], as_binary: bool) -> bool {
        let Some(session) = self.inner.sessions.get(&session_id).map(|s| s.clone()) else {
            return false;
        };

        let bytes = f32_to_pcm16le(samples);
        let mut writer = session.writer.lock().await;
        let sent = if as_binary {
            writer.send(WsMessage::Binary(bytes.clone())).await.is_ok()
        } else {
            let frame = AudioFrame::from_pcm16(&bytes, self.inner.config.sample_rate, 0);
            match serde_json::to_string(&ServerMessage::Audio(frame)) {
                Ok(text) => writer.send(WsMessage::Text(text)).await.is_ok(),
                Err(_) => false,
            }
        };
        drop(writer);

        if sent {
            session.bytes_sent.fetch_add(bytes.len() as u64, Ordering::Relaxed);
            session.frames_sent.fetch_add(1, Ordering::Relaxed);
        }
        sent
    }

    pub async fn send_transcript(&self, session_id: SessionId, text: &str, is_final: bool) -> bool {
        let Some(session) = self.inner.sessions.get(&session_id).map(|s| s.clone()) else {
            return false;
        };
        self.send_json(&session, &ServerMessage::Transcript { text: text.to_string(), is_final }).await;
        true
    }

    pub async fn send_response(&self, session_id: SessionId, text: &str) -> bool {
        let Some(session) = self.inner.sessions.get(&session_id).map(|s| s.clone()) else {
            return false;
        };
        self.send_json(&session, &ServerMessage::Response { text: text.to_string() }).await;
        true
    }

    pub fn active_sessions(&self) -> usize {
        self.inner.sessions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::{SinkExt as _, StreamExt as _};
    use std::sync::atomic::AtomicUsize;

    #[tokio::test]
    async fn accepts_connection_and_delivers_binary_audio() {
        let config = WsAdapterConfig { bind_addr: "127.0.0.1:0".parse().unwrap(), ..Default::default() };
        let adapter = WsAudioAdapter::new(config);

        let received = Arc::new(AtomicUsize::new(0));
        let received_clone = received.clone();
        adapter.on_audio_received(move |_id, samples| {
            if !samples.is_empty() {
                received_clone.fetch_add(1, Ordering::SeqCst);
            }
        });

        let addr = adapter.start().await.unwrap();
        let (mut ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}")).await.unwrap();

        // First message is the "connected" envelope.
        let _ = ws.next().await;

        ws.send(WsMessage::Binary(vec![0u8; 320])).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;

        assert_eq!(received.load(Ordering::SeqCst), 1);
        assert_eq!(adapter.active_sessions(), 1);
    }

    #[tokio::test]
    async fn rejects_connections_past_the_configured_limit() {
        let config = WsAdapterConfig { bind_addr: "127.0.0.1:0".parse().unwrap(), max_connections: 1, ..Default::default() };
        let adapter = WsAudioAdapter::new(config);
        let addr = adapter.start().await.unwrap();

        let (_ws1, _) = tokio_tungstenite::connect_async(format!("ws://{addr}")).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        let (mut ws2, _) = tokio_tungstenite::connect_async(format!("ws://{addr}")).await.unwrap();
        let close_msg = ws2.next().await;
        assert!(matches!(close_msg, Some(Ok(WsMessage::Close(_))) | None));
    }
}
