//! Concurrent audio bridge: accepts many telephony-side audio connections
//! and marshals audio between telephony and AI in both directions.
//!
//! Mirrors the `Arc<Inner>` + `AtomicBool` closed-flag + per-connection
//! spawned task shape used for UDP transports elsewhere in this workspace,
//! generalized to TCP audio streams and many concurrent calls instead of one
//! shared socket.
//!
//! This bridge speaks raw fixed-size telephony frames directly, not RTP —
//! it has no sequence numbers to reorder. `callcore-rtp`'s `JitterBuffer`/
//! `RtpSession` (C3) is a separate, complete library for the RTP/UDP case;
//! composing it in front of an RTP-carrying transport is left to whatever
//! binds that transport, not this bridge.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::BytesMut;
use callcore_codec::CodecKind;
use dashmap::DashMap;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex as AsyncMutex;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::error::{MediaError, Result};
use crate::pipeline::CodecPipeline;

pub type CallId = u64;

/// Audio payload accepted by [`AudioBridge::send_audio`]: already-encoded
/// telephony bytes, or normalized float32 PCM to be encoded first.
pub enum AudioPayload {
    Encoded(Vec<u8>),
    Samples(Vec<f32>),
}

#[derive(Debug, Clone)]
pub struct AudioBridgeConfig {
    pub bind_addr: SocketAddr,
    pub codec: CodecKind,
    /// Bytes per telephony frame (typically 160 at 8kHz mono / 20ms).
    pub frame_bytes: usize,
    /// Telephony frames accumulated before one AI chunk is emitted.
    pub buffer_chunks: usize,
    /// Connection is closed after this much inactivity.
    pub read_timeout: Duration,
}

impl Default for AudioBridgeConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:0".parse().expect("valid default socket addr"),
            codec: CodecKind::Pcmu,
            frame_bytes: 160,
            buffer_chunks: 1,
            read_timeout: Duration::from_secs(30),
        }
    }
}

type ConnectionCallback = Arc<dyn Fn(CallId) + Send + Sync>;
type AudioCallback = Arc<dyn Fn(CallId, Vec<f32>) + Send + Sync>;

#[derive(Default)]
struct Callbacks {
    on_connection: Option<ConnectionCallback>,
    on_audio_received: Option<AudioCallback>,
    on_disconnection: Option<ConnectionCallback>,
}

struct Connection {
    writer: AsyncMutex<OwnedWriteHalf>,
    frames_in: AtomicU64,
    frames_out: AtomicU64,
    codec_errors: AtomicU64,
}

struct Inner {
    config: AudioBridgeConfig,
    closed: AtomicBool,
    next_call_id: AtomicU64,
    connections: DashMap<CallId, Arc<Connection>>,
    callbacks: std::sync::RwLock<Callbacks>,
}

/// Accepts telephony audio connections and bridges audio to/from the AI
/// side for many calls concurrently. Cheaply `Clone`; clones share state.
#[derive(Clone)]
pub struct AudioBridge {
    inner: Arc<Inner>,
}

impl AudioBridge {
    pub fn new(config: AudioBridgeConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                closed: AtomicBool::new(false),
                next_call_id: AtomicU64::new(1),
                connections: DashMap::new(),
                callbacks: std::sync::RwLock::new(Callbacks::default()),
            }),
        }
    }

    pub fn on_connection<F: Fn(CallId) + Send + Sync + 'static>(&self, f: F) {
        self.inner.callbacks.write().expect("callbacks lock poisoned").on_connection = Some(Arc::new(f));
    }

    pub fn on_audio_received<F: Fn(CallId, Vec<f32>) + Send + Sync + 'static>(&self, f: F) {
        self.inner.callbacks.write().expect("callbacks lock poisoned").on_audio_received = Some(Arc::new(f));
    }

    pub fn on_disconnection<F: Fn(CallId) + Send + Sync + 'static>(&self, f: F) {
        self.inner.callbacks.write().expect("callbacks lock poisoned").on_disconnection = Some(Arc::new(f));
    }

    /// Bind and begin accepting connections. Returns once bound; accepting
    /// and per-connection processing continue on spawned tasks.
    pub async fn start(&self) -> Result<SocketAddr> {
        let listener = TcpListener::bind(self.inner.config.bind_addr).await?;
        let local_addr = listener.local_addr()?;
        info!(%local_addr, "audio bridge listening");

        let bridge = self.clone();
        tokio::spawn(async move {
            loop {
                if bridge.inner.closed.load(Ordering::Relaxed) {
                    break;
                }
                match listener.accept().await {
                    Ok((stream, peer)) => bridge.accept_connection(stream, peer),
                    Err(err) => {
                        if bridge.inner.closed.load(Ordering::Relaxed) {
                            break;
                        }
                        error!(%err, "audio bridge accept failed");
                    }
                }
            }
            info!("audio bridge accept loop terminated");
        });

        Ok(local_addr)
    }

    pub fn close(&self) {
        self.inner.closed.store(true, Ordering::Relaxed);
    }

    fn accept_connection(&self, stream: TcpStream, peer: SocketAddr) {
        let call_id = self.inner.next_call_id.fetch_add(1, Ordering::Relaxed);
        debug!(call_id, %peer, "audio bridge accepted connection");

        let (read_half, write_half) = stream.into_split();
        let connection = Arc::new(Connection {
            writer: AsyncMutex::new(write_half),
            frames_in: AtomicU64::new(0),
            frames_out: AtomicU64::new(0),
            codec_errors: AtomicU64::new(0),
        });
        self.inner.connections.insert(call_id, connection.clone());

        if let Some(cb) = self.inner.callbacks.read().expect("callbacks lock poisoned").on_connection.clone() {
            cb(call_id);
        }

        let bridge = self.clone();
        tokio::spawn(async move {
            bridge.receive_loop(call_id, read_half, connection).await;
            bridge.inner.connections.remove(&call_id);
            if let Some(cb) = bridge.inner.callbacks.read().expect("callbacks lock poisoned").on_disconnection.clone() {
                cb(call_id);
            }
        });
    }

    async fn receive_loop(
        &self,
        call_id: CallId,
        mut read_half: tokio::net::tcp::OwnedReadHalf,
        connection: Arc<Connection>,
    ) {
        let pipeline = CodecPipeline::new(self.inner.config.codec);
        let frame_bytes = self.inner.config.frame_bytes;
        let mut accumulated = BytesMut::with_capacity(frame_bytes * self.inner.config.buffer_chunks);
        let mut frame = vec![0u8; frame_bytes];

        loop {
            let read = timeout(self.inner.config.read_timeout, read_half.read_exact(&mut frame)).await;
            match read {
                Ok(Ok(0)) => {
                    debug!(call_id, "audio bridge connection reached EOF");
                    break;
                }
                Ok(Ok(_)) => {
                    connection.frames_in.fetch_add(1, Ordering::Relaxed);
                    accumulated.extend_from_slice(&frame);

                    if accumulated.len() >= frame_bytes * self.inner.config.buffer_chunks {
                        match pipeline.decode_for_ai(&accumulated) {
                            Ok(samples) => {
                                if let Some(cb) = self
                                    .inner
                                    .callbacks
                                    .read()
                                    .expect("callbacks lock poisoned")
                                    .on_audio_received
                                    .clone()
                                {
                                    cb(call_id, samples);
                                }
                            }
                            Err(err) => {
                                connection.codec_errors.fetch_add(1, Ordering::Relaxed);
                                warn!(call_id, %err, "codec error decoding telephony audio");
                            }
                        }
                        accumulated.clear();
                    }
                }
                Ok(Err(err)) => {
                    warn!(call_id, %err, "audio bridge read error");
                    break;
                }
                Err(_) => {
                    debug!(call_id, "audio bridge connection timed out with no activity");
                    break;
                }
            }
        }
    }

    /// Encode (if needed) and write audio to a connection's outbound
    /// stream. Returns `false` if the call isn't known or the write fails.
    pub async fn send_audio(&self, call_id: CallId, payload: AudioPayload) -> bool {
        let Some(connection) = self.inner.connections.get(&call_id).map(|c| c.clone()) else {
            return false;
        };

        let bytes = match payload {
            AudioPayload::Encoded(bytes) => Ok(bytes),
            AudioPayload::Samples(samples) => {
                let pipeline = CodecPipeline::new(self.inner.config.codec);
                pipeline.encode_for_telephony(&samples).map_err(MediaError::from)
            }
        };

        let bytes = match bytes {
            Ok(b) => b,
            Err(err) => {
                connection.codec_errors.fetch_add(1, Ordering::Relaxed);
                warn!(call_id, %err, "codec error encoding outbound audio");
                return false;
            }
        };

        let mut writer = connection.writer.lock().await;
        match writer.write_all(&bytes).await {
            Ok(()) => {
                connection.frames_out.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(err) => {
                warn!(call_id, %err, "audio bridge write failed");
                false
            }
        }
    }

    pub fn active_call_count(&self) -> usize {
        self.inner.connections.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use tokio::net::TcpStream;

    #[tokio::test]
    async fn accepts_connection_and_round_trips_audio() {
        let config = AudioBridgeConfig {
            bind_addr: "127.0.0.1:0".parse().unwrap(),
            codec: CodecKind::Pcmu,
            frame_bytes: 160,
            buffer_chunks: 1,
            read_timeout: Duration::from_millis(500),
        };
        let bridge = AudioBridge::new(config);

        let connected = Arc::new(AtomicUsize::new(0));
        let connected_clone = connected.clone();
        bridge.on_connection(move |_call_id| {
            connected_clone.fetch_add(1, Ordering::SeqCst);
        });

        let received = Arc::new(AtomicUsize::new(0));
        let received_clone = received.clone();
        bridge.on_audio_received(move |_call_id, samples| {
            if !samples.is_empty() {
                received_clone.fetch_add(1, Ordering::SeqCst);
            }
        });

        let addr = bridge.start().await.unwrap();
        let mut client = TcpStream::connect(addr).await.unwrap();
        client.write_all(&[0xFFu8; 160]).await.unwrap();

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(connected.load(Ordering::SeqCst), 1);
        assert_eq!(received.load(Ordering::SeqCst), 1);
        assert_eq!(bridge.active_call_count(), 1);
    }

    #[tokio::test]
    async fn disconnection_fires_on_eof() {
        let config = AudioBridgeConfig {
            bind_addr: "127.0.0.1:0".parse().unwrap(),
            read_timeout: Duration::from_millis(200),
            ..AudioBridgeConfig::default()
        };
        let bridge = AudioBridge::new(config);

        let disconnected = Arc::new(AtomicUsize::new(0));
        let disconnected_clone = disconnected.clone();
        bridge.on_disconnection(move |_call_id| {
            disconnected_clone.fetch_add(1, Ordering::SeqCst);
        });

        let addr = bridge.start().await.unwrap();
        let client = TcpStream::connect(addr).await.unwrap();
        drop(client);

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(disconnected.load(Ordering::SeqCst), 1);
        assert_eq!(bridge.active_call_count(), 0);
    }
}
