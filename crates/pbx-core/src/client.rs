//! `PbxClient`: event-socket control client over `tokio::net::TcpStream`.
//!
//! `Arc<Inner>` wrapping the socket, an atomic/watch-based connection flag,
//! and a spawned read loop that is the only task touching the read half.

use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use futures::future::BoxFuture;
use futures::FutureExt;
use parking_lot::Mutex;
use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{oneshot, watch, Mutex as AsyncMutex};
use tracing::{error, info, info_span, warn, Instrument};

use crate::error::{PbxError, Result};
use crate::protocol::{self, Frame};
use crate::types::{ChannelUuid, ConnectionStatus, HangupCause, OriginateRequest, PbxEvent, TransferType};

#[derive(Debug, Clone)]
pub struct PbxConfig {
    pub host: String,
    pub port: u16,
    pub password: String,
    pub reconnect: bool,
    pub reconnect_delay: Duration,
}

impl Default for PbxConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8021,
            password: String::new(),
            reconnect: true,
            reconnect_delay: Duration::from_secs(5),
        }
    }
}

pub type EventHandlerResult = std::result::Result<(), String>;
pub type EventHandler = Arc<dyn Fn(PbxEvent) -> BoxFuture<'static, EventHandlerResult> + Send + Sync>;

/// Wraps a sync or async closure as an [`EventHandler`].
pub fn handler<F, Fut>(f: F) -> EventHandler
where
    F: Fn(PbxEvent) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = EventHandlerResult> + Send + 'static,
{
    Arc::new(move |event| f(event).boxed())
}

struct Inner {
    config: PbxConfig,
    write: AsyncMutex<Option<OwnedWriteHalf>>,
    command_lock: AsyncMutex<()>,
    pending_reply: Mutex<Option<oneshot::Sender<Frame>>>,
    connected: AtomicBool,
    status_tx: watch::Sender<ConnectionStatus>,
    handlers: DashMap<String, Vec<EventHandler>>,
    global_handlers: Mutex<Vec<EventHandler>>,
}

#[derive(Clone)]
pub struct PbxClient {
    inner: Arc<Inner>,
}

impl PbxClient {
    pub fn new(config: PbxConfig) -> Self {
        let (status_tx, _) = watch::channel(ConnectionStatus::Disconnected);
        Self {
            inner: Arc::new(Inner {
                config,
                write: AsyncMutex::new(None),
                command_lock: AsyncMutex::new(()),
                pending_reply: Mutex::new(None),
                connected: AtomicBool::new(false),
                status_tx,
                handlers: DashMap::new(),
                global_handlers: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn on_event(&self, event_name: impl Into<String>, handler: EventHandler) {
        self.inner.handlers.entry(event_name.into()).or_default().push(handler);
    }

    pub fn on_all_events(&self, handler: EventHandler) {
        self.inner.global_handlers.lock().push(handler);
    }

    pub fn connection_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.inner.status_tx.subscribe()
    }

    pub fn is_connected(&self) -> bool {
        self.inner.connected.load(Ordering::Acquire)
    }

    /// Connect, authenticate, subscribe to all events, and start the
    /// background read loop. On any later read/write error the client
    /// reconnects automatically if `config.reconnect` is set.
    pub async fn connect(&self) -> Result<()> {
        let addr = format!("{}:{}", self.inner.config.host, self.inner.config.port);
        let stream = TcpStream::connect(&addr).await?;
        let (read_half, write_half) = stream.into_split();
        let mut reader = BufReader::new(read_half);

        let banner = protocol::read_frame(&mut reader).await?;
        if banner.headers.get("Content-Type").map(|v| v != "auth/request").unwrap_or(true) {
            return Err(PbxError::AuthFailed);
        }

        let mut write_half = write_half;
        send_line(&mut write_half, &format!("auth {}", self.inner.config.password)).await?;
        let auth_reply = protocol::read_frame(&mut reader).await?;
        if !auth_reply.is_ok() {
            return Err(PbxError::AuthFailed);
        }

        send_line(&mut write_half, "event plain all").await?;
        let _ = protocol::read_frame(&mut reader).await?;

        *self.inner.write.lock().await = Some(write_half);
        self.inner.connected.store(true, Ordering::Release);
        let _ = self.inner.status_tx.send(ConnectionStatus::Connected);

        info!(addr = %addr, "connected to PBX event socket");
        self.spawn_read_loop(reader);
        Ok(())
    }

    pub async fn disconnect(&self) {
        self.inner.connected.store(false, Ordering::Release);
        if let Some(mut write) = self.inner.write.lock().await.take() {
            let _ = write.shutdown().await;
        }
        let _ = self.inner.status_tx.send(ConnectionStatus::Disconnected);
    }

    fn spawn_read_loop(&self, mut reader: BufReader<OwnedReadHalf>) {
        let client = self.clone();
        tokio::spawn(
            async move {
                loop {
                    match protocol::read_frame(&mut reader).await {
                        Ok(frame) => {
                            if frame.is_event() {
                                if let Some(event) = protocol::parse_event(&frame) {
                                    client.dispatch(event).await;
                                }
                            } else if let Some(tx) = client.inner.pending_reply.lock().take() {
                                let _ = tx.send(frame);
                            } else {
                                warn!("reply frame arrived with no pending command");
                            }
                        }
                        Err(err) => {
                            error!(%err, "event socket read failed");
                            break;
                        }
                    }
                }
                client.on_disconnected().await;
            }
            .instrument(info_span!("pbx_read_loop")),
        );
    }

    async fn on_disconnected(&self) {
        self.inner.connected.store(false, Ordering::Release);
        if let Some(tx) = self.inner.pending_reply.lock().take() {
            drop(tx); // the awaiting command observes a closed channel -> ConnectionClosed
        }
        if self.inner.config.reconnect {
            let _ = self.inner.status_tx.send(ConnectionStatus::Reconnecting);
            let client = self.clone();
            let delay = self.inner.config.reconnect_delay;
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                if let Err(err) = client.connect().await {
                    error!(%err, "reconnect attempt failed");
                }
            });
        } else {
            let _ = self.inner.status_tx.send(ConnectionStatus::Disconnected);
        }
    }

    async fn dispatch(&self, event: PbxEvent) {
        let specific = self.inner.handlers.get(&event.event_name).map(|h| h.value().clone()).unwrap_or_default();
        let global = self.inner.global_handlers.lock().clone();
        let name = event.event_name.clone();

        for h in specific.into_iter().chain(global) {
            let result = AssertUnwindSafe(h(event.clone())).catch_unwind().await;
            match result {
                Ok(Ok(())) => {}
                Ok(Err(msg)) => warn!(event = %name, error = %msg, "event handler returned an error"),
                Err(_) => error!(event = %name, "event handler panicked"),
            }
        }
    }

    async fn send_command(&self, command: &str) -> Result<Frame> {
        if !self.is_connected() {
            return Err(PbxError::NotConnected);
        }
        let _permit = self.inner.command_lock.lock().await;
        let (tx, rx) = oneshot::channel();
        *self.inner.pending_reply.lock() = Some(tx);

        let mut write_guard = self.inner.write.lock().await;
        let Some(write) = write_guard.as_mut() else {
            return Err(PbxError::NotConnected);
        };
        if let Err(err) = send_line(write, command).await {
            self.inner.pending_reply.lock().take();
            return Err(err);
        }
        drop(write_guard);

        rx.await.map_err(|_| PbxError::ConnectionClosed)
    }

    async fn command_ok(&self, command: &str) -> Result<bool> {
        Ok(self.send_command(command).await?.is_ok())
    }

    pub async fn answer(&self, channel_uuid: &str) -> Result<bool> {
        self.command_ok(&format!("api uuid_answer {channel_uuid}")).await
    }

    pub async fn hangup(&self, channel_uuid: &str, cause: HangupCause) -> Result<bool> {
        self.command_ok(&format!("api uuid_kill {channel_uuid} {}", cause.as_wire())).await
    }

    pub async fn transfer(&self, channel_uuid: &str, destination: &str, dialplan: &str, context: &str) -> Result<bool> {
        self.command_ok(&format!("api uuid_transfer {channel_uuid} {destination} {dialplan} {context}")).await
    }

    pub async fn bridge(&self, channel_uuid: &str, destination: &str) -> Result<bool> {
        self.command_ok(&format!("api uuid_bridge {channel_uuid} {destination}")).await
    }

    pub async fn execute_app(&self, channel_uuid: &str, app: &str, args: &str) -> Result<bool> {
        let cmd = if args.is_empty() {
            format!("api uuid_broadcast {channel_uuid} {app}")
        } else {
            format!("api uuid_broadcast {channel_uuid} {app}::{args}")
        };
        self.command_ok(&cmd).await
    }

    pub async fn send_dtmf(&self, channel_uuid: &str, digits: &str, duration_ms: u32) -> Result<bool> {
        self.command_ok(&format!("api uuid_send_dtmf {channel_uuid} {digits} {duration_ms}")).await
    }

    pub async fn hold(&self, channel_uuid: &str) -> Result<bool> {
        self.command_ok(&format!("api uuid_hold {channel_uuid}")).await
    }

    pub async fn unhold(&self, channel_uuid: &str) -> Result<bool> {
        self.command_ok(&format!("api uuid_hold off {channel_uuid}")).await
    }

    pub async fn mute(&self, channel_uuid: &str, direction: &str) -> Result<bool> {
        self.command_ok(&format!("api uuid_audio {channel_uuid} start {direction} mute")).await
    }

    pub async fn unmute(&self, channel_uuid: &str, direction: &str) -> Result<bool> {
        self.command_ok(&format!("api uuid_audio {channel_uuid} stop {direction} mute")).await
    }

    pub async fn set_variable(&self, channel_uuid: &str, name: &str, value: &str) -> Result<bool> {
        self.command_ok(&format!("api uuid_setvar {channel_uuid} {name} {value}")).await
    }

    pub async fn get_variable(&self, channel_uuid: &str, name: &str) -> Result<Option<String>> {
        let frame = self.send_command(&format!("api uuid_getvar {channel_uuid} {name}")).await?;
        if frame.body.contains("+OK") || frame.body.contains("-ERR") {
            Ok(None)
        } else {
            Ok(Some(frame.body.trim().to_string()))
        }
    }

    /// Blind or attended transfer is expressed as a plain `transfer` call at
    /// this layer; choreography between the two belongs to conversation
    /// policy, not this client.
    pub async fn transfer_typed(&self, channel_uuid: &str, destination: &str, _kind: TransferType) -> Result<bool> {
        self.transfer(channel_uuid, destination, "XML", "default").await
    }

    pub async fn originate(&self, request: &OriginateRequest) -> Result<Option<ChannelUuid>> {
        let mut vars: HashMap<String, String> = request.variables.clone();
        if let Some(name) = &request.caller_id_name {
            vars.insert("origination_caller_id_name".to_string(), name.clone());
        }
        if let Some(number) = &request.caller_id_number {
            vars.insert("origination_caller_id_number".to_string(), number.clone());
        }
        vars.insert("originate_timeout".to_string(), request.timeout_secs.to_string());

        let vars_str = if vars.is_empty() {
            String::new()
        } else {
            let parts: Vec<String> = vars.iter().map(|(k, v)| format!("{k}={v}")).collect();
            format!("{{{}}}", parts.join(","))
        };

        let dial_string = format!("sofia/gateway/{}/{}", request.gateway, request.destination);
        let cmd = format!("api originate {vars_str}{dial_string} &park()");

        let frame = self.send_command(&cmd).await?;
        if !frame.is_ok() {
            warn!(destination = %request.destination, "originate failed");
            return Ok(None);
        }
        Ok(frame.ok_token().map(|s| s.to_string()))
    }
}

async fn send_line(write: &mut OwnedWriteHalf, line: &str) -> Result<()> {
    write.write_all(format!("{line}\n\n").as_bytes()).await?;
    write.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn originate_builds_sofia_gateway_dial_string() {
        // Dial-string shape is exercised end-to-end via an actual socket in
        // integration tests; here we just check the static pieces compile
        // against the expected field names.
        let req = OriginateRequest {
            destination: "+491234".to_string(),
            gateway: "sipgate".to_string(),
            timeout_secs: 30,
            ..Default::default()
        };
        assert_eq!(req.destination, "+491234");
    }
}
