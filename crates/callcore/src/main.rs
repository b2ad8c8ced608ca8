//! Composition root: wires the codec/media pipeline, the conversation
//! engine, the PBX client, and the outbound dialer into one running
//! process. Real deployments swap [`capabilities`]'s reference STT/LLM/
//! TTS/SMS/consent/audit implementations for production ones; everything
//! else in this file stays the same.

mod audio_router;
mod audio_turn;
mod capabilities;
mod config;
mod outbound;

use std::sync::Arc;

use callcore_capabilities::{Conversational, Stt, SystemClock, Tts};
use callcore_conversation::ConversationEngine;
use callcore_dialer::{OutboundDialer, OutboundPolicyConfig};
use callcore_media::{AudioBridge, AudioBridgeConfig, AudioPayload, CallId as MediaCallId};
use callcore_pbx::PbxClient;
use clap::Parser;
use dashmap::DashMap;
use tokio::sync::{mpsc, Mutex as AsyncMutex};
use tracing::{info, warn};

use crate::audio_router::AudioRouter;
use crate::audio_turn::UtteranceAccumulator;
use crate::config::AppConfig;
use crate::outbound::{BridgeConnectionMailbox, ConversationOutboundDriver, DispatchingLlm};

/// Trailing silence, after speech has been seen, that closes an utterance
/// and hands it to the conversation engine. Not yet exposed as its own
/// config key; revisit if a deployment needs it tuned per codec.
const UTTERANCE_SILENCE_MS: u32 = 600;
const BRIDGE_FRAME_DURATION_MS: u32 = 20;

#[derive(Parser, Debug)]
#[command(name = "callcore", about = "Telephony AI agent core")]
struct Cli {
    /// Path to a TOML config file. Missing is fine; every field has a default.
    #[arg(long, env = "CALLCORE_CONFIG", default_value = "callcore.toml")]
    config: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let provider = callcore_infra::FileConfigProvider::new(&cli.config);
    let config: AppConfig = callcore_infra::ConfigProvider::load(&provider)?;

    init_logging(&config)?;
    callcore_infra::log_welcome("callcore", env!("CARGO_PKG_VERSION"));

    let stt: Arc<dyn Stt> = Arc::new(capabilities::PlaceholderStt);
    let tts: Arc<dyn Tts> = Arc::new(capabilities::PlaceholderTts::default());
    let real_llm: Arc<dyn Conversational> = Arc::new(capabilities::PlaceholderLlm::default());
    let llm: Arc<dyn Conversational> = Arc::new(DispatchingLlm::new(real_llm));
    let engine = ConversationEngine::new(config.conversation.clone().into_engine_config(), stt, llm, tts);

    let bridge = Arc::new(AudioBridge::new(AudioBridgeConfig {
        bind_addr: config.media.bind_addr,
        codec: config.media.codec_kind(),
        frame_bytes: config.media.frame_bytes,
        buffer_chunks: config.media.buffer_chunks,
        read_timeout: config.media.read_timeout(),
    }));

    let inbound_engine_ids: Arc<DashMap<MediaCallId, callcore_conversation::CallId>> = Arc::new(DashMap::new());
    let inbound_accumulators: Arc<DashMap<MediaCallId, AsyncMutex<UtteranceAccumulator>>> = Arc::new(DashMap::new());
    let barge_in_rms_threshold = config.conversation.barge_in_rms_threshold;

    let (unclaimed_tx, mut unclaimed_rx) = mpsc::unbounded_channel::<(MediaCallId, Vec<f32>)>();
    let router = AudioRouter::install(&bridge, unclaimed_tx);

    let mailbox = {
        let engine = engine.clone();
        let bridge = bridge.clone();
        let inbound_engine_ids = inbound_engine_ids.clone();
        let inbound_accumulators = inbound_accumulators.clone();
        BridgeConnectionMailbox::install(&bridge, move |media_id| {
            let engine = engine.clone();
            let bridge = bridge.clone();
            let inbound_engine_ids = inbound_engine_ids.clone();
            let inbound_accumulators = inbound_accumulators.clone();
            tokio::spawn(async move {
                let (engine_id, greeting_audio) = engine.start_conversation().await;
                inbound_engine_ids.insert(media_id, engine_id);
                inbound_accumulators.insert(
                    media_id,
                    AsyncMutex::new(UtteranceAccumulator::new(barge_in_rms_threshold, UTTERANCE_SILENCE_MS, BRIDGE_FRAME_DURATION_MS)),
                );
                let samples = callcore_ws::pcm16le_to_f32(&greeting_audio);
                bridge.send_audio(media_id, AudioPayload::Samples(samples)).await;
            });
        })
    };

    {
        let engine = engine.clone();
        let inbound_engine_ids = inbound_engine_ids.clone();
        let inbound_accumulators = inbound_accumulators.clone();
        bridge.on_disconnection(move |media_id| {
            if let Some((_, engine_id)) = inbound_engine_ids.remove(&media_id) {
                engine.end_conversation(engine_id);
            }
            inbound_accumulators.remove(&media_id);
        });
    }

    {
        let engine = engine.clone();
        let bridge = bridge.clone();
        let inbound_engine_ids = inbound_engine_ids.clone();
        let inbound_accumulators = inbound_accumulators.clone();
        tokio::spawn(async move {
            while let Some((media_id, frame)) = unclaimed_rx.recv().await {
                let Some(engine_id) = inbound_engine_ids.get(&media_id).map(|e| *e) else {
                    warn!(call_id = media_id, "audio for a call with no conversation state yet, dropping frame");
                    continue;
                };
                engine.report_incoming_audio(engine_id, &frame).await;

                let Some(accumulator_entry) = inbound_accumulators.get(&media_id) else {
                    continue;
                };
                let utterance = accumulator_entry.lock().await.push(&frame);
                drop(accumulator_entry);
                let Some(utterance) = utterance else {
                    continue;
                };

                let mut sentences = Vec::new();
                match engine
                    .process_audio_streaming(engine_id, &utterance, 16_000, |text, pcm| sentences.push((text, pcm)))
                    .await
                {
                    Ok(_) => {
                        for (text, pcm) in sentences {
                            if pcm.is_empty() {
                                continue;
                            }
                            let samples = callcore_ws::pcm16le_to_f32(&pcm);
                            if !bridge.send_audio(media_id, AudioPayload::Samples(samples)).await {
                                warn!(call_id = media_id, %text, "failed to write inbound reply audio");
                            }
                        }
                    }
                    Err(err) => warn!(call_id = media_id, %err, "inbound turn failed"),
                }
            }
        });
    }

    let media_addr = bridge.start().await?;
    info!(%media_addr, "audio bridge listening");

    if config.ws.enabled {
        start_ws_adapter(&config, engine.clone()).await?;
    }
    if config.media_streams.enabled {
        start_media_streams_adapter(&config, engine.clone()).await?;
    }

    if config.pbx.enabled && config.dialer.enabled {
        let pbx = Arc::new(PbxClient::new(config.pbx.clone().into_pbx_config()));
        pbx.connect().await?;
        info!("connected to PBX event socket");

        let driver = Arc::new(ConversationOutboundDriver::new(
            engine.clone(),
            bridge.clone(),
            router.clone(),
            mailbox.clone(),
            barge_in_rms_threshold,
            UTTERANCE_SILENCE_MS,
        ));

        let dialer = OutboundDialer::new(
            config.dialer.clone().into_dialer_config(),
            pbx,
            Arc::new(capabilities::AllowAllConsent),
            Arc::new(capabilities::TracingAuditLog),
            Some(Arc::new(capabilities::LoggingSmsGateway)),
            Arc::new(SystemClock),
            driver,
            OutboundPolicyConfig::default(),
            config.practice_name.clone(),
        );
        dialer.start().await;
        info!("outbound dialer started");
    }

    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");
    Ok(())
}

fn init_logging(config: &AppConfig) -> anyhow::Result<()> {
    let level = callcore_infra::parse_log_level(&config.logging.level).unwrap_or(tracing::Level::INFO);
    let mut logging = callcore_infra::LoggingConfig::new(level, "callcore");
    if config.logging.json {
        logging = logging.with_json();
    }
    if config.logging.spans {
        logging = logging.with_spans();
    }
    callcore_infra::setup_logging(logging)?;
    Ok(())
}

/// Generic websocket audio sessions (browser demo clients, etc). Each
/// session gets its own conversation, correlated by [`ws_core::SessionId`].
async fn start_ws_adapter(config: &AppConfig, engine: ConversationEngine) -> anyhow::Result<()> {
    let adapter = callcore_ws::WsAudioAdapter::new(callcore_ws::WsAdapterConfig {
        bind_addr: config.ws.bind_addr,
        sample_rate: 16_000,
        frame_duration_ms: 20,
        max_connections: config.ws.max_connections,
    });

    let sessions: Arc<DashMap<callcore_ws::SessionId, callcore_conversation::CallId>> = Arc::new(DashMap::new());
    let accumulators: Arc<DashMap<callcore_ws::SessionId, AsyncMutex<UtteranceAccumulator>>> = Arc::new(DashMap::new());
    let barge_in_rms_threshold = config.conversation.barge_in_rms_threshold;

    {
        let engine = engine.clone();
        let adapter_for_greeting = adapter.clone();
        let sessions = sessions.clone();
        let accumulators = accumulators.clone();
        adapter.on_connection(move |session_id| {
            let engine = engine.clone();
            let adapter = adapter_for_greeting.clone();
            let sessions = sessions.clone();
            let accumulators = accumulators.clone();
            tokio::spawn(async move {
                let (engine_id, greeting_audio) = engine.start_conversation().await;
                sessions.insert(session_id, engine_id);
                accumulators.insert(
                    session_id,
                    AsyncMutex::new(UtteranceAccumulator::new(barge_in_rms_threshold, UTTERANCE_SILENCE_MS, 20)),
                );
                let samples = callcore_ws::pcm16le_to_f32(&greeting_audio);
                adapter.send_audio(session_id, &samples, true).await;
            });
        });
    }

    {
        let sessions = sessions.clone();
        let accumulators = accumulators.clone();
        let engine = engine.clone();
        adapter.on_disconnection(move |session_id| {
            if let Some((_, engine_id)) = sessions.remove(&session_id) {
                engine.end_conversation(engine_id);
            }
            accumulators.remove(&session_id);
        });
    }

    {
        let adapter_for_audio = adapter.clone();
        adapter.on_audio_received(move |session_id, frame| {
            let engine = engine.clone();
            let adapter = adapter_for_audio.clone();
            let sessions = sessions.clone();
            let accumulators = accumulators.clone();
            tokio::spawn(async move {
                let Some(engine_id) = sessions.get(&session_id).map(|e| *e) else {
                    return;
                };
                engine.report_incoming_audio(engine_id, &frame).await;

                let Some(accumulator_entry) = accumulators.get(&session_id) else {
                    return;
                };
                let utterance = accumulator_entry.lock().await.push(&frame);
                drop(accumulator_entry);
                let Some(utterance) = utterance else {
                    return;
                };

                let mut sentences = Vec::new();
                if let Err(err) = engine
                    .process_audio_streaming(engine_id, &utterance, 16_000, |text, pcm| sentences.push((text, pcm)))
                    .await
                {
                    warn!(%session_id, %err, "websocket turn failed");
                    return;
                }
                for (_, pcm) in sentences {
                    if !pcm.is_empty() {
                        let samples = callcore_ws::pcm16le_to_f32(&pcm);
                        adapter.send_audio(session_id, &samples, true).await;
                    }
                }
            });
        });
    }

    let addr = adapter.start().await?;
    info!(%addr, "websocket audio adapter listening");
    Ok(())
}

/// PBX-provider Media-Streams sessions: same shape as the websocket
/// adapter, but streams are identified by `streamSid` and only surface
/// through a single `on_audio` callback, so the first frame for a new
/// stream lazily starts its conversation.
async fn start_media_streams_adapter(config: &AppConfig, engine: ConversationEngine) -> anyhow::Result<()> {
    let adapter = callcore_ws::MediaStreamsAdapter::new();
    let sessions: Arc<DashMap<callcore_ws::StreamSid, callcore_conversation::CallId>> = Arc::new(DashMap::new());
    let accumulators: Arc<DashMap<callcore_ws::StreamSid, AsyncMutex<UtteranceAccumulator>>> = Arc::new(DashMap::new());
    let barge_in_rms_threshold = config.conversation.barge_in_rms_threshold;

    {
        let adapter_for_audio = adapter.clone();
        adapter.on_audio(move |stream_sid, frame| {
            let engine = engine.clone();
            let adapter = adapter_for_audio.clone();
            let sessions = sessions.clone();
            let accumulators = accumulators.clone();
            tokio::spawn(async move {
                let engine_id = if let Some(id) = sessions.get(&stream_sid).map(|e| *e) {
                    id
                } else {
                    let (engine_id, greeting_audio) = engine.start_conversation().await;
                    sessions.insert(stream_sid.clone(), engine_id);
                    accumulators.insert(
                        stream_sid.clone(),
                        AsyncMutex::new(UtteranceAccumulator::new(barge_in_rms_threshold, UTTERANCE_SILENCE_MS, 20)),
                    );
                    let samples = callcore_ws::pcm16le_to_f32(&greeting_audio);
                    adapter.send_audio(&stream_sid, &samples).await;
                    engine_id
                };

                engine.report_incoming_audio(engine_id, &frame).await;

                let Some(accumulator_entry) = accumulators.get(&stream_sid) else {
                    return;
                };
                let utterance = accumulator_entry.lock().await.push(&frame);
                drop(accumulator_entry);
                let Some(utterance) = utterance else {
                    return;
                };

                let mut sentences = Vec::new();
                if let Err(err) = engine
                    .process_audio_streaming(engine_id, &utterance, 16_000, |text, pcm| sentences.push((text, pcm)))
                    .await
                {
                    warn!(%stream_sid, %err, "media-streams turn failed");
                    return;
                }
                for (_, pcm) in sentences {
                    if !pcm.is_empty() {
                        let samples = callcore_ws::pcm16le_to_f32(&pcm);
                        adapter.send_audio(&stream_sid, &samples).await;
                    }
                }
            });
        });
    }

    let addr = adapter.listen(config.media_streams.bind_addr).await?;
    info!(%addr, "media-streams adapter listening");
    Ok(())
}
