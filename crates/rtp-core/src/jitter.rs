//! Adaptive jitter buffer for RTP packet reordering and playout timing.
//!
//! Collects packets as they arrive and releases them at a steady cadence,
//! smoothing out network jitter. Buffer delay widens when measured jitter
//! gets close to the current delay and narrows again once it's been quiet
//! for a while.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::packet::{seq_diff, seq_lt, RtpPacket};

const MAX_BUFFERED_PACKETS: usize = 100;
/// Loss concealment never synthesizes more than this many silent frames for
/// a single gap, no matter how large the gap actually was.
const MAX_CONCEALED_PACKETS: u64 = 5;

#[derive(Debug, Clone, Copy)]
pub struct JitterBufferConfig {
    pub min_delay_ms: u32,
    pub max_delay_ms: u32,
    pub target_delay_ms: u32,
    pub adaptive: bool,
    pub packet_time_ms: u32,
}

impl Default for JitterBufferConfig {
    fn default() -> Self {
        Self {
            min_delay_ms: 40,
            max_delay_ms: 200,
            target_delay_ms: 100,
            adaptive: true,
            packet_time_ms: 20,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct JitterBufferStats {
    pub packets_received: u64,
    pub packets_dropped: u64,
    pub packets_lost: u64,
    pub buffer_size: usize,
    pub buffer_delay_ms: u32,
    pub max_jitter_ms: f64,
}

struct Buffered {
    packet: RtpPacket,
    arrival: Instant,
}

pub struct JitterBuffer {
    config: JitterBufferConfig,
    packets: VecDeque<Buffered>,
    last_seq: Option<u16>,
    expected_seq: Option<u16>,
    playout_time: Option<Instant>,
    buffer_delay_ms: u32,
    packets_received: u64,
    packets_dropped: u64,
    packets_lost: u64,
    max_jitter_ms: f64,
    /// A real packet popped while detecting a gap, held back one call so the
    /// silence emitted for the gap precedes it instead of discarding it.
    pending_audio: Option<RtpPacket>,
}

impl JitterBuffer {
    pub fn new(config: JitterBufferConfig) -> Self {
        let buffer_delay_ms = config.target_delay_ms;
        Self {
            config,
            packets: VecDeque::with_capacity(MAX_BUFFERED_PACKETS),
            last_seq: None,
            expected_seq: None,
            playout_time: None,
            buffer_delay_ms,
            packets_received: 0,
            packets_dropped: 0,
            packets_lost: 0,
            max_jitter_ms: 0.0,
            pending_audio: None,
        }
    }

    /// Add a packet to the buffer, timestamped at `arrival`. Duplicate
    /// sequence numbers are silently ignored.
    pub fn put(&mut self, packet: RtpPacket, arrival: Instant) {
        self.packets_received += 1;
        let sequence = packet.header.sequence;

        if self.expected_seq.is_none() {
            self.expected_seq = Some(sequence);
            self.playout_time = Some(arrival + Duration::from_millis(self.config.target_delay_ms as u64));
        }

        if self.packets.iter().any(|p| p.packet.header.sequence == sequence) {
            return;
        }

        if self.last_seq.is_some() {
            if let Some(expected_time) = self.playout_time {
                let actual_delay_ms = if arrival >= expected_time {
                    (arrival - expected_time).as_secs_f64() * 1000.0
                } else {
                    -((expected_time - arrival).as_secs_f64() * 1000.0)
                };
                self.max_jitter_ms = self.max_jitter_ms.max(actual_delay_ms.abs());
            }
        }
        self.last_seq = Some(sequence);

        let insert_at = self
            .packets
            .iter()
            .position(|existing| seq_lt(sequence, existing.packet.header.sequence));
        match insert_at {
            Some(idx) => self.packets.insert(idx, Buffered { packet, arrival }),
            None => self.packets.push_back(Buffered { packet, arrival }),
        }

        if self.packets.len() > MAX_BUFFERED_PACKETS {
            self.packets.pop_front();
            self.packets_dropped += 1;
        }

        if self.config.adaptive {
            self.adjust_delay();
        }
    }

    /// Pop the next packet ready for playout, or `None` if the buffer is
    /// empty or the target delay hasn't elapsed yet.
    pub fn get(&mut self) -> Option<RtpPacket> {
        if self.packets.is_empty() {
            return None;
        }

        let now = Instant::now();
        if let Some(playout_time) = self.playout_time {
            if now < playout_time {
                return None;
            }
        }

        let buffered = self.packets.pop_front()?;
        let sequence = buffered.packet.header.sequence;

        if let Some(expected) = self.expected_seq {
            let gap = seq_diff(sequence, expected);
            if gap > 0 {
                self.packets_lost += gap as u64;
            }
        }
        self.expected_seq = Some(sequence.wrapping_add(1));

        if let Some(playout_time) = self.playout_time.as_mut() {
            *playout_time += Duration::from_millis(self.config.packet_time_ms as u64);
        }

        Some(buffered.packet)
    }

    /// Pop audio for playout, synthesizing silence for lost packets
    /// (capped at [`MAX_CONCEALED_PACKETS`] per call). Payload bytes are
    /// interpreted as little-endian `i16` samples.
    ///
    /// When a gap is detected, the real packet that revealed it is held back
    /// and returned whole on the following call, after the silence frame --
    /// it is never discarded.
    pub fn get_audio(&mut self, samples_per_packet: usize) -> Option<Vec<i16>> {
        if let Some(packet) = self.pending_audio.take() {
            return Some(decode_payload(&packet));
        }

        let packet = self.get()?;

        if self.packets_lost > 0 {
            let lost = self.packets_lost.min(MAX_CONCEALED_PACKETS);
            self.packets_lost -= lost;
            debug!(lost, "concealing lost packets with silence");
            self.pending_audio = Some(packet);
            return Some(vec![0i16; samples_per_packet * lost as usize]);
        }

        Some(decode_payload(&packet))
    }

    fn adjust_delay(&mut self) {
        let delay = self.buffer_delay_ms as f64;
        if self.max_jitter_ms > delay * 0.8 {
            self.buffer_delay_ms = self.config.max_delay_ms.min(self.buffer_delay_ms + 10);
        } else if self.max_jitter_ms < delay * 0.3 {
            self.buffer_delay_ms = self.config.min_delay_ms.max(self.buffer_delay_ms.saturating_sub(5));
        }
    }

    pub fn stats(&self) -> JitterBufferStats {
        JitterBufferStats {
            packets_received: self.packets_received,
            packets_dropped: self.packets_dropped,
            packets_lost: self.packets_lost,
            buffer_size: self.packets.len(),
            buffer_delay_ms: self.buffer_delay_ms,
            max_jitter_ms: self.max_jitter_ms,
        }
    }

    pub fn clear(&mut self) {
        self.packets.clear();
        self.last_seq = None;
        self.expected_seq = None;
        self.playout_time = None;
        self.pending_audio = None;
    }
}

fn decode_payload(packet: &RtpPacket) -> Vec<i16> {
    packet.payload.chunks_exact(2).map(|pair| i16::from_le_bytes([pair[0], pair[1]])).collect()
}

impl Default for JitterBuffer {
    fn default() -> Self {
        Self::new(JitterBufferConfig::default())
    }
}
