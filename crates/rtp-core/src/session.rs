//! RTP session: per-call sequence/timestamp state plus the receive-side
//! jitter buffer.

use std::time::Instant;

use bytes::Bytes;
use rand::Rng;
use tracing::warn;

use crate::jitter::{JitterBuffer, JitterBufferConfig, JitterBufferStats};
use crate::packet::{RtpHeader, RtpPacket};

/// Standard static RTP payload types relevant to telephony audio (RFC 3551).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RtpPayloadType {
    Pcmu,
    Pcma,
    G722,
    L16Mono,
    Dynamic(u8),
}

impl RtpPayloadType {
    pub fn as_u8(self) -> u8 {
        match self {
            RtpPayloadType::Pcmu => 0,
            RtpPayloadType::Pcma => 8,
            RtpPayloadType::G722 => 9,
            RtpPayloadType::L16Mono => 11,
            RtpPayloadType::Dynamic(v) => v,
        }
    }
}

/// Manages outbound sequence/timestamp state and the inbound jitter buffer
/// for one call leg.
pub struct RtpSession {
    pub ssrc: u32,
    pub payload_type: RtpPayloadType,
    pub sample_rate: u32,
    sequence: u16,
    timestamp: u32,
    samples_per_packet: u32,
    pub jitter_buffer: JitterBuffer,
}

impl RtpSession {
    pub fn new(payload_type: RtpPayloadType, sample_rate: u32) -> Self {
        let mut rng = rand::thread_rng();
        Self {
            ssrc: rng.gen(),
            payload_type,
            sample_rate,
            sequence: rng.gen(),
            timestamp: rng.gen(),
            samples_per_packet: sample_rate * 20 / 1000,
            jitter_buffer: JitterBuffer::new(JitterBufferConfig::default()),
        }
    }

    /// Build the next outbound packet, advancing sequence and timestamp.
    pub fn create_packet(&mut self, payload: Bytes, marker: bool) -> RtpPacket {
        let header = RtpHeader {
            version: 2,
            padding: false,
            extension: false,
            csrc_count: 0,
            marker,
            payload_type: self.payload_type.as_u8(),
            sequence: self.sequence,
            timestamp: self.timestamp,
            ssrc: self.ssrc,
        };

        self.sequence = self.sequence.wrapping_add(1);
        self.timestamp = self.timestamp.wrapping_add(self.samples_per_packet);

        RtpPacket { header, payload }
    }

    /// Parse and buffer an inbound packet. Malformed packets are logged and
    /// dropped rather than propagated, matching how a live RTP stream treats
    /// a single bad datagram.
    pub fn receive(&mut self, data: &[u8]) {
        match RtpPacket::parse(data) {
            Ok(packet) => self.jitter_buffer.put(packet, Instant::now()),
            Err(err) => warn!(%err, "dropping invalid RTP packet"),
        }
    }

    pub fn stats(&self) -> JitterBufferStats {
        self.jitter_buffer.stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_packet_advances_sequence_and_timestamp() {
        let mut session = RtpSession::new(RtpPayloadType::Pcmu, 8000);
        let first = session.create_packet(Bytes::from_static(&[0; 160]), false);
        let second = session.create_packet(Bytes::from_static(&[0; 160]), false);
        assert_eq!(second.header.sequence, first.header.sequence.wrapping_add(1));
        assert_eq!(second.header.timestamp, first.header.timestamp.wrapping_add(160));
    }

    #[test]
    fn receive_feeds_jitter_buffer() {
        let mut session = RtpSession::new(RtpPayloadType::Pcmu, 8000);
        let packet = session.create_packet(Bytes::from_static(&[0; 160]), false);
        let bytes = packet.to_bytes();
        session.receive(&bytes);
        assert_eq!(session.stats().packets_received, 1);
    }

    #[test]
    fn malformed_packet_is_dropped_without_panic() {
        let mut session = RtpSession::new(RtpPayloadType::Pcmu, 8000);
        session.receive(&[0u8; 4]);
        assert_eq!(session.stats().packets_received, 0);
    }
}
