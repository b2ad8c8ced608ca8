//! RTCP receiver reports (RFC 3550 section 6.4.2), used here purely for call
//! quality monitoring rather than full session control.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{Result, RtpError};

const RTCP_VERSION: u8 = 2;
const RECEIVER_REPORT_PT: u8 = 201;
const REPORT_BLOCK_SIZE: usize = 24;

/// A single RTCP report block: per-source reception quality stats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RtcpReportBlock {
    pub ssrc: u32,
    pub fraction_lost: u8,
    pub cumulative_lost: u32,
    pub highest_seq: u32,
    pub jitter: u32,
    pub last_sr_timestamp: u32,
    pub delay_since_last_sr: u32,
}

impl RtcpReportBlock {
    pub fn parse(buf: &mut Bytes) -> Result<Self> {
        if buf.remaining() < REPORT_BLOCK_SIZE {
            return Err(RtpError::BufferTooSmall {
                required: REPORT_BLOCK_SIZE,
                available: buf.remaining(),
            });
        }
        let ssrc = buf.get_u32();
        let fraction_lost = buf.get_u8();
        let cumulative_lost =
            (buf.get_u8() as u32) << 16 | (buf.get_u8() as u32) << 8 | buf.get_u8() as u32;
        let highest_seq = buf.get_u32();
        let jitter = buf.get_u32();
        let last_sr_timestamp = buf.get_u32();
        let delay_since_last_sr = buf.get_u32();

        Ok(Self {
            ssrc,
            fraction_lost,
            cumulative_lost,
            highest_seq,
            jitter,
            last_sr_timestamp,
            delay_since_last_sr,
        })
    }

    pub fn serialize(&self, buf: &mut BytesMut) {
        buf.put_u32(self.ssrc);
        buf.put_u8(self.fraction_lost);
        buf.put_u8(((self.cumulative_lost >> 16) & 0xFF) as u8);
        buf.put_u8(((self.cumulative_lost >> 8) & 0xFF) as u8);
        buf.put_u8((self.cumulative_lost & 0xFF) as u8);
        buf.put_u32(self.highest_seq);
        buf.put_u32(self.jitter);
        buf.put_u32(self.last_sr_timestamp);
        buf.put_u32(self.delay_since_last_sr);
    }
}

/// An RTCP Receiver Report packet carrying one report block per monitored source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RtcpReceiverReport {
    pub reporter_ssrc: u32,
    pub blocks: Vec<RtcpReportBlock>,
}

impl RtcpReceiverReport {
    pub fn new(reporter_ssrc: u32) -> Self {
        Self {
            reporter_ssrc,
            blocks: Vec::new(),
        }
    }

    pub fn parse(data: &[u8]) -> Result<Self> {
        let mut buf = Bytes::copy_from_slice(data);
        if buf.remaining() < 8 {
            return Err(RtpError::BufferTooSmall {
                required: 8,
                available: buf.remaining(),
            });
        }

        let first_byte = buf.get_u8();
        let version = (first_byte >> 6) & 0x03;
        if version != RTCP_VERSION {
            return Err(RtpError::UnsupportedVersion(version));
        }
        let report_count = first_byte & 0x1F;

        let packet_type = buf.get_u8();
        if packet_type != RECEIVER_REPORT_PT {
            return Err(RtpError::UnknownRtcpType(packet_type));
        }

        let length_words = buf.get_u16() as usize;
        let needed = length_words * 4;
        if buf.remaining() < needed {
            return Err(RtpError::BufferTooSmall {
                required: needed,
                available: buf.remaining(),
            });
        }

        let reporter_ssrc = buf.get_u32();
        let mut blocks = Vec::with_capacity(report_count as usize);
        for _ in 0..report_count {
            blocks.push(RtcpReportBlock::parse(&mut buf)?);
        }

        Ok(Self { reporter_ssrc, blocks })
    }

    pub fn to_bytes(&self) -> Bytes {
        let body_len = 4 + self.blocks.len() * REPORT_BLOCK_SIZE;
        let mut buf = BytesMut::with_capacity(4 + body_len);

        let first_byte = (RTCP_VERSION << 6) | (self.blocks.len() as u8 & 0x1F);
        buf.put_u8(first_byte);
        buf.put_u8(RECEIVER_REPORT_PT);
        buf.put_u16((body_len / 4) as u16);
        buf.put_u32(self.reporter_ssrc);
        for block in &self.blocks {
            block.serialize(&mut buf);
        }

        buf.freeze()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_with_blocks() {
        let mut report = RtcpReceiverReport::new(42);
        report.blocks.push(RtcpReportBlock {
            ssrc: 7,
            fraction_lost: 3,
            cumulative_lost: 100,
            highest_seq: 5000,
            jitter: 20,
            last_sr_timestamp: 123,
            delay_since_last_sr: 456,
        });
        let bytes = report.to_bytes();
        let parsed = RtcpReceiverReport::parse(&bytes).unwrap();
        assert_eq!(parsed, report);
    }

    #[test]
    fn rejects_wrong_packet_type() {
        let mut buf = BytesMut::new();
        buf.put_u8((RTCP_VERSION << 6) | 0);
        buf.put_u8(200); // sender report, not receiver report
        buf.put_u16(1);
        buf.put_u32(1);
        let err = RtcpReceiverReport::parse(&buf).unwrap_err();
        assert!(matches!(err, RtpError::UnknownRtcpType(200)));
    }
}
