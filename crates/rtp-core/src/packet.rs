//! RTP header and packet (RFC 3550 section 5.1).
//!
//! ```text
//!  0                   1                   2                   3
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |V=2|P|X|  CC   |M|     PT      |       sequence number        |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                           timestamp                          |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |           synchronization source (SSRC) identifier            |
//! +=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+
//! ```

use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::time::{Instant, SystemTime};

use crate::error::{Result, RtpError};

pub const RTP_VERSION: u8 = 2;
const FIXED_HEADER_LEN: usize = 12;

/// Parsed RTP header fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RtpHeader {
    pub version: u8,
    pub padding: bool,
    pub extension: bool,
    pub csrc_count: u8,
    pub marker: bool,
    pub payload_type: u8,
    pub sequence: u16,
    pub timestamp: u32,
    pub ssrc: u32,
}

/// A full RTP packet: header plus (already depadded / extension-stripped) payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RtpPacket {
    pub header: RtpHeader,
    pub payload: Bytes,
}

impl RtpPacket {
    /// Parse an RTP packet from wire bytes. Strips the CSRC list, extension
    /// header, and padding, leaving only the codec payload.
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < FIXED_HEADER_LEN {
            return Err(RtpError::BufferTooSmall {
                required: FIXED_HEADER_LEN,
                available: data.len(),
            });
        }

        let mut buf = Bytes::copy_from_slice(data);
        let first_byte = buf.get_u8();
        let second_byte = buf.get_u8();

        let version = (first_byte >> 6) & 0x03;
        if version != RTP_VERSION {
            return Err(RtpError::UnsupportedVersion(version));
        }
        let padding = (first_byte >> 5) & 0x01 != 0;
        let extension = (first_byte >> 4) & 0x01 != 0;
        let csrc_count = first_byte & 0x0F;

        let marker = (second_byte >> 7) & 0x01 != 0;
        let payload_type = second_byte & 0x7F;

        let sequence = buf.get_u16();
        let timestamp = buf.get_u32();
        let ssrc = buf.get_u32();

        let csrc_bytes = csrc_count as usize * 4;
        if buf.remaining() < csrc_bytes {
            return Err(RtpError::BufferTooSmall {
                required: csrc_bytes,
                available: buf.remaining(),
            });
        }
        buf.advance(csrc_bytes);

        if extension {
            if buf.remaining() < 4 {
                return Err(RtpError::BufferTooSmall {
                    required: 4,
                    available: buf.remaining(),
                });
            }
            buf.advance(2); // profile-specific identifier, unused
            let ext_len_words = buf.get_u16() as usize;
            let ext_len_bytes = ext_len_words * 4;
            if buf.remaining() < ext_len_bytes {
                return Err(RtpError::BufferTooSmall {
                    required: ext_len_bytes,
                    available: buf.remaining(),
                });
            }
            buf.advance(ext_len_bytes);
        }

        let mut payload = buf;
        if padding {
            if payload.is_empty() {
                return Err(RtpError::Malformed {
                    details: "padding flag set but payload is empty".into(),
                });
            }
            let pad_len = *payload.last().expect("checked non-empty above") as usize;
            if pad_len == 0 || pad_len > payload.len() {
                return Err(RtpError::Malformed {
                    details: format!("invalid padding length {pad_len}"),
                });
            }
            payload.truncate(payload.len() - pad_len);
        }

        let header = RtpHeader {
            version,
            padding,
            extension,
            csrc_count,
            marker,
            payload_type,
            sequence,
            timestamp,
            ssrc,
        };

        Ok(Self { header, payload })
    }

    /// Serialize to wire bytes. CSRC list and extension header are not
    /// reconstructed; this crate only ever emits packets with `csrc_count ==
    /// 0` and `extension == false`.
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(FIXED_HEADER_LEN + self.payload.len());

        let mut first_byte = (self.header.version << 6) | (self.header.csrc_count & 0x0F);
        if self.header.padding {
            first_byte |= 0x20;
        }
        if self.header.extension {
            first_byte |= 0x10;
        }
        buf.put_u8(first_byte);

        let mut second_byte = self.header.payload_type & 0x7F;
        if self.header.marker {
            second_byte |= 0x80;
        }
        buf.put_u8(second_byte);

        buf.put_u16(self.header.sequence);
        buf.put_u32(self.header.timestamp);
        buf.put_u32(self.header.ssrc);
        buf.put_slice(&self.payload);

        buf.freeze()
    }
}

/// Wall-clock arrival time recorded separately from the packet itself so
/// that parsing stays a pure function of the wire bytes.
#[derive(Debug, Clone, Copy)]
pub struct Arrival {
    pub instant: Instant,
    pub system_time: SystemTime,
}

impl Arrival {
    pub fn now() -> Self {
        Self {
            instant: Instant::now(),
            system_time: SystemTime::now(),
        }
    }
}

/// True if `a` precedes `b` on the 16-bit sequence-number circle (RFC 3550
/// Appendix A.1 semantics: at most half the number space apart).
pub fn seq_lt(a: u16, b: u16) -> bool {
    let diff = b.wrapping_sub(a);
    diff != 0 && diff < 0x8000
}

/// Signed difference `a - b` on the 16-bit sequence-number circle.
pub fn seq_diff(a: u16, b: u16) -> i32 {
    let diff = a.wrapping_sub(b) as i32 & 0xFFFF;
    if diff > 0x8000 {
        diff - 0x1_0000
    } else {
        diff
    }
}

/// Signed difference `a - b` on the 32-bit timestamp circle.
pub fn ts_diff(a: u32, b: u32) -> i64 {
    let diff = (a.wrapping_sub(b)) as i64 & 0xFFFF_FFFF;
    if diff > 0x8000_0000 {
        diff - 0x1_0000_0000
    } else {
        diff
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_header() -> RtpHeader {
        RtpHeader {
            version: 2,
            padding: false,
            extension: false,
            csrc_count: 0,
            marker: true,
            payload_type: 0,
            sequence: 1000,
            timestamp: 160_000,
            ssrc: 0xDEAD_BEEF,
        }
    }

    #[test]
    fn round_trips_minimal_packet() {
        let packet = RtpPacket {
            header: sample_header(),
            payload: Bytes::from_static(&[1, 2, 3, 4]),
        };
        let bytes = packet.to_bytes();
        let parsed = RtpPacket::parse(&bytes).unwrap();
        assert_eq!(parsed, packet);
    }

    #[test]
    fn rejects_short_packet() {
        let err = RtpPacket::parse(&[0u8; 4]).unwrap_err();
        assert!(matches!(err, RtpError::BufferTooSmall { .. }));
    }

    #[test]
    fn rejects_unsupported_version() {
        let mut bytes = RtpPacket {
            header: sample_header(),
            payload: Bytes::from_static(&[1, 2]),
        }
        .to_bytes()
        .to_vec();
        bytes[0] = (1 << 6) | (bytes[0] & 0x3F); // version 1
        let err = RtpPacket::parse(&bytes).unwrap_err();
        assert!(matches!(err, RtpError::UnsupportedVersion(1)));
    }

    #[test]
    fn strips_padding() {
        let mut header = sample_header();
        header.padding = true;
        let mut payload = vec![1u8, 2, 3];
        let pad_len = 3u8;
        payload.extend(std::iter::repeat(0u8).take(pad_len as usize - 1));
        payload.push(pad_len);
        let packet = RtpPacket {
            header,
            payload: Bytes::from(payload),
        };
        let bytes = packet.to_bytes();
        let parsed = RtpPacket::parse(&bytes).unwrap();
        assert_eq!(&parsed.payload[..], &[1, 2, 3]);
    }

    #[test]
    fn sequence_wraparound_ordering() {
        assert!(seq_lt(65535, 0));
        assert!(!seq_lt(0, 65535));
        assert_eq!(seq_diff(0, 65535), 1);
        assert_eq!(seq_diff(65535, 0), -1);
    }

    #[test]
    fn timestamp_wraparound_diff() {
        assert_eq!(ts_diff(0, u32::MAX), 1);
        assert_eq!(ts_diff(u32::MAX, 0), -1);
    }
}
