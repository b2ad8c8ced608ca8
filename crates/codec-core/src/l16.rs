//! Linear 16-bit PCM passthrough, big-endian on the wire per RFC 3551 L16.

use crate::error::{CodecError, Result};
use crate::types::{AudioCodec, CodecInfo, CodecKind};

/// L16 codec: encodes to big-endian byte pairs, decodes back to `i16`.
#[derive(Debug, Default, Clone, Copy)]
pub struct L16Codec;

impl AudioCodec for L16Codec {
    fn encode(&self, pcm: &[i16]) -> Result<Vec<u8>> {
        if pcm.is_empty() {
            return Err(CodecError::EmptyInput);
        }
        let mut out = Vec::with_capacity(pcm.len() * 2);
        for &sample in pcm {
            out.extend_from_slice(&sample.to_be_bytes());
        }
        Ok(out)
    }

    fn decode(&self, data: &[u8]) -> Result<Vec<i16>> {
        if data.is_empty() {
            return Err(CodecError::EmptyInput);
        }
        if data.len() % 2 != 0 {
            return Err(CodecError::MalformedPayload {
                details: format!("L16 payload length {} is not a multiple of 2", data.len()),
            });
        }
        Ok(data
            .chunks_exact(2)
            .map(|pair| i16::from_be_bytes([pair[0], pair[1]]))
            .collect())
    }

    fn info(&self) -> CodecInfo {
        CodecKind::L16.info()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_exactly() {
        let codec = L16Codec;
        let pcm = vec![0i16, 1, -1, i16::MAX, i16::MIN, 1234, -4321];
        let encoded = codec.encode(&pcm).unwrap();
        assert_eq!(encoded.len(), pcm.len() * 2);
        let decoded = codec.decode(&encoded).unwrap();
        assert_eq!(decoded, pcm);
    }

    #[test]
    fn rejects_odd_length_payload() {
        let err = L16Codec.decode(&[0x00, 0x01, 0x02]).unwrap_err();
        assert!(matches!(err, CodecError::MalformedPayload { .. }));
    }

    #[test]
    fn rejects_empty_input() {
        assert_eq!(L16Codec.encode(&[]).unwrap_err(), CodecError::EmptyInput);
        assert_eq!(L16Codec.decode(&[]).unwrap_err(), CodecError::EmptyInput);
    }
}
