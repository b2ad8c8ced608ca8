//! G.711 mu-law (PCMU) and A-law (PCMA) codec.
//!
//! Bit-exact ITU-T G.711. Decode uses precomputed 256-entry lookup tables;
//! encode uses the direct segment/mantissa computation so it never needs a
//! reverse-lookup table.

use crate::error::{CodecError, Result};
use crate::types::{AudioCodec, CodecInfo, CodecKind};
use once_cell::sync::Lazy;

const MULAW_BIAS: i32 = 0x84;
const MULAW_CLIP: i32 = 32635;
const ALAW_SEG_END: [i32; 8] = [0x1F, 0x3F, 0x7F, 0xFF, 0x1FF, 0x3FF, 0x7FF, 0xFFF];

fn mulaw_encode_sample(sample: i16) -> u8 {
    let mut sign: u8 = 0x80;
    let mut pcm = sample as i32;
    if pcm < 0 {
        pcm = -pcm;
        sign = 0x00;
    }
    pcm = pcm.min(MULAW_CLIP) + MULAW_BIAS;

    // Find the segment: position of the highest set bit above bit 7.
    let mut exponent: i32 = 7;
    let mut mask: i32 = 0x4000;
    while exponent > 0 && (pcm & mask) == 0 {
        exponent -= 1;
        mask >>= 1;
    }
    let mantissa = (pcm >> (exponent + 3)) & 0x0F;
    let byte = sign | ((exponent as u8) << 4) | (mantissa as u8);
    !byte
}

fn mulaw_decode_sample(encoded: u8) -> i16 {
    let byte = !encoded;
    let sign = byte & 0x80;
    let exponent = ((byte >> 4) & 0x07) as i32;
    let mantissa = (byte & 0x0F) as i32;
    let mut magnitude = ((mantissa << 3) + MULAW_BIAS) << exponent;
    magnitude -= MULAW_BIAS;
    let sample = if sign != 0 { -magnitude } else { magnitude };
    sample.clamp(i16::MIN as i32, i16::MAX as i32) as i16
}

fn alaw_encode_sample(sample: i16) -> u8 {
    let pcm = sample as i32;
    let (sign, magnitude) = if pcm < 0 { (0x00u8, (-pcm).min(0x7FFF)) } else { (0x80u8, pcm.min(0x7FFF)) };

    let mut segment: i32 = 0;
    while segment < 8 && magnitude > ALAW_SEG_END[segment as usize] {
        segment += 1;
    }

    let byte = if segment >= 8 {
        // Clipped to the top segment.
        sign | 0x7F
    } else if segment == 0 {
        let mantissa = (magnitude >> 1) & 0x0F;
        sign | mantissa as u8
    } else {
        let mantissa = (magnitude >> segment) & 0x0F;
        sign | ((segment as u8) << 4) | mantissa as u8
    };

    byte ^ 0x55
}

fn alaw_decode_sample(encoded: u8) -> i16 {
    let byte = encoded ^ 0x55;
    let sign = byte & 0x80;
    let segment = ((byte >> 4) & 0x07) as i32;
    let mantissa = (byte & 0x0F) as i32;

    let magnitude = if segment == 0 {
        (mantissa << 4) + 8
    } else {
        ((mantissa << 4) + 0x108) << (segment - 1)
    };

    let sample = if sign != 0 { magnitude } else { -magnitude };
    sample.clamp(i16::MIN as i32, i16::MAX as i32) as i16
}

static MULAW_DECODE_TABLE: Lazy<[i16; 256]> = Lazy::new(|| {
    let mut table = [0i16; 256];
    for (i, slot) in table.iter_mut().enumerate() {
        *slot = mulaw_decode_sample(i as u8);
    }
    table
});

static ALAW_DECODE_TABLE: Lazy<[i16; 256]> = Lazy::new(|| {
    let mut table = [0i16; 256];
    for (i, slot) in table.iter_mut().enumerate() {
        *slot = alaw_decode_sample(i as u8);
    }
    table
});

/// G.711 mu-law (PCMU) codec. Stateless, thread-safe, allocation per call
/// bounded by `len(input)`.
#[derive(Debug, Default, Clone, Copy)]
pub struct MuLawCodec;

impl AudioCodec for MuLawCodec {
    fn encode(&self, pcm: &[i16]) -> Result<Vec<u8>> {
        if pcm.is_empty() {
            return Err(CodecError::EmptyInput);
        }
        Ok(pcm.iter().map(|&s| mulaw_encode_sample(s)).collect())
    }

    fn decode(&self, data: &[u8]) -> Result<Vec<i16>> {
        if data.is_empty() {
            return Err(CodecError::EmptyInput);
        }
        Ok(data.iter().map(|&b| MULAW_DECODE_TABLE[b as usize]).collect())
    }

    fn info(&self) -> CodecInfo {
        CodecKind::Pcmu.info()
    }
}

/// G.711 A-law (PCMA) codec. Stateless, thread-safe, allocation per call
/// bounded by `len(input)`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ALawCodec;

impl AudioCodec for ALawCodec {
    fn encode(&self, pcm: &[i16]) -> Result<Vec<u8>> {
        if pcm.is_empty() {
            return Err(CodecError::EmptyInput);
        }
        Ok(pcm.iter().map(|&s| alaw_encode_sample(s)).collect())
    }

    fn decode(&self, data: &[u8]) -> Result<Vec<i16>> {
        if data.is_empty() {
            return Err(CodecError::EmptyInput);
        }
        Ok(data.iter().map(|&b| ALAW_DECODE_TABLE[b as usize]).collect())
    }

    fn info(&self) -> CodecInfo {
        CodecKind::Pcma.info()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn mulaw_zero_is_zero() {
        let codec = MuLawCodec;
        let encoded = codec.encode(&[0]).unwrap();
        let decoded = codec.decode(&encoded).unwrap();
        assert_eq!(decoded[0], 0);
    }

    #[test]
    fn alaw_zero_is_zero() {
        let codec = ALawCodec;
        let encoded = codec.encode(&[0]).unwrap();
        let decoded = codec.decode(&encoded).unwrap();
        assert_eq!(decoded[0], 0);
    }

    #[test]
    fn mulaw_0xff_decodes_near_zero() {
        // 0xFF is the all-ones mu-law byte; the canonical silence byte.
        assert_eq!(MULAW_DECODE_TABLE[0xFF], 0);
    }

    #[test]
    fn encode_never_allocates_more_than_input_len() {
        let pcm: Vec<i16> = (0..500).collect();
        assert_eq!(MuLawCodec.encode(&pcm).unwrap().len(), pcm.len());
        assert_eq!(ALawCodec.encode(&pcm).unwrap().len(), pcm.len());
    }

    proptest! {
        #[test]
        fn mulaw_round_trip_within_quantization_bound(sample in i16::MIN..i16::MAX) {
            let codec = MuLawCodec;
            let encoded = codec.encode(&[sample]).unwrap();
            let decoded = codec.decode(&encoded).unwrap()[0];
            // G.711 mu-law quantization error grows with segment; bound it
            // generously relative to magnitude rather than asserting a fixed epsilon.
            let bound = (sample as i32).unsigned_abs() as i64 / 16 + 32;
            assert!(((decoded as i64) - (sample as i64)).abs() <= bound);
        }

        #[test]
        fn alaw_round_trip_within_quantization_bound(sample in i16::MIN..i16::MAX) {
            let codec = ALawCodec;
            let encoded = codec.encode(&[sample]).unwrap();
            let decoded = codec.decode(&encoded).unwrap()[0];
            let bound = (sample as i32).unsigned_abs() as i64 / 16 + 32;
            assert!(((decoded as i64) - (sample as i64)).abs() <= bound);
        }
    }
}
