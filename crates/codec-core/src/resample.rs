//! Linear-interpolation resampling between telephony (8kHz) and AI-model
//! (16kHz) sample rates.

use crate::error::{CodecError, Result};

/// Sample rates this resampler has been validated against. Other rates are
/// rejected rather than silently producing garbage ratios.
const SUPPORTED_RATES: [u32; 2] = [8_000, 16_000];

/// Resample linear PCM from `rate_in` to `rate_out` using linear
/// interpolation. Output length is `floor(in_len * rate_out / rate_in)`,
/// matching the reference behavior exactly so callers can size buffers
/// ahead of time. Samples are clipped to the `i16` range.
pub fn resample(pcm: &[i16], rate_in: u32, rate_out: u32) -> Result<Vec<i16>> {
    if !SUPPORTED_RATES.contains(&rate_in) {
        return Err(CodecError::UnsupportedSampleRate {
            rate: rate_in,
            supported: SUPPORTED_RATES.to_vec(),
        });
    }
    if !SUPPORTED_RATES.contains(&rate_out) {
        return Err(CodecError::UnsupportedSampleRate {
            rate: rate_out,
            supported: SUPPORTED_RATES.to_vec(),
        });
    }
    if pcm.is_empty() {
        return Err(CodecError::EmptyInput);
    }
    if rate_in == rate_out {
        return Ok(pcm.to_vec());
    }

    let out_len = (pcm.len() as u64 * rate_out as u64 / rate_in as u64) as usize;
    let mut out = Vec::with_capacity(out_len);
    for i in 0..out_len {
        // Position in the input timeline, in input-sample units.
        let pos = i as f64 * rate_in as f64 / rate_out as f64;
        let idx = pos.floor() as usize;
        let frac = pos - idx as f64;

        let sample = if idx + 1 < pcm.len() {
            let a = pcm[idx] as f64;
            let b = pcm[idx + 1] as f64;
            a + (b - a) * frac
        } else {
            pcm[idx.min(pcm.len() - 1)] as f64
        };
        out.push(sample.round().clamp(i16::MIN as f64, i16::MAX as f64) as i16);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn output_length_matches_ratio() {
        let pcm: Vec<i16> = (0..160).collect();
        let up = resample(&pcm, 8_000, 16_000).unwrap();
        assert_eq!(up.len(), 320);
        let down = resample(&up, 16_000, 8_000).unwrap();
        assert_eq!(down.len(), 160);
    }

    #[test]
    fn same_rate_is_identity() {
        let pcm = vec![1i16, 2, 3, 4];
        assert_eq!(resample(&pcm, 8_000, 8_000).unwrap(), pcm);
    }

    #[test]
    fn rejects_unsupported_rate() {
        let pcm = vec![1i16, 2, 3];
        let err = resample(&pcm, 8_000, 44_100).unwrap_err();
        assert!(matches!(err, CodecError::UnsupportedSampleRate { rate: 44_100, .. }));
    }

    #[test]
    fn rejects_empty_input() {
        assert_eq!(resample(&[], 8_000, 16_000).unwrap_err(), CodecError::EmptyInput);
    }

    proptest! {
        #[test]
        fn upsample_then_downsample_preserves_length_and_is_bounded(
            pcm in prop::collection::vec(-30000i16..30000, 1..200)
        ) {
            let up = resample(&pcm, 8_000, 16_000).unwrap();
            let down = resample(&up, 16_000, 8_000).unwrap();
            prop_assert_eq!(down.len(), pcm.len());
            for &s in &down {
                prop_assert!(s >= i16::MIN && s <= i16::MAX);
            }
        }
    }
}
