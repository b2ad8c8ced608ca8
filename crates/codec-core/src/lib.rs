//! Telephony audio codecs and sample-rate conversion.
//!
//! Every codec in this crate implements [`AudioCodec`](types::AudioCodec)
//! against `i16` linear PCM, so the rest of the media plane never has to
//! know which wire format a call happens to be using.

mod error;
mod g711;
mod g722;
mod l16;
mod resample;
mod types;

pub use error::{CodecError, Result};
pub use g711::{ALawCodec, MuLawCodec};
pub use g722::G722Codec;
pub use l16::L16Codec;
pub use resample::resample;
pub use types::{AudioCodec, CodecInfo, CodecKind};

/// Construct the codec implementation for a given [`CodecKind`].
pub fn codec_for(kind: CodecKind) -> Box<dyn AudioCodec> {
    match kind {
        CodecKind::Pcmu => Box::new(MuLawCodec),
        CodecKind::Pcma => Box::new(ALawCodec),
        CodecKind::G722 => Box::new(G722Codec::new()),
        CodecKind::L16 => Box::new(L16Codec),
    }
}

pub mod prelude {
    pub use crate::{codec_for, resample, ALawCodec, AudioCodec, CodecError, CodecInfo, CodecKind, G722Codec, L16Codec, MuLawCodec};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codec_for_every_kind_round_trips() {
        for kind in [CodecKind::Pcmu, CodecKind::Pcma, CodecKind::G722, CodecKind::L16] {
            let codec = codec_for(kind);
            let pcm = vec![100i16, -200, 300, -400];
            let encoded = codec.encode(&pcm).unwrap();
            let decoded = codec.decode(&encoded).unwrap();
            assert_eq!(decoded.len(), pcm.len(), "kind {kind:?}");
        }
    }
}
