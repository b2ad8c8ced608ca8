//! Groups the audio bridge's fixed-size frames into caller utterances.
//!
//! The bridge and the websocket/media-streams adapters deliver audio in
//! small, constant-size chunks (one bridge frame, one websocket message).
//! [`ConversationEngine::process_audio`] and `process_audio_streaming` each
//! want one full utterance at a time, so something between the transport and
//! the engine has to decide where an utterance ends. This accumulator uses
//! the same RMS-energy technique `ConversationEngine::report_incoming_audio`
//! uses for barge-in, aimed at segmentation instead: it buffers frames after
//! the first one that crosses the energy threshold, and flushes once enough
//! trailing silence has elapsed.

fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_sq: f32 = samples.iter().map(|s| s * s).sum();
    (sum_sq / samples.len() as f32).sqrt()
}

pub struct UtteranceAccumulator {
    threshold: f32,
    silence_to_flush_ms: u32,
    frame_duration_ms: u32,
    samples: Vec<f32>,
    speech_seen: bool,
    silence_run_ms: u32,
}

impl UtteranceAccumulator {
    pub fn new(threshold: f32, silence_to_flush_ms: u32, frame_duration_ms: u32) -> Self {
        Self { threshold, silence_to_flush_ms, frame_duration_ms, samples: Vec::new(), speech_seen: false, silence_run_ms: 0 }
    }

    /// Feed one frame. Returns the accumulated utterance once speech has
    /// been seen and is followed by `silence_to_flush_ms` of quiet.
    pub fn push(&mut self, frame: &[f32]) -> Option<Vec<f32>> {
        self.samples.extend_from_slice(frame);

        if rms(frame) >= self.threshold {
            self.speech_seen = true;
            self.silence_run_ms = 0;
        } else if self.speech_seen {
            self.silence_run_ms += self.frame_duration_ms;
        }

        if self.speech_seen && self.silence_run_ms >= self.silence_to_flush_ms {
            self.speech_seen = false;
            self.silence_run_ms = 0;
            Some(std::mem::take(&mut self.samples))
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(energy: f32) -> Vec<f32> {
        vec![energy; 160]
    }

    #[test]
    fn silence_only_never_flushes() {
        let mut acc = UtteranceAccumulator::new(0.05, 200, 20);
        for _ in 0..50 {
            assert!(acc.push(&frame(0.0)).is_none());
        }
    }

    #[test]
    fn speech_then_silence_flushes_once() {
        let mut acc = UtteranceAccumulator::new(0.05, 100, 20);
        assert!(acc.push(&frame(0.2)).is_none());
        assert!(acc.push(&frame(0.2)).is_none());
        assert!(acc.push(&frame(0.0)).is_none());
        assert!(acc.push(&frame(0.0)).is_none());
        let utterance = acc.push(&frame(0.0)).expect("silence run reached threshold");
        assert_eq!(utterance.len(), 160 * 5);
    }

    #[test]
    fn resets_after_flush() {
        let mut acc = UtteranceAccumulator::new(0.05, 40, 20);
        acc.push(&frame(0.2));
        let first = acc.push(&frame(0.0)).unwrap();
        assert_eq!(first.len(), 160 * 2);
        assert!(acc.push(&frame(0.0)).is_none(), "no speech seen yet in the new utterance");
    }
}
