//! Demultiplexes the audio bridge's single `on_audio_received` callback
//! across inbound calls and outbound calls claimed by the dialer driver.
//!
//! [`AudioBridge`] holds one callback slot per event, shared by every
//! connection it accepts; installing a second one replaces the first
//! instead of composing with it. Everything that wants per-call audio
//! installs against this router instead of the bridge directly.

use std::sync::Arc;

use callcore_media::{AudioBridge, CallId};
use dashmap::DashMap;
use tokio::sync::mpsc;

pub struct AudioRouter {
    claimed: DashMap<CallId, mpsc::UnboundedSender<Vec<f32>>>,
}

impl AudioRouter {
    /// Installs the bridge's only `on_audio_received` callback. Frames for a
    /// claimed call go to that call's channel; everything else is forwarded
    /// on `unclaimed` for the inbound-call path to pick up.
    pub fn install(bridge: &AudioBridge, unclaimed: mpsc::UnboundedSender<(CallId, Vec<f32>)>) -> Arc<Self> {
        let router = Arc::new(Self { claimed: DashMap::new() });
        let for_callback = router.clone();
        bridge.on_audio_received(move |call_id, samples| {
            if let Some(sender) = for_callback.claimed.get(&call_id) {
                let _ = sender.send(samples);
            } else {
                let _ = unclaimed.send((call_id, samples));
            }
        });
        router
    }

    /// Claims a call's audio for exclusive delivery, e.g. for the duration
    /// of an outbound conversation. Must be released once the call ends.
    pub fn claim(&self, call_id: CallId) -> mpsc::UnboundedReceiver<Vec<f32>> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.claimed.insert(call_id, tx);
        rx
    }

    pub fn release(&self, call_id: CallId) {
        self.claimed.remove(&call_id);
    }
}
