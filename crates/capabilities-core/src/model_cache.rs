//! Bounded LRU cache of loaded model instances (spec §5: "implementations
//! that are not re-entrant must be wrapped with internal queues. A bounded
//! LRU cache of model instances (default max 2 loaded) with eviction on
//! miss is REQUIRED for the dialect-routed STT use case.").
//!
//! Keyed by an opaque model key (e.g. a language or dialect tag); values
//! are whatever `Arc<dyn Stt>`/`Arc<dyn Tts>` the loader produces. Loading
//! is caller-supplied so this crate never has to know how a model is
//! constructed.

use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;

use lru::LruCache;
use parking_lot::Mutex;
use tracing::debug;

use crate::error::Result;

const DEFAULT_CAPACITY: usize = 2;

/// Caches up to `capacity` loaded model instances, evicting the
/// least-recently-used entry on a miss once full.
pub struct ModelCache<K, V> {
    cache: Mutex<LruCache<K, Arc<V>>>,
}

impl<K, V> ModelCache<K, V>
where
    K: Eq + Hash + Clone + Send + Sync,
    V: Send + Sync,
{
    pub fn new(capacity: usize) -> Self {
        let capacity = std::num::NonZeroUsize::new(capacity.max(1)).expect("capacity is at least 1");
        Self {
            cache: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Fetch a cached instance for `key`, loading it via `loader` on a
    /// miss. Loading happens outside the lock so a slow load never blocks
    /// lookups of other keys.
    pub async fn get_or_load<F, Fut>(&self, key: K, loader: F) -> Result<Arc<V>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V>>,
    {
        if let Some(hit) = self.cache.lock().get(&key).cloned() {
            return Ok(hit);
        }

        let loaded = Arc::new(loader().await?);
        let mut cache = self.cache.lock();
        if cache.push(key, loaded.clone()).is_some() {
            debug!("model cache evicted an entry to make room");
        }
        Ok(loaded)
    }

    pub fn len(&self) -> usize {
        self.cache.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<K, V> Default for ModelCache<K, V>
where
    K: Eq + Hash + Clone + Send + Sync,
    V: Send + Sync,
{
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn second_lookup_of_same_key_does_not_reload() {
        let cache: ModelCache<String, usize> = ModelCache::new(2);
        let loads = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let loads = loads.clone();
            cache
                .get_or_load("de".to_string(), move || {
                    loads.fetch_add(1, Ordering::SeqCst);
                    async move { Ok(42) }
                })
                .await
                .unwrap();
        }

        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn exceeding_capacity_evicts_least_recently_used() {
        let cache: ModelCache<&'static str, usize> = ModelCache::new(2);
        cache.get_or_load("en", || async { Ok(1) }).await.unwrap();
        cache.get_or_load("de", || async { Ok(2) }).await.unwrap();
        cache.get_or_load("fr", || async { Ok(3) }).await.unwrap();

        assert_eq!(cache.len(), 2);

        let loads = Arc::new(AtomicUsize::new(0));
        let loads_clone = loads.clone();
        cache
            .get_or_load("en", move || {
                loads_clone.fetch_add(1, Ordering::SeqCst);
                async move { Ok(1) }
            })
            .await
            .unwrap();
        assert_eq!(loads.load(Ordering::SeqCst), 1, "english was evicted and had to reload");
    }
}
