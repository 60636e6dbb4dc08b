use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::translation::domain::caption_generator::{CaptionError, CaptionGenerator};
use crate::translation::domain::caption_style::CaptionStyle;
use crate::translation::domain::ttl_cache::TtlCache;

/// Decorator that remembers generation results per (gloss, style) for a TTL.
///
/// Failures are remembered too, so a down service is retried at most once
/// per TTL and per key instead of on every high-confidence frame. The
/// cache is shared across sessions. Concurrent misses on one key wait for
/// a single call to the inner generator.
pub struct CachedCaptionGenerator {
    inner: Arc<dyn CaptionGenerator>,
    cache: TtlCache<CacheKey, Result<String, CaptionError>>,
    in_flight: Mutex<HashMap<CacheKey, Arc<Mutex<()>>>>,
}

type CacheKey = (String, CaptionStyle);

impl CachedCaptionGenerator {
    pub fn new(inner: Arc<dyn CaptionGenerator>, ttl: Duration) -> Self {
        Self {
            inner,
            cache: TtlCache::new(ttl),
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    pub fn generate_at(
        &self,
        gloss: &str,
        style: CaptionStyle,
        now: Instant,
    ) -> Result<String, CaptionError> {
        let key = (gloss.to_string(), style);
        if let Some(cached) = self.cache.get_at(&key, now) {
            return from_cache(cached);
        }

        let key_lock = self.key_lock(&key);
        let result = {
            let _guard = key_lock.lock().unwrap_or_else(|e| e.into_inner());
            match self.cache.get_at(&key, now) {
                Some(cached) => from_cache(cached),
                None => {
                    let result = self.inner.generate(gloss, style);
                    if let Err(ref e) = result {
                        log::warn!("Caption generation failed for {gloss} ({style}): {e}");
                    }
                    self.cache.insert_at(key.clone(), result.clone(), now);
                    result
                }
            }
        };
        self.release_key_lock(&key, key_lock);
        result
    }

    fn key_lock(&self, key: &CacheKey) -> Arc<Mutex<()>> {
        let mut in_flight = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        in_flight.entry(key.clone()).or_default().clone()
    }

    fn release_key_lock(&self, key: &CacheKey, key_lock: Arc<Mutex<()>>) {
        let mut in_flight = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        // Only the map and this caller still hold it.
        if Arc::strong_count(&key_lock) == 2 {
            in_flight.remove(key);
        }
    }
}

fn from_cache(cached: Result<String, CaptionError>) -> Result<String, CaptionError> {
    cached.map_err(|e| match e {
        CaptionError::Unavailable => CaptionError::Unavailable,
        _ => CaptionError::CoolingDown,
    })
}

impl CaptionGenerator for CachedCaptionGenerator {
    fn generate(&self, gloss: &str, style: CaptionStyle) -> Result<String, CaptionError> {
        self.generate_at(gloss, style, Instant::now())
    }
}
