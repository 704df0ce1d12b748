use moka::sync::Cache;
use std::time::Duration;

use crate::api::types::EvaluationResult;
use crate::flags::flag_context::ContextFingerprint;
use crate::metrics::consts::{FLAG_CACHE_HIT_COUNTER, FLAG_CACHE_MISS_COUNTER};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EvaluationCacheKey {
    /// Generation of the registry snapshot the result was computed against.
    generation: u64,
    flag_key: String,
    fingerprint: ContextFingerprint,
}

impl EvaluationCacheKey {
    pub fn new(generation: u64, flag_key: &str, fingerprint: ContextFingerprint) -> Self {
        EvaluationCacheKey {
            generation,
            flag_key: flag_key.to_string(),
            fingerprint,
        }
    }
}

/// In-memory memo of evaluation results using `moka`.
///
/// Features:
/// - **Generation-scoped keys**: every key carries the registry generation, so
///   a result computed against an older registry is unreachable once a newer
///   one is published, even if it lands in the cache after the clear.
/// - **Clear on write**: registry mutations call `invalidate_all`; there is no
///   per-key invalidation.
/// - **Optional TTL**: with a time-to-live set, entries also expire by age.
///   Without one the cache is purely invalidate-on-write.
/// - **Bounded**: least recently used entries are evicted past `max_entries`.
pub struct EvaluationCache {
    cache: Cache<EvaluationCacheKey, EvaluationResult>,
}

impl EvaluationCache {
    pub fn new(max_entries: u64, ttl: Option<Duration>) -> Self {
        let mut builder = Cache::builder().max_capacity(max_entries);
        if let Some(ttl) = ttl.filter(|ttl| !ttl.is_zero()) {
            builder = builder.time_to_live(ttl);
        }
        EvaluationCache {
            cache: builder.build(),
        }
    }

    pub fn get(&self, key: &EvaluationCacheKey) -> Option<EvaluationResult> {
        let cached = self.cache.get(key);
        match cached {
            Some(_) => metrics::counter!(FLAG_CACHE_HIT_COUNTER).increment(1),
            None => metrics::counter!(FLAG_CACHE_MISS_COUNTER).increment(1),
        }
        cached
    }

    pub fn insert(&self, key: EvaluationCacheKey, result: EvaluationResult) {
        self.cache.insert(key, result);
    }

    /// Drops every entry. Entries inserted before this call are never returned
    /// again, even before moka has physically evicted them.
    pub fn clear(&self) {
        self.cache.invalidate_all();
    }

    /// Number of live entries after flushing moka's pending maintenance.
    pub fn entry_count(&self) -> u64 {
        self.cache.run_pending_tasks();
        self.cache.entry_count()
    }
}
