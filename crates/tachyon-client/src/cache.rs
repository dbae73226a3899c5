//! In-memory response cache with TTL-based expiration.
//!
//! Holds the raw bodies of successful GET responses keyed by request
//! identity. The cache is bounded: once `capacity` entries are held the
//! least recently used one is evicted. Expired entries are removed when they
//! are looked up. Invalidation is coarse: mutations and usecase switches
//! clear everything and bump the cache generation, so a response fetched
//! before the clear is never written back afterwards.

use std::num::NonZeroUsize;
use std::time::{Duration, Instant};

use bytes::Bytes;
use lru::LruCache;
use reqwest::Method;
use tokio::sync::RwLock;
use tracing::debug;

/// Identity of a cacheable request: method, absolute URL and query params.
///
/// The URL embeds the usecase, so entries of different tenants never share
/// a key.
pub fn cache_key(method: &Method, url: &str, params: Option<&serde_json::Value>) -> String {
    let params = params
        .map(|p| p.to_string())
        .unwrap_or_else(|| "null".to_string());
    format!("{}-{}-{}", method.as_str().to_ascii_lowercase(), url, params)
}

/// Cached body with the instant it was stored.
#[derive(Debug, Clone)]
struct CacheEntry {
    data: Bytes,
    stored_at: Instant,
}

impl CacheEntry {
    fn is_expired(&self, ttl: Duration) -> bool {
        self.stored_at.elapsed() > ttl
    }
}

/// Cache statistics for diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

#[derive(Debug)]
struct CacheState {
    entries: LruCache<String, CacheEntry>,
    /// Bumped by every clear.
    generation: u64,
    hits: u64,
    misses: u64,
}

/// Thread-safe response cache.
#[derive(Debug)]
pub struct ResponseCache {
    state: RwLock<CacheState>,
    ttl: Duration,
}

impl ResponseCache {
    /// Create a cache holding at most `capacity` entries for `ttl` each.
    ///
    /// A zero `ttl` disables caching: nothing is stored and every lookup
    /// misses. A zero `capacity` is treated as one.
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            state: RwLock::new(CacheState {
                entries: LruCache::new(capacity),
                generation: 0,
                hits: 0,
                misses: 0,
            }),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn is_enabled(&self) -> bool {
        !self.ttl.is_zero()
    }

    /// Current generation. Capture it before fetching a response that will
    /// be stored with [`put`](Self::put).
    pub async fn generation(&self) -> u64 {
        self.state.read().await.generation
    }

    /// Look up a fresh entry; an expired one is removed and reported as a miss.
    pub async fn get(&self, key: &str) -> Option<Bytes> {
        let mut state = self.state.write().await;
        if !self.is_enabled() {
            state.misses += 1;
            return None;
        }

        let found = state
            .entries
            .get(key)
            .map(|entry| (entry.data.clone(), entry.is_expired(self.ttl)));

        match found {
            Some((data, false)) => {
                state.hits += 1;
                debug!(cache = "hit", key = %key, "Cache HIT");
                Some(data)
            }
            Some((_, true)) => {
                state.entries.pop(key);
                state.misses += 1;
                debug!(cache = "expired", key = %key, "Cache entry expired");
                None
            }
            None => {
                state.misses += 1;
                debug!(cache = "miss", key = %key, "Cache MISS");
                None
            }
        }
    }

    /// Store a response body under `key`, stamped with the current instant.
    ///
    /// `generation` is the value of [`generation`](Self::generation) taken
    /// before the response was requested. If the cache was cleared since,
    /// the body may predate a mutation and is dropped.
    pub async fn put(&self, key: String, data: Bytes, generation: u64) {
        if !self.is_enabled() {
            return;
        }
        let mut state = self.state.write().await;
        if state.generation != generation {
            debug!(
                key = %key,
                fetched_in = generation,
                current = state.generation,
                "Cache cleared while fetching, not storing"
            );
            return;
        }
        debug!(key = %key, bytes = data.len(), "Cache SET");
        let entry = CacheEntry {
            data,
            stored_at: Instant::now(),
        };
        if let Some((evicted, _)) = state.entries.push(key.clone(), entry) {
            if evicted != key {
                debug!(cache = "evicted", key = %evicted, "Cache EVICT");
            }
        }
    }

    /// Drop every entry and start a new generation.
    pub async fn clear(&self) {
        let mut state = self.state.write().await;
        let dropped = state.entries.len();
        state.entries.clear();
        state.generation += 1;
        debug!(
            cache = "cleared",
            cache_entries = dropped,
            generation = state.generation,
            "Cache cleared"
        );
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn capacity(&self) -> usize {
        self.state.read().await.entries.cap().get()
    }

    pub async fn stats(&self) -> CacheStats {
        let state = self.state.read().await;
        CacheStats {
            hits: state.hits,
            misses: state.misses,
            entries: state.entries.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(s: &'static str) -> Bytes {
        Bytes::from_static(s.as_bytes())
    }

    #[test]
    fn test_cache_key_includes_method_url_and_params() {
        let url = "http://h/api/v1/usecases/a/datasets";
        assert_eq!(
            cache_key(&Method::GET, url, None),
            "get-http://h/api/v1/usecases/a/datasets-null"
        );
        let params = serde_json::json!({"page": 2});
        assert_ne!(
            cache_key(&Method::GET, url, Some(&params)),
            cache_key(&Method::GET, url, None)
        );
        assert_ne!(
            cache_key(&Method::GET, url, None),
            cache_key(&Method::GET, "http://h/api/v1/usecases/b/datasets", None)
        );
    }

    #[tokio::test]
    async fn test_hit_returns_identical_bytes() {
        let cache = ResponseCache::new(16, Duration::from_secs(60));
        cache.put("k".into(), body("[1,2,3]"), 0).await;

        let first = cache.get("k").await.unwrap();
        let second = cache.get("k").await.unwrap();
        assert_eq!(first, second);
        assert_eq!(&first[..], b"[1,2,3]");

        let stats = cache.stats().await;
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.entries, 1);
    }

    #[tokio::test]
    async fn test_expired_entry_is_evicted() {
        let cache = ResponseCache::new(16, Duration::from_millis(20));
        cache.put("k".into(), body("x"), 0).await;
        tokio::time::sleep(Duration::from_millis(40)).await;

        assert!(cache.get("k").await.is_none());
        assert!(cache.is_empty().await);
        assert_eq!(cache.stats().await.misses, 1);
    }

    #[tokio::test]
    async fn test_zero_ttl_disables_cache() {
        let cache = ResponseCache::new(16, Duration::ZERO);
        cache.put("k".into(), body("x"), 0).await;
        assert!(cache.get("k").await.is_none());
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_clear_drops_everything() {
        let cache = ResponseCache::new(16, Duration::from_secs(60));
        cache.put("a".into(), body("1"), 0).await;
        cache.put("b".into(), body("2"), 0).await;
        assert_eq!(cache.len().await, 2);

        cache.clear().await;
        assert!(cache.get("a").await.is_none());
        assert!(cache.get("b").await.is_none());
    }

    #[tokio::test]
    async fn test_put_from_before_clear_is_dropped() {
        let cache = ResponseCache::new(16, Duration::from_secs(60));
        let before = cache.generation().await;

        cache.clear().await;
        cache.put("k".into(), body("stale"), before).await;
        assert!(cache.get("k").await.is_none());

        let now = cache.generation().await;
        assert_eq!(now, before + 1);
        cache.put("k".into(), body("fresh"), now).await;
        assert_eq!(&cache.get("k").await.unwrap()[..], b"fresh");
    }

    #[tokio::test]
    async fn test_capacity_evicts_least_recently_used() {
        let cache = ResponseCache::new(2, Duration::from_secs(60));
        assert_eq!(cache.capacity().await, 2);
        cache.put("a".into(), body("1"), 0).await;
        cache.put("b".into(), body("2"), 0).await;

        // Touch "a" so "b" becomes the eviction candidate.
        assert!(cache.get("a").await.is_some());
        cache.put("c".into(), body("3"), 0).await;

        assert_eq!(cache.len().await, 2);
        assert!(cache.get("a").await.is_some());
        assert!(cache.get("b").await.is_none());
        assert!(cache.get("c").await.is_some());
    }

    #[tokio::test]
    async fn test_zero_capacity_keeps_one_entry() {
        let cache = ResponseCache::new(0, Duration::from_secs(60));
        cache.put("a".into(), body("1"), 0).await;
        cache.put("b".into(), body("2"), 0).await;
        assert_eq!(cache.len().await, 1);
        assert!(cache.get("b").await.is_some());
    }
}
