use lru::LruCache;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

use crate::models::{Recommendation, Song, SongId};

/// Tokens of one song plus a fingerprint of the metadata they were built from
struct CachedTokens {
    fingerprint: u64,
    tokens: Arc<Vec<String>>,
}

/// Bounded per-song cache of feature tokens
///
/// Entries are validated against a fingerprint of the song's metadata, so a
/// refreshed title, artist, genre or tag list is recomputed instead of served stale.
/// A capacity of zero disables caching.
pub struct FeatureCache {
    inner: Option<Mutex<LruCache<SongId, CachedTokens>>>,
}

impl FeatureCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: NonZeroUsize::new(capacity).map(|cap| Mutex::new(LruCache::new(cap))),
        }
    }

    pub fn disabled() -> Self {
        Self { inner: None }
    }

    /// Returns the cached tokens for `song`, computing and storing them on a miss
    pub fn get_or_compute<F>(&self, song: &Song, compute: F) -> Arc<Vec<String>>
    where
        F: FnOnce(&Song) -> Vec<String>,
    {
        let Some(inner) = &self.inner else {
            return Arc::new(compute(song));
        };

        let fingerprint = metadata_fingerprint(song);
        {
            let mut cache = inner.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(entry) = cache.get(&song.id) {
                if entry.fingerprint == fingerprint {
                    return Arc::clone(&entry.tokens);
                }
            }
        }

        // Computed outside the lock; a concurrent miss on the same song just does the work twice
        let tokens = Arc::new(compute(song));
        let mut cache = inner.lock().unwrap_or_else(PoisonError::into_inner);
        cache.put(
            song.id.clone(),
            CachedTokens {
                fingerprint,
                tokens: Arc::clone(&tokens),
            },
        );
        tokens
    }

    pub fn len(&self) -> usize {
        self.inner
            .as_ref()
            .map(|inner| inner.lock().unwrap_or_else(PoisonError::into_inner).len())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for FeatureCache {
    fn default() -> Self {
        Self::disabled()
    }
}

fn metadata_fingerprint(song: &Song) -> u64 {
    let mut hasher = DefaultHasher::new();
    song.title.hash(&mut hasher);
    song.artist.hash(&mut hasher);
    song.genre.hash(&mut hasher);
    song.tags.hash(&mut hasher);
    hasher.finish()
}

/// Fallback answers older than this are refetched
pub const DEFAULT_SEARCH_TTL: Duration = Duration::from_secs(3600);

struct CachedSearch {
    stored_at: Instant,
    results: Vec<Recommendation>,
}

/// Bounded cache of fallback search results keyed by query and result limit
///
/// Entries expire `ttl` after insertion so popular-song answers follow the charts.
pub struct SearchCache {
    inner: Option<Mutex<LruCache<(String, usize), CachedSearch>>>,
    ttl: Duration,
}

impl SearchCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: NonZeroUsize::new(capacity).map(|cap| Mutex::new(LruCache::new(cap))),
            ttl: DEFAULT_SEARCH_TTL,
        }
    }

    pub fn disabled() -> Self {
        Self {
            inner: None,
            ttl: DEFAULT_SEARCH_TTL,
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn get(&self, query: &str, limit: usize) -> Option<Vec<Recommendation>> {
        let inner = self.inner.as_ref()?;
        let key = (query.to_lowercase(), limit);
        let mut cache = inner.lock().unwrap_or_else(PoisonError::into_inner);

        let expired = cache.get(&key)?.stored_at.elapsed() >= self.ttl;
        if expired {
            cache.pop(&key);
            return None;
        }
        cache.get(&key).map(|entry| entry.results.clone())
    }

    pub fn insert(&self, query: &str, limit: usize, results: Vec<Recommendation>) {
        if let Some(inner) = &self.inner {
            let mut cache = inner.lock().unwrap_or_else(PoisonError::into_inner);
            cache.put(
                (query.to_lowercase(), limit),
                CachedSearch {
                    stored_at: Instant::now(),
                    results,
                },
            );
        }
    }
}

impl Default for SearchCache {
    fn default() -> Self {
        Self::disabled()
    }
}
