use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use super::cache::SearchCache;
use crate::models::{Recommendation, SongId};
use crate::services::providers::SongSearcher;

/// Score given to every fallback entry; there is no personal signal to rank by
pub const FALLBACK_SCORE: f64 = 1.0;

const GLOBAL_QUERY: &str = "Top Global Hits";

/// Non-personalized suggestions used when neither signal source produced anything
pub struct FallbackPolicy {
    searcher: Arc<dyn SongSearcher>,
    timeout: Duration,
    cache: Arc<SearchCache>,
}

impl FallbackPolicy {
    pub fn new(searcher: Arc<dyn SongSearcher>, timeout: Duration) -> Self {
        Self {
            searcher,
            timeout,
            cache: Arc::new(SearchCache::disabled()),
        }
    }

    pub fn with_cache(mut self, cache: Arc<SearchCache>) -> Self {
        self.cache = cache;
        self
    }

    /// Search query for the given genre, or the global query without one
    pub fn query_for(genre: Option<&str>) -> String {
        match genre.map(str::trim) {
            Some(genre) if !genre.is_empty() => format!("Top {} songs", genre),
            _ => GLOBAL_QUERY.to_string(),
        }
    }

    /// Popular songs for `genre`, each scored uniformly
    ///
    /// Never fails: search errors, timeouts and empty answers all yield an
    /// empty list.
    pub async fn fallback(&self, genre: Option<&str>, limit: usize) -> Vec<Recommendation> {
        if limit == 0 {
            return Vec::new();
        }

        let query = Self::query_for(genre);
        if let Some(cached) = self.cache.get(&query, limit) {
            tracing::debug!(query = %query, "Fallback cache hit");
            return cached;
        }

        tracing::info!(
            query = %query,
            provider = self.searcher.name(),
            "Executing fallback search"
        );

        let hits = match tokio::time::timeout(self.timeout, self.searcher.search(&query, limit)).await {
            Ok(Ok(hits)) => hits,
            Ok(Err(e)) => {
                tracing::warn!(query = %query, error = %e, "Fallback search failed");
                return Vec::new();
            }
            Err(_) => {
                tracing::warn!(
                    query = %query,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "Fallback search timed out"
                );
                return Vec::new();
            }
        };

        let mut seen: HashSet<SongId> = HashSet::new();
        let results: Vec<Recommendation> = hits
            .into_iter()
            .filter(|hit| seen.insert(hit.video_id.clone()))
            .take(limit)
            .map(|hit| Recommendation {
                title: hit.title,
                artist: hit.artist,
                video_id: hit.video_id,
                score: FALLBACK_SCORE,
            })
            .collect();

        if results.is_empty() {
            tracing::info!(query = %query, "Fallback search returned nothing");
        } else {
            self.cache.insert(&query, limit, results.clone());
        }

        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::models::SearchHit;
    use crate::services::providers::MockSongSearcher;
    use mockall::predicate::{eq, function};

    fn hit(id: &str) -> SearchHit {
        SearchHit {
            video_id: SongId::new(id),
            title: format!("Hit {}", id),
            artist: "Channel".to_string(),
        }
    }

    fn mock_searcher() -> MockSongSearcher {
        let mut searcher = MockSongSearcher::new();
        searcher.expect_name().return_const("mock");
        searcher
    }

    #[test]
    fn test_query_for_genre() {
        assert_eq!(FallbackPolicy::query_for(Some("Rock")), "Top Rock songs");
        assert_eq!(FallbackPolicy::query_for(None), "Top Global Hits");
        assert_eq!(FallbackPolicy::query_for(Some("  ")), "Top Global Hits");
    }

    #[tokio::test]
    async fn test_fallback_uses_genre_query_and_uniform_score() {
        let mut searcher = mock_searcher();
        searcher
            .expect_search()
            .with(function(|q: &str| q == "Top Jazz songs"), eq(3usize))
            .times(1)
            .returning(|_, _| Ok(vec![hit("j1"), hit("j2"), hit("j1")]));

        let policy = FallbackPolicy::new(Arc::new(searcher), Duration::from_secs(1));
        let results = policy.fallback(Some("Jazz"), 3).await;

        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.score == FALLBACK_SCORE));
        assert_eq!(results[0].video_id, SongId::new("j1"));
    }

    #[tokio::test]
    async fn test_fallback_search_error_yields_empty() {
        let mut searcher = mock_searcher();
        searcher
            .expect_search()
            .returning(|_, _| Err(AppError::ExternalApi("quota exceeded".to_string())));

        let policy = FallbackPolicy::new(Arc::new(searcher), Duration::from_secs(1));
        assert!(policy.fallback(None, 10).await.is_empty());
    }

    #[tokio::test]
    async fn test_fallback_caches_non_empty_results() {
        let mut searcher = mock_searcher();
        searcher
            .expect_search()
            .times(1)
            .returning(|_, _| Ok(vec![hit("g1")]));

        let policy = FallbackPolicy::new(Arc::new(searcher), Duration::from_secs(1))
            .with_cache(Arc::new(SearchCache::new(8)));

        let first = policy.fallback(None, 5).await;
        let second = policy.fallback(None, 5).await;
        assert_eq!(first, second);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_cache_entry_is_searched_again() {
        let mut searcher = mock_searcher();
        searcher
            .expect_search()
            .times(1)
            .returning(|_, _| Ok(vec![hit("old")]));
        searcher
            .expect_search()
            .times(1)
            .returning(|_, _| Ok(vec![hit("new")]));

        let cache = SearchCache::new(8).with_ttl(Duration::from_secs(300));
        let policy = FallbackPolicy::new(Arc::new(searcher), Duration::from_secs(1))
            .with_cache(Arc::new(cache));

        assert_eq!(policy.fallback(None, 5).await[0].video_id, SongId::new("old"));
        assert_eq!(policy.fallback(None, 5).await[0].video_id, SongId::new("old"));

        tokio::time::advance(Duration::from_secs(301)).await;
        assert_eq!(policy.fallback(None, 5).await[0].video_id, SongId::new("new"));
    }

    #[tokio::test]
    async fn test_zero_limit_skips_search() {
        let searcher = mock_searcher();
        let policy = FallbackPolicy::new(Arc::new(searcher), Duration::from_secs(1));
        assert!(policy.fallback(Some("Pop"), 0).await.is_empty());
    }
}
