//! Hybrid recommendation engine.
//!
//! One suggestion request walks `COLLECT_SIGNALS -> MERGE -> (if empty)
//! FALLBACK -> RANKED_RESULT`. Collaborative and content-based scoring are
//! pure over their inputs; the only external calls are the neighbor lookup
//! in the like store and the fallback search, which is bounded by a timeout.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::{
    error::AppResult,
    models::{LikedSong, NeighborLike, Recommendation, Song, SongId},
    services::providers::SongSearcher,
};

pub mod cache;
pub mod collaborative;
pub mod fallback;
pub mod hybrid;
pub mod similarity;

pub use cache::{FeatureCache, SearchCache};
pub use collaborative::{rank_neighbor_suggestions, CollaborativeFilter};
pub use fallback::FallbackPolicy;
pub use hybrid::{HybridRanker, ScoringPolicy};
pub use similarity::SimilarityEngine;

/// Upper bound on songs requested from the fallback search in one call
const MAX_FALLBACK_FETCH: usize = 50;

/// Read access to persisted likes
#[async_trait::async_trait]
pub trait LikeStore: Send + Sync {
    /// Liked songs of a user, most recent first
    async fn get_user_likes(&self, user_id: &str) -> AppResult<Vec<LikedSong>>;

    async fn get_user_like_ids(&self, user_id: &str) -> AppResult<HashSet<SongId>>;

    /// Every like of every other user who liked at least one of `song_ids`
    async fn get_neighbor_likes(
        &self,
        user_id: &str,
        song_ids: &HashSet<SongId>,
    ) -> AppResult<Vec<NeighborLike>>;
}

/// Source of the songs a request may recommend from
#[async_trait::async_trait]
pub trait CandidateProvider: Send + Sync {
    /// Most recently updated songs first
    async fn get_candidate_songs(&self, limit: usize) -> AppResult<Vec<Song>>;
}

/// Engine tuning
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Shared likes needed for another user to count as a neighbor
    pub min_overlap: usize,
    pub collaborative_limit: usize,
    pub content_limit: usize,
    /// Content-based candidates must score strictly above this
    pub min_similarity: f64,
    pub scoring: ScoringPolicy,
    pub fallback_enabled: bool,
    pub fallback_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            min_overlap: 2,
            collaborative_limit: 30,
            content_limit: 15,
            min_similarity: 0.0,
            scoring: ScoringPolicy::default(),
            fallback_enabled: true,
            fallback_timeout: Duration::from_secs(8),
        }
    }
}

/// Final outcome of a suggestion request
#[derive(Debug, Clone, PartialEq)]
pub enum SuggestionOutcome {
    Ranked(Vec<Recommendation>),
    /// Every source, fallback included, came back empty
    NoSuggestions,
}

impl SuggestionOutcome {
    pub fn into_vec(self) -> Vec<Recommendation> {
        match self {
            SuggestionOutcome::Ranked(recommendations) => recommendations,
            SuggestionOutcome::NoSuggestions => Vec::new(),
        }
    }
}

pub struct RecommendationEngine {
    config: EngineConfig,
    collaborative: CollaborativeFilter,
    similarity: SimilarityEngine,
    ranker: HybridRanker,
    fallback: FallbackPolicy,
}

impl RecommendationEngine {
    pub fn new(
        config: EngineConfig,
        like_store: Arc<dyn LikeStore>,
        searcher: Arc<dyn SongSearcher>,
    ) -> Self {
        Self {
            collaborative: CollaborativeFilter::new(like_store, config.min_overlap),
            similarity: SimilarityEngine::new().with_min_similarity(config.min_similarity),
            ranker: HybridRanker::new(config.scoring),
            fallback: FallbackPolicy::new(searcher, config.fallback_timeout),
            config,
        }
    }

    /// Attaches caches owned by the host application
    pub fn with_caches(mut self, features: Arc<FeatureCache>, searches: Arc<SearchCache>) -> Self {
        self.similarity = self.similarity.with_cache(features);
        self.fallback = self.fallback.with_cache(searches);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Ranked suggestions for a user
    ///
    /// Only songs from `candidate_pool` that the user has not liked are
    /// returned, unless the fallback kicks in. An empty history or pool
    /// short-circuits to an empty result without consulting the fallback.
    pub async fn recommend(
        &self,
        user_id: &str,
        user_likes: &[Song],
        candidate_pool: &[Song],
        genre: Option<&str>,
        top_n: usize,
    ) -> Vec<Recommendation> {
        if user_likes.is_empty() || candidate_pool.is_empty() || top_n == 0 {
            tracing::debug!(
                user_id = %user_id,
                likes = user_likes.len(),
                pool = candidate_pool.len(),
                "Nothing to score"
            );
            return Vec::new();
        }

        let start = Instant::now();
        let like_ids: HashSet<SongId> = user_likes.iter().map(|s| s.id.clone()).collect();
        let pool_ids: HashSet<SongId> = candidate_pool.iter().map(|s| s.id.clone()).collect();

        // COLLECT_SIGNALS
        let collaborative = self
            .collaborative
            .find_neighbor_suggestions(
                user_id,
                &like_ids,
                Some(&pool_ids),
                self.config.collaborative_limit,
            )
            .await;

        let mut content_based = self.similarity.vectorize_and_score(user_likes, candidate_pool);
        content_based.truncate(self.config.content_limit);

        // MERGE
        let merged = self.ranker.merge(&collaborative, &content_based, top_n);

        tracing::info!(
            user_id = %user_id,
            collaborative = collaborative.len(),
            content_based = content_based.len(),
            merged = merged.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Signals merged"
        );

        if !merged.is_empty() {
            return merged;
        }

        // FALLBACK
        if !self.config.fallback_enabled {
            return merged;
        }
        tracing::warn!(user_id = %user_id, "No personalized suggestions, triggering fallback");

        // Over-fetch so that dropping already liked songs can still fill `top_n`
        let fetch = (top_n + like_ids.len()).min(MAX_FALLBACK_FETCH).max(top_n);
        let mut popular: Vec<Recommendation> = self
            .fallback
            .fallback(genre, fetch)
            .await
            .into_iter()
            .filter(|rec| !like_ids.contains(&rec.video_id))
            .collect();
        popular.truncate(top_n);
        popular
    }

    /// Like [`recommend`](Self::recommend), with the empty result made explicit
    pub async fn suggest(
        &self,
        user_id: &str,
        user_likes: &[Song],
        candidate_pool: &[Song],
        genre: Option<&str>,
        top_n: usize,
    ) -> SuggestionOutcome {
        let recommendations = self
            .recommend(user_id, user_likes, candidate_pool, genre, top_n)
            .await;

        if recommendations.is_empty() {
            SuggestionOutcome::NoSuggestions
        } else {
            SuggestionOutcome::Ranked(recommendations)
        }
    }
}
