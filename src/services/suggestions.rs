use std::sync::Arc;

use crate::{
    db::{LikeWriter, MusicStore},
    engine::{CandidateProvider, LikeStore, RecommendationEngine, SuggestionOutcome},
    error::{AppError, AppResult},
    models::{LikedSong, Recommendation, Song, SongId, SuggestionRequest},
    services::providers::SongSearcher,
};

pub const DEFAULT_NUM_SUGGESTIONS: usize = 10;
pub const MAX_NUM_SUGGESTIONS: usize = 50;
pub const MAX_LIKED_SONGS: usize = 50;
pub const MAX_USER_ID_CHARS: usize = 128;

const NO_SUGGESTIONS_MESSAGE: &str = "Could not find personalized suggestions for the provided songs.";

/// Validates a user identifier taken from a request body or path
pub fn validate_user_id(user_id: &str) -> AppResult<&str> {
    let user_id = user_id.trim();
    if user_id.is_empty() {
        return Err(AppError::InvalidInput("user_id must not be empty".to_string()));
    }
    if user_id.chars().count() > MAX_USER_ID_CHARS {
        return Err(AppError::InvalidInput(format!(
            "user_id must be at most {} characters",
            MAX_USER_ID_CHARS
        )));
    }
    Ok(user_id)
}

/// Resolves the requested suggestion count, defaulting when absent
pub fn validate_limit(limit: Option<usize>) -> AppResult<usize> {
    match limit {
        None => Ok(DEFAULT_NUM_SUGGESTIONS),
        Some(n) if (1..=MAX_NUM_SUGGESTIONS).contains(&n) => Ok(n),
        Some(n) => Err(AppError::InvalidInput(format!(
            "num_suggestions must be between 1 and {}, got {}",
            MAX_NUM_SUGGESTIONS, n
        ))),
    }
}

fn validate_songs(songs: &[String]) -> AppResult<Vec<&str>> {
    let songs: Vec<&str> = songs
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect();

    if songs.is_empty() {
        return Err(AppError::InvalidInput(
            "At least one liked song is required".to_string(),
        ));
    }
    if songs.len() > MAX_LIKED_SONGS {
        return Err(AppError::InvalidInput(format!(
            "At most {} liked songs are accepted",
            MAX_LIKED_SONGS
        )));
    }
    Ok(songs)
}

/// Request-level workflow around the recommendation engine
///
/// Resolves song names to catalog entries, persists the user's likes and
/// asks the engine for a ranking over the recent candidate pool.
pub struct SuggestionService {
    engine: Arc<RecommendationEngine>,
    store: Arc<dyn MusicStore>,
    searcher: Arc<dyn SongSearcher>,
    candidate_pool_size: usize,
}

impl SuggestionService {
    pub fn new(
        engine: Arc<RecommendationEngine>,
        store: Arc<dyn MusicStore>,
        searcher: Arc<dyn SongSearcher>,
        candidate_pool_size: usize,
    ) -> Self {
        Self {
            engine,
            store,
            searcher,
            candidate_pool_size,
        }
    }

    /// Handles a POST /api/v1/suggestions request
    pub async fn suggest_for_songs(
        &self,
        request: &SuggestionRequest,
    ) -> AppResult<Vec<Recommendation>> {
        let user_id = validate_user_id(&request.user_id)?;
        let song_names = validate_songs(&request.songs)?;
        let limit = validate_limit(request.num_suggestions)?;

        let resolved = self.resolve_songs(&song_names).await?;
        if resolved.is_empty() {
            tracing::warn!(user_id = %user_id, requested = song_names.len(), "No liked songs could be resolved");
            return Err(AppError::NoSuggestions(NO_SUGGESTIONS_MESSAGE.to_string()));
        }

        let song_ids: Vec<SongId> = resolved.iter().map(|s| s.id.clone()).collect();
        self.store.replace_user_likes(user_id, &song_ids).await?;

        self.rank_stored_likes(user_id, request.genre.as_deref(), limit)
            .await
    }

    /// Suggestions from the likes already stored for `user_id`
    pub async fn suggest_for_user(
        &self,
        user_id: &str,
        genre: Option<&str>,
        limit: Option<usize>,
    ) -> AppResult<Vec<Recommendation>> {
        let user_id = validate_user_id(user_id)?;
        let limit = validate_limit(limit)?;
        self.rank_stored_likes(user_id, genre, limit).await
    }

    /// Liked songs of `user_id`, most recent first
    ///
    /// Likes are only ever stored as a non-empty set, so a user without any
    /// is one the service has never seen.
    pub async fn liked_songs(&self, user_id: &str) -> AppResult<Vec<LikedSong>> {
        let user_id = validate_user_id(user_id)?;
        let likes = self.store.get_user_likes(user_id).await?;
        if likes.is_empty() {
            return Err(AppError::NotFound(format!("No likes stored for user {}", user_id)));
        }
        Ok(likes)
    }

    /// Looks up each name and stores the best match, skipping names that fail
    async fn resolve_songs(&self, names: &[&str]) -> AppResult<Vec<Song>> {
        let mut resolved: Vec<Song> = Vec::with_capacity(names.len());

        for name in names {
            let hit = match self.searcher.search(name, 1).await {
                Ok(hits) => hits.into_iter().next(),
                Err(e) => {
                    tracing::warn!(song = %name, error = %e, "Song lookup failed, skipping");
                    None
                }
            };

            let Some(hit) = hit else {
                tracing::debug!(song = %name, "No match for liked song");
                continue;
            };

            if resolved.iter().any(|s| s.id == hit.video_id) {
                continue;
            }
            resolved.push(self.store.upsert_song(hit).await?);
        }

        Ok(resolved)
    }

    async fn rank_stored_likes(
        &self,
        user_id: &str,
        genre: Option<&str>,
        limit: usize,
    ) -> AppResult<Vec<Recommendation>> {
        let history: Vec<Song> = self
            .store
            .get_user_likes(user_id)
            .await?
            .into_iter()
            .map(|liked| liked.song)
            .collect();

        let pool = self
            .store
            .get_candidate_songs(self.candidate_pool_size)
            .await?;

        match self
            .engine
            .suggest(user_id, &history, &pool, genre, limit)
            .await
        {
            SuggestionOutcome::Ranked(recommendations) => Ok(recommendations),
            SuggestionOutcome::NoSuggestions => {
                Err(AppError::NoSuggestions(NO_SUGGESTIONS_MESSAGE.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::InMemoryStore;
    use crate::engine::EngineConfig;
    use crate::models::SearchHit;
    use crate::services::providers::MockSongSearcher;
    use mockall::predicate::*;

    fn hit(id: &str, title: &str, artist: &str) -> SearchHit {
        SearchHit {
            video_id: SongId::new(id),
            title: title.to_string(),
            artist: artist.to_string(),
        }
    }

    fn request(user_id: &str, songs: &[&str]) -> SuggestionRequest {
        SuggestionRequest {
            user_id: user_id.to_string(),
            songs: songs.iter().map(|s| s.to_string()).collect(),
            genre: None,
            num_suggestions: None,
        }
    }

    fn service(store: Arc<InMemoryStore>, searcher: MockSongSearcher) -> SuggestionService {
        let searcher: Arc<dyn SongSearcher> = Arc::new(searcher);
        let engine = RecommendationEngine::new(
            EngineConfig::default(),
            store.clone(),
            searcher.clone(),
        );
        SuggestionService::new(Arc::new(engine), store, searcher, 1000)
    }

    #[test]
    fn test_validate_limit() {
        assert_eq!(validate_limit(None).unwrap(), DEFAULT_NUM_SUGGESTIONS);
        assert_eq!(validate_limit(Some(50)).unwrap(), 50);
        assert!(validate_limit(Some(0)).is_err());
        assert!(validate_limit(Some(51)).is_err());
    }

    #[test]
    fn test_validate_user_id() {
        assert_eq!(validate_user_id("  alice ").unwrap(), "alice");
        assert!(validate_user_id("   ").is_err());
        assert!(validate_user_id(&"x".repeat(MAX_USER_ID_CHARS + 1)).is_err());
    }

    #[tokio::test]
    async fn test_empty_song_list_is_rejected() {
        let service = service(Arc::new(InMemoryStore::new()), MockSongSearcher::new());

        let result = service.suggest_for_songs(&request("u", &["  "])).await;
        assert!(matches!(result, Err(AppError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_liked_songs_are_resolved_and_stored() {
        let store = Arc::new(InMemoryStore::new());
        store
            .insert_song(Song::new("p1", "Ocean Eyes Acoustic", "Billie").with_genre("Pop"))
            .await;

        let mut searcher = MockSongSearcher::new();
        searcher.expect_name().return_const("mock");
        searcher
            .expect_search()
            .with(function(|q: &str| q == "Ocean Eyes"), eq(1))
            .times(1)
            .returning(|_, _| Ok(vec![hit("o1", "Ocean Eyes", "Billie")]));
        searcher
            .expect_search()
            .with(function(|q: &str| q == "Unknown Tune"), eq(1))
            .times(1)
            .returning(|_, _| Ok(Vec::new()));

        let service = service(store.clone(), searcher);
        let recs = service
            .suggest_for_songs(&request("alice", &["Ocean Eyes", "Unknown Tune"]))
            .await
            .unwrap();

        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].video_id, SongId::new("p1"));

        let liked = store.get_user_like_ids("alice").await.unwrap();
        assert_eq!(liked.len(), 1);
        assert!(liked.contains(&SongId::new("o1")));
    }

    #[tokio::test]
    async fn test_unresolvable_songs_yield_no_suggestions() {
        let mut searcher = MockSongSearcher::new();
        searcher.expect_name().return_const("mock");
        searcher
            .expect_search()
            .returning(|_, _| Err(AppError::ExternalApi("quota exceeded".to_string())));

        let service = service(Arc::new(InMemoryStore::new()), searcher);
        let result = service.suggest_for_songs(&request("u", &["Anything"])).await;

        assert!(matches!(result, Err(AppError::NoSuggestions(_))));
    }

    #[tokio::test]
    async fn test_suggest_for_user_without_likes_is_no_suggestions() {
        let service = service(Arc::new(InMemoryStore::new()), MockSongSearcher::new());

        let result = service.suggest_for_user("nobody", None, None).await;
        assert!(matches!(result, Err(AppError::NoSuggestions(_))));
    }

    #[tokio::test]
    async fn test_suggest_for_user_uses_stored_likes() {
        let store = Arc::new(InMemoryStore::new());
        let liked = Song::new("a", "Midnight Drive", "Synthwave Kid").with_genre("Synthwave");
        let similar = Song::new("b", "Neon Drive", "Synthwave Kid").with_genre("Synthwave");
        store.insert_song(liked.clone()).await;
        store.insert_song(similar).await;
        store.like("u", &[&liked.id]).await;

        let service = service(store, MockSongSearcher::new());
        let recs = service.suggest_for_user("u", None, Some(5)).await.unwrap();

        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].video_id, SongId::new("b"));
    }

    #[tokio::test]
    async fn test_liked_songs_of_unknown_user_is_not_found() {
        let service = service(Arc::new(InMemoryStore::new()), MockSongSearcher::new());

        let result = service.liked_songs("ghost").await;
        assert!(matches!(result, Err(AppError::NotFound(msg)) if msg.contains("ghost")));
    }

    #[tokio::test]
    async fn test_liked_songs_lists_stored_likes() {
        let store = Arc::new(InMemoryStore::new());
        let liked = Song::new("a", "Midnight Drive", "Synthwave Kid");
        store.insert_song(liked.clone()).await;
        store.like("u", &[&liked.id]).await;

        let service = service(store, MockSongSearcher::new());
        let likes = service.liked_songs("u").await.unwrap();

        assert_eq!(likes.len(), 1);
        assert_eq!(likes[0].song.id, SongId::new("a"));
    }
}
