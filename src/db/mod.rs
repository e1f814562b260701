pub mod memory;
pub mod postgres;
pub mod redis;
pub mod repository;

pub use memory::InMemoryStore;
pub use postgres::create_pool;
pub use self::redis::create_redis_client;
pub use self::redis::Cache;
pub use self::redis::CacheKey;
pub use self::redis::CacheWriterHandle;
pub use repository::MusicRepository;

use crate::{
    engine::{CandidateProvider, LikeStore},
    error::AppResult,
    models::{SearchHit, Song, SongId},
};

/// Write side of the song and like tables
#[async_trait::async_trait]
pub trait LikeWriter: Send + Sync {
    /// Inserts a searched song or refreshes its title and artist
    async fn upsert_song(&self, hit: SearchHit) -> AppResult<Song>;

    /// Makes `song_ids` the exact like set of `user_id`, creating the user if needed
    async fn replace_user_likes(&self, user_id: &str, song_ids: &[SongId]) -> AppResult<()>;
}

/// Everything the suggestion workflow needs from persistence
pub trait MusicStore: LikeStore + CandidateProvider + LikeWriter {}

impl<T: LikeStore + CandidateProvider + LikeWriter> MusicStore for T {}
