//! Song metadata search providers
//!
//! The engine only needs a narrow "query in, (title, artist, video id) out"
//! capability: the fallback policy uses it for popular songs and the
//! suggestion workflow uses it to resolve liked song names to video IDs.
use crate::{error::AppResult, models::SearchHit};

pub mod youtube;

pub use youtube::YoutubeSearcher;

/// Trait for song metadata search providers
///
/// Implementations are fallible and may be slow; callers bound them with
/// timeouts and treat errors as "no results".
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait SongSearcher: Send + Sync {
    /// Search for songs matching `query`, returning at most `max_results` hits
    async fn search(&self, query: &str, max_results: usize) -> AppResult<Vec<SearchHit>>;

    /// Provider name for logging and debugging
    fn name(&self) -> &'static str;
}
