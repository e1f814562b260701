//! YouTube Data API v3 provider
//!
//! Uses the `/search` endpoint restricted to music videos (category 10).
//! The channel title stands in for the artist.
use crate::{
    cached,
    db::{Cache, CacheKey},
    error::{AppError, AppResult},
    models::{SearchHit, YoutubeSearchItem, YoutubeSearchResponse},
    services::providers::SongSearcher,
};
use reqwest::Client as HttpClient;
use std::time::Duration;

const SEARCH_CACHE_TTL: u64 = 3600; // 1 hour
const MUSIC_CATEGORY_ID: &str = "10";
const MAX_QUERY_CHARS: usize = 200;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(8);

/// Strips everything but word characters, whitespace, hyphens and apostrophes,
/// lowercases and caps the length
pub fn sanitize_query(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace() || matches!(c, '_' | '-' | '\''))
        .collect::<String>()
        .to_lowercase();

    cleaned.trim().chars().take(MAX_QUERY_CHARS).collect::<String>().trim_end().to_string()
}

#[derive(Clone)]
pub struct YoutubeSearcher {
    http_client: HttpClient,
    api_key: Option<String>,
    api_url: String,
    cache: Option<Cache>,
}

impl YoutubeSearcher {
    pub fn new(api_key: Option<String>, api_url: String) -> AppResult<Self> {
        let http_client = HttpClient::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            http_client,
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            api_url,
            cache: None,
        })
    }

    /// Caches search answers in Redis
    pub fn with_cache(mut self, cache: Cache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    async fn fetch(&self, api_key: &str, query: &str, max_results: usize) -> AppResult<Vec<SearchHit>> {
        let url = format!("{}/search", self.api_url);
        let max_results = max_results.to_string();

        let response = self
            .http_client
            .get(&url)
            .query(&[
                ("part", "snippet"),
                ("q", query),
                ("type", "video"),
                ("videoCategoryId", MUSIC_CATEGORY_ID),
                ("maxResults", max_results.as_str()),
                ("key", api_key),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            // The body is not logged: error payloads echo the request URL, key included
            let status = response.status();
            tracing::error!(query = %query, status = %status, "YouTube search request failed");
            return Err(AppError::ExternalApi(format!(
                "YouTube API returned status {}",
                status
            )));
        }

        let body: YoutubeSearchResponse = response.json().await?;
        let hits: Vec<SearchHit> = body
            .items
            .into_iter()
            .filter_map(YoutubeSearchItem::into_hit)
            .collect();

        tracing::info!(
            query = %query,
            results = hits.len(),
            provider = "youtube",
            "Song search completed"
        );

        Ok(hits)
    }
}

#[async_trait::async_trait]
impl SongSearcher for YoutubeSearcher {
    async fn search(&self, query: &str, max_results: usize) -> AppResult<Vec<SearchHit>> {
        let Some(api_key) = self.api_key.as_deref() else {
            tracing::warn!("YouTube API key not configured, search skipped");
            return Ok(Vec::new());
        };

        let query = sanitize_query(query);
        if query.is_empty() || max_results == 0 {
            return Ok(Vec::new());
        }

        match &self.cache {
            Some(cache) => cached!(
                cache,
                CacheKey::SongSearch(query.clone(), max_results),
                SEARCH_CACHE_TTL,
                self.fetch(api_key, &query, max_results)
            ),
            None => self.fetch(api_key, &query, max_results).await,
        }
    }

    fn name(&self) -> &'static str {
        "youtube"
    }
}
