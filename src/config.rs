use serde::Deserialize;
use std::time::Duration;

use crate::engine::{EngineConfig, ScoringPolicy};

/// Application configuration loaded from environment variables
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// PostgreSQL database connection URL; the in-memory store is used when unset
    #[serde(default)]
    pub database_url: Option<String>,

    /// Redis connection URL; song-name lookups are not cached when unset
    #[serde(default)]
    pub redis_url: Option<String>,

    /// YouTube Data API key
    #[serde(default)]
    pub youtube_api_key: Option<String>,

    /// YouTube Data API base URL
    #[serde(default = "default_youtube_api_url")]
    pub youtube_api_url: String,

    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Comma-separated CORS origins; `*` or empty allows any origin
    #[serde(default = "default_cors_allowed_origins")]
    pub cors_allowed_origins: String,

    /// Minimum shared likes for another user to count as a neighbor
    #[serde(default = "default_min_overlap")]
    pub engine_min_overlap: usize,

    #[serde(default = "default_collaborative_limit")]
    pub engine_collaborative_limit: usize,

    #[serde(default = "default_content_limit")]
    pub engine_content_limit: usize,

    /// Number of recently updated songs considered for recommendation
    #[serde(default = "default_candidate_pool_size")]
    pub engine_candidate_pool_size: usize,

    #[serde(default = "default_collaborative_base")]
    pub engine_collaborative_base: f64,

    #[serde(default = "default_content_base")]
    pub engine_content_base: f64,

    #[serde(default = "default_agreement_boost")]
    pub engine_agreement_boost: f64,

    #[serde(default = "default_fallback_enabled")]
    pub engine_fallback_enabled: bool,

    #[serde(default = "default_fallback_timeout_ms")]
    pub engine_fallback_timeout_ms: u64,

    /// Capacity of the per-song token cache (0 disables it)
    #[serde(default = "default_feature_cache_size")]
    pub engine_feature_cache_size: usize,

    /// Capacity of the fallback query cache (0 disables it)
    #[serde(default = "default_search_cache_size")]
    pub engine_search_cache_size: usize,

    /// Seconds a cached fallback answer stays valid
    #[serde(default = "default_search_cache_ttl_secs")]
    pub engine_search_cache_ttl_secs: u64,
}

fn default_youtube_api_url() -> String {
    "https://www.googleapis.com/youtube/v3".to_string()
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_cors_allowed_origins() -> String {
    "*".to_string()
}

fn default_min_overlap() -> usize {
    2
}

fn default_collaborative_limit() -> usize {
    30
}

fn default_content_limit() -> usize {
    15
}

fn default_candidate_pool_size() -> usize {
    1000
}

fn default_collaborative_base() -> f64 {
    1.0
}

fn default_content_base() -> f64 {
    0.8
}

fn default_agreement_boost() -> f64 {
    0.5
}

fn default_fallback_enabled() -> bool {
    true
}

fn default_fallback_timeout_ms() -> u64 {
    8000
}

fn default_feature_cache_size() -> usize {
    4096
}

fn default_search_cache_size() -> usize {
    256
}

fn default_search_cache_ttl_secs() -> u64 {
    3600
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        envy::from_env::<Config>().map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))
    }

    /// Explicit CORS origins, empty when any origin is allowed
    pub fn allowed_origins(&self) -> Vec<String> {
        self.cors_allowed_origins
            .split(',')
            .map(str::trim)
            .filter(|o| !o.is_empty() && *o != "*")
            .map(str::to_string)
            .collect()
    }

    /// Engine tuning derived from the `ENGINE_*` variables
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            min_overlap: self.engine_min_overlap,
            collaborative_limit: self.engine_collaborative_limit,
            content_limit: self.engine_content_limit,
            min_similarity: 0.0,
            scoring: ScoringPolicy {
                collaborative_base: self.engine_collaborative_base,
                content_base: self.engine_content_base,
                agreement_boost: self.engine_agreement_boost,
            },
            fallback_enabled: self.engine_fallback_enabled,
            fallback_timeout: Duration::from_millis(self.engine_fallback_timeout_ms),
        }
    }

    pub fn search_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.engine_search_cache_ttl_secs)
    }
}
