use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// External video identifier of a song (e.g. a YouTube video ID)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SongId(pub String);

impl SongId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for SongId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for SongId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Song metadata as stored by the application
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Song {
    pub id: SongId,
    pub title: String,
    pub artist: String,
    #[serde(default)]
    pub genre: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl Song {
    pub fn new(id: impl Into<String>, title: impl Into<String>, artist: impl Into<String>) -> Self {
        Self {
            id: SongId::new(id),
            title: title.into(),
            artist: artist.into(),
            genre: None,
            tags: Vec::new(),
        }
    }

    pub fn with_genre(mut self, genre: impl Into<String>) -> Self {
        self.genre = Some(genre.into());
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }
}

/// Splits the comma-separated tag column into individual tags
pub fn parse_tags(raw: Option<&str>) -> Vec<String> {
    raw.map(|tags| {
        tags.split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect()
    })
    .unwrap_or_default()
}

/// A song liked by a user, with the time of the like
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LikedSong {
    pub song: Song,
    pub liked_at: DateTime<Utc>,
}

/// One like edge belonging to some other user
#[derive(Debug, Clone, PartialEq)]
pub struct NeighborLike {
    pub user_id: String,
    pub song: Song,
}

/// A ranked suggestion returned to the client
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Recommendation {
    pub title: String,
    pub artist: String,
    #[serde(rename = "youtube_video_id")]
    pub video_id: SongId,
    pub score: f64,
}

impl Recommendation {
    pub fn from_song(song: &Song, score: f64) -> Self {
        Self {
            title: song.title.clone(),
            artist: song.artist.clone(),
            video_id: song.id.clone(),
            score,
        }
    }
}

/// Result of a metadata search
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchHit {
    pub video_id: SongId,
    pub title: String,
    pub artist: String,
}

impl From<SearchHit> for Song {
    fn from(hit: SearchHit) -> Self {
        Song {
            id: hit.video_id,
            title: hit.title,
            artist: hit.artist,
            genre: None,
            tags: Vec::new(),
        }
    }
}

// ============================================================================
// API Contracts
// ============================================================================

/// Request body for POST /api/v1/suggestions
#[derive(Debug, Deserialize)]
pub struct SuggestionRequest {
    pub user_id: String,
    /// Song titles the user has liked
    pub songs: Vec<String>,
    #[serde(default)]
    pub genre: Option<String>,
    #[serde(default)]
    pub num_suggestions: Option<usize>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SuggestionResponse {
    pub suggestions: Vec<Recommendation>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct LikedSongResponse {
    pub title: String,
    pub artist: String,
    pub video_id: SongId,
    pub liked_at: DateTime<Utc>,
}

impl From<LikedSong> for LikedSongResponse {
    fn from(liked: LikedSong) -> Self {
        Self {
            title: liked.song.title,
            artist: liked.song.artist,
            video_id: liked.song.id,
            liked_at: liked.liked_at,
        }
    }
}

// ============================================================================
// YouTube Data API Types
// ============================================================================

/// Response of GET /search
#[derive(Debug, Clone, Deserialize)]
pub struct YoutubeSearchResponse {
    #[serde(default)]
    pub items: Vec<YoutubeSearchItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct YoutubeSearchItem {
    pub id: YoutubeResourceId,
    pub snippet: YoutubeSnippet,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct YoutubeResourceId {
    /// Absent for channel and playlist results
    #[serde(default)]
    pub video_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct YoutubeSnippet {
    pub title: String,
    pub channel_title: String,
}

impl YoutubeSearchItem {
    /// Converts to a search hit; non-video results yield `None`
    pub fn into_hit(self) -> Option<SearchHit> {
        let video_id = self.id.video_id?;
        Some(SearchHit {
            video_id: SongId(video_id),
            title: self.snippet.title,
            artist: self.snippet.channel_title,
        })
    }
}
