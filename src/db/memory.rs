use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use super::LikeWriter;
use crate::{
    engine::{CandidateProvider, LikeStore},
    error::AppResult,
    models::{LikedSong, NeighborLike, SearchHit, Song, SongId},
};

#[derive(Debug, Clone)]
struct StoredSong {
    song: Song,
    /// Monotonic write counter standing in for `updated_at`
    revision: u64,
}

#[derive(Debug, Clone)]
struct StoredLike {
    song_id: SongId,
    liked_at: DateTime<Utc>,
    revision: u64,
}

#[derive(Debug, Default)]
struct Inner {
    songs: HashMap<SongId, StoredSong>,
    likes: BTreeMap<String, Vec<StoredLike>>,
    revision: u64,
}

impl Inner {
    fn next_revision(&mut self) -> u64 {
        self.revision += 1;
        self.revision
    }

    fn add_like(&mut self, user_id: &str, song_id: &SongId) {
        let exists = self
            .likes
            .get(user_id)
            .is_some_and(|likes| likes.iter().any(|l| &l.song_id == song_id));
        if exists || !self.songs.contains_key(song_id) {
            return;
        }

        let revision = self.next_revision();
        self.likes.entry(user_id.to_string()).or_default().push(StoredLike {
            song_id: song_id.clone(),
            liked_at: Utc::now(),
            revision,
        });
    }
}

/// Process-local song and like store
///
/// Used when no database is configured and by tests. Likes referencing
/// unknown songs are ignored, mirroring the foreign keys of the SQL schema.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    inner: RwLock<Inner>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a song, marking it as most recently updated
    pub async fn insert_song(&self, song: Song) {
        let mut inner = self.inner.write().await;
        let revision = inner.next_revision();
        inner
            .songs
            .insert(song.id.clone(), StoredSong { song, revision });
    }

    /// Adds likes for `user_id`, keeping the ones already present
    pub async fn like(&self, user_id: &str, song_ids: &[&SongId]) {
        let mut inner = self.inner.write().await;
        for song_id in song_ids {
            inner.add_like(user_id, song_id);
        }
    }

    pub async fn song_count(&self) -> usize {
        self.inner.read().await.songs.len()
    }
}

#[async_trait::async_trait]
impl LikeStore for InMemoryStore {
    async fn get_user_likes(&self, user_id: &str) -> AppResult<Vec<LikedSong>> {
        let inner = self.inner.read().await;
        let Some(likes) = inner.likes.get(user_id) else {
            return Ok(Vec::new());
        };

        let mut likes: Vec<&StoredLike> = likes.iter().collect();
        likes.sort_by(|a, b| b.revision.cmp(&a.revision));

        Ok(likes
            .into_iter()
            .filter_map(|like| {
                inner.songs.get(&like.song_id).map(|stored| LikedSong {
                    song: stored.song.clone(),
                    liked_at: like.liked_at,
                })
            })
            .collect())
    }

    async fn get_user_like_ids(&self, user_id: &str) -> AppResult<HashSet<SongId>> {
        let inner = self.inner.read().await;
        Ok(inner
            .likes
            .get(user_id)
            .map(|likes| likes.iter().map(|l| l.song_id.clone()).collect())
            .unwrap_or_default())
    }

    async fn get_neighbor_likes(
        &self,
        user_id: &str,
        song_ids: &HashSet<SongId>,
    ) -> AppResult<Vec<NeighborLike>> {
        let inner = self.inner.read().await;
        let mut neighbor_likes = Vec::new();

        for (other, likes) in &inner.likes {
            if other == user_id || !likes.iter().any(|l| song_ids.contains(&l.song_id)) {
                continue;
            }
            for like in likes {
                if let Some(stored) = inner.songs.get(&like.song_id) {
                    neighbor_likes.push(NeighborLike {
                        user_id: other.clone(),
                        song: stored.song.clone(),
                    });
                }
            }
        }

        Ok(neighbor_likes)
    }
}

#[async_trait::async_trait]
impl CandidateProvider for InMemoryStore {
    async fn get_candidate_songs(&self, limit: usize) -> AppResult<Vec<Song>> {
        let inner = self.inner.read().await;
        let mut songs: Vec<&StoredSong> = inner.songs.values().collect();
        songs.sort_by(|a, b| b.revision.cmp(&a.revision));

        Ok(songs
            .into_iter()
            .take(limit)
            .map(|stored| stored.song.clone())
            .collect())
    }
}

#[async_trait::async_trait]
impl LikeWriter for InMemoryStore {
    async fn upsert_song(&self, hit: SearchHit) -> AppResult<Song> {
        let mut inner = self.inner.write().await;
        let revision = inner.next_revision();

        let song = match inner.songs.get(&hit.video_id) {
            Some(existing) => Song {
                title: hit.title,
                artist: hit.artist,
                ..existing.song.clone()
            },
            None => Song::from(hit),
        };

        inner.songs.insert(
            song.id.clone(),
            StoredSong {
                song: song.clone(),
                revision,
            },
        );
        Ok(song)
    }

    async fn replace_user_likes(&self, user_id: &str, song_ids: &[SongId]) -> AppResult<()> {
        let mut inner = self.inner.write().await;
        let keep: HashSet<&SongId> = song_ids.iter().collect();

        if let Some(likes) = inner.likes.get_mut(user_id) {
            likes.retain(|l| keep.contains(&l.song_id));
        } else {
            inner.likes.insert(user_id.to_string(), Vec::new());
        }

        for song_id in song_ids {
            inner.add_like(user_id, song_id);
        }
        Ok(())
    }
}
