use std::collections::HashSet;

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use super::LikeWriter;
use crate::{
    engine::{CandidateProvider, LikeStore},
    error::AppResult,
    models::{parse_tags, LikedSong, NeighborLike, SearchHit, Song, SongId},
};

#[derive(Debug, sqlx::FromRow)]
struct SongRow {
    video_id: String,
    title: String,
    artist: String,
    genre: Option<String>,
    tags: Option<String>,
}

impl From<SongRow> for Song {
    fn from(row: SongRow) -> Self {
        Song {
            id: SongId(row.video_id),
            title: row.title,
            artist: row.artist,
            genre: row.genre,
            tags: parse_tags(row.tags.as_deref()),
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct LikedSongRow {
    #[sqlx(flatten)]
    song: SongRow,
    liked_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
struct NeighborLikeRow {
    user_id: String,
    #[sqlx(flatten)]
    song: SongRow,
}

/// Postgres-backed song metadata and likes
///
/// Expects the `users`, `song_metadata` and `user_liked_songs` tables to exist.
#[derive(Clone)]
pub struct MusicRepository {
    pool: PgPool,
}

impl MusicRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl LikeStore for MusicRepository {
    async fn get_user_likes(&self, user_id: &str) -> AppResult<Vec<LikedSong>> {
        let rows = sqlx::query_as::<_, LikedSongRow>(
            r#"
            SELECT sm.video_id, sm.title, sm.artist, sm.genre, sm.tags,
                   uls.created_at AS liked_at
            FROM user_liked_songs uls
            JOIN users u ON u.id = uls.user_id
            JOIN song_metadata sm ON sm.id = uls.song_id
            WHERE u.user_id = $1
            ORDER BY uls.created_at DESC, uls.id DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| LikedSong {
                song: row.song.into(),
                liked_at: row.liked_at,
            })
            .collect())
    }

    async fn get_user_like_ids(&self, user_id: &str) -> AppResult<HashSet<SongId>> {
        let ids: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT sm.video_id
            FROM user_liked_songs uls
            JOIN users u ON u.id = uls.user_id
            JOIN song_metadata sm ON sm.id = uls.song_id
            WHERE u.user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(ids.into_iter().map(SongId).collect())
    }

    async fn get_neighbor_likes(
        &self,
        user_id: &str,
        song_ids: &HashSet<SongId>,
    ) -> AppResult<Vec<NeighborLike>> {
        if song_ids.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<String> = song_ids.iter().map(|id| id.0.clone()).collect();

        // Every like of every other user sharing at least one song
        let rows = sqlx::query_as::<_, NeighborLikeRow>(
            r#"
            SELECT u.user_id, sm.video_id, sm.title, sm.artist, sm.genre, sm.tags
            FROM user_liked_songs uls
            JOIN users u ON u.id = uls.user_id
            JOIN song_metadata sm ON sm.id = uls.song_id
            WHERE u.user_id <> $1
              AND uls.user_id IN (
                  SELECT shared.user_id
                  FROM user_liked_songs shared
                  JOIN song_metadata s ON s.id = shared.song_id
                  WHERE s.video_id = ANY($2)
              )
            ORDER BY u.user_id, uls.id
            "#,
        )
        .bind(user_id)
        .bind(&ids[..])
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| NeighborLike {
                user_id: row.user_id,
                song: row.song.into(),
            })
            .collect())
    }
}

#[async_trait::async_trait]
impl CandidateProvider for MusicRepository {
    async fn get_candidate_songs(&self, limit: usize) -> AppResult<Vec<Song>> {
        let rows = sqlx::query_as::<_, SongRow>(
            r#"
            SELECT video_id, title, artist, genre, tags
            FROM song_metadata
            ORDER BY updated_at DESC, id DESC
            LIMIT $1
            "#,
        )
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Song::from).collect())
    }
}

#[async_trait::async_trait]
impl LikeWriter for MusicRepository {
    async fn upsert_song(&self, hit: SearchHit) -> AppResult<Song> {
        let row = sqlx::query_as::<_, SongRow>(
            r#"
            INSERT INTO song_metadata (video_id, title, artist, updated_at)
            VALUES ($1, $2, $3, NOW())
            ON CONFLICT (video_id) DO UPDATE
            SET title = EXCLUDED.title,
                artist = EXCLUDED.artist,
                updated_at = NOW()
            RETURNING video_id, title, artist, genre, tags
            "#,
        )
        .bind(hit.video_id.as_str())
        .bind(&hit.title)
        .bind(&hit.artist)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into())
    }

    async fn replace_user_likes(&self, user_id: &str, song_ids: &[SongId]) -> AppResult<()> {
        let ids: Vec<String> = song_ids.iter().map(|id| id.0.clone()).collect();
        let mut tx = self.pool.begin().await?;

        let user_pk: i32 = sqlx::query_scalar(
            r#"
            INSERT INTO users (user_id)
            VALUES ($1)
            ON CONFLICT (user_id) DO UPDATE SET user_id = EXCLUDED.user_id
            RETURNING id
            "#,
        )
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await?;

        let removed = sqlx::query(
            r#"
            DELETE FROM user_liked_songs
            WHERE user_id = $1
              AND song_id NOT IN (SELECT id FROM song_metadata WHERE video_id = ANY($2))
            "#,
        )
        .bind(user_pk)
        .bind(&ids[..])
        .execute(&mut *tx)
        .await?
        .rows_affected();

        let added = sqlx::query(
            r#"
            INSERT INTO user_liked_songs (user_id, song_id)
            SELECT $1, id FROM song_metadata WHERE video_id = ANY($2)
            ON CONFLICT (user_id, song_id) DO NOTHING
            "#,
        )
        .bind(user_pk)
        .bind(&ids[..])
        .execute(&mut *tx)
        .await?
        .rows_affected();

        tx.commit().await?;

        tracing::debug!(user_id = %user_id, added, removed, "User likes replaced");
        Ok(())
    }
}
