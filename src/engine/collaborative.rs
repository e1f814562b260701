use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use super::LikeStore;
use crate::models::{NeighborLike, Song, SongId};

/// Ranks songs liked by taste neighbors
///
/// A neighbor is any user whose likes overlap `user_like_ids` in at least
/// `min_overlap` distinct songs. Songs liked by neighbors and not already
/// liked by the target user are ordered by the number of distinct neighbors
/// who liked them; ties keep the order in which songs first appear in
/// `neighbor_likes`. When `eligible` is given, only songs in it are returned.
pub fn rank_neighbor_suggestions(
    user_like_ids: &HashSet<SongId>,
    neighbor_likes: &[NeighborLike],
    min_overlap: usize,
    eligible: Option<&HashSet<SongId>>,
    limit: usize,
) -> Vec<(Song, usize)> {
    if user_like_ids.is_empty() || limit == 0 {
        return Vec::new();
    }
    let min_overlap = min_overlap.max(1);

    let mut overlap: HashMap<&str, HashSet<&SongId>> = HashMap::new();
    for like in neighbor_likes {
        if user_like_ids.contains(&like.song.id) {
            overlap
                .entry(like.user_id.as_str())
                .or_default()
                .insert(&like.song.id);
        }
    }

    let neighbors: HashSet<&str> = overlap
        .into_iter()
        .filter(|(_, shared)| shared.len() >= min_overlap)
        .map(|(user_id, _)| user_id)
        .collect();

    if neighbors.is_empty() {
        return Vec::new();
    }

    // song id -> (first appearance, song, distinct neighbors)
    let mut tally: HashMap<&SongId, (usize, &Song, HashSet<&str>)> = HashMap::new();
    for like in neighbor_likes {
        let song_id = &like.song.id;
        if !neighbors.contains(like.user_id.as_str()) || user_like_ids.contains(song_id) {
            continue;
        }
        if eligible.is_some_and(|pool| !pool.contains(song_id)) {
            continue;
        }
        let next = tally.len();
        tally
            .entry(song_id)
            .or_insert_with(|| (next, &like.song, HashSet::new()))
            .2
            .insert(like.user_id.as_str());
    }

    let mut ranked: Vec<(usize, &Song, usize)> = tally
        .into_values()
        .map(|(order, song, users)| (order, song, users.len()))
        .collect();
    ranked.sort_by(|a, b| b.2.cmp(&a.2).then(a.0.cmp(&b.0)));

    ranked
        .into_iter()
        .take(limit)
        .map(|(_, song, count)| (song.clone(), count))
        .collect()
}

/// Collaborative filter backed by the like store
pub struct CollaborativeFilter {
    store: Arc<dyn LikeStore>,
    min_overlap: usize,
}

impl CollaborativeFilter {
    pub fn new(store: Arc<dyn LikeStore>, min_overlap: usize) -> Self {
        Self {
            store,
            min_overlap: min_overlap.max(1),
        }
    }

    pub fn min_overlap(&self) -> usize {
        self.min_overlap
    }

    /// Finds songs popular among `user_id`'s taste neighbors
    ///
    /// Store failures are logged and treated as "no neighbors".
    pub async fn find_neighbor_suggestions(
        &self,
        user_id: &str,
        user_like_ids: &HashSet<SongId>,
        eligible: Option<&HashSet<SongId>>,
        limit: usize,
    ) -> Vec<(Song, usize)> {
        if user_like_ids.is_empty() {
            return Vec::new();
        }

        let neighbor_likes = match self.store.get_neighbor_likes(user_id, user_like_ids).await {
            Ok(likes) => likes,
            Err(e) => {
                tracing::warn!(
                    user_id = %user_id,
                    error = %e,
                    "Neighbor lookup failed, skipping collaborative signal"
                );
                return Vec::new();
            }
        };

        let suggestions = rank_neighbor_suggestions(
            user_like_ids,
            &neighbor_likes,
            self.min_overlap,
            eligible,
            limit,
        );

        tracing::debug!(
            user_id = %user_id,
            neighbor_likes = neighbor_likes.len(),
            suggestions = suggestions.len(),
            min_overlap = self.min_overlap,
            "Collaborative filtering completed"
        );

        suggestions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{AppError, AppResult};
    use crate::models::LikedSong;

    fn like(user: &str, song_id: &str) -> NeighborLike {
        NeighborLike {
            user_id: user.to_string(),
            song: Song::new(song_id, format!("Title {}", song_id), "Artist"),
        }
    }

    fn ids(values: &[&str]) -> HashSet<SongId> {
        values.iter().map(|v| SongId::new(*v)).collect()
    }

    fn ranked_ids(ranked: &[(Song, usize)]) -> Vec<&str> {
        ranked.iter().map(|(s, _)| s.id.as_str()).collect()
    }

    #[test]
    fn test_empty_like_set_returns_empty() {
        let likes = vec![like("bob", "s1"), like("bob", "s2")];
        assert!(rank_neighbor_suggestions(&HashSet::new(), &likes, 1, None, 10).is_empty());
    }

    #[test]
    fn test_overlap_below_threshold_returns_empty() {
        let mine = ids(&["s1", "s2"]);
        let likes = vec![like("bob", "s1"), like("bob", "s9")];

        assert!(rank_neighbor_suggestions(&mine, &likes, 2, None, 10).is_empty());
    }

    #[test]
    fn test_threshold_of_one_admits_single_overlap() {
        let mine = ids(&["s1", "s2"]);
        let likes = vec![like("bob", "s1"), like("bob", "s9")];

        let ranked = rank_neighbor_suggestions(&mine, &likes, 1, None, 10);
        assert_eq!(ranked_ids(&ranked), vec!["s9"]);
    }

    #[test]
    fn test_ranks_by_distinct_neighbor_count() {
        let mine = ids(&["s1", "s2"]);
        let likes = vec![
            like("bob", "s1"),
            like("bob", "s2"),
            like("bob", "s3"),
            like("carol", "s1"),
            like("carol", "s2"),
            like("carol", "s4"),
            like("carol", "s3"),
            like("dave", "s1"),
            like("dave", "s2"),
            like("dave", "s4"),
            like("dave", "s5"),
            // not a neighbor: single overlap
            like("erin", "s1"),
            like("erin", "s5"),
            like("erin", "s6"),
        ];

        let ranked = rank_neighbor_suggestions(&mine, &likes, 2, None, 10);

        assert_eq!(ranked_ids(&ranked), vec!["s3", "s4", "s5"]);
        assert_eq!(ranked[0].1, 2);
        assert_eq!(ranked[2].1, 1);
    }

    #[test]
    fn test_duplicate_edges_count_once() {
        let mine = ids(&["s1", "s2"]);
        let likes = vec![
            like("bob", "s1"),
            like("bob", "s1"),
            like("bob", "s3"),
            like("bob", "s3"),
        ];

        // duplicated s1 edge must not satisfy an overlap of two
        assert!(rank_neighbor_suggestions(&mine, &likes, 2, None, 10).is_empty());

        let ranked = rank_neighbor_suggestions(&mine, &likes, 1, None, 10);
        assert_eq!(ranked, vec![(likes[2].song.clone(), 1)]);
    }

    #[test]
    fn test_eligible_pool_and_limit() {
        let mine = ids(&["s1"]);
        let likes = vec![
            like("bob", "s1"),
            like("bob", "s2"),
            like("bob", "s3"),
            like("bob", "s4"),
        ];
        let pool = ids(&["s3", "s4"]);

        let ranked = rank_neighbor_suggestions(&mine, &likes, 1, Some(&pool), 1);
        assert_eq!(ranked_ids(&ranked), vec!["s3"]);
    }

    struct BrokenStore;

    #[async_trait::async_trait]
    impl LikeStore for BrokenStore {
        async fn get_user_likes(&self, _user_id: &str) -> AppResult<Vec<LikedSong>> {
            Ok(Vec::new())
        }

        async fn get_user_like_ids(&self, _user_id: &str) -> AppResult<HashSet<SongId>> {
            Ok(HashSet::new())
        }

        async fn get_neighbor_likes(
            &self,
            _user_id: &str,
            _song_ids: &HashSet<SongId>,
        ) -> AppResult<Vec<NeighborLike>> {
            Err(AppError::Internal("pool timed out".to_string()))
        }
    }

    #[tokio::test]
    async fn test_store_failure_yields_no_neighbor_suggestions() {
        let filter = CollaborativeFilter::new(Arc::new(BrokenStore), 1);

        let ranked = filter
            .find_neighbor_suggestions("u", &ids(&["s1"]), None, 10)
            .await;

        assert!(ranked.is_empty());
    }
}
