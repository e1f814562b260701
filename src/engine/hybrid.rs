use std::cmp::Ordering;
use std::collections::HashMap;

use crate::models::{Recommendation, Song, SongId};

/// Score policy for blending collaborative and content-based results
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoringPolicy {
    /// Base score of a collaborative result
    pub collaborative_base: f64,
    /// Base score of a content-based result not found by the collaborative filter
    pub content_base: f64,
    /// Added once to a collaborative result that the content engine also found
    pub agreement_boost: f64,
}

impl Default for ScoringPolicy {
    fn default() -> Self {
        Self {
            collaborative_base: 1.0,
            content_base: 0.8,
            agreement_boost: 0.5,
        }
    }
}

/// Origin of a pooled entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Source {
    Collaborative,
    ContentBased,
    Both,
}

struct PoolEntry<'a> {
    song: &'a Song,
    source: Source,
}

/// Merges the two signal sources into one ranked list
#[derive(Debug, Clone, Default)]
pub struct HybridRanker {
    policy: ScoringPolicy,
}

impl HybridRanker {
    pub fn new(policy: ScoringPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &ScoringPolicy {
        &self.policy
    }

    fn score(&self, source: Source) -> f64 {
        match source {
            Source::Collaborative => self.policy.collaborative_base,
            Source::ContentBased => self.policy.content_base,
            Source::Both => self.policy.collaborative_base + self.policy.agreement_boost,
        }
    }

    /// Deduplicates by song identifier, scores by source agreement and returns
    /// the top `limit` entries by descending score (pool order on ties)
    ///
    /// Only the songs matter here; the per-source raw scores are ignored, so
    /// agreement is rewarded with a fixed boost rather than by magnitude.
    pub fn merge<A, B>(
        &self,
        collaborative: &[(Song, A)],
        content_based: &[(Song, B)],
        limit: usize,
    ) -> Vec<Recommendation> {
        let mut pool: Vec<PoolEntry<'_>> = Vec::new();
        let mut index: HashMap<&SongId, usize> = HashMap::new();

        for (song, _) in collaborative {
            if !index.contains_key(&song.id) {
                index.insert(&song.id, pool.len());
                pool.push(PoolEntry {
                    song,
                    source: Source::Collaborative,
                });
            }
        }

        for (song, _) in content_based {
            match index.get(&song.id) {
                Some(&position) => {
                    let entry = &mut pool[position];
                    if entry.source == Source::Collaborative {
                        entry.source = Source::Both;
                    }
                }
                None => {
                    index.insert(&song.id, pool.len());
                    pool.push(PoolEntry {
                        song,
                        source: Source::ContentBased,
                    });
                }
            }
        }

        let mut ranked: Vec<Recommendation> = pool
            .into_iter()
            .map(|entry| Recommendation::from_song(entry.song, self.score(entry.source)))
            .collect();

        ranked.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
        ranked.truncate(limit);
        ranked
    }
}
