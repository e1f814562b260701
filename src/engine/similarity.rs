//! Content-based scoring over song metadata.
//!
//! Each song becomes a weighted feature string (title once, artist twice,
//! genre three times, tags once). The history and candidate feature strings
//! are fitted as one TF-IDF corpus (`aprender`'s vectorizer, smoothed IDF)
//! so both sides share a vocabulary; the mean of the L2-normalised history
//! rows is the user's taste vector, and candidates are scored by cosine
//! similarity against it.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::{Arc, LazyLock};

use aprender::primitives::{Matrix, Vector};
use aprender::text::similarity::cosine_similarity;
use aprender::text::stopwords::StopWordsFilter;
use aprender::text::tokenize::WhitespaceTokenizer;
use aprender::text::vectorize::TfidfVectorizer;

use super::cache::FeatureCache;
use crate::models::{Song, SongId};

const TITLE_WEIGHT: usize = 1;
const ARTIST_WEIGHT: usize = 2;
const GENRE_WEIGHT: usize = 3;
const TAGS_WEIGHT: usize = 1;

static STOP_WORDS: LazyLock<StopWordsFilter> = LazyLock::new(StopWordsFilter::english);

/// Repeats a metadata field `weight` times; absent or blank fields yield an empty segment
fn weighted_segment(field: Option<&str>, weight: usize) -> String {
    match field.map(str::trim) {
        Some(value) if !value.is_empty() => vec![value; weight].join(" "),
        _ => String::new(),
    }
}

/// Builds the weighted feature string of a song
pub fn feature_string(song: &Song) -> String {
    let tags = song.tags.join(" ");
    let segments = [
        weighted_segment(Some(&song.title), TITLE_WEIGHT),
        weighted_segment(Some(&song.artist), ARTIST_WEIGHT),
        weighted_segment(song.genre.as_deref(), GENRE_WEIGHT),
        weighted_segment(Some(&tags), TAGS_WEIGHT),
    ];

    segments
        .iter()
        .filter(|s| !s.is_empty())
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Lowercases, splits on non-alphanumerics, keeps tokens of two or more
/// characters and drops English stop words
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric() && c != '_')
        .filter(|t| t.chars().count() >= 2)
        .filter(|t| !STOP_WORDS.is_stop_word(t))
        .map(str::to_string)
        .collect()
}

fn song_tokens(song: &Song) -> Vec<String> {
    tokenize(&feature_string(song))
}

/// Fits TF-IDF on the joint corpus of pre-tokenised documents
///
/// `None` when the corpus has no usable terms.
fn fit_corpus(documents: &[String]) -> Option<Matrix<f64>> {
    let mut vectorizer =
        TfidfVectorizer::new().with_tokenizer(Box::new(WhitespaceTokenizer::new()));

    match vectorizer.fit_transform(documents) {
        Ok(matrix) if matrix.n_cols() > 0 => Some(matrix),
        Ok(_) => None,
        Err(e) => {
            tracing::debug!(error = %e, "TF-IDF fit rejected corpus");
            None
        }
    }
}

/// Row `index` of `matrix`, L2-normalised
fn normalized_row(matrix: &Matrix<f64>, index: usize) -> Vec<f64> {
    let mut row = matrix.row(index).as_slice().to_vec();
    let norm = row.iter().map(|w| w * w).sum::<f64>().sqrt();
    if norm > 0.0 {
        for w in row.iter_mut() {
            *w /= norm;
        }
    }
    row
}

/// Element-wise mean of `rows`, each `width` wide
fn mean_vector(rows: &[Vec<f64>], width: usize) -> Vec<f64> {
    let mut mean = vec![0.0; width];
    if rows.is_empty() {
        return mean;
    }
    for row in rows {
        for (acc, w) in mean.iter_mut().zip(row) {
            *acc += w;
        }
    }
    let n = rows.len() as f64;
    for value in mean.iter_mut() {
        *value /= n;
    }
    mean
}

/// Content-based similarity scorer
pub struct SimilarityEngine {
    cache: Arc<FeatureCache>,
    min_similarity: f64,
}

impl Default for SimilarityEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl SimilarityEngine {
    pub fn new() -> Self {
        Self {
            cache: Arc::new(FeatureCache::disabled()),
            min_similarity: 0.0,
        }
    }

    pub fn with_cache(mut self, cache: Arc<FeatureCache>) -> Self {
        self.cache = cache;
        self
    }

    /// Candidates must score strictly above this value to be returned
    pub fn with_min_similarity(mut self, min_similarity: f64) -> Self {
        self.min_similarity = min_similarity;
        self
    }

    fn tokens_for(&self, song: &Song) -> Arc<Vec<String>> {
        self.cache.get_or_compute(song, song_tokens)
    }

    /// Scores `candidates` against the taste vector of `user_history`
    ///
    /// Returns candidates the user has not liked, sorted by descending
    /// similarity with ties kept in input order. Empty inputs and corpora with
    /// no usable terms produce an empty result.
    pub fn vectorize_and_score(&self, user_history: &[Song], candidates: &[Song]) -> Vec<(Song, f64)> {
        if user_history.is_empty() || candidates.is_empty() {
            return Vec::new();
        }

        let documents: Vec<String> = user_history
            .iter()
            .chain(candidates.iter())
            .map(|song| self.tokens_for(song).join(" "))
            .collect();

        let Some(matrix) = fit_corpus(&documents) else {
            tracing::debug!(
                history = user_history.len(),
                candidates = candidates.len(),
                "Empty vocabulary, no content-based scores"
            );
            return Vec::new();
        };

        let vocabulary_size = matrix.n_cols();
        let history_rows: Vec<Vec<f64>> = (0..user_history.len())
            .map(|i| normalized_row(&matrix, i))
            .collect();
        let taste = Vector::from_slice(&mean_vector(&history_rows, vocabulary_size));

        let liked: HashSet<&SongId> = user_history.iter().map(|song| &song.id).collect();
        let mut seen: HashSet<SongId> = HashSet::new();

        let offset = user_history.len();
        let mut scored: Vec<(Song, f64)> = candidates
            .iter()
            .enumerate()
            .filter(|(_, song)| !liked.contains(&song.id) && seen.insert(song.id.clone()))
            .map(|(i, song)| {
                let row = Vector::from_slice(&normalized_row(&matrix, offset + i));
                let score = cosine_similarity(&taste, &row).unwrap_or(0.0).clamp(0.0, 1.0);
                (song, score)
            })
            .filter(|(_, score)| *score > self.min_similarity)
            .map(|(song, score)| (song.clone(), score))
            .collect();

        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));

        tracing::debug!(
            vocabulary = vocabulary_size,
            scored = scored.len(),
            "Content-based scoring completed"
        );

        scored
    }
}
