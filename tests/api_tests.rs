use std::collections::HashMap;
use std::sync::Arc;

use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum_test::TestServer;
use serde_json::{json, Value};

use cadence_api::{
    db::InMemoryStore,
    engine::{EngineConfig, RecommendationEngine},
    error::AppResult,
    models::{SearchHit, Song, SongId},
    routes::{create_router, AppState},
    services::{providers::SongSearcher, SuggestionService},
};

/// Answers from a fixed table keyed by lowercased query
#[derive(Default)]
struct StubSearcher {
    answers: HashMap<String, Vec<SearchHit>>,
}

impl StubSearcher {
    fn answer(mut self, query: &str, hits: &[(&str, &str, &str)]) -> Self {
        let hits = hits
            .iter()
            .map(|(id, title, artist)| SearchHit {
                video_id: SongId::new(*id),
                title: title.to_string(),
                artist: artist.to_string(),
            })
            .collect();
        self.answers.insert(query.to_lowercase(), hits);
        self
    }
}

#[async_trait::async_trait]
impl SongSearcher for StubSearcher {
    async fn search(&self, query: &str, max_results: usize) -> AppResult<Vec<SearchHit>> {
        let mut hits = self
            .answers
            .get(&query.to_lowercase())
            .cloned()
            .unwrap_or_default();
        hits.truncate(max_results);
        Ok(hits)
    }

    fn name(&self) -> &'static str {
        "stub"
    }
}

fn create_test_server(
    store: Arc<InMemoryStore>,
    searcher: StubSearcher,
    search_available: bool,
) -> TestServer {
    let searcher: Arc<dyn SongSearcher> = Arc::new(searcher);
    let engine = RecommendationEngine::new(EngineConfig::default(), store.clone(), searcher.clone());
    let suggestions = SuggestionService::new(Arc::new(engine), store, searcher, 1000);
    let app = create_router(AppState::new(Arc::new(suggestions), search_available));
    TestServer::new(app).unwrap()
}

async fn synthwave_catalog() -> Arc<InMemoryStore> {
    let store = Arc::new(InMemoryStore::new());
    store
        .insert_song(Song::new("b", "Neon Drive", "Synthwave Kid").with_genre("Synthwave"))
        .await;
    store
        .insert_song(Song::new("c", "Harvest Moon", "Banjo Bill").with_genre("Bluegrass"))
        .await;
    store
}

#[tokio::test]
async fn test_health_check() {
    let server = create_test_server(Arc::new(InMemoryStore::new()), StubSearcher::default(), true);

    let response = server.get("/health").await;
    response.assert_status_ok();
    response.assert_json(&json!({ "status": "healthy" }));
}

#[tokio::test]
async fn test_suggestions_rank_similar_catalog_songs() {
    let searcher = StubSearcher::default().answer(
        "Midnight Drive",
        &[("a", "Midnight Drive", "Synthwave Kid")],
    );
    let server = create_test_server(synthwave_catalog().await, searcher, true);

    let response = server
        .post("/api/v1/suggestions")
        .json(&json!({
            "user_id": "alice",
            "songs": ["Midnight Drive"],
            "num_suggestions": 5
        }))
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    let suggestions = body["suggestions"].as_array().unwrap();
    assert_eq!(suggestions.len(), 1);
    assert_eq!(suggestions[0]["youtube_video_id"], "b");
    assert_eq!(suggestions[0]["title"], "Neon Drive");
    assert_eq!(suggestions[0]["score"], 0.8);
}

#[tokio::test]
async fn test_suggestions_without_search_key_is_unavailable() {
    let server = create_test_server(synthwave_catalog().await, StubSearcher::default(), false);

    let response = server
        .post("/api/v1/suggestions")
        .json(&json!({ "user_id": "alice", "songs": ["Midnight Drive"] }))
        .await;

    response.assert_status(StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_suggestions_reject_invalid_input() {
    let server = create_test_server(synthwave_catalog().await, StubSearcher::default(), true);

    let response = server
        .post("/api/v1/suggestions")
        .json(&json!({ "user_id": "alice", "songs": [] }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);

    let response = server
        .post("/api/v1/suggestions")
        .json(&json!({ "user_id": "alice", "songs": ["x"], "num_suggestions": 0 }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unresolvable_songs_return_not_found() {
    let server = create_test_server(synthwave_catalog().await, StubSearcher::default(), true);

    let response = server
        .post("/api/v1/suggestions")
        .json(&json!({ "user_id": "alice", "songs": ["No Such Song"] }))
        .await;

    response.assert_status(StatusCode::NOT_FOUND);
    let body: Value = response.json();
    assert_eq!(
        body["error"],
        "Could not find personalized suggestions for the provided songs."
    );
}

#[tokio::test]
async fn test_likes_are_listed_after_suggestion_request() {
    let searcher = StubSearcher::default().answer(
        "Midnight Drive",
        &[("a", "Midnight Drive", "Synthwave Kid")],
    );
    let server = create_test_server(synthwave_catalog().await, searcher, true);

    server
        .post("/api/v1/suggestions")
        .json(&json!({ "user_id": "alice", "songs": ["Midnight Drive"] }))
        .await
        .assert_status_ok();

    let response = server.get("/api/v1/users/alice/likes").await;
    response.assert_status_ok();
    let likes: Vec<Value> = response.json();
    assert_eq!(likes.len(), 1);
    assert_eq!(likes[0]["title"], "Midnight Drive");
    assert_eq!(likes[0]["video_id"], "a");

    let response = server.get("/api/v1/users/bob/likes").await;
    response.assert_status(StatusCode::NOT_FOUND);
    let body: Value = response.json();
    assert_eq!(body["error"], "No likes stored for user bob");
}

#[tokio::test]
async fn test_stored_likes_fall_back_to_genre_hits() {
    let store = Arc::new(InMemoryStore::new());
    let liked = Song::new("p", "Quiet Piano", "Keys").with_genre("Classical");
    store.insert_song(liked.clone()).await;
    store
        .insert_song(Song::new("d", "Loud Drums", "Thunder").with_genre("Metal"))
        .await;
    store.like("carol", &[&liked.id]).await;

    let searcher = StubSearcher::default().answer(
        "Top Metal songs",
        &[("m1", "Anthem", "Forge"), ("m2", "Hammer", "Forge")],
    );
    let server = create_test_server(store, searcher, true);

    let response = server
        .get("/api/v1/users/carol/suggestions")
        .add_query_param("genre", "Metal")
        .add_query_param("limit", 1)
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    let suggestions = body["suggestions"].as_array().unwrap();
    assert_eq!(suggestions.len(), 1);
    assert_eq!(suggestions[0]["youtube_video_id"], "m1");
    assert_eq!(suggestions[0]["score"], 1.0);
}

#[tokio::test]
async fn test_request_id_is_echoed() {
    let server = create_test_server(Arc::new(InMemoryStore::new()), StubSearcher::default(), true);

    let response = server
        .get("/health")
        .add_header(
            HeaderName::from_static("x-request-id"),
            HeaderValue::from_static("trace-me-42"),
        )
        .await;

    assert_eq!(response.header("x-request-id"), "trace-me-42");
}
