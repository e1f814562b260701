use std::sync::Arc;

use cadence_api::{
    config::Config,
    db::{self, InMemoryStore, MusicRepository, MusicStore},
    engine::{FeatureCache, LikeStore, RecommendationEngine, SearchCache},
    routes::{create_router, AppState},
    services::{
        providers::{SongSearcher, YoutubeSearcher},
        SuggestionService,
    },
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cadence_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    // Persistence: Postgres when configured, otherwise process-local
    let (store, like_store): (Arc<dyn MusicStore>, Arc<dyn LikeStore>) =
        match config.database_url.as_deref() {
            Some(url) => {
                let pool = db::create_pool(url).await?;
                tracing::info!("Connected to PostgreSQL");
                let repository = Arc::new(MusicRepository::new(pool));
                let store: Arc<dyn MusicStore> = repository.clone();
                let like_store: Arc<dyn LikeStore> = repository;
                (store, like_store)
            }
            None => {
                tracing::warn!("DATABASE_URL not set, using in-memory store");
                let memory = Arc::new(InMemoryStore::new());
                let store: Arc<dyn MusicStore> = memory.clone();
                let like_store: Arc<dyn LikeStore> = memory;
                (store, like_store)
            }
        };

    let mut youtube = YoutubeSearcher::new(
        config.youtube_api_key.clone(),
        config.youtube_api_url.clone(),
    )?;
    let search_available = youtube.is_configured();
    if !search_available {
        tracing::warn!("YOUTUBE_API_KEY not set, song search disabled");
    }

    let mut cache_writer = None;
    if let Some(url) = config.redis_url.as_deref() {
        let client = db::create_redis_client(url)?;
        let (cache, handle) = db::Cache::new(client);
        youtube = youtube.with_cache(cache);
        cache_writer = Some(handle);
        tracing::info!("Redis search cache enabled");
    }
    let searcher: Arc<dyn SongSearcher> = Arc::new(youtube);

    let engine = RecommendationEngine::new(config.engine_config(), like_store, searcher.clone())
        .with_caches(
            Arc::new(FeatureCache::new(config.engine_feature_cache_size)),
            Arc::new(
                SearchCache::new(config.engine_search_cache_size)
                    .with_ttl(config.search_cache_ttl()),
            ),
        );

    let suggestions = SuggestionService::new(
        Arc::new(engine),
        store,
        searcher,
        config.engine_candidate_pool_size,
    );
    let state = AppState::new(Arc::new(suggestions), search_available)
        .with_allowed_origins(config.allowed_origins());
    let app = create_router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(handle) = cache_writer {
        handle.shutdown().await;
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    tracing::info!("Shutdown signal received");
}
