use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::EnvFilter;

use lexica_api::api::{create_router, AppState};
use lexica_api::config::Config;
use lexica_api::db::{self, Cache};
use lexica_api::services::orchestrator::{RecommendationService, Settings};
use lexica_api::stores::pg::PgStore;
use lexica_api::stores::search::CirrusSearch;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env()?;

    // Storage and cache backends
    let pool = db::create_pool(&config.database_url).await?;
    let redis_client = db::create_redis_client(&config.redis_url)?;
    let (cache, cache_writer) = Cache::new(redis_client).await;

    let store = Arc::new(PgStore::new(pool, cache.clone()));
    let search = Arc::new(CirrusSearch::new(cache, config.search_api_url.clone()));

    let settings = Settings {
        source_timeout: Duration::from_secs(config.recommender_timeout_secs),
        history_max_age: config.history_max_age,
        ..Settings::default()
    };

    let service = Arc::new(RecommendationService::new(
        store.clone(),
        store.clone(),
        store.clone(),
        search,
        store.clone(),
        store.clone(),
        settings,
    ));

    let app = create_router(AppState::new(service));

    let listener = tokio::net::TcpListener::bind((config.host.as_str(), config.port)).await?;
    tracing::info!(host = %config.host, port = config.port, "lexica-api listening");
    axum::serve(listener, app).await?;

    // Flush pending cache writes before exiting
    cache_writer.shutdown().await;

    Ok(())
}
