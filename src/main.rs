use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use shelfwise::{
    api::{create_router, AppState},
    config::Config,
    db::{create_pool, create_redis_client, Cache, CacheWriterHandle},
    services::{
        catalog::{CatalogClient, HttpCatalog, InMemoryCatalog},
        library::{LibraryStore, MemoryStore, PostgresStore},
    },
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("shelfwise=info,tower_http=info")),
        )
        .init();

    let config = Config::from_env()?;

    let (catalog, cache_writer) = build_catalog(&config).await?;
    let store = build_store(&config).await?;

    let state = AppState::start(catalog, store, config.search_debounce());
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(config.bind_address())
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_address()))?;
    tracing::info!(address = %config.bind_address(), "Server running");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(handle) = cache_writer {
        handle.shutdown().await;
    }

    Ok(())
}

async fn build_catalog(
    config: &Config,
) -> anyhow::Result<(Arc<dyn CatalogClient>, Option<CacheWriterHandle>)> {
    if let Some(path) = &config.catalog_file {
        let catalog = InMemoryCatalog::from_file(path).await?;
        return Ok((Arc::new(catalog), None));
    }

    let (cache, handle) = match &config.redis_url {
        Some(url) => {
            let (cache, handle) = Cache::new(create_redis_client(url)?);
            (Some(cache), Some(handle))
        }
        None => (None, None),
    };

    tracing::info!(
        catalog_url = %config.catalog_url,
        cached = cache.is_some(),
        "Using HTTP catalog"
    );

    let catalog = HttpCatalog::new(
        cache,
        config.catalog_api_key.clone(),
        &config.catalog_url,
        config.catalog_timeout(),
    )?;
    Ok((Arc::new(catalog), handle))
}

async fn build_store(config: &Config) -> anyhow::Result<Arc<dyn LibraryStore>> {
    match &config.database_url {
        Some(url) => {
            let pool = create_pool(url).await?;
            Ok(Arc::new(PostgresStore::new(pool).await?))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, favorites are kept in memory only");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    tracing::info!("Shutdown signal received");
}
