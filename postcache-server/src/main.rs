use postcache::{
    CacheKey, CacheSynchronizer, CachedPosts, DispatcherConfig, EventBus, EventDispatcher,
    PostEvent, PostFactory, PostRepository, PostService, ResyncReason, SledPostRepository,
};
use shared::config::Config;
use std::path::Path;
use std::sync::Arc;
use storage_engine::MokaCacheStore;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Starting postcache");

    match dotenvy::dotenv() {
        Ok(_) => info!("Loaded environment variables from .env file"),
        Err(_) => info!("No .env file found, using system environment variables"),
    }

    let config = Config::from_env()?;

    // Stores
    let posts: Arc<dyn PostRepository> = Arc::new(SledPostRepository::new(
        Path::new(&config.data_dir).join("posts.sled"),
    )?);
    let cache = Arc::new(MokaCacheStore::new("posts", config.cache_max_entries));
    let key = CacheKey::new(config.cache_key.clone())?;

    info!(data_dir = %config.data_dir, cache.key = %key, "Stores opened");

    // Event plumbing
    let bus = EventBus::new(config.event_capacity);
    let shutdown = CancellationToken::new();

    let synchronizer = Arc::new(CacheSynchronizer::new(
        cache.clone(),
        posts.clone(),
        key.clone(),
    ));
    let dispatcher = EventDispatcher::new(DispatcherConfig::from(&config)).with_handler(synchronizer);
    info!(
        handlers = dispatcher.handler_count(),
        max_redeliveries = config.max_redeliveries,
        "Spawning event dispatcher"
    );
    let dispatcher_handle = dispatcher.spawn(&bus, shutdown.clone());

    // Warm the cache before anything reads it
    bus.publish(PostEvent::resync(ResyncReason::Startup));

    let service = PostService::new(posts.clone(), bus.clone());
    if config.seed_posts > 0 {
        let existing = posts.count().await?;
        if existing == 0 {
            let seeded = PostFactory::default()
                .seed(&service, config.seed_posts)
                .await?;
            info!(posts.count = seeded.len(), "Seeded fake posts");
        } else {
            info!(posts.count = existing, "Store not empty, skipping seed");
        }
    }

    let reader = CachedPosts::new(cache.clone(), posts.clone(), key);
    let visible = reader.all().await?;
    info!(posts.count = visible.len(), cache.entries = cache.entry_count(), "postcache ready");

    shutdown_signal().await;
    shutdown.cancel();

    if let Err(e) = dispatcher_handle.await {
        warn!("Event dispatcher task failed: {}", e);
    }

    info!("postcache shutting down");
    Ok(())
}

// Graceful shutdown handler
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            info!("Received terminate signal");
        },
    }

    info!("Shutting down gracefully...");
}
