use crate::domain::CacheKey;
use crate::events::PostEvent;
use crate::ports::{CacheStore, DomainEventHandler, PostRepository};
use async_trait::async_trait;
use bytes::Bytes;
use shared::{Error, Expiry, Result};
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Keeps one cache entry equal to the full post collection.
///
/// Every event runs a complete cycle: delete the entry, read all posts from
/// the store, write them back with no expiration. The entry is removed before
/// the store is read, so a failure part way leaves a miss, never stale data.
#[derive(Clone)]
pub struct CacheSynchronizer {
    cache: Arc<dyn CacheStore>,
    posts: Arc<dyn PostRepository>,
    key: CacheKey,
}

/// What one synchronization did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncReport {
    /// An entry existed and was removed.
    pub invalidated: bool,
    /// Number of posts written back.
    pub stored: usize,
}

impl CacheSynchronizer {
    pub fn new(cache: Arc<dyn CacheStore>, posts: Arc<dyn PostRepository>, key: CacheKey) -> Self {
        Self { cache, posts, key }
    }

    #[instrument(
        skip(self, event),
        fields(cache.key = %self.key, event.id = %event.event_id(), event.kind = event.kind())
    )]
    pub async fn on_domain_event(&self, event: &PostEvent) -> Result<SyncReport> {
        let invalidated = self
            .cache
            .delete(self.key.as_str())
            .await
            .map_err(cache_unavailable)?;
        debug!(invalidated, "Cache entry invalidated");

        let posts = self.posts.fetch_all().await.map_err(store_unavailable)?;
        let payload = serde_json::to_vec(&posts)?;

        self.cache
            .put(self.key.as_str(), Bytes::from(payload), Expiry::Never)
            .await
            .map_err(cache_unavailable)?;

        info!(posts.count = posts.len(), "Cache entry repopulated");

        Ok(SyncReport {
            invalidated,
            stored: posts.len(),
        })
    }
}

#[async_trait]
impl DomainEventHandler for CacheSynchronizer {
    fn name(&self) -> &str {
        "cache-synchronizer"
    }

    async fn handle(&self, event: &PostEvent) -> Result<()> {
        self.on_domain_event(event).await.map(|_| ())
    }
}

impl std::fmt::Debug for CacheSynchronizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheSynchronizer")
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

fn cache_unavailable(err: Error) -> Error {
    match err {
        Error::CacheUnavailable(_) => err,
        other => Error::CacheUnavailable(other.to_string()),
    }
}

fn store_unavailable(err: Error) -> Error {
    match err {
        Error::DataStoreUnavailable(_) => err,
        other => Error::DataStoreUnavailable(other.to_string()),
    }
}
