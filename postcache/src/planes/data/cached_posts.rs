use crate::domain::{CacheKey, Post};
use crate::ports::{CacheStore, PostRepository};
use shared::Result;
use std::sync::Arc;
use tracing::{debug, warn};

/// Read path for the post collection.
///
/// Serves the cached entry when present and falls through to the post store
/// on a miss. It never writes the cache; the synchronizer owns population.
#[derive(Clone)]
pub struct CachedPosts {
    cache: Arc<dyn CacheStore>,
    posts: Arc<dyn PostRepository>,
    key: CacheKey,
}

impl CachedPosts {
    pub fn new(cache: Arc<dyn CacheStore>, posts: Arc<dyn PostRepository>, key: CacheKey) -> Self {
        Self { cache, posts, key }
    }

    pub async fn all(&self) -> Result<Vec<Post>> {
        match self.cache.get(self.key.as_str()).await {
            Ok(Some(bytes)) => match serde_json::from_slice::<Vec<Post>>(&bytes) {
                Ok(posts) => {
                    debug!(cache.key = %self.key, posts.count = posts.len(), "Cache hit");
                    return Ok(posts);
                }
                Err(e) => {
                    warn!(cache.key = %self.key, error = %e, "Undecodable cache entry, reading store");
                }
            },
            Ok(None) => {
                debug!(cache.key = %self.key, "Cache miss, reading store");
            }
            Err(e) => {
                warn!(cache.key = %self.key, error = %e, "Cache read failed, reading store");
            }
        }

        self.posts.fetch_all().await
    }
}
