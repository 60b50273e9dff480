use async_trait::async_trait;
use bytes::Bytes;
use moka::Expiry as ExpiryPolicy;
use moka::future::Cache;
use postcache::ports::CacheStore;
use shared::{Expiry, Result};
use std::fmt::Debug;
use std::time::{Duration, Instant};

#[derive(Clone, Debug)]
struct CachedValue {
    bytes: Bytes,
    expiry: Expiry,
}

/// Reads the lifetime from each entry; an overwrite takes the new entry's lifetime.
struct PerEntryExpiry;

impl ExpiryPolicy<String, CachedValue> for PerEntryExpiry {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &CachedValue,
        _created_at: Instant,
    ) -> Option<Duration> {
        value.expiry.ttl()
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &CachedValue,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        value.expiry.ttl()
    }
}

/// Moka-based cache store with per-entry expiry
/// `Expiry::Never` entries stay until deleted or evicted for capacity
pub struct MokaCacheStore {
    cache: Cache<String, CachedValue>,
}

impl MokaCacheStore {
    /// Create a Moka cache from name and optional capacity
    pub fn new(name: &str, max_entries: Option<u64>) -> Self {
        let mut builder = Cache::builder().name(name).expire_after(PerEntryExpiry);

        if let Some(capacity) = max_entries {
            builder = builder.max_capacity(capacity);
        }

        Self {
            cache: builder.build(),
        }
    }

    pub fn new_unbounded(name: &str) -> Self {
        Self::new(name, None)
    }

    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }
}

#[async_trait]
impl CacheStore for MokaCacheStore {
    async fn put(&self, key: &str, value: Bytes, expiry: Expiry) -> Result<()> {
        let size = value.len();
        self.cache
            .insert(key.to_string(), CachedValue { bytes: value, expiry })
            .await;
        tracing::debug!(cache.key = %key, cache.bytes = size, cache.expiry = ?expiry, "Cache set");
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Bytes>> {
        // None covers both absent and expired
        Ok(self.cache.get(key).await.map(|entry| entry.bytes))
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let existed = self.cache.remove(key).await.is_some();
        tracing::debug!(cache.key = %key, existed, "Cache invalidated");
        Ok(existed)
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.cache.contains_key(key))
    }
}

impl Debug for MokaCacheStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MokaCacheStore")
            .field("name", &self.cache.name())
            .field("entry_count", &self.cache.entry_count())
            .field("weighted_size", &self.cache.weighted_size())
            .finish()
    }
}
