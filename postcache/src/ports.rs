#![deny(clippy::all)]

use crate::domain::{NewPost, Post, PostChanges, PostId};
use crate::events::PostEvent;
use async_trait::async_trait;
use bytes::Bytes;
use shared::{Expiry, Result};

// Ports are the pluggable seams between the synchronizer and the stores it talks to

/// Port for the shared cache store (e.g., Moka)
#[async_trait]
pub trait CacheStore: Send + Sync + 'static {
    /// Write `value` under `key`, replacing any previous value.
    async fn put(&self, key: &str, value: Bytes, expiry: Expiry) -> Result<()>;

    async fn get(&self, key: &str) -> Result<Option<Bytes>>;

    /// Remove `key`. Returns whether an entry existed; a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<bool>;

    async fn exists(&self, key: &str) -> Result<bool>;
}

/// Port for the authoritative post store
#[async_trait]
pub trait PostRepository: Send + Sync + 'static {
    /// Every post, ordered by id.
    async fn fetch_all(&self) -> Result<Vec<Post>>;

    async fn find(&self, id: PostId) -> Result<Option<Post>>;

    async fn insert(&self, post: NewPost) -> Result<Post>;

    /// Fails with `Error::NotFound` when no post has this id.
    async fn update(&self, id: PostId, changes: PostChanges) -> Result<Post>;

    async fn delete(&self, id: PostId) -> Result<bool>;

    async fn count(&self) -> Result<usize>;
}

/// Port for anything reacting to post events
#[async_trait]
pub trait DomainEventHandler: Send + Sync + 'static {
    fn name(&self) -> &str;

    async fn handle(&self, event: &PostEvent) -> Result<()>;
}
