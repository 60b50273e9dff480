use crate::domain::{NewPost, Post, PostChanges, PostId};
use crate::events::{EventBus, PostEvent};
use crate::ports::PostRepository;
use shared::{Error, Result};
use std::sync::Arc;

/// Write path for posts.
///
/// Every successful write is persisted first, then announced on the event bus.
#[derive(Clone)]
pub struct PostService {
    posts: Arc<dyn PostRepository>,
    bus: EventBus,
}

impl PostService {
    pub fn new(posts: Arc<dyn PostRepository>, bus: EventBus) -> Self {
        Self { posts, bus }
    }

    pub async fn create(&self, new_post: NewPost) -> Result<Post> {
        let post = self.posts.insert(new_post).await?;
        tracing::debug!(post.id = %post.id, "Post created");

        self.bus.publish(PostEvent::created(post.id));
        Ok(post)
    }

    /// Apply `changes` to a post. An empty change set leaves the store and cache untouched.
    pub async fn update(&self, id: PostId, changes: PostChanges) -> Result<Post> {
        if changes.is_empty() {
            return self.posts.find(id).await?.ok_or(Error::NotFound);
        }

        let post = self.posts.update(id, changes).await?;
        tracing::debug!(post.id = %id, "Post updated");

        self.bus.publish(PostEvent::updated(id));
        Ok(post)
    }

    /// Delete a post; a missing id is `Error::NotFound` and publishes nothing.
    pub async fn delete(&self, id: PostId) -> Result<()> {
        if !self.posts.delete(id).await? {
            return Err(Error::NotFound);
        }
        tracing::debug!(post.id = %id, "Post deleted");

        self.bus.publish(PostEvent::deleted(id));
        Ok(())
    }
}

impl std::fmt::Debug for PostService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostService")
            .field("bus", &self.bus)
            .finish_non_exhaustive()
    }
}
