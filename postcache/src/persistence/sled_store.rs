use crate::domain::{NewPost, Post, PostChanges, PostId};
use crate::ports::PostRepository;
use async_trait::async_trait;
use chrono::Utc;
use shared::{Error, Result};
use std::path::Path;

const POSTS_TREE: &str = "posts";

/// Sled-based post store.
///
/// Keys are big-endian ids so iteration order is id order.
#[derive(Clone)]
pub struct SledPostRepository {
    db: sled::Db,
    posts: sled::Tree,
}

impl SledPostRepository {
    /// Open (or create) the store at `path`, creating the parent directory if needed.
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| Error::DataStoreUnavailable(format!("Failed to create directory: {}", e)))?;
        }

        let db = sled::open(path).map_err(|e| unavailable("Failed to open Sled database", e))?;
        let posts = db
            .open_tree(POSTS_TREE)
            .map_err(|e| unavailable("Failed to open posts tree", e))?;

        Ok(Self { db, posts })
    }

    fn decode(bytes: &[u8]) -> Result<Post> {
        serde_json::from_slice(bytes)
            .map_err(|e| Error::DataStoreUnavailable(format!("Corrupt post record: {}", e)))
    }

    fn write(&self, post: &Post) -> Result<()> {
        let value = serde_json::to_vec(post)?;

        self.posts
            .insert(post.id.0.to_be_bytes(), value)
            .map_err(|e| unavailable("Failed to save post", e))?;

        self.posts
            .flush()
            .map_err(|e| unavailable("Failed to flush database", e))?;

        Ok(())
    }
}

fn unavailable(context: &str, e: sled::Error) -> Error {
    Error::DataStoreUnavailable(format!("{}: {}", context, e))
}

#[async_trait]
impl PostRepository for SledPostRepository {
    async fn fetch_all(&self) -> Result<Vec<Post>> {
        let mut posts = Vec::new();

        for item in self.posts.iter() {
            let (_, value) = item.map_err(|e| unavailable("Failed to iterate posts", e))?;
            posts.push(Self::decode(&value)?);
        }

        Ok(posts)
    }

    async fn find(&self, id: PostId) -> Result<Option<Post>> {
        let value = self
            .posts
            .get(id.0.to_be_bytes())
            .map_err(|e| unavailable("Failed to get post", e))?;

        value.map(|bytes| Self::decode(&bytes)).transpose()
    }

    async fn insert(&self, new_post: NewPost) -> Result<Post> {
        // sled ids start at 0, posts start at 1
        let id = self
            .db
            .generate_id()
            .map_err(|e| unavailable("Failed to generate post id", e))?
            + 1;
        let now = Utc::now();

        let post = Post {
            id: PostId(id),
            user_id: new_post.user_id,
            title: new_post.title,
            description: new_post.description,
            created_at: now,
            updated_at: now,
        };

        self.write(&post)?;
        Ok(post)
    }

    async fn update(&self, id: PostId, changes: PostChanges) -> Result<Post> {
        let mut post = self.find(id).await?.ok_or(Error::NotFound)?;

        changes.apply(&mut post, Utc::now());

        self.write(&post)?;
        Ok(post)
    }

    async fn delete(&self, id: PostId) -> Result<bool> {
        let removed = self
            .posts
            .remove(id.0.to_be_bytes())
            .map_err(|e| unavailable("Failed to delete post", e))?
            .is_some();

        self.posts
            .flush()
            .map_err(|e| unavailable("Failed to flush database", e))?;

        Ok(removed)
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.posts.len())
    }
}
