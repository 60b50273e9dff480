use crate::domain::{NewPost, Post};
use crate::planes::data::PostService;
use fake::Fake;
use fake::faker::lorem::en::{Paragraph, Sentence};
use shared::Result;

/// Fake post generator for seeding and tests.
#[derive(Clone, Copy, Debug)]
pub struct PostFactory {
    user_id: u64,
}

impl Default for PostFactory {
    fn default() -> Self {
        Self { user_id: 1 }
    }
}

impl PostFactory {
    pub fn for_user(user_id: u64) -> Self {
        Self { user_id }
    }

    pub fn make(&self) -> NewPost {
        NewPost {
            user_id: self.user_id,
            title: Sentence(3..8).fake(),
            description: Paragraph(2..5).fake(),
        }
    }

    pub fn make_many(&self, count: usize) -> Vec<NewPost> {
        (0..count).map(|_| self.make()).collect()
    }

    /// Create `count` posts through the write path, one event per post.
    pub async fn seed(&self, service: &PostService, count: usize) -> Result<Vec<Post>> {
        let mut created = Vec::with_capacity(count);
        for new_post in self.make_many(count) {
            created.push(service.create(new_post).await?);
        }
        Ok(created)
    }
}
