pub mod cached_posts;
pub mod post_operations;

pub use cached_posts::CachedPosts;
pub use post_operations::PostService;
