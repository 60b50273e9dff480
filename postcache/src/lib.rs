// postcache/src/lib.rs
pub mod dispatcher;
pub mod domain;
pub mod events;
pub mod factory;
pub mod persistence;
pub mod planes;
pub mod ports;
pub mod synchronizer;

pub use dispatcher::{DispatchOutcome, DispatcherConfig, EventDispatcher};
pub use domain::{CacheKey, NewPost, Post, PostChanges, PostId};
pub use events::{EventBus, PostEvent, ResyncReason};
pub use factory::PostFactory;
pub use persistence::SledPostRepository;
pub use planes::data::{CachedPosts, PostService};
pub use ports::{CacheStore, DomainEventHandler, PostRepository};
pub use synchronizer::{CacheSynchronizer, SyncReport};
