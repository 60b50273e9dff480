use async_trait::async_trait;
use bytes::Bytes;
use postcache::{
    CacheKey, CacheStore, CacheSynchronizer, CachedPosts, DispatcherConfig, EventBus,
    EventDispatcher, NewPost, Post, PostChanges, PostEvent, PostFactory, PostId, PostRepository,
    PostService, ResyncReason, SledPostRepository,
};
use shared::{Error, Expiry, Result};
use std::sync::Arc;
use std::time::Duration;
use storage_engine::MokaCacheStore;
use tokio_util::sync::CancellationToken;

struct Harness {
    _dir: tempfile::TempDir,
    posts: Arc<SledPostRepository>,
    cache: Arc<MokaCacheStore>,
}

/// Post store whose backend is down.
struct UnreachablePosts;

impl UnreachablePosts {
    fn down<T>() -> Result<T> {
        Err(Error::DataStoreUnavailable("connection refused".to_string()))
    }
}

#[async_trait]
impl PostRepository for UnreachablePosts {
    async fn fetch_all(&self) -> Result<Vec<Post>> {
        Self::down()
    }

    async fn find(&self, _id: PostId) -> Result<Option<Post>> {
        Self::down()
    }

    async fn insert(&self, _post: NewPost) -> Result<Post> {
        Self::down()
    }

    async fn update(&self, _id: PostId, _changes: PostChanges) -> Result<Post> {
        Self::down()
    }

    async fn delete(&self, _id: PostId) -> Result<bool> {
        Self::down()
    }

    async fn count(&self) -> Result<usize> {
        Self::down()
    }
}

impl Harness {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let posts = Arc::new(SledPostRepository::new(dir.path().join("posts.sled")).unwrap());
        Self {
            _dir: dir,
            posts,
            cache: Arc::new(MokaCacheStore::new_unbounded("posts")),
        }
    }

    fn synchronizer(&self) -> CacheSynchronizer {
        CacheSynchronizer::new(self.cache.clone(), self.posts.clone(), CacheKey::posts())
    }

    fn dispatcher(&self) -> EventDispatcher {
        dispatcher_for(self.synchronizer())
    }

    async fn cached(&self) -> Option<Vec<Post>> {
        self.cache
            .get("posts")
            .await
            .unwrap()
            .map(|bytes| serde_json::from_slice(&bytes).unwrap())
    }
}

fn dispatcher_for(synchronizer: CacheSynchronizer) -> EventDispatcher {
    EventDispatcher::new(DispatcherConfig {
        max_redeliveries: 1,
        redelivery_backoff: Duration::ZERO,
    })
    .with_handler(Arc::new(synchronizer))
}

#[tokio::test]
async fn test_writes_through_the_service_end_up_in_the_cache() {
    let harness = Harness::new();
    let bus = EventBus::new(64);
    let rx = bus.subscribe();
    let service = PostService::new(harness.posts.clone(), bus.clone());

    let first = service
        .create(NewPost::new(1, "First", "Hello"))
        .await
        .unwrap();
    let second = service
        .create(NewPost::new(1, "Second", "World"))
        .await
        .unwrap();
    service
        .update(first.id, PostChanges::default().title("First, edited"))
        .await
        .unwrap();
    let third = service
        .create(NewPost::new(2, "Third", "Again"))
        .await
        .unwrap();
    service.delete(second.id).await.unwrap();

    drop(service);
    drop(bus);
    harness.dispatcher().run(rx, CancellationToken::new()).await;

    let cached = harness.cached().await.unwrap();
    let ids: Vec<PostId> = cached.iter().map(|p| p.id).collect();
    assert_eq!(ids, vec![first.id, third.id]);
    assert_eq!(cached[0].title, "First, edited");
}

#[tokio::test]
async fn test_cache_matches_store_after_seeding() {
    let harness = Harness::new();
    let bus = EventBus::new(64);
    let rx = bus.subscribe();
    let service = PostService::new(harness.posts.clone(), bus.clone());

    PostFactory::default().seed(&service, 5).await.unwrap();

    drop(service);
    drop(bus);
    harness.dispatcher().run(rx, CancellationToken::new()).await;

    let reader = CachedPosts::new(harness.cache.clone(), harness.posts.clone(), CacheKey::posts());
    let from_cache = reader.all().await.unwrap();
    assert_eq!(from_cache.len(), 5);
    assert_eq!(Some(from_cache), harness.cached().await);
}

#[tokio::test]
async fn test_startup_resync_populates_existing_posts() {
    let harness = Harness::new();
    let bus = EventBus::new(4);

    harness
        .posts
        .insert(NewPost::new(1, "Before start", "Body"))
        .await
        .unwrap();
    assert_eq!(harness.cached().await, None);

    let shutdown = CancellationToken::new();
    let handle = harness.dispatcher().spawn(&bus, shutdown.clone());
    bus.publish(PostEvent::resync(ResyncReason::Startup));

    let mut cached = None;
    for _ in 0..50 {
        cached = harness.cached().await;
        if cached.is_some() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    shutdown.cancel();
    handle.await.unwrap();

    let cached = cached.expect("resync should populate the cache");
    assert_eq!(cached.len(), 1);
    assert_eq!(cached[0].title, "Before start");
}

#[tokio::test]
async fn test_forever_entry_survives_idle_time() {
    let harness = Harness::new();
    harness
        .synchronizer()
        .on_domain_event(&PostEvent::resync(ResyncReason::Startup))
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(200)).await;

    assert_eq!(harness.cached().await, Some(Vec::new()));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_concurrent_dispatchers_converge_on_store_contents() {
    let harness = Harness::new();
    let bus = EventBus::new(256);
    let shutdown = CancellationToken::new();
    let first = harness.dispatcher().spawn(&bus, shutdown.clone());
    let second = harness.dispatcher().spawn(&bus, shutdown.clone());
    let service = PostService::new(harness.posts.clone(), bus.clone());

    let writers: Vec<_> = (0..4)
        .map(|writer| {
            let service = service.clone();
            tokio::spawn(async move {
                let factory = PostFactory::for_user(writer + 1);
                for post in factory.make_many(5) {
                    let created = service.create(post).await.unwrap();
                    if created.id.0 % 3 == 0 {
                        service.delete(created.id).await.unwrap();
                    }
                }
            })
        })
        .collect();
    for writer in writers {
        writer.await.unwrap();
    }

    drop(service);
    drop(bus);
    first.await.unwrap();
    second.await.unwrap();

    let stored = harness.posts.fetch_all().await.unwrap();
    assert!(!stored.is_empty());
    assert_eq!(harness.cached().await, Some(stored));
}

#[tokio::test]
async fn test_failed_warm_up_leaves_key_absent() {
    let harness = Harness::new();
    harness
        .cache
        .put("posts", Bytes::from_static(b"[]"), Expiry::Never)
        .await
        .unwrap();

    let synchronizer =
        CacheSynchronizer::new(harness.cache.clone(), Arc::new(UnreachablePosts), CacheKey::posts());
    let bus = EventBus::new(4);
    let rx = bus.subscribe();
    bus.publish(PostEvent::resync(ResyncReason::Startup));
    drop(bus);

    tokio::time::timeout(
        Duration::from_secs(1),
        dispatcher_for(synchronizer).run(rx, CancellationToken::new()),
    )
    .await
    .expect("dispatcher should give up and drain the bus");

    assert!(!harness.cache.exists("posts").await.unwrap());

    let reader = CachedPosts::new(harness.cache.clone(), Arc::new(UnreachablePosts), CacheKey::posts());
    assert!(matches!(reader.all().await, Err(Error::DataStoreUnavailable(_))));
}
