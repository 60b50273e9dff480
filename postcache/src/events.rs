use crate::domain::PostId;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PostEvent {
    Created(PostChanged),
    Updated(PostChanged),
    Deleted(PostChanged),
    Resync(ResyncRequested),
}

impl PostEvent {
    pub fn created(post_id: PostId) -> Self {
        PostEvent::Created(PostChanged::new(post_id))
    }

    pub fn updated(post_id: PostId) -> Self {
        PostEvent::Updated(PostChanged::new(post_id))
    }

    pub fn deleted(post_id: PostId) -> Self {
        PostEvent::Deleted(PostChanged::new(post_id))
    }

    pub fn resync(reason: ResyncReason) -> Self {
        PostEvent::Resync(ResyncRequested {
            event_id: Uuid::new_v4(),
            reason,
            timestamp: now_timestamp(),
        })
    }

    pub fn event_id(&self) -> Uuid {
        match self {
            PostEvent::Created(e) | PostEvent::Updated(e) | PostEvent::Deleted(e) => e.event_id,
            PostEvent::Resync(e) => e.event_id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            PostEvent::Created(_) => "created",
            PostEvent::Updated(_) => "updated",
            PostEvent::Deleted(_) => "deleted",
            PostEvent::Resync(_) => "resync",
        }
    }

    /// The post a write event is about, `None` for resyncs.
    pub fn post_id(&self) -> Option<PostId> {
        match self {
            PostEvent::Created(e) | PostEvent::Updated(e) | PostEvent::Deleted(e) => {
                Some(e.post_id)
            }
            PostEvent::Resync(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostChanged {
    pub event_id: Uuid,
    pub post_id: PostId,
    pub timestamp: u64,
}

impl PostChanged {
    fn new(post_id: PostId) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            post_id,
            timestamp: now_timestamp(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResyncRequested {
    pub event_id: Uuid,
    pub reason: ResyncReason,
    pub timestamp: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResyncReason {
    Startup,
    /// The subscriber fell behind and `skipped` events were dropped.
    Lagged { skipped: u64 },
}

/// Seconds since UNIX epoch
pub fn now_timestamp() -> u64 {
    u64::try_from(Utc::now().timestamp()).unwrap_or_default()
}

/// In-process fan-out of post events
#[derive(Clone, Debug)]
pub struct EventBus {
    sender: broadcast::Sender<PostEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publish an event, returning how many subscribers will see it.
    pub fn publish(&self, event: PostEvent) -> usize {
        let event_id = event.event_id();
        let kind = event.kind();

        match self.sender.send(event) {
            Ok(subscriber_count) => {
                tracing::debug!(
                    event.id = %event_id,
                    event.kind = kind,
                    subscriber_count,
                    "Published post event"
                );
                subscriber_count
            }
            Err(_) => {
                tracing::warn!(
                    event.id = %event_id,
                    event.kind = kind,
                    "No subscribers for post event"
                );
                0
            }
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PostEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}
