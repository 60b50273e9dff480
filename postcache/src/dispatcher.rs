use crate::events::{EventBus, PostEvent, ResyncReason};
use crate::ports::DomainEventHandler;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[derive(Clone, Copy, Debug)]
pub struct DispatcherConfig {
    /// Extra deliveries after the first failure.
    pub max_redeliveries: u32,
    /// Base delay, multiplied by the attempt number.
    pub redelivery_backoff: Duration,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            max_redeliveries: 3,
            redelivery_backoff: Duration::from_millis(200),
        }
    }
}

impl From<&shared::config::Config> for DispatcherConfig {
    fn from(config: &shared::config::Config) -> Self {
        Self {
            max_redeliveries: config.max_redeliveries,
            redelivery_backoff: config.redelivery_backoff,
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DispatchOutcome {
    pub delivered: usize,
    pub failed: usize,
}

/// Delivers post events to handlers, one event at a time, in arrival order.
///
/// Redelivery of failed handlers lives here, handlers themselves never retry.
pub struct EventDispatcher {
    handlers: Vec<Arc<dyn DomainEventHandler>>,
    config: DispatcherConfig,
}

impl EventDispatcher {
    pub fn new(config: DispatcherConfig) -> Self {
        Self {
            handlers: Vec::new(),
            config,
        }
    }

    pub fn with_handler(mut self, handler: Arc<dyn DomainEventHandler>) -> Self {
        self.handlers.push(handler);
        self
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }

    /// Deliver one event to every handler.
    ///
    /// A pending redelivery is abandoned as soon as `shutdown` fires.
    pub async fn dispatch(
        &self,
        event: &PostEvent,
        shutdown: &CancellationToken,
    ) -> DispatchOutcome {
        let mut outcome = DispatchOutcome::default();

        for handler in &self.handlers {
            if self.deliver(handler.as_ref(), event, shutdown).await {
                outcome.delivered += 1;
            } else {
                outcome.failed += 1;
            }
        }

        outcome
    }

    async fn deliver(
        &self,
        handler: &dyn DomainEventHandler,
        event: &PostEvent,
        shutdown: &CancellationToken,
    ) -> bool {
        let mut attempt: u32 = 0;

        loop {
            match handler.handle(event).await {
                Ok(()) => return true,
                Err(e) if attempt < self.config.max_redeliveries => {
                    attempt += 1;
                    warn!(
                        handler = handler.name(),
                        event.id = %event.event_id(),
                        event.kind = event.kind(),
                        attempt,
                        error = %e,
                        "Handler failed, redelivering"
                    );
                    tokio::select! {
                        _ = shutdown.cancelled() => {
                            warn!(
                                handler = handler.name(),
                                event.id = %event.event_id(),
                                event.kind = event.kind(),
                                attempt,
                                "Shutdown during redelivery backoff, dropping event"
                            );
                            return false;
                        }
                        _ = tokio::time::sleep(self.config.redelivery_backoff * attempt) => {}
                    }
                }
                Err(e) => {
                    error!(
                        handler = handler.name(),
                        event.id = %event.event_id(),
                        event.kind = event.kind(),
                        attempts = attempt + 1,
                        error = %e,
                        "Handler failed, giving up on event"
                    );
                    return false;
                }
            }
        }
    }

    /// Consume events until the channel closes or `shutdown` fires.
    pub async fn run(self, mut rx: broadcast::Receiver<PostEvent>, shutdown: CancellationToken) {
        info!(handlers = self.handlers.len(), "Event dispatcher started");

        loop {
            let received = tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Event dispatcher received shutdown");
                    break;
                }
                received = rx.recv() => received,
            };

            match received {
                Ok(event) => {
                    self.dispatch(&event, &shutdown).await;
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Event dispatcher lagged, requesting resync");
                    let resync = PostEvent::resync(ResyncReason::Lagged { skipped });
                    self.dispatch(&resync, &shutdown).await;
                }
                Err(RecvError::Closed) => {
                    info!("Event bus closed");
                    break;
                }
            }
        }

        info!("Event dispatcher stopped");
    }

    /// Subscribe to `bus` and run on a background task.
    pub fn spawn(self, bus: &EventBus, shutdown: CancellationToken) -> JoinHandle<()> {
        let rx = bus.subscribe();
        tokio::spawn(self.run(rx, shutdown))
    }
}
