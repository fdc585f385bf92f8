use std::sync::Arc;

use broccoli_queue::queue::BroccoliQueue;
use common::Clock;
use common::config::QueueConfig;
use common::event::{DomainEvent, Notification};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Capacity of the in-process channel. Slow subscribers lag rather than block.
const CHANNEL_CAPACITY: usize = 256;

/// Fans domain events out to in-process subscribers and, when configured,
/// to a Redis queue. Delivery is best-effort on both paths. Envelopes are
/// stamped with the shared clock.
#[derive(Clone)]
pub struct Notifier {
    tx: broadcast::Sender<DomainEvent>,
    clock: Arc<dyn Clock>,
    mq: Option<Arc<BroccoliQueue>>,
    queue_name: String,
}

impl Notifier {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            tx,
            clock,
            mq: None,
            queue_name: String::new(),
        }
    }

    pub fn with_queue(mut self, mq: Arc<BroccoliQueue>, queue_name: impl Into<String>) -> Self {
        self.mq = Some(mq);
        self.queue_name = queue_name.into();
        self
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DomainEvent> {
        self.tx.subscribe()
    }

    pub async fn emit<N: Notification>(&self, notification: &N) {
        let event = notification.to_domain_event(self.clock.now());

        // Err only means nobody is listening.
        if self.tx.send(event.clone()).is_err() {
            debug!(topic = event.topic(), "No in-process subscribers");
        }

        let Some(ref mq) = self.mq else {
            return;
        };

        match mq.publish(&self.queue_name, None, &event, None).await {
            Ok(_) => {
                info!(
                    topic = event.topic(),
                    event_id = event.event_id,
                    submission_id = event.submission_id,
                    "Domain event published"
                );
            }
            Err(e) => {
                warn!(error = %e, topic = event.topic(), "Failed to publish domain event");
            }
        }
    }
}

/// Connect to the notification queue if it is enabled.
///
/// A broker that cannot be reached is logged and skipped; the server keeps
/// running with in-process delivery only.
pub async fn connect_queue(config: &QueueConfig) -> Option<Arc<BroccoliQueue>> {
    if !config.enabled {
        info!("Notification queue disabled");
        return None;
    }

    match BroccoliQueue::builder(&config.url)
        .pool_connections(config.pool_size)
        .build()
        .await
    {
        Ok(mq) => {
            info!(url = %config.url, queue = %config.queue_name, "Notification queue connected");
            Some(Arc::new(mq))
        }
        Err(e) => {
            warn!(error = %e, "Failed to connect notification queue, continuing without it");
            None
        }
    }
}
