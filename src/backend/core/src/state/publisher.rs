//! Publishers (C10): sinks that receive a [`TransitionEvent`] after a state
//! transition is validated. Grounded on the teacher's websocket broadcaster
//! (`websocket::broadcast::Broadcaster`, a `tokio::sync::broadcast` fan-out)
//! for the pub/sub sink, generalized from rooms to a flat event stream.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::warn;
use uuid::Uuid;

use crate::repository::{StateHistoryEntry, StateHistoryRepository};

#[derive(Debug, Clone, Serialize)]
pub struct TransitionEvent {
    pub entity_type: String,
    pub entity_id: Uuid,
    pub old_state: Option<String>,
    pub new_state: String,
    pub metadata: serde_json::Value,
    pub at: DateTime<Utc>,
}

/// A sink that accepts transition events. A sink failure must never block
/// the transition itself, so `publish` has no error return — implementations
/// log and swallow their own failures.
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, event: TransitionEvent);
}

#[derive(Default)]
pub struct NoopPublisher;

#[async_trait]
impl Publisher for NoopPublisher {
    async fn publish(&self, _event: TransitionEvent) {}
}

/// Appends every transition to the append-only `StateHistoryEntry` table.
pub struct HistoryPublisher {
    repo: Arc<dyn StateHistoryRepository>,
}

impl HistoryPublisher {
    pub fn new(repo: Arc<dyn StateHistoryRepository>) -> Self {
        Self { repo }
    }
}

#[async_trait]
impl Publisher for HistoryPublisher {
    async fn publish(&self, event: TransitionEvent) {
        let entry = StateHistoryEntry {
            id: Uuid::new_v4(),
            entity_type: event.entity_type,
            entity_id: event.entity_id,
            old_state: event.old_state,
            new_state: event.new_state,
            changed_at: event.at,
            metadata: event.metadata,
        };
        if let Err(err) = self.repo.append(entry).await {
            warn!(error = %err.user_message(), "failed to append state history entry");
        }
    }
}

/// Broadcasts every transition to any number of subscribers (e.g. an
/// operator UI). Subscribing late or not at all is fine — `send` only fails
/// when there are zero receivers, which is not an error here.
pub struct PubSubPublisher {
    tx: broadcast::Sender<TransitionEvent>,
}

impl PubSubPublisher {
    pub fn new(capacity: usize) -> (Self, broadcast::Receiver<TransitionEvent>) {
        let (tx, rx) = broadcast::channel(capacity);
        (Self { tx }, rx)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TransitionEvent> {
        self.tx.subscribe()
    }
}

#[async_trait]
impl Publisher for PubSubPublisher {
    async fn publish(&self, event: TransitionEvent) {
        let _ = self.tx.send(event);
    }
}

/// Fans a transition out to several sinks concurrently; an individual
/// sink's failure (already swallowed internally, per the `Publisher`
/// contract) never prevents the others from receiving the event.
pub struct MultiPublisher {
    sinks: Vec<Arc<dyn Publisher>>,
}

impl MultiPublisher {
    pub fn new(sinks: Vec<Arc<dyn Publisher>>) -> Self {
        Self { sinks }
    }
}

#[async_trait]
impl Publisher for MultiPublisher {
    async fn publish(&self, event: TransitionEvent) {
        let futures = self.sinks.iter().map(|sink| {
            let event = event.clone();
            async move { sink.publish(event).await }
        });
        futures::future::join_all(futures).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::memory::InMemoryStateHistoryRepository;

    fn event() -> TransitionEvent {
        TransitionEvent {
            entity_type: "task_instance".to_string(),
            entity_id: Uuid::new_v4(),
            old_state: Some("queued".to_string()),
            new_state: "running".to_string(),
            metadata: serde_json::Value::Null,
            at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn history_publisher_appends_an_entry() {
        let repo: Arc<dyn StateHistoryRepository> = Arc::new(InMemoryStateHistoryRepository::default());
        let publisher = HistoryPublisher::new(repo.clone());
        let event = event();
        let entity_id = event.entity_id;
        publisher.publish(event).await;

        let history = repo.list_for_entity("task_instance", entity_id).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].new_state, "running");
    }

    #[tokio::test]
    async fn pubsub_publisher_delivers_to_subscribers() {
        let (publisher, mut rx) = PubSubPublisher::new(16);
        publisher.publish(event()).await;
        let received = rx.recv().await.unwrap();
        assert_eq!(received.new_state, "running");
    }

    #[tokio::test]
    async fn multi_publisher_fans_out_to_every_sink() {
        let repo: Arc<dyn StateHistoryRepository> = Arc::new(InMemoryStateHistoryRepository::default());
        let (pubsub, mut rx) = PubSubPublisher::new(16);
        let multi = MultiPublisher::new(vec![Arc::new(HistoryPublisher::new(repo.clone())), Arc::new(pubsub)]);

        let event = event();
        let entity_id = event.entity_id;
        multi.publish(event).await;

        assert!(rx.recv().await.is_ok());
        assert_eq!(repo.list_for_entity("task_instance", entity_id).await.unwrap().len(), 1);
    }
}
