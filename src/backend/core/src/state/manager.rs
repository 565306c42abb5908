//! StateManager (C10): validates a transition, then publishes a
//! [`TransitionEvent`]. Callers still perform the authoritative, version-
//! checked repository write themselves — the manager's validation is what
//! decides whether that write should even be attempted.

use std::sync::Arc;
use uuid::Uuid;

use crate::dag::state_machine::validate_transition;
use crate::dag::task_instance::InstanceState;
use crate::dag::run::RunState;
use crate::error::Result;

use super::publisher::{Publisher, TransitionEvent};

pub struct StateManager {
    publisher: Arc<dyn Publisher>,
}

impl StateManager {
    pub fn new(publisher: Arc<dyn Publisher>) -> Self {
        Self { publisher }
    }

    /// Validates a TaskInstance transition against the state machine table
    /// (spec.md §4.2) and, if legal, publishes the event. Returns the
    /// validation error without publishing anything if the transition is
    /// illegal.
    pub async fn transition_instance(&self, entity_id: Uuid, from: InstanceState, to: InstanceState, metadata: serde_json::Value) -> Result<()> {
        validate_transition(from, to)?;
        self.publisher
            .publish(TransitionEvent {
                entity_type: "task_instance".to_string(),
                entity_id,
                old_state: Some(from.to_string()),
                new_state: to.to_string(),
                metadata,
                at: chrono::Utc::now(),
            })
            .await;
        Ok(())
    }

    /// DAGRuns follow a simpler lifecycle (queued -> running -> terminal)
    /// enforced by the repository's compare-and-swap rather than a separate
    /// table, so this only publishes.
    pub async fn transition_run(&self, entity_id: Uuid, from: RunState, to: RunState, metadata: serde_json::Value) {
        self.publisher
            .publish(TransitionEvent {
                entity_type: "dag_run".to_string(),
                entity_id,
                old_state: Some(from.to_string()),
                new_state: to.to_string(),
                metadata,
                at: chrono::Utc::now(),
            })
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::publisher::PubSubPublisher;

    #[tokio::test]
    async fn rejects_illegal_instance_transitions_without_publishing() {
        let (publisher, mut rx) = PubSubPublisher::new(16);
        let manager = StateManager::new(Arc::new(publisher));

        let err = manager.transition_instance(Uuid::new_v4(), InstanceState::Queued, InstanceState::Success, serde_json::Value::Null).await;
        assert!(err.is_err());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn publishes_on_legal_instance_transition() {
        let (publisher, mut rx) = PubSubPublisher::new(16);
        let manager = StateManager::new(Arc::new(publisher));

        manager.transition_instance(Uuid::new_v4(), InstanceState::Queued, InstanceState::Running, serde_json::Value::Null).await.unwrap();
        let event = rx.recv().await.unwrap();
        assert_eq!(event.new_state, "running");
    }
}
