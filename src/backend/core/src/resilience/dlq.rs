//! Dead-letter queue (C12): terminal task failures, kept for inspection and
//! manual or policy-driven replay.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

use crate::dag::{Task, TaskInstance};
use crate::error::{OrchestratorError, Result};

/// A terminal task failure, keyed by the TaskInstance id that produced it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DlqEntry {
    pub id: Uuid,
    pub dag_run_id: Uuid,
    pub dag_id: String,
    pub task_id: String,
    pub attempts: u32,
    pub reason: String,
    pub error_message: String,
    pub metadata: Value,
    pub replayed: bool,
    pub replayed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Filters accepted by [`Dlq::list`].
#[derive(Debug, Clone, Default)]
pub struct DlqFilter {
    pub dag_id: Option<String>,
    pub task_id: Option<String>,
    pub replayed: Option<bool>,
    pub after: Option<DateTime<Utc>>,
    pub before: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

impl DlqFilter {
    fn matches(&self, entry: &DlqEntry) -> bool {
        if let Some(dag_id) = &self.dag_id {
            if &entry.dag_id != dag_id {
                return false;
            }
        }
        if let Some(task_id) = &self.task_id {
            if &entry.task_id != task_id {
                return false;
            }
        }
        if let Some(replayed) = self.replayed {
            if entry.replayed != replayed {
                return false;
            }
        }
        if let Some(after) = self.after {
            if entry.created_at <= after {
                return false;
            }
        }
        if let Some(before) = self.before {
            if entry.created_at >= before {
                return false;
            }
        }
        true
    }
}

/// An in-process DLQ registry. A persistent implementation lives behind the
/// same shape in `repository::postgres` (table-backed, same semantics).
#[derive(Default)]
pub struct Dlq {
    entries: DashMap<Uuid, DlqEntry>,
}

impl Dlq {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, entry: DlqEntry) -> Result<()> {
        if self.entries.contains_key(&entry.id) {
            return Err(OrchestratorError::new(
                crate::error::ErrorCode::DuplicateDlqEntry,
                format!("DLQ entry already exists for task instance {}", entry.id),
            ));
        }
        self.entries.insert(entry.id, entry);
        Ok(())
    }

    pub fn get(&self, id: Uuid) -> Result<DlqEntry> {
        self.entries
            .get(&id)
            .map(|e| e.clone())
            .ok_or_else(|| OrchestratorError::not_found("dlq_entry", id.to_string()))
    }

    pub fn list(&self, filter: &DlqFilter) -> Vec<DlqEntry> {
        let mut matched: Vec<DlqEntry> = self.entries.iter().map(|e| e.value().clone()).filter(|e| filter.matches(e)).collect();
        matched.sort_by_key(|e| e.created_at);
        let offset = filter.offset.unwrap_or(0);
        let matched = matched.into_iter().skip(offset);
        match filter.limit {
            Some(limit) => matched.take(limit).collect(),
            None => matched.collect(),
        }
    }

    pub fn replay(&self, id: Uuid, at: DateTime<Utc>) -> Result<DlqEntry> {
        let mut entry = self.entries.get_mut(&id).ok_or_else(|| OrchestratorError::not_found("dlq_entry", id.to_string()))?;
        entry.replayed = true;
        entry.replayed_at = Some(at);
        Ok(entry.clone())
    }

    pub fn delete(&self, id: Uuid) -> Result<()> {
        self.entries.remove(&id).map(|_| ()).ok_or_else(|| OrchestratorError::not_found("dlq_entry", id.to_string()))
    }

    pub fn purge(&self) -> usize {
        let n = self.entries.len();
        self.entries.clear();
        n
    }

    pub fn count(&self) -> usize {
        self.entries.len()
    }
}

/// Callback invoked when an entry is added, and when the DLQ size crosses a
/// configured threshold.
pub trait DlqCallbacks: Send + Sync {
    fn on_add(&self, _entry: &DlqEntry) {}
    fn on_threshold_reached(&self, _count: usize, _threshold: usize) {}
}

/// Convenience wrapper around [`Dlq`] for the common failure-recording path.
pub struct DlqManager {
    dlq: Arc<Dlq>,
    threshold: usize,
    callbacks: Arc<dyn DlqCallbacks>,
}

struct NoopCallbacks;
impl DlqCallbacks for NoopCallbacks {}

impl DlqManager {
    pub fn new(dlq: Arc<Dlq>, threshold: usize) -> Self {
        Self { dlq, threshold, callbacks: Arc::new(NoopCallbacks) }
    }

    pub fn with_callbacks(mut self, callbacks: Arc<dyn DlqCallbacks>) -> Self {
        self.callbacks = callbacks;
        self
    }

    pub fn add_failed_task(&self, instance: &TaskInstance, task: &Task, dag_id: &str, err: &OrchestratorError, at: DateTime<Utc>) -> Result<()> {
        let entry = DlqEntry {
            id: instance.id,
            dag_run_id: instance.dag_run_id,
            dag_id: dag_id.to_string(),
            task_id: task.id.0.clone(),
            attempts: instance.try_number,
            reason: "max_retries_exceeded".to_string(),
            error_message: err.user_message().to_string(),
            metadata: Value::Null,
            replayed: false,
            replayed_at: None,
            created_at: at,
        };
        self.dlq.add(entry.clone())?;
        self.callbacks.on_add(&entry);
        let count = self.dlq.count();
        if count >= self.threshold {
            self.callbacks.on_threshold_reached(count, self.threshold);
        }
        Ok(())
    }

    pub fn dlq(&self) -> &Arc<Dlq> {
        &self.dlq
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: Uuid, dag_id: &str, replayed: bool) -> DlqEntry {
        DlqEntry {
            id,
            dag_run_id: Uuid::new_v4(),
            dag_id: dag_id.to_string(),
            task_id: "t1".to_string(),
            attempts: 3,
            reason: "max_retries_exceeded".to_string(),
            error_message: "boom".to_string(),
            metadata: Value::Null,
            replayed,
            replayed_at: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn add_rejects_duplicates() {
        let dlq = Dlq::new();
        let id = Uuid::new_v4();
        dlq.add(entry(id, "d", false)).unwrap();
        assert!(dlq.add(entry(id, "d", false)).is_err());
    }

    #[test]
    fn list_filters_by_dag_id_and_replayed() {
        let dlq = Dlq::new();
        dlq.add(entry(Uuid::new_v4(), "a", false)).unwrap();
        dlq.add(entry(Uuid::new_v4(), "b", true)).unwrap();

        let filter = DlqFilter { dag_id: Some("a".to_string()), ..Default::default() };
        assert_eq!(dlq.list(&filter).len(), 1);

        let filter = DlqFilter { replayed: Some(true), ..Default::default() };
        assert_eq!(dlq.list(&filter).len(), 1);
    }

    #[test]
    fn replay_sets_flag_and_timestamp() {
        let dlq = Dlq::new();
        let id = Uuid::new_v4();
        dlq.add(entry(id, "a", false)).unwrap();
        let now = Utc::now();
        let replayed = dlq.replay(id, now).unwrap();
        assert!(replayed.replayed);
        assert_eq!(replayed.replayed_at, Some(now));
    }

    #[test]
    fn purge_clears_everything_and_returns_count() {
        let dlq = Dlq::new();
        dlq.add(entry(Uuid::new_v4(), "a", false)).unwrap();
        dlq.add(entry(Uuid::new_v4(), "b", false)).unwrap();
        assert_eq!(dlq.purge(), 2);
        assert_eq!(dlq.count(), 0);
    }
}
