//! Repositories (C13): the storage boundary. Abstract traits decouple the
//! rest of the crate from any concrete backend; `memory` backs unit tests
//! and `postgres` is the shipped production implementation.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::dag::run::RunState;
use crate::dag::task_instance::InstanceState;
use crate::dag::{DagRun, TaskInstance};
use crate::error::Result;

/// Narrow filter shared by List operations across repositories.
#[derive(Debug, Clone, Default)]
pub struct ListFilter {
    pub state: Option<String>,
    pub parent_id: Option<Uuid>,
    pub after: Option<DateTime<Utc>>,
    pub before: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

/// A DAG's persisted definition: the metadata plus its serialized task graph
/// (the parsed [`crate::dag::Graph`] is rebuilt from `tasks_json` on load).
#[derive(Debug, Clone)]
pub struct DagRecord {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub schedule: Option<String>,
    pub start_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
    pub tags: Vec<String>,
    pub is_paused: bool,
    pub tasks_json: serde_json::Value,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[async_trait]
pub trait DagRepository: Send + Sync {
    async fn create(&self, record: DagRecord) -> Result<DagRecord>;
    async fn get(&self, id: &str) -> Result<DagRecord>;
    async fn get_by_name(&self, name: &str) -> Result<DagRecord>;
    async fn list(&self, filter: &ListFilter) -> Result<Vec<DagRecord>>;
    async fn update(&self, record: DagRecord) -> Result<DagRecord>;
    async fn delete(&self, id: &str) -> Result<()>;
    async fn pause(&self, id: &str) -> Result<()>;
    async fn unpause(&self, id: &str) -> Result<()>;
}

#[async_trait]
pub trait DagRunRepository: Send + Sync {
    async fn create(&self, run: DagRun) -> Result<DagRun>;
    async fn get(&self, id: Uuid) -> Result<DagRun>;
    async fn list(&self, filter: &ListFilter) -> Result<Vec<DagRun>>;
    async fn update(&self, run: DagRun) -> Result<DagRun>;
    async fn delete(&self, id: Uuid) -> Result<()>;
    /// Compare-and-swap transition: `UPDATE ... SET state=to, version=version+1
    /// WHERE id=? AND state=from`. Zero rows affected maps to `optimistic_lock`.
    async fn update_state(&self, id: Uuid, from: RunState, to: RunState) -> Result<DagRun>;
    async fn get_latest_run(&self, dag_id: &str) -> Result<Option<DagRun>>;
    async fn get_by_execution_date(&self, dag_id: &str, instant: DateTime<Utc>) -> Result<Option<DagRun>>;
}

#[async_trait]
pub trait TaskInstanceRepository: Send + Sync {
    async fn create(&self, instance: TaskInstance) -> Result<TaskInstance>;
    async fn get(&self, id: Uuid) -> Result<TaskInstance>;
    async fn list(&self, filter: &ListFilter) -> Result<Vec<TaskInstance>>;
    async fn update(&self, instance: TaskInstance) -> Result<TaskInstance>;
    async fn delete(&self, id: Uuid) -> Result<()>;
    async fn update_state(&self, id: Uuid, from: InstanceState, to: InstanceState) -> Result<TaskInstance>;
}

/// A single log line (or chunk) attached to a task instance.
#[derive(Debug, Clone)]
pub struct TaskLog {
    pub id: Uuid,
    pub task_instance_id: Uuid,
    pub payload: String,
    pub logged_at: DateTime<Utc>,
}

#[async_trait]
pub trait TaskLogRepository: Send + Sync {
    async fn create(&self, log: TaskLog) -> Result<TaskLog>;
    async fn get(&self, id: Uuid) -> Result<TaskLog>;
    async fn list(&self, filter: &ListFilter) -> Result<Vec<TaskLog>>;
    async fn delete(&self, id: Uuid) -> Result<()>;
}

/// Append-only audit trail of every state transition (spec.md §3).
#[derive(Debug, Clone)]
pub struct StateHistoryEntry {
    pub id: Uuid,
    pub entity_type: String,
    pub entity_id: Uuid,
    pub old_state: Option<String>,
    pub new_state: String,
    pub changed_at: DateTime<Utc>,
    pub metadata: serde_json::Value,
}

#[async_trait]
pub trait StateHistoryRepository: Send + Sync {
    async fn append(&self, entry: StateHistoryEntry) -> Result<()>;
    async fn list_for_entity(&self, entity_type: &str, entity_id: Uuid) -> Result<Vec<StateHistoryEntry>>;
}
