//! In-memory repository implementations, used by unit and integration
//! tests so the rest of the crate can be exercised without a database.

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use std::collections::HashMap;
use uuid::Uuid;

use super::*;
use crate::error::OrchestratorError;

#[derive(Default)]
pub struct InMemoryDagRepository {
    rows: RwLock<HashMap<String, DagRecord>>,
}

#[async_trait]
impl DagRepository for InMemoryDagRepository {
    async fn create(&self, record: DagRecord) -> Result<DagRecord> {
        let mut rows = self.rows.write();
        if rows.contains_key(&record.id) {
            return Err(OrchestratorError::new(crate::error::ErrorCode::DuplicateDagName, format!("DAG {} already exists", record.id)));
        }
        rows.insert(record.id.clone(), record.clone());
        Ok(record)
    }

    async fn get(&self, id: &str) -> Result<DagRecord> {
        self.rows.read().get(id).cloned().ok_or_else(|| OrchestratorError::not_found("dag", id))
    }

    async fn get_by_name(&self, name: &str) -> Result<DagRecord> {
        self.rows
            .read()
            .values()
            .find(|r| r.name == name)
            .cloned()
            .ok_or_else(|| OrchestratorError::not_found("dag", name))
    }

    async fn list(&self, filter: &ListFilter) -> Result<Vec<DagRecord>> {
        let mut rows: Vec<DagRecord> = self.rows.read().values().cloned().collect();
        rows.sort_by(|a, b| a.id.cmp(&b.id));
        let offset = filter.offset.unwrap_or(0);
        let rows = rows.into_iter().skip(offset);
        Ok(match filter.limit {
            Some(limit) => rows.take(limit).collect(),
            None => rows.collect(),
        })
    }

    async fn update(&self, record: DagRecord) -> Result<DagRecord> {
        let mut rows = self.rows.write();
        if !rows.contains_key(&record.id) {
            return Err(OrchestratorError::not_found("dag", record.id.clone()));
        }
        rows.insert(record.id.clone(), record.clone());
        Ok(record)
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.rows.write().remove(id).map(|_| ()).ok_or_else(|| OrchestratorError::not_found("dag", id))
    }

    async fn pause(&self, id: &str) -> Result<()> {
        let mut rows = self.rows.write();
        let record = rows.get_mut(id).ok_or_else(|| OrchestratorError::not_found("dag", id))?;
        record.is_paused = true;
        Ok(())
    }

    async fn unpause(&self, id: &str) -> Result<()> {
        let mut rows = self.rows.write();
        let record = rows.get_mut(id).ok_or_else(|| OrchestratorError::not_found("dag", id))?;
        record.is_paused = false;
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryDagRunRepository {
    rows: RwLock<HashMap<Uuid, DagRun>>,
}

#[async_trait]
impl DagRunRepository for InMemoryDagRunRepository {
    async fn create(&self, run: DagRun) -> Result<DagRun> {
        self.rows.write().insert(run.id, run.clone());
        Ok(run)
    }

    async fn get(&self, id: Uuid) -> Result<DagRun> {
        self.rows.read().get(&id).cloned().ok_or_else(|| OrchestratorError::not_found("dag_run", id.to_string()))
    }

    async fn list(&self, filter: &ListFilter) -> Result<Vec<DagRun>> {
        let mut rows: Vec<DagRun> = self
            .rows
            .read()
            .values()
            .filter(|r| filter.parent_id.map(|p| p == r.id).unwrap_or(true))
            .cloned()
            .collect();
        rows.sort_by_key(|r| r.execution_date);
        let offset = filter.offset.unwrap_or(0);
        let rows = rows.into_iter().skip(offset);
        Ok(match filter.limit {
            Some(limit) => rows.take(limit).collect(),
            None => rows.collect(),
        })
    }

    async fn update(&self, run: DagRun) -> Result<DagRun> {
        self.rows.write().insert(run.id, run.clone());
        Ok(run)
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        self.rows.write().remove(&id).map(|_| ()).ok_or_else(|| OrchestratorError::not_found("dag_run", id.to_string()))
    }

    async fn update_state(&self, id: Uuid, from: RunState, to: RunState) -> Result<DagRun> {
        let mut rows = self.rows.write();
        let run = rows.get_mut(&id).ok_or_else(|| OrchestratorError::not_found("dag_run", id.to_string()))?;
        if run.state != from {
            return Err(OrchestratorError::optimistic_lock(id.to_string()));
        }
        run.state = to;
        run.version += 1;
        if to == RunState::Running {
            run.start_date = Some(Utc::now());
        }
        if to.is_terminal() {
            run.end_date = Some(Utc::now());
        }
        Ok(run.clone())
    }

    async fn get_latest_run(&self, dag_id: &str) -> Result<Option<DagRun>> {
        Ok(self
            .rows
            .read()
            .values()
            .filter(|r| r.dag_id == dag_id)
            .max_by_key(|r| r.execution_date)
            .cloned())
    }

    async fn get_by_execution_date(&self, dag_id: &str, instant: chrono::DateTime<Utc>) -> Result<Option<DagRun>> {
        Ok(self.rows.read().values().find(|r| r.dag_id == dag_id && r.execution_date == instant).cloned())
    }
}

#[derive(Default)]
pub struct InMemoryTaskInstanceRepository {
    rows: RwLock<HashMap<Uuid, TaskInstance>>,
}

#[async_trait]
impl TaskInstanceRepository for InMemoryTaskInstanceRepository {
    async fn create(&self, instance: TaskInstance) -> Result<TaskInstance> {
        self.rows.write().insert(instance.id, instance.clone());
        Ok(instance)
    }

    async fn get(&self, id: Uuid) -> Result<TaskInstance> {
        self.rows.read().get(&id).cloned().ok_or_else(|| OrchestratorError::not_found("task_instance", id.to_string()))
    }

    async fn list(&self, filter: &ListFilter) -> Result<Vec<TaskInstance>> {
        let mut rows: Vec<TaskInstance> = self
            .rows
            .read()
            .values()
            .filter(|r| filter.parent_id.map(|p| p == r.dag_run_id).unwrap_or(true))
            .cloned()
            .collect();
        rows.sort_by_key(|r| r.id);
        let offset = filter.offset.unwrap_or(0);
        let rows = rows.into_iter().skip(offset);
        Ok(match filter.limit {
            Some(limit) => rows.take(limit).collect(),
            None => rows.collect(),
        })
    }

    async fn update(&self, instance: TaskInstance) -> Result<TaskInstance> {
        self.rows.write().insert(instance.id, instance.clone());
        Ok(instance)
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        self.rows.write().remove(&id).map(|_| ()).ok_or_else(|| OrchestratorError::not_found("task_instance", id.to_string()))
    }

    async fn update_state(&self, id: Uuid, from: InstanceState, to: InstanceState) -> Result<TaskInstance> {
        let mut rows = self.rows.write();
        let instance = rows.get_mut(&id).ok_or_else(|| OrchestratorError::not_found("task_instance", id.to_string()))?;
        if instance.state != from {
            return Err(OrchestratorError::optimistic_lock(id.to_string()));
        }
        instance.state = to;
        instance.version += 1;
        Ok(instance.clone())
    }
}

#[derive(Default)]
pub struct InMemoryTaskLogRepository {
    rows: RwLock<HashMap<Uuid, TaskLog>>,
}

#[async_trait]
impl TaskLogRepository for InMemoryTaskLogRepository {
    async fn create(&self, log: TaskLog) -> Result<TaskLog> {
        self.rows.write().insert(log.id, log.clone());
        Ok(log)
    }

    async fn get(&self, id: Uuid) -> Result<TaskLog> {
        self.rows.read().get(&id).cloned().ok_or_else(|| OrchestratorError::not_found("task_log", id.to_string()))
    }

    async fn list(&self, filter: &ListFilter) -> Result<Vec<TaskLog>> {
        let mut rows: Vec<TaskLog> = self
            .rows
            .read()
            .values()
            .filter(|r| filter.parent_id.map(|p| p == r.task_instance_id).unwrap_or(true))
            .cloned()
            .collect();
        rows.sort_by_key(|r| r.logged_at);
        Ok(rows)
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        self.rows.write().remove(&id).map(|_| ()).ok_or_else(|| OrchestratorError::not_found("task_log", id.to_string()))
    }
}

#[derive(Default)]
pub struct InMemoryStateHistoryRepository {
    rows: RwLock<Vec<StateHistoryEntry>>,
}

#[async_trait]
impl StateHistoryRepository for InMemoryStateHistoryRepository {
    async fn append(&self, entry: StateHistoryEntry) -> Result<()> {
        self.rows.write().push(entry);
        Ok(())
    }

    async fn list_for_entity(&self, entity_type: &str, entity_id: Uuid) -> Result<Vec<StateHistoryEntry>> {
        Ok(self
            .rows
            .read()
            .iter()
            .filter(|e| e.entity_type == entity_type && e.entity_id == entity_id)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dag::task::TaskId;

    #[tokio::test]
    async fn dag_run_update_state_is_compare_and_swap() {
        let repo = InMemoryDagRunRepository::default();
        let run = repo.create(DagRun::new("d", Utc::now(), false, 1)).await.unwrap();

        let updated = repo.update_state(run.id, RunState::Queued, RunState::Running).await.unwrap();
        assert_eq!(updated.version, 1);
        assert!(updated.start_date.is_some());

        // Second transition from the now-stale `from` must fail.
        let err = repo.update_state(run.id, RunState::Queued, RunState::Running).await.unwrap_err();
        assert!(matches!(err.code(), crate::error::ErrorCode::OptimisticLock));
    }

    #[tokio::test]
    async fn task_instance_update_state_bumps_version() {
        let repo = InMemoryTaskInstanceRepository::default();
        let instance = repo.create(TaskInstance::new(Uuid::new_v4(), TaskId::new("a"), 2)).await.unwrap();
        let updated = repo.update_state(instance.id, InstanceState::Queued, InstanceState::Running).await.unwrap();
        assert_eq!(updated.version, 1);
        assert_eq!(updated.state, InstanceState::Running);
    }

    #[tokio::test]
    async fn dag_repository_get_by_name_and_pause() {
        let repo = InMemoryDagRepository::default();
        let record = DagRecord {
            id: "d1".to_string(),
            name: "My DAG".to_string(),
            description: None,
            schedule: None,
            start_date: Utc::now(),
            end_date: None,
            tags: vec![],
            is_paused: false,
            tasks_json: serde_json::Value::Null,
            version: 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        repo.create(record).await.unwrap();
        assert_eq!(repo.get_by_name("My DAG").await.unwrap().id, "d1");
        repo.pause("d1").await.unwrap();
        assert!(repo.get("d1").await.unwrap().is_paused);
    }
}
