//! Postgres-backed repositories: raw parameterized queries over `sqlx`, no
//! compile-time query macros (so the crate builds without a live database
//! at compile time, matching the rest of the corpus's style).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use super::*;
use crate::dag::run::RunState;
use crate::dag::task::TaskId;
use crate::dag::task_instance::InstanceState;
use crate::error::OrchestratorError;

pub struct PgDagRepository {
    pool: PgPool,
}

impl PgDagRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn row_to_dag_record(row: &sqlx::postgres::PgRow) -> Result<DagRecord> {
    Ok(DagRecord {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        schedule: row.try_get("schedule")?,
        start_date: row.try_get("start_date")?,
        end_date: row.try_get("end_date")?,
        tags: row.try_get("tags")?,
        is_paused: row.try_get("is_paused")?,
        tasks_json: row.try_get("tasks_json")?,
        version: row.try_get("version")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[async_trait]
impl DagRepository for PgDagRepository {
    async fn create(&self, record: DagRecord) -> Result<DagRecord> {
        sqlx::query(
            r#"
            INSERT INTO dags (id, name, description, schedule, start_date, end_date, tags, is_paused, tasks_json, version, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(&record.id)
        .bind(&record.name)
        .bind(&record.description)
        .bind(&record.schedule)
        .bind(record.start_date)
        .bind(record.end_date)
        .bind(&record.tags)
        .bind(record.is_paused)
        .bind(&record.tasks_json)
        .bind(record.version)
        .bind(record.created_at)
        .bind(record.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(record)
    }

    async fn get(&self, id: &str) -> Result<DagRecord> {
        let row = sqlx::query("SELECT * FROM dags WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| OrchestratorError::not_found("dag", id))?;
        row_to_dag_record(&row)
    }

    async fn get_by_name(&self, name: &str) -> Result<DagRecord> {
        let row = sqlx::query("SELECT * FROM dags WHERE name = $1")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| OrchestratorError::not_found("dag", name))?;
        row_to_dag_record(&row)
    }

    async fn list(&self, filter: &ListFilter) -> Result<Vec<DagRecord>> {
        let limit = filter.limit.unwrap_or(100) as i64;
        let offset = filter.offset.unwrap_or(0) as i64;
        let rows = sqlx::query("SELECT * FROM dags ORDER BY id LIMIT $1 OFFSET $2")
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(row_to_dag_record).collect()
    }

    async fn update(&self, record: DagRecord) -> Result<DagRecord> {
        let result = sqlx::query(
            r#"
            UPDATE dags SET name=$2, description=$3, schedule=$4, start_date=$5, end_date=$6,
                tags=$7, is_paused=$8, tasks_json=$9, version=version+1, updated_at=$10
            WHERE id=$1
            "#,
        )
        .bind(&record.id)
        .bind(&record.name)
        .bind(&record.description)
        .bind(&record.schedule)
        .bind(record.start_date)
        .bind(record.end_date)
        .bind(&record.tags)
        .bind(record.is_paused)
        .bind(&record.tasks_json)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(OrchestratorError::not_found("dag", record.id.clone()));
        }
        self.get(&record.id).await
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let result = sqlx::query("DELETE FROM dags WHERE id = $1").bind(id).execute(&self.pool).await?;
        if result.rows_affected() == 0 {
            return Err(OrchestratorError::not_found("dag", id));
        }
        Ok(())
    }

    async fn pause(&self, id: &str) -> Result<()> {
        set_paused(&self.pool, id, true).await
    }

    async fn unpause(&self, id: &str) -> Result<()> {
        set_paused(&self.pool, id, false).await
    }
}

async fn set_paused(pool: &PgPool, id: &str, paused: bool) -> Result<()> {
    let result = sqlx::query("UPDATE dags SET is_paused = $2 WHERE id = $1").bind(id).bind(paused).execute(pool).await?;
    if result.rows_affected() == 0 {
        return Err(OrchestratorError::not_found("dag", id));
    }
    Ok(())
}

pub struct PgDagRunRepository {
    pool: PgPool,
}

impl PgDagRunRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn row_to_dag_run(row: &sqlx::postgres::PgRow) -> Result<DagRun> {
    let state: String = row.try_get("state")?;
    Ok(DagRun {
        id: row.try_get("id")?,
        dag_id: row.try_get("dag_id")?,
        execution_date: row.try_get("execution_date")?,
        state: parse_run_state(&state)?,
        start_date: row.try_get("start_date")?,
        end_date: row.try_get("end_date")?,
        external_trigger: row.try_get("external_trigger")?,
        version: row.try_get("version")?,
    })
}

fn parse_run_state(s: &str) -> Result<RunState> {
    Ok(match s {
        "queued" => RunState::Queued,
        "running" => RunState::Running,
        "success" => RunState::Success,
        "failed" => RunState::Failed,
        "skipped" => RunState::Skipped,
        other => return Err(OrchestratorError::internal(format!("unknown run state in database: {other}"))),
    })
}

#[async_trait]
impl DagRunRepository for PgDagRunRepository {
    async fn create(&self, run: DagRun) -> Result<DagRun> {
        sqlx::query(
            r#"
            INSERT INTO dag_runs (id, dag_id, execution_date, state, start_date, end_date, external_trigger, version)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(run.id)
        .bind(&run.dag_id)
        .bind(run.execution_date)
        .bind(run.state.to_string())
        .bind(run.start_date)
        .bind(run.end_date)
        .bind(run.external_trigger)
        .bind(run.version)
        .execute(&self.pool)
        .await?;
        Ok(run)
    }

    async fn get(&self, id: Uuid) -> Result<DagRun> {
        let row = sqlx::query("SELECT * FROM dag_runs WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| OrchestratorError::not_found("dag_run", id.to_string()))?;
        row_to_dag_run(&row)
    }

    async fn list(&self, filter: &ListFilter) -> Result<Vec<DagRun>> {
        let limit = filter.limit.unwrap_or(100) as i64;
        let offset = filter.offset.unwrap_or(0) as i64;
        let rows = sqlx::query("SELECT * FROM dag_runs ORDER BY execution_date DESC LIMIT $1 OFFSET $2")
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(row_to_dag_run).collect()
    }

    async fn update(&self, run: DagRun) -> Result<DagRun> {
        sqlx::query("UPDATE dag_runs SET state=$2, start_date=$3, end_date=$4 WHERE id=$1")
            .bind(run.id)
            .bind(run.state.to_string())
            .bind(run.start_date)
            .bind(run.end_date)
            .execute(&self.pool)
            .await?;
        Ok(run)
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        let result = sqlx::query("DELETE FROM dag_runs WHERE id = $1").bind(id).execute(&self.pool).await?;
        if result.rows_affected() == 0 {
            return Err(OrchestratorError::not_found("dag_run", id.to_string()));
        }
        Ok(())
    }

    async fn update_state(&self, id: Uuid, from: RunState, to: RunState) -> Result<DagRun> {
        let now = Utc::now();
        let start_date = if to == RunState::Running { Some(now) } else { None };
        let end_date = if to.is_terminal() { Some(now) } else { None };
        let result = sqlx::query(
            r#"
            UPDATE dag_runs
            SET state = $3, version = version + 1,
                start_date = COALESCE($4, start_date),
                end_date = COALESCE($5, end_date)
            WHERE id = $1 AND state = $2
            "#,
        )
        .bind(id)
        .bind(from.to_string())
        .bind(to.to_string())
        .bind(start_date)
        .bind(end_date)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(OrchestratorError::optimistic_lock(id.to_string()));
        }
        self.get(id).await
    }

    async fn get_latest_run(&self, dag_id: &str) -> Result<Option<DagRun>> {
        let row = sqlx::query("SELECT * FROM dag_runs WHERE dag_id = $1 ORDER BY execution_date DESC LIMIT 1")
            .bind(dag_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_dag_run).transpose()
    }

    async fn get_by_execution_date(&self, dag_id: &str, instant: DateTime<Utc>) -> Result<Option<DagRun>> {
        let row = sqlx::query("SELECT * FROM dag_runs WHERE dag_id = $1 AND execution_date = $2")
            .bind(dag_id)
            .bind(instant)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_dag_run).transpose()
    }
}

pub struct PgTaskInstanceRepository {
    pool: PgPool,
}

impl PgTaskInstanceRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn row_to_task_instance(row: &sqlx::postgres::PgRow) -> Result<TaskInstance> {
    let state: String = row.try_get("state")?;
    let task_id: String = row.try_get("task_id")?;
    Ok(TaskInstance {
        id: row.try_get("id")?,
        dag_run_id: row.try_get("dag_run_id")?,
        task_id: TaskId::new(task_id),
        state: parse_instance_state(&state)?,
        try_number: row.try_get::<i32, _>("try_number")? as u32,
        max_tries: row.try_get::<i32, _>("max_tries")? as u32,
        start_date: row.try_get("start_date")?,
        end_date: row.try_get("end_date")?,
        duration_ms: row.try_get("duration_ms")?,
        worker_hostname: row.try_get("worker_hostname")?,
        error_message: row.try_get("error_message")?,
        version: row.try_get("version")?,
    })
}

fn parse_instance_state(s: &str) -> Result<InstanceState> {
    Ok(match s {
        "queued" => InstanceState::Queued,
        "running" => InstanceState::Running,
        "retrying" => InstanceState::Retrying,
        "success" => InstanceState::Success,
        "failed" => InstanceState::Failed,
        "skipped" => InstanceState::Skipped,
        "upstream_failed" => InstanceState::UpstreamFailed,
        other => return Err(OrchestratorError::internal(format!("unknown instance state in database: {other}"))),
    })
}

#[async_trait]
impl TaskInstanceRepository for PgTaskInstanceRepository {
    async fn create(&self, instance: TaskInstance) -> Result<TaskInstance> {
        sqlx::query(
            r#"
            INSERT INTO task_instances (id, dag_run_id, task_id, state, try_number, max_tries,
                start_date, end_date, duration_ms, worker_hostname, error_message, version)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(instance.id)
        .bind(instance.dag_run_id)
        .bind(&instance.task_id.0)
        .bind(instance.state.to_string())
        .bind(instance.try_number as i32)
        .bind(instance.max_tries as i32)
        .bind(instance.start_date)
        .bind(instance.end_date)
        .bind(instance.duration_ms)
        .bind(&instance.worker_hostname)
        .bind(&instance.error_message)
        .bind(instance.version)
        .execute(&self.pool)
        .await?;
        Ok(instance)
    }

    async fn get(&self, id: Uuid) -> Result<TaskInstance> {
        let row = sqlx::query("SELECT * FROM task_instances WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| OrchestratorError::not_found("task_instance", id.to_string()))?;
        row_to_task_instance(&row)
    }

    async fn list(&self, filter: &ListFilter) -> Result<Vec<TaskInstance>> {
        let limit = filter.limit.unwrap_or(100) as i64;
        let offset = filter.offset.unwrap_or(0) as i64;
        let rows = if let Some(parent_id) = filter.parent_id {
            sqlx::query("SELECT * FROM task_instances WHERE dag_run_id = $1 ORDER BY id LIMIT $2 OFFSET $3")
                .bind(parent_id)
                .bind(limit)
                .bind(offset)
                .fetch_all(&self.pool)
                .await?
        } else {
            sqlx::query("SELECT * FROM task_instances ORDER BY id LIMIT $1 OFFSET $2")
                .bind(limit)
                .bind(offset)
                .fetch_all(&self.pool)
                .await?
        };
        rows.iter().map(row_to_task_instance).collect()
    }

    async fn update(&self, instance: TaskInstance) -> Result<TaskInstance> {
        sqlx::query(
            r#"
            UPDATE task_instances SET start_date=$2, end_date=$3, duration_ms=$4,
                worker_hostname=$5, error_message=$6, try_number=$7
            WHERE id=$1
            "#,
        )
        .bind(instance.id)
        .bind(instance.start_date)
        .bind(instance.end_date)
        .bind(instance.duration_ms)
        .bind(&instance.worker_hostname)
        .bind(&instance.error_message)
        .bind(instance.try_number as i32)
        .execute(&self.pool)
        .await?;
        Ok(instance)
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        let result = sqlx::query("DELETE FROM task_instances WHERE id = $1").bind(id).execute(&self.pool).await?;
        if result.rows_affected() == 0 {
            return Err(OrchestratorError::not_found("task_instance", id.to_string()));
        }
        Ok(())
    }

    async fn update_state(&self, id: Uuid, from: InstanceState, to: InstanceState) -> Result<TaskInstance> {
        let result = sqlx::query(
            r#"
            UPDATE task_instances SET state = $3, version = version + 1
            WHERE id = $1 AND state = $2
            "#,
        )
        .bind(id)
        .bind(from.to_string())
        .bind(to.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(OrchestratorError::optimistic_lock(id.to_string()));
        }
        self.get(id).await
    }
}

pub struct PgTaskLogRepository {
    pool: PgPool,
}

impl PgTaskLogRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TaskLogRepository for PgTaskLogRepository {
    async fn create(&self, log: TaskLog) -> Result<TaskLog> {
        sqlx::query("INSERT INTO task_logs (id, task_instance_id, payload, logged_at) VALUES ($1, $2, $3, $4)")
            .bind(log.id)
            .bind(log.task_instance_id)
            .bind(&log.payload)
            .bind(log.logged_at)
            .execute(&self.pool)
            .await?;
        Ok(log)
    }

    async fn get(&self, id: Uuid) -> Result<TaskLog> {
        let row = sqlx::query("SELECT * FROM task_logs WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| OrchestratorError::not_found("task_log", id.to_string()))?;
        Ok(TaskLog {
            id: row.try_get("id")?,
            task_instance_id: row.try_get("task_instance_id")?,
            payload: row.try_get("payload")?,
            logged_at: row.try_get("logged_at")?,
        })
    }

    async fn list(&self, filter: &ListFilter) -> Result<Vec<TaskLog>> {
        let parent_id = filter.parent_id.ok_or_else(|| OrchestratorError::validation("task log list requires parent_id"))?;
        let rows = sqlx::query("SELECT * FROM task_logs WHERE task_instance_id = $1 ORDER BY logged_at")
            .bind(parent_id)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter()
            .map(|row| {
                Ok(TaskLog {
                    id: row.try_get("id")?,
                    task_instance_id: row.try_get("task_instance_id")?,
                    payload: row.try_get("payload")?,
                    logged_at: row.try_get("logged_at")?,
                })
            })
            .collect()
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        let result = sqlx::query("DELETE FROM task_logs WHERE id = $1").bind(id).execute(&self.pool).await?;
        if result.rows_affected() == 0 {
            return Err(OrchestratorError::not_found("task_log", id.to_string()));
        }
        Ok(())
    }
}

pub struct PgStateHistoryRepository {
    pool: PgPool,
}

impl PgStateHistoryRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl StateHistoryRepository for PgStateHistoryRepository {
    async fn append(&self, entry: StateHistoryEntry) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO state_history (id, entity_type, entity_id, old_state, new_state, changed_at, metadata)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(entry.id)
        .bind(&entry.entity_type)
        .bind(entry.entity_id)
        .bind(&entry.old_state)
        .bind(&entry.new_state)
        .bind(entry.changed_at)
        .bind(&entry.metadata)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_for_entity(&self, entity_type: &str, entity_id: Uuid) -> Result<Vec<StateHistoryEntry>> {
        let rows = sqlx::query("SELECT * FROM state_history WHERE entity_type = $1 AND entity_id = $2 ORDER BY changed_at")
            .bind(entity_type)
            .bind(entity_id)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter()
            .map(|row| {
                Ok(StateHistoryEntry {
                    id: row.try_get("id")?,
                    entity_type: row.try_get("entity_type")?,
                    entity_id: row.try_get("entity_id")?,
                    old_state: row.try_get("old_state")?,
                    new_state: row.try_get("new_state")?,
                    changed_at: row.try_get("changed_at")?,
                    metadata: row.try_get("metadata")?,
                })
            })
            .collect()
    }
}
