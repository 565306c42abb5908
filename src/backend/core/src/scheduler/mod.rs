//! Scheduler (C8): the main orchestration loop. Owns [`cron::CronScheduler`],
//! [`priority_queue::PriorityQueue`], and [`concurrency::ConcurrencyManager`]
//! and drives the transition from "what should run" to "what is running".

pub mod backfill;
pub mod concurrency;
pub mod cron;
pub mod dispatch;
pub mod priority_queue;
pub mod propagation;

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::dag::run::RunState;
use crate::dag::DagRun;
use crate::error::{OrchestratorError, Result};
use crate::repository::{DagRepository, DagRunRepository, ListFilter};

use concurrency::ConcurrencyManager;
use cron::CronScheduler;
use dispatch::Dispatcher;
use priority_queue::{Priority, PriorityQueue, QueueItem};

pub struct SchedulerConfig {
    pub schedule_interval: Duration,
    pub default_timezone: String,
    pub enable_catchup: bool,
    pub max_catchup_runs: usize,
}

/// Per-tick poll window used to detect cron fires: how far back from "now"
/// each registered DAG is checked for instants it has not yet created a run
/// for. Polling (rather than threading a stored callback through
/// `CronScheduler`) keeps the scheduler the single owner of run-creation
/// side effects and avoids a callback type that would have to capture
/// `Arc<Scheduler>` inside `CronScheduler` itself.
const FIRE_POLL_CAP: usize = 50;

pub struct Scheduler {
    config: SchedulerConfig,
    cron: Arc<CronScheduler>,
    queue: Arc<PriorityQueue>,
    concurrency: Arc<ConcurrencyManager>,
    dags: Arc<dyn DagRepository>,
    runs: Arc<dyn DagRunRepository>,
    dispatcher: Arc<dyn Dispatcher>,
    checkpoints: parking_lot::RwLock<HashMap<String, DateTime<Utc>>>,
}

impl Scheduler {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: SchedulerConfig,
        cron: Arc<CronScheduler>,
        queue: Arc<PriorityQueue>,
        concurrency: Arc<ConcurrencyManager>,
        dags: Arc<dyn DagRepository>,
        runs: Arc<dyn DagRunRepository>,
        dispatcher: Arc<dyn Dispatcher>,
    ) -> Self {
        Self { config, cron, queue, concurrency, dags, runs, dispatcher, checkpoints: parking_lot::RwLock::new(HashMap::new()) }
    }

    /// Loads all DAGs, registers schedulable ones with the cron scheduler,
    /// and (if catchup is enabled) backfills runs missed since the last
    /// recorded run or the DAG's start_date.
    pub async fn start(&self) -> Result<()> {
        let records = self.dags.list(&ListFilter::default()).await?;
        let now = Utc::now();

        for record in records {
            if record.is_paused {
                continue;
            }
            let Some(schedule) = record.schedule.clone() else { continue };

            if let Err(err) = self.cron.add_dag(record.id.clone(), &schedule, &self.config.default_timezone) {
                warn!(dag_id = %record.id, error = %err.user_message(), "skipping DAG with invalid cron schedule");
                continue;
            }
            self.checkpoints.write().insert(record.id.clone(), now);

            if !self.config.enable_catchup {
                continue;
            }
            let from = match self.runs.get_latest_run(&record.id).await? {
                Some(run) => run.execution_date,
                None => record.start_date,
            };
            let missed = self.cron.get_missed_executions(&record.id, from, now, self.config.max_catchup_runs)?;
            for instant in missed {
                if let Err(err) = self.create_run_from_cron(&record.id, instant).await {
                    warn!(dag_id = %record.id, error = %err.user_message(), "catchup run creation failed");
                }
            }
        }
        Ok(())
    }

    /// Runs the tick loop until `cancel` is triggered.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut interval = tokio::time::interval(self.config.schedule_interval);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("scheduler loop received shutdown signal");
                    return;
                }
                _ = interval.tick() => {
                    if let Err(err) = self.tick().await {
                        warn!(error = %err.user_message(), "scheduler tick failed");
                    }
                }
            }
        }
    }

    /// One iteration of the main loop (§4.8): poll cron fires, then drain
    /// admissible items from the priority queue.
    pub async fn tick(&self) -> Result<()> {
        self.poll_cron_fires().await?;

        if !self.concurrency.can_schedule_global() {
            return Ok(());
        }

        loop {
            let Some(item) = self.queue.pop() else { break };
            if !self.concurrency.can_schedule_dag(&item.dag_id) {
                // Preserve priority ordering: put it back and stop this tick
                // rather than skip ahead to a lower-priority item.
                self.queue.push(item);
                break;
            }
            if let Err(err) = self.admit(item).await {
                warn!(error = %err.user_message(), "admission failed for queued run");
            }
        }
        Ok(())
    }

    /// Loads the run, transitions `queued -> running` (version-checked),
    /// acquires concurrency slots, and hands off to the dispatch layer.
    async fn admit(&self, item: QueueItem) -> Result<()> {
        let run = self.runs.get(item.dag_run_id).await?;
        let run = match self.runs.update_state(run.id, RunState::Queued, RunState::Running).await {
            Ok(run) => run,
            Err(err) if err.code() == crate::error::ErrorCode::OptimisticLock => {
                // Another scheduler instance (or a stale queue entry) already
                // admitted this run; drop it silently.
                return Ok(());
            }
            Err(err) => return Err(err),
        };

        self.concurrency.acquire_global()?;
        if let Err(err) = self.concurrency.acquire_dag(&item.dag_id) {
            self.concurrency.release_global();
            return Err(err);
        }

        if let Err(err) = self.dispatcher.dispatch(run).await {
            self.concurrency.release_global();
            self.concurrency.release_dag(&item.dag_id);
            return Err(err);
        }
        Ok(())
    }

    async fn poll_cron_fires(&self) -> Result<()> {
        let now = Utc::now();
        let dag_ids: Vec<String> = self.checkpoints.read().keys().cloned().collect();
        for dag_id in dag_ids {
            let checkpoint = *self.checkpoints.read().get(&dag_id).unwrap_or(&now);
            let fires = match self.cron.get_missed_executions(&dag_id, checkpoint, now, FIRE_POLL_CAP) {
                Ok(fires) => fires,
                Err(_) => continue, // DAG was removed from the cron scheduler concurrently
            };
            for instant in &fires {
                if let Err(err) = self.create_run_from_cron(&dag_id, *instant).await {
                    warn!(dag_id = %dag_id, error = %err.user_message(), "scheduled run creation failed");
                }
            }
            self.checkpoints.write().insert(dag_id, now);
        }
        Ok(())
    }

    /// Fired by a cron match: idempotent insert (skip if a run already
    /// exists for this (dag_id, execution_date) pair) at Medium priority.
    async fn create_run_from_cron(&self, dag_id: &str, fire_time: DateTime<Utc>) -> Result<()> {
        if self.runs.get_by_execution_date(dag_id, fire_time).await?.is_some() {
            return Ok(());
        }
        let run = DagRun::new(dag_id, fire_time, false, 1);
        let run = self.runs.create(run).await?;
        self.queue.push(QueueItem { dag_run_id: run.id, dag_id: dag_id.to_string(), execution_date: fire_time, priority: Priority::Medium, enqueued_at: Utc::now() });
        Ok(())
    }

    /// Manual trigger: refuses a paused DAG, creates an externally-triggered
    /// run, and admits it at High priority.
    pub async fn trigger_dag(&self, dag_id: &str, execution_date: DateTime<Utc>) -> Result<DagRun> {
        let record = self.dags.get(dag_id).await?;
        if record.is_paused {
            return Err(OrchestratorError::validation(format!("DAG {dag_id} is paused")));
        }
        let run = DagRun::new(dag_id, execution_date, true, 1);
        let run = self.runs.create(run).await?;
        self.queue.push(QueueItem { dag_run_id: run.id, dag_id: dag_id.to_string(), execution_date, priority: Priority::High, enqueued_at: Utc::now() });
        Ok(run)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::memory::{InMemoryDagRepository, InMemoryDagRunRepository};
    use crate::repository::DagRecord;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct RecordingDispatcher {
        count: AtomicUsize,
    }

    #[async_trait]
    impl Dispatcher for RecordingDispatcher {
        async fn dispatch(&self, _run: DagRun) -> Result<()> {
            self.count.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn scheduler(dispatcher: Arc<RecordingDispatcher>) -> (Scheduler, Arc<dyn DagRepository>, Arc<dyn DagRunRepository>) {
        let dags: Arc<dyn DagRepository> = Arc::new(InMemoryDagRepository::default());
        let runs: Arc<dyn DagRunRepository> = Arc::new(InMemoryDagRunRepository::default());
        let sched = Scheduler::new(
            SchedulerConfig { schedule_interval: Duration::from_secs(1), default_timezone: "UTC".to_string(), enable_catchup: false, max_catchup_runs: 10 },
            Arc::new(CronScheduler::new()),
            Arc::new(PriorityQueue::new()),
            Arc::new(ConcurrencyManager::new(100, 10, Default::default())),
            dags.clone(),
            runs.clone(),
            dispatcher,
        );
        (sched, dags, runs)
    }

    fn dag_record(id: &str, paused: bool) -> DagRecord {
        DagRecord {
            id: id.to_string(),
            name: id.to_string(),
            description: None,
            schedule: None,
            start_date: Utc::now(),
            end_date: None,
            tags: vec![],
            is_paused: paused,
            tasks_json: serde_json::Value::Null,
            version: 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn trigger_dag_refuses_when_paused() {
        let dispatcher = Arc::new(RecordingDispatcher { count: AtomicUsize::new(0) });
        let (sched, dags, _runs) = scheduler(dispatcher);
        dags.create(dag_record("d", true)).await.unwrap();
        assert!(sched.trigger_dag("d", Utc::now()).await.is_err());
    }

    #[tokio::test]
    async fn trigger_dag_admits_on_next_tick() {
        let dispatcher = Arc::new(RecordingDispatcher { count: AtomicUsize::new(0) });
        let (sched, dags, _runs) = scheduler(dispatcher.clone());
        dags.create(dag_record("d", false)).await.unwrap();

        sched.trigger_dag("d", Utc::now()).await.unwrap();
        sched.tick().await.unwrap();

        assert_eq!(dispatcher.count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn per_dag_limit_blocks_admission_without_dropping_priority_order() {
        let dispatcher = Arc::new(RecordingDispatcher { count: AtomicUsize::new(0) });
        let dags: Arc<dyn DagRepository> = Arc::new(InMemoryDagRepository::default());
        let runs: Arc<dyn DagRunRepository> = Arc::new(InMemoryDagRunRepository::default());
        dags.create(dag_record("d", false)).await.unwrap();

        let concurrency = Arc::new(ConcurrencyManager::new(100, 1, Default::default()));
        let sched = Scheduler::new(
            SchedulerConfig { schedule_interval: Duration::from_secs(1), default_timezone: "UTC".to_string(), enable_catchup: false, max_catchup_runs: 10 },
            Arc::new(CronScheduler::new()),
            Arc::new(PriorityQueue::new()),
            concurrency,
            dags,
            runs,
            dispatcher.clone(),
        );

        sched.trigger_dag("d", Utc::now()).await.unwrap();
        sched.trigger_dag("d", Utc::now()).await.unwrap();
        sched.tick().await.unwrap();

        // Per-DAG limit is 1: only one of the two triggered runs is admitted.
        assert_eq!(dispatcher.count.load(Ordering::SeqCst), 1);
        assert_eq!(sched.queue.len(), 1);
    }
}
