//! DistributedExecutor + Worker (C15, spec.md §4.10.3): the remote-fan-out
//! counterpart to [`super::local::LocalExecutor`]. Grounded the same way
//! the rest of `execution` is on the teacher's `tokio::spawn` +
//! `tokio_util::sync::CancellationToken` loop shape, with `dashmap::DashMap`
//! standing in for the teacher's per-key worker/contract registries.
//!
//! Retry location (spec.md §9's open question, decided for this path):
//! holding a `tasks.pending` message unacked through a multi-minute backoff
//! would make a worker crash indistinguishable from "still backing off",
//! so a worker here always acks immediately after publishing one result.
//! The executor owns the retry loop instead: on a failed result with
//! retries remaining it transitions `running -> retrying`, sleeps the
//! backoff out-of-band, then republishes a fresh `TaskMessage` itself.

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::dag::task::{Task, TaskId, TaskType};
use crate::dag::task_instance::InstanceState;
use crate::error::{OrchestratorError, Result};
use crate::repository::TaskInstanceRepository;
use crate::resilience::dlq::DlqManager;
use crate::resilience::retry::{apply_jitter, BackoffStrategy};
use crate::state::StateManager;

use super::handler::HandlerRegistry;
use super::message_bus::{MessageBus, TaskMessage, TaskResultMessage, WorkerHeartbeat};
use super::run_loop::{DispatchBackend, TaskSubmission};

/// Context kept in-memory for a task instance that has an attempt in
/// flight, so a retry republish has everything it needs without round
/// tripping through a DAG/Graph lookup.
#[derive(Clone)]
struct InFlight {
    dag_id: String,
    dag_run_id: Uuid,
    task: Task,
}

pub struct DistributedExecutorConfig {
    pub consumer_group: String,
    pub consumer_name: String,
    pub result_poll_block: Duration,
    pub retry_backoff: BackoffStrategy,
    pub heartbeat_ttl: Duration,
}

impl Default for DistributedExecutorConfig {
    fn default() -> Self {
        Self {
            consumer_group: "orka-executor".to_string(),
            consumer_name: format!("executor-{}", Uuid::new_v4()),
            result_poll_block: Duration::from_secs(2),
            retry_backoff: BackoffStrategy::default(),
            heartbeat_ttl: Duration::from_secs(30),
        }
    }
}

/// Executor side of §4.10.3: publishes ready tasks to `tasks.pending` and
/// owns the consumer loop over `tasks.results` that drives TaskInstance
/// transitions.
pub struct DistributedExecutor {
    bus: Arc<dyn MessageBus>,
    instances: Arc<dyn TaskInstanceRepository>,
    state: Arc<StateManager>,
    dlq: Option<Arc<DlqManager>>,
    config: DistributedExecutorConfig,
    in_flight: DashMap<Uuid, InFlight>,
    live_workers: DashMap<String, chrono::DateTime<Utc>>,
    completed_tasks: Arc<AtomicUsize>,
    failed_tasks: Arc<AtomicUsize>,
}

impl DistributedExecutor {
    pub fn new(bus: Arc<dyn MessageBus>, instances: Arc<dyn TaskInstanceRepository>, state: Arc<StateManager>, config: DistributedExecutorConfig) -> Self {
        Self {
            bus,
            instances,
            state,
            dlq: None,
            config,
            in_flight: DashMap::new(),
            live_workers: DashMap::new(),
            completed_tasks: Arc::new(AtomicUsize::new(0)),
            failed_tasks: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_dlq(mut self, dlq: Arc<DlqManager>) -> Self {
        self.dlq = Some(dlq);
        self
    }

    pub fn completed_tasks(&self) -> usize {
        self.completed_tasks.load(Ordering::SeqCst)
    }

    pub fn failed_tasks(&self) -> usize {
        self.failed_tasks.load(Ordering::SeqCst)
    }

    pub fn live_worker_count(&self) -> usize {
        self.live_workers.len()
    }

    /// Runs the `tasks.results` consumer loop and the heartbeat-eviction
    /// watcher until `cancel` fires. Intended to be spawned alongside the
    /// [`super::run_loop::RunLoop`] it backs.
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) -> Result<()> {
        let results_loop = self.clone().run_results_loop(cancel.clone());
        let heartbeat_loop = self.clone().run_heartbeat_watch(cancel.clone());
        tokio::select! {
            _ = cancel.cancelled() => {}
            r = results_loop => { r?; }
            r = heartbeat_loop => { r?; }
        }
        Ok(())
    }

    async fn run_results_loop(self: Arc<Self>, cancel: CancellationToken) -> Result<()> {
        loop {
            if cancel.is_cancelled() {
                return Ok(());
            }
            let deliveries = match self.bus.consume_results(&self.config.consumer_group, &self.config.consumer_name, self.config.result_poll_block).await {
                Ok(d) => d,
                Err(err) => {
                    warn!(error = %err.user_message(), "failed to poll tasks.results, backing off");
                    tokio::time::sleep(Duration::from_secs(1)).await;
                    continue;
                }
            };
            for delivery in deliveries {
                match self.handle_result(&delivery.payload).await {
                    Ok(()) => {
                        if let Err(err) = self.bus.ack_result(&self.config.consumer_group, &delivery.id).await {
                            warn!(error = %err.user_message(), delivery_id = %delivery.id, "failed to ack tasks.results delivery");
                        }
                    }
                    Err(err) => {
                        warn!(error = %err.user_message(), delivery_id = %delivery.id, "failed to process result, leaving unacked for redelivery");
                    }
                }
            }
        }
    }

    async fn run_heartbeat_watch(self: Arc<Self>, cancel: CancellationToken) -> Result<()> {
        let mut rx = self.bus.subscribe_heartbeats().await?;
        let mut sweep = tokio::time::interval(Duration::from_secs(5));
        loop {
            tokio::select! {
                _ = cancel.cancelled() => return Ok(()),
                heartbeat = rx.recv() => {
                    match heartbeat {
                        Some(hb) => { self.live_workers.insert(hb.worker_id, hb.timestamp); }
                        None => return Ok(()),
                    }
                }
                _ = sweep.tick() => {
                    let cutoff = Utc::now() - chrono::Duration::from_std(self.config.heartbeat_ttl).unwrap_or_default();
                    let stale: Vec<String> = self.live_workers.iter().filter(|e| *e.value() < cutoff).map(|e| e.key().clone()).collect();
                    for worker_id in stale {
                        self.live_workers.remove(&worker_id);
                        info!(worker_id, "evicted worker missing heartbeats");
                    }
                }
            }
        }
    }

    /// Idempotence (spec.md §4.10.3/S6): a version-checked `running ->
    /// terminal` CAS succeeds exactly once; a duplicate redelivered result
    /// observes an already-terminal instance (or a losing CAS) and is a
    /// no-op here, acked by the caller regardless.
    async fn handle_result(&self, result: &TaskResultMessage) -> Result<()> {
        let instance = self.instances.get(result.task_instance_id).await?;
        if instance.state.is_terminal() {
            return Ok(());
        }

        match result.state.as_str() {
            "success" => self.finish_success(instance, result).await,
            "failed" => self.finish_failed_or_retry(instance, result).await,
            other => {
                error!(task_instance_id = %result.task_instance_id, state = other, "tasks.results delivered an unrecognized terminal state");
                Ok(())
            }
        }
    }

    async fn finish_success(&self, mut instance: crate::dag::TaskInstance, result: &TaskResultMessage) -> Result<()> {
        match self.instances.update_state(instance.id, InstanceState::Running, InstanceState::Success).await {
            Ok(_) => {}
            Err(_) => return Ok(()), // lost the CAS race to a prior duplicate delivery
        }
        self.state.transition_instance(instance.id, InstanceState::Running, InstanceState::Success, serde_json::Value::Null).await.ok();
        instance.mark_success(result.end);
        let _ = self.instances.update(instance.clone()).await;
        self.completed_tasks.fetch_add(1, Ordering::SeqCst);
        self.in_flight.remove(&instance.id);
        Ok(())
    }

    async fn finish_failed_or_retry(&self, mut instance: crate::dag::TaskInstance, result: &TaskResultMessage) -> Result<()> {
        let error_message = result.error_message.clone().unwrap_or_else(|| "task failed".to_string());

        if instance.has_retries_remaining() {
            match self.instances.update_state(instance.id, InstanceState::Running, InstanceState::Retrying).await {
                Ok(_) => {}
                Err(_) => return Ok(()),
            }
            self.state.transition_instance(instance.id, InstanceState::Running, InstanceState::Retrying, serde_json::Value::Null).await.ok();
            instance.mark_retrying(error_message);
            let _ = self.instances.update(instance.clone()).await;

            let Some(ctx) = self.in_flight.get(&instance.id).map(|e| e.value().clone()) else {
                warn!(task_instance_id = %instance.id, "no in-flight context for a retrying task instance, cannot republish");
                return Ok(());
            };
            self.schedule_retry(instance, ctx);
            return Ok(());
        }

        match self.instances.update_state(instance.id, InstanceState::Running, InstanceState::Failed).await {
            Ok(final_instance) => {
                self.state.transition_instance(instance.id, InstanceState::Running, InstanceState::Failed, serde_json::Value::Null).await.ok();
                instance.mark_failed(error_message, result.end);
                let _ = self.instances.update(instance.clone()).await;
                self.failed_tasks.fetch_add(1, Ordering::SeqCst);
                if let Some(ctx) = self.in_flight.get(&instance.id).map(|e| e.value().clone()) {
                    if let Some(dlq) = &self.dlq {
                        let err = OrchestratorError::internal(instance.error_message.clone().unwrap_or_default());
                        if let Err(dlq_err) = dlq.add_failed_task(&final_instance, &ctx.task, &ctx.dag_id, &err, result.end) {
                            warn!(error = %dlq_err.user_message(), "failed to record DLQ entry");
                        }
                    }
                }
                self.in_flight.remove(&instance.id);
                Ok(())
            }
            Err(_) => Ok(()),
        }
    }

    /// Sleeps the backoff out-of-band, then CASes back to `running` and
    /// republishes — the message bus never carries the retry delay.
    fn schedule_retry(&self, instance: crate::dag::TaskInstance, ctx: InFlight) {
        let bus = self.bus.clone();
        let instances = self.instances.clone();
        let state = self.state.clone();
        let backoff = self.config.retry_backoff;
        let instance_id = instance.id;
        let try_number = instance.try_number;
        let dag_run_id = ctx.dag_run_id;
        let dag_id = ctx.dag_id.clone();
        let task = ctx.task.clone();

        tokio::spawn(async move {
            let delay = apply_jitter(backoff.next_delay(try_number));
            tokio::time::sleep(delay).await;

            let started_at = Utc::now();
            let mut instance = match instances.update_state(instance_id, InstanceState::Retrying, InstanceState::Running).await {
                Ok(ti) => ti,
                Err(err) => {
                    warn!(task_instance_id = %instance_id, error = %err.user_message(), "failed to re-admit retrying task instance to running");
                    return;
                }
            };
            state.transition_instance(instance_id, InstanceState::Retrying, InstanceState::Running, serde_json::Value::Null).await.ok();
            instance.mark_started("distributed", started_at);
            let _ = instances.update(instance).await;

            let message = TaskMessage {
                task_instance_id: instance_id,
                task_id: task.id.0.clone(),
                dag_run_id,
                dag_id,
                task_type: task.task_type.to_string(),
                command: task.command.clone(),
                timeout: task.timeout,
                retries: task.retries,
            };
            if let Err(err) = bus.publish_task(&message).await {
                error!(task_instance_id = %instance_id, error = %err.user_message(), "failed to republish retried task");
            }
        });
    }
}

#[async_trait]
impl DispatchBackend for DistributedExecutor {
    async fn submit(&self, submission: TaskSubmission) -> Result<()> {
        let TaskSubmission { dag_id, dag_run_id, instance, task } = submission;

        let started_at = Utc::now();
        let mut instance = self.instances.update_state(instance.id, InstanceState::Queued, InstanceState::Running).await?;
        self.state.transition_instance(instance.id, InstanceState::Queued, InstanceState::Running, serde_json::Value::Null).await.ok();
        instance.mark_started("distributed", started_at);
        self.instances.update(instance.clone()).await?;

        self.in_flight.insert(instance.id, InFlight { dag_id: dag_id.clone(), dag_run_id, task: task.clone() });

        let message = TaskMessage {
            task_instance_id: instance.id,
            task_id: task.id.0.clone(),
            dag_run_id,
            dag_id,
            task_type: task.task_type.to_string(),
            command: task.command.clone(),
            timeout: task.timeout,
            retries: task.retries,
        };
        self.bus.publish_task(&message).await
    }
}

pub struct WorkerConfig {
    pub worker_id: String,
    pub hostname: String,
    pub consumer_group: String,
    pub consumer_name: String,
    pub poll_block: Duration,
    pub heartbeat_interval: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        let worker_id = format!("worker-{}", Uuid::new_v4());
        Self {
            hostname: std::env::var("HOSTNAME").unwrap_or_else(|_| "worker".to_string()),
            consumer_group: "orka-workers".to_string(),
            consumer_name: worker_id.clone(),
            worker_id,
            poll_block: Duration::from_secs(2),
            heartbeat_interval: Duration::from_secs(10),
        }
    }
}

/// Worker side of §4.10.3: pulls `TaskMessage`s off `tasks.pending`, runs
/// the matching handler, and always publishes exactly one result before
/// acking — it never holds a message through a retry sleep.
pub struct Worker {
    bus: Arc<dyn MessageBus>,
    handlers: Arc<HandlerRegistry>,
    config: WorkerConfig,
    active_tasks: Arc<AtomicUsize>,
}

impl Worker {
    pub fn new(bus: Arc<dyn MessageBus>, handlers: Arc<HandlerRegistry>, config: WorkerConfig) -> Self {
        Self { bus, handlers, config, active_tasks: Arc::new(AtomicUsize::new(0)) }
    }

    pub async fn run(self: Arc<Self>, cancel: CancellationToken) -> Result<()> {
        let poll_loop = self.clone().run_poll_loop(cancel.clone());
        let heartbeat_loop = self.clone().run_heartbeat_loop(cancel.clone());
        tokio::select! {
            _ = cancel.cancelled() => {}
            r = poll_loop => { r?; }
            r = heartbeat_loop => { r?; }
        }
        Ok(())
    }

    async fn run_poll_loop(self: Arc<Self>, cancel: CancellationToken) -> Result<()> {
        loop {
            if cancel.is_cancelled() {
                return Ok(());
            }
            let deliveries = match self.bus.consume_tasks(&self.config.consumer_group, &self.config.consumer_name, self.config.poll_block).await {
                Ok(d) => d,
                Err(err) => {
                    warn!(error = %err.user_message(), "failed to poll tasks.pending, backing off");
                    tokio::time::sleep(Duration::from_secs(1)).await;
                    continue;
                }
            };
            for delivery in deliveries {
                self.handle_task(delivery.payload).await;
                if let Err(err) = self.bus.ack_task(&self.config.consumer_group, &delivery.id).await {
                    warn!(error = %err.user_message(), delivery_id = %delivery.id, "failed to ack tasks.pending delivery");
                }
            }
        }
    }

    async fn run_heartbeat_loop(self: Arc<Self>, cancel: CancellationToken) -> Result<()> {
        let mut interval = tokio::time::interval(self.config.heartbeat_interval);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => return Ok(()),
                _ = interval.tick() => {
                    let heartbeat = WorkerHeartbeat {
                        worker_id: self.config.worker_id.clone(),
                        hostname: self.config.hostname.clone(),
                        active_tasks: self.active_tasks.load(Ordering::SeqCst),
                        timestamp: Utc::now(),
                    };
                    if let Err(err) = self.bus.publish_heartbeat(&heartbeat).await {
                        warn!(error = %err.user_message(), "failed to publish heartbeat");
                    }
                }
            }
        }
    }

    async fn handle_task(&self, message: TaskMessage) {
        self.active_tasks.fetch_add(1, Ordering::SeqCst);
        let start = Utc::now();

        let task_type = match TaskType::parse(&message.task_type) {
            Ok(t) => t,
            Err(_) => {
                self.active_tasks.fetch_sub(1, Ordering::SeqCst);
                self.publish_failure(&message, start, "unknown task type").await;
                return;
            }
        };

        let Some(handler) = self.handlers.resolve(task_type) else {
            self.active_tasks.fetch_sub(1, Ordering::SeqCst);
            self.publish_failure(&message, start, "no handler registered for task type").await;
            return;
        };

        let task = Task::new(message.task_id.clone(), message.task_id.clone(), task_type, message.command.clone()).with_timeout(message.timeout);
        let join_handle = tokio::spawn(async move { handler.execute(&task).await });
        let outcome = match tokio::time::timeout(message.timeout, join_handle).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_err)) => Err(OrchestratorError::internal(format!("task handler panicked: {join_err}"))),
            Err(_elapsed) => Err(OrchestratorError::task_timeout(message.task_instance_id.to_string())),
        };
        self.active_tasks.fetch_sub(1, Ordering::SeqCst);

        let end = Utc::now();
        let result = match outcome {
            Ok(output) => TaskResultMessage {
                task_instance_id: message.task_instance_id,
                worker_id: self.config.worker_id.clone(),
                state: "success".to_string(),
                output: Some(output),
                error_message: None,
                start,
                end,
                hostname: self.config.hostname.clone(),
            },
            Err(err) => TaskResultMessage {
                task_instance_id: message.task_instance_id,
                worker_id: self.config.worker_id.clone(),
                state: "failed".to_string(),
                output: None,
                error_message: Some(err.user_message().to_string()),
                start,
                end,
                hostname: self.config.hostname.clone(),
            },
        };
        if let Err(err) = self.bus.publish_result(&result).await {
            error!(task_instance_id = %message.task_instance_id, error = %err.user_message(), "failed to publish task result");
        }
    }

    async fn publish_failure(&self, message: &TaskMessage, start: chrono::DateTime<Utc>, reason: &str) {
        let result = TaskResultMessage {
            task_instance_id: message.task_instance_id,
            worker_id: self.config.worker_id.clone(),
            state: "failed".to_string(),
            output: None,
            error_message: Some(reason.to_string()),
            start,
            end: Utc::now(),
            hostname: self.config.hostname.clone(),
        };
        if let Err(err) = self.bus.publish_result(&result).await {
            error!(error = %err.user_message(), "failed to publish failure result");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dag::task::TaskType;
    use crate::dag::task_instance::TaskInstance;
    use crate::repository::memory::InMemoryTaskInstanceRepository;
    use crate::state::{NoopPublisher, StateManager};
    use std::sync::Mutex as StdMutex;
    use tokio::sync::mpsc;

    #[derive(Default)]
    struct FakeBus {
        published_tasks: StdMutex<Vec<TaskMessage>>,
        published_results: StdMutex<Vec<TaskResultMessage>>,
    }

    #[async_trait]
    impl MessageBus for FakeBus {
        async fn publish_task(&self, message: &TaskMessage) -> Result<()> {
            self.published_tasks.lock().unwrap().push(message.clone());
            Ok(())
        }
        async fn consume_tasks(&self, _g: &str, _c: &str, _b: Duration) -> Result<Vec<super::super::message_bus::Delivery<TaskMessage>>> {
            Ok(Vec::new())
        }
        async fn ack_task(&self, _g: &str, _id: &str) -> Result<()> {
            Ok(())
        }
        async fn reclaim_stale_tasks(&self, _g: &str, _c: &str, _i: Duration) -> Result<Vec<super::super::message_bus::Delivery<TaskMessage>>> {
            Ok(Vec::new())
        }
        async fn publish_result(&self, message: &TaskResultMessage) -> Result<()> {
            self.published_results.lock().unwrap().push(message.clone());
            Ok(())
        }
        async fn consume_results(&self, _g: &str, _c: &str, _b: Duration) -> Result<Vec<super::super::message_bus::Delivery<TaskResultMessage>>> {
            Ok(Vec::new())
        }
        async fn ack_result(&self, _g: &str, _id: &str) -> Result<()> {
            Ok(())
        }
        async fn publish_heartbeat(&self, _h: &WorkerHeartbeat) -> Result<()> {
            Ok(())
        }
        async fn subscribe_heartbeats(&self) -> Result<mpsc::Receiver<WorkerHeartbeat>> {
            let (_tx, rx) = mpsc::channel(1);
            Ok(rx)
        }
    }

    fn state_manager() -> Arc<StateManager> {
        Arc::new(StateManager::new(Arc::new(NoopPublisher)))
    }

    #[tokio::test]
    async fn submit_transitions_to_running_and_publishes_task_message() {
        let instances: Arc<dyn TaskInstanceRepository> = Arc::new(InMemoryTaskInstanceRepository::default());
        let bus = Arc::new(FakeBus::default());
        let task = Task::new("t1", "t1", TaskType::Bash, "true");
        let instance = instances.create(TaskInstance::new(Uuid::new_v4(), TaskId::new("t1"), 1)).await.unwrap();
        let dag_run_id = instance.dag_run_id;

        let executor = DistributedExecutor::new(bus.clone(), instances.clone(), state_manager(), DistributedExecutorConfig::default());
        executor.submit(TaskSubmission { dag_id: "d".to_string(), dag_run_id, instance: instance.clone(), task }).await.unwrap();

        let stored = instances.get(instance.id).await.unwrap();
        assert_eq!(stored.state, InstanceState::Running);
        assert_eq!(bus.published_tasks.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn success_result_completes_the_instance_exactly_once() {
        let instances: Arc<dyn TaskInstanceRepository> = Arc::new(InMemoryTaskInstanceRepository::default());
        let bus = Arc::new(FakeBus::default());
        let task = Task::new("t1", "t1", TaskType::Bash, "true");
        let instance = instances.create(TaskInstance::new(Uuid::new_v4(), TaskId::new("t1"), 1)).await.unwrap();
        let dag_run_id = instance.dag_run_id;
        let instance_id = instance.id;

        let executor = DistributedExecutor::new(bus.clone(), instances.clone(), state_manager(), DistributedExecutorConfig::default());
        executor.submit(TaskSubmission { dag_id: "d".to_string(), dag_run_id, instance, task }).await.unwrap();

        let result = TaskResultMessage {
            task_instance_id: instance_id,
            worker_id: "w1".to_string(),
            state: "success".to_string(),
            output: Some("ok".to_string()),
            error_message: None,
            start: Utc::now(),
            end: Utc::now(),
            hostname: "w1-host".to_string(),
        };
        executor.handle_result(&result).await.unwrap();
        assert_eq!(executor.completed_tasks(), 1);

        // A duplicate redelivered result observes an already-terminal
        // instance and is a no-op (spec.md S6).
        executor.handle_result(&result).await.unwrap();
        assert_eq!(executor.completed_tasks(), 1);
    }

    #[tokio::test]
    async fn failed_result_with_no_retries_remaining_fails_the_instance() {
        let instances: Arc<dyn TaskInstanceRepository> = Arc::new(InMemoryTaskInstanceRepository::default());
        let bus = Arc::new(FakeBus::default());
        let task = Task::new("t1", "t1", TaskType::Bash, "exit 1");
        let instance = instances.create(TaskInstance::new(Uuid::new_v4(), TaskId::new("t1"), 1)).await.unwrap();
        let dag_run_id = instance.dag_run_id;
        let instance_id = instance.id;

        let executor = DistributedExecutor::new(bus.clone(), instances.clone(), state_manager(), DistributedExecutorConfig::default());
        executor.submit(TaskSubmission { dag_id: "d".to_string(), dag_run_id, instance, task }).await.unwrap();

        let result = TaskResultMessage {
            task_instance_id: instance_id,
            worker_id: "w1".to_string(),
            state: "failed".to_string(),
            output: None,
            error_message: Some("boom".to_string()),
            start: Utc::now(),
            end: Utc::now(),
            hostname: "w1-host".to_string(),
        };
        executor.handle_result(&result).await.unwrap();
        assert_eq!(executor.failed_tasks(), 1);
        let stored = instances.get(instance_id).await.unwrap();
        assert_eq!(stored.state, InstanceState::Failed);
    }
}
