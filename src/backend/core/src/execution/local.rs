//! LocalExecutor (C14): a fixed-size in-process worker pool. Grounded in the
//! teacher's `orchestrator::worker_pool::WorkerPool` — a `tokio::sync::Semaphore`
//! bounding concurrency, `tokio::spawn` per unit of work — adapted from an
//! arbitrary-future pool to one that runs exactly the five worker steps of
//! spec.md §4.10.2 per task instance.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{error, warn};

use crate::dag::task::Task;
use crate::dag::task_instance::InstanceState;
use crate::error::{OrchestratorError, Result};
use crate::repository::TaskInstanceRepository;
use crate::resilience::dlq::DlqManager;
use crate::resilience::retry::{apply_jitter, BackoffStrategy};
use crate::state::StateManager;

use super::handler::HandlerRegistry;
use super::run_loop::{DispatchBackend, TaskSubmission};

pub struct LocalExecutorConfig {
    pub max_workers: usize,
    pub shutdown_timeout: Duration,
    pub retry_backoff: BackoffStrategy,
    pub hostname: String,
}

impl Default for LocalExecutorConfig {
    fn default() -> Self {
        Self {
            max_workers: 50,
            shutdown_timeout: Duration::from_secs(30),
            retry_backoff: BackoffStrategy::default(),
            hostname: hostname_or_default(),
        }
    }
}

fn hostname_or_default() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "local-executor".to_string())
}

/// A fixed-size worker pool driving tasks handed off by [`super::run_loop::RunLoop`].
pub struct LocalExecutor {
    semaphore: Arc<Semaphore>,
    handlers: Arc<HandlerRegistry>,
    instances: Arc<dyn TaskInstanceRepository>,
    state: Arc<StateManager>,
    dlq: Option<Arc<DlqManager>>,
    retry_backoff: BackoffStrategy,
    hostname: String,
    shutdown_timeout: Duration,
    shutting_down: Arc<AtomicBool>,
    active_tasks: Arc<AtomicUsize>,
    completed_tasks: Arc<AtomicUsize>,
    failed_tasks: Arc<AtomicUsize>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl LocalExecutor {
    pub fn new(config: LocalExecutorConfig, handlers: Arc<HandlerRegistry>, instances: Arc<dyn TaskInstanceRepository>, state: Arc<StateManager>) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(config.max_workers.max(1))),
            handlers,
            instances,
            state,
            dlq: None,
            retry_backoff: config.retry_backoff,
            hostname: config.hostname,
            shutdown_timeout: config.shutdown_timeout,
            shutting_down: Arc::new(AtomicBool::new(false)),
            active_tasks: Arc::new(AtomicUsize::new(0)),
            completed_tasks: Arc::new(AtomicUsize::new(0)),
            failed_tasks: Arc::new(AtomicUsize::new(0)),
            handles: Mutex::new(Vec::new()),
        }
    }

    pub fn with_dlq(mut self, dlq: Arc<DlqManager>) -> Self {
        self.dlq = Some(dlq);
        self
    }

    pub fn active_tasks(&self) -> usize {
        self.active_tasks.load(Ordering::SeqCst)
    }

    pub fn completed_tasks(&self) -> usize {
        self.completed_tasks.load(Ordering::SeqCst)
    }

    pub fn failed_tasks(&self) -> usize {
        self.failed_tasks.load(Ordering::SeqCst)
    }

    /// Refuses new work, then waits for in-flight tasks up to
    /// `shutdown_timeout` before returning; idempotent.
    pub async fn shutdown(&self) {
        self.shutting_down.store(true, Ordering::SeqCst);
        let handles: Vec<JoinHandle<()>> = self.handles.lock().drain(..).collect();
        let wait = async {
            for handle in handles {
                let _ = handle.await;
            }
        };
        if tokio::time::timeout(self.shutdown_timeout, wait).await.is_err() {
            warn!(timeout = ?self.shutdown_timeout, "local executor shutdown timed out, forcing exit");
        }
    }
}

#[async_trait]
impl DispatchBackend for LocalExecutor {
    async fn submit(&self, submission: TaskSubmission) -> Result<()> {
        if self.shutting_down.load(Ordering::SeqCst) {
            return Err(OrchestratorError::internal("local executor is shutting down, refusing new work"));
        }

        let semaphore = self.semaphore.clone();
        let handlers = self.handlers.clone();
        let instances = self.instances.clone();
        let state = self.state.clone();
        let dlq = self.dlq.clone();
        let retry_backoff = self.retry_backoff;
        let hostname = self.hostname.clone();
        let active_tasks = self.active_tasks.clone();
        let completed_tasks = self.completed_tasks.clone();
        let failed_tasks = self.failed_tasks.clone();

        let handle = tokio::spawn(async move {
            let _permit = match semaphore.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => return,
            };
            run_task_instance(WorkerDeps { handlers, instances, state, dlq, retry_backoff, hostname, active_tasks, completed_tasks, failed_tasks }, submission).await;
        });
        self.handles.lock().push(handle);
        Ok(())
    }
}

struct WorkerDeps {
    handlers: Arc<HandlerRegistry>,
    instances: Arc<dyn TaskInstanceRepository>,
    state: Arc<StateManager>,
    dlq: Option<Arc<DlqManager>>,
    retry_backoff: BackoffStrategy,
    hostname: String,
    active_tasks: Arc<AtomicUsize>,
    completed_tasks: Arc<AtomicUsize>,
    failed_tasks: Arc<AtomicUsize>,
}

/// The five worker steps of spec.md §4.10.2, looped across retry attempts.
async fn run_task_instance(deps: WorkerDeps, submission: TaskSubmission) {
    let TaskSubmission { dag_id, task, mut instance, .. } = submission;
    let mut from = InstanceState::Queued;

    loop {
        let started_at = Utc::now();
        instance = match deps.instances.update_state(instance.id, from, InstanceState::Running).await {
            Ok(ti) => ti,
            Err(err) => {
                warn!(task_instance_id = %instance.id, error = %err.user_message(), "could not admit task instance to running, skipping");
                return;
            }
        };
        deps.state.transition_instance(instance.id, from, InstanceState::Running, serde_json::Value::Null).await.ok();
        instance.mark_started(deps.hostname.clone(), started_at);
        if let Err(err) = deps.instances.update(instance.clone()).await {
            warn!(task_instance_id = %instance.id, error = %err.user_message(), "failed to persist start metadata");
        }
        deps.active_tasks.fetch_add(1, Ordering::SeqCst);

        let outcome = execute_one_attempt(&deps.handlers, &task).await;
        deps.active_tasks.fetch_sub(1, Ordering::SeqCst);
        let ended_at = Utc::now();

        match outcome {
            Ok(_output) => {
                if let Err(err) = deps.instances.update_state(instance.id, InstanceState::Running, InstanceState::Success).await {
                    error!(task_instance_id = %instance.id, error = %err.user_message(), "failed to record task success");
                    return;
                }
                deps.state.transition_instance(instance.id, InstanceState::Running, InstanceState::Success, serde_json::Value::Null).await.ok();
                instance.mark_success(ended_at);
                let _ = deps.instances.update(instance).await;
                deps.completed_tasks.fetch_add(1, Ordering::SeqCst);
                return;
            }
            Err(err) => {
                if instance.has_retries_remaining() {
                    if deps.instances.update_state(instance.id, InstanceState::Running, InstanceState::Retrying).await.is_err() {
                        return;
                    }
                    deps.state.transition_instance(instance.id, InstanceState::Running, InstanceState::Retrying, serde_json::Value::Null).await.ok();
                    instance.mark_retrying(err.user_message().to_string());
                    let _ = deps.instances.update(instance.clone()).await;

                    let delay = apply_jitter(deps.retry_backoff.next_delay(instance.try_number));
                    tokio::time::sleep(delay).await;
                    from = InstanceState::Retrying;
                    continue;
                }

                let final_instance = match deps.instances.update_state(instance.id, InstanceState::Running, InstanceState::Failed).await {
                    Ok(ti) => ti,
                    Err(err) => {
                        error!(task_instance_id = %instance.id, error = %err.user_message(), "failed to record task failure");
                        return;
                    }
                };
                deps.state.transition_instance(instance.id, InstanceState::Running, InstanceState::Failed, serde_json::Value::Null).await.ok();
                instance.mark_failed(err.user_message().to_string(), ended_at);
                let _ = deps.instances.update(instance.clone()).await;
                deps.failed_tasks.fetch_add(1, Ordering::SeqCst);

                if let Some(dlq) = &deps.dlq {
                    if let Err(dlq_err) = dlq.add_failed_task(&final_instance, &task, &dag_id, &err, ended_at) {
                        warn!(task_instance_id = %instance.id, error = %dlq_err.user_message(), "failed to record DLQ entry");
                    }
                }
                return;
            }
        }
    }
}

/// Worker steps 2-3: resolve a handler for the task's type, run it under a
/// timeout, and catch a panicking handler by isolating it in its own task.
async fn execute_one_attempt(handlers: &HandlerRegistry, task: &Task) -> Result<String> {
    let Some(handler) = handlers.resolve(task.task_type) else {
        return Err(OrchestratorError::validation(format!("no handler registered for task type {}", task.task_type)));
    };

    let timeout = task.timeout;
    let task_id = task.id.clone();
    let owned_task = task.clone();
    let join_handle = tokio::spawn(async move { handler.execute(&owned_task).await });
    let abort_handle = join_handle.abort_handle();

    match tokio::time::timeout(timeout, join_handle).await {
        Ok(Ok(result)) => result,
        Ok(Err(join_err)) => Err(OrchestratorError::internal(format!("task handler panicked: {join_err}"))),
        Err(_elapsed) => {
            abort_handle.abort();
            Err(OrchestratorError::task_timeout(task_id.0))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dag::task::{TaskId, TaskType};
    use crate::repository::memory::InMemoryTaskInstanceRepository;
    use crate::dag::task_instance::TaskInstance;
    use crate::state::{NoopPublisher, StateManager};
    use uuid::Uuid;

    fn registry() -> Arc<HandlerRegistry> {
        Arc::new(HandlerRegistry::with_defaults())
    }

    fn state_manager() -> Arc<StateManager> {
        Arc::new(StateManager::new(Arc::new(NoopPublisher)))
    }

    #[tokio::test]
    async fn submit_runs_a_successful_bash_task_to_completion() {
        let instances: Arc<dyn TaskInstanceRepository> = Arc::new(InMemoryTaskInstanceRepository::default());
        let task = Task::new("t1", "t1", TaskType::Bash, "true").with_timeout(Duration::from_secs(5));
        let instance = instances.create(TaskInstance::new(Uuid::new_v4(), TaskId::new("t1"), 1)).await.unwrap();

        let executor = LocalExecutor::new(LocalExecutorConfig { max_workers: 2, ..Default::default() }, registry(), instances.clone(), state_manager());
        let dag_run_id = instance.dag_run_id;
        executor
            .submit(TaskSubmission { dag_id: "d".to_string(), dag_run_id, instance, task })
            .await
            .unwrap();

        executor.shutdown().await;
        assert_eq!(executor.completed_tasks(), 1);
        assert_eq!(executor.failed_tasks(), 0);
    }

    #[tokio::test]
    async fn submit_exhausts_retries_then_records_failure() {
        let instances: Arc<dyn TaskInstanceRepository> = Arc::new(InMemoryTaskInstanceRepository::default());
        let task = Task::new("t1", "t1", TaskType::Bash, "exit 1").with_timeout(Duration::from_secs(5));
        let instance = instances.create(TaskInstance::new(Uuid::new_v4(), TaskId::new("t1"), 1)).await.unwrap();

        let config = LocalExecutorConfig { max_workers: 2, retry_backoff: BackoffStrategy::Fixed { delay: Duration::from_millis(1) }, ..Default::default() };
        let executor = LocalExecutor::new(config, registry(), instances.clone(), state_manager());
        let dag_run_id = instance.dag_run_id;
        executor
            .submit(TaskSubmission { dag_id: "d".to_string(), dag_run_id, instance, task })
            .await
            .unwrap();

        executor.shutdown().await;
        assert_eq!(executor.failed_tasks(), 1);
        assert_eq!(executor.completed_tasks(), 0);
    }

    #[tokio::test]
    async fn submit_refuses_work_once_shutting_down() {
        let instances: Arc<dyn TaskInstanceRepository> = Arc::new(InMemoryTaskInstanceRepository::default());
        let executor = LocalExecutor::new(LocalExecutorConfig::default(), registry(), instances.clone(), state_manager());
        executor.shutdown().await;

        let task = Task::new("t1", "t1", TaskType::Bash, "true");
        let instance = TaskInstance::new(Uuid::new_v4(), TaskId::new("t1"), 1);
        let dag_run_id = instance.dag_run_id;
        let err = executor.submit(TaskSubmission { dag_id: "d".to_string(), dag_run_id, instance, task }).await;
        assert!(err.is_err());
    }
}
