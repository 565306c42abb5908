//! The per-run scheduler loop (spec.md §4.10.1) shared by both executors: a
//! tick-based fixed point over `completed` / `failed` / `submitted` task-id
//! sets, driving a single [`DagRun`] to a terminal state. [`LocalExecutor`]
//! (`super::local`) and the distributed executor (`super::distributed`)
//! differ only in how step 2.b hands a ready task off to a worker — that
//! seam is the [`DispatchBackend`] trait.

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use crate::dag::state_machine::validate_transition;
use crate::dag::task::{Task, TaskId};
use crate::dag::task_instance::InstanceState;
use crate::dag::{DagRun, Graph, RunState, TaskInstance};
use crate::error::Result;
use crate::repository::{DagRunRepository, ListFilter, TaskInstanceRepository};
use crate::scheduler::propagation::PropagationPolicy;
use crate::state::StateManager;

/// One ready task, handed to a [`DispatchBackend`] for execution.
#[derive(Debug, Clone)]
pub struct TaskSubmission {
    pub dag_id: String,
    pub dag_run_id: Uuid,
    pub instance: TaskInstance,
    pub task: Task,
}

/// The hand-off point between the common per-run loop and a concrete
/// executor. A successful return means the task has been queued for a
/// worker — not that it has started running yet — and the loop will not
/// dispatch it again; the `queued -> running` transition and everything
/// after it happens on the worker side (§4.10.2 step 1, §4.10.3 executor
/// side), observed by the loop's step 3 re-read.
#[async_trait]
pub trait DispatchBackend: Send + Sync {
    async fn submit(&self, submission: TaskSubmission) -> Result<()>;
}

pub struct RunLoopConfig {
    pub tick_interval: Duration,
    pub propagation: PropagationPolicy,
    pub critical_tasks: HashSet<TaskId>,
}

impl Default for RunLoopConfig {
    fn default() -> Self {
        Self { tick_interval: Duration::from_secs(1), propagation: PropagationPolicy::default(), critical_tasks: HashSet::new() }
    }
}

pub struct RunLoop {
    run: DagRun,
    graph: Arc<Graph>,
    instances: Arc<dyn TaskInstanceRepository>,
    runs: Arc<dyn DagRunRepository>,
    backend: Arc<dyn DispatchBackend>,
    state: Arc<StateManager>,
    config: RunLoopConfig,
}

impl RunLoop {
    pub fn new(
        run: DagRun,
        graph: Arc<Graph>,
        instances: Arc<dyn TaskInstanceRepository>,
        runs: Arc<dyn DagRunRepository>,
        backend: Arc<dyn DispatchBackend>,
        state: Arc<StateManager>,
        config: RunLoopConfig,
    ) -> Self {
        Self { run, graph, instances, runs, backend, state, config }
    }

    /// Drives the run to completion. Returns once the run reaches a terminal
    /// state or `cancel` fires.
    pub async fn run(mut self, cancel: CancellationToken) -> Result<()> {
        let mut by_task = self.bootstrap_instances().await?;

        let mut completed: HashSet<TaskId> = HashSet::new();
        let mut failed: HashSet<TaskId> = HashSet::new();
        let mut submitted: HashSet<TaskId> = HashSet::new();

        for (task_id, instance) in &by_task {
            match instance.state {
                InstanceState::Success | InstanceState::Skipped => {
                    completed.insert(task_id.clone());
                }
                InstanceState::Failed | InstanceState::UpstreamFailed => {
                    failed.insert(task_id.clone());
                }
                InstanceState::Running | InstanceState::Retrying => {
                    submitted.insert(task_id.clone());
                }
                InstanceState::Queued => {}
            }
        }

        let mut interval = tokio::time::interval(self.config.tick_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!(dag_run_id = %self.run.id, "run loop cancelled");
                    return Ok(());
                }
                _ = interval.tick() => {}
            }

            if completed.len() + failed.len() == self.graph.len() {
                self.finish(&by_task).await?;
                return Ok(());
            }

            // Step 2: dispatch newly-ready tasks.
            let ready = self.graph.ready_set(&completed);
            for task_id in ready {
                if submitted.contains(&task_id) || failed.contains(&task_id) || completed.contains(&task_id) {
                    continue;
                }
                let deps = self.graph.dependencies(&task_id)?;
                if deps.iter().any(|d| failed.contains(d)) {
                    self.mark_upstream_failed(&mut by_task, &task_id).await?;
                    failed.insert(task_id);
                    continue;
                }

                let instance = by_task.get(&task_id).cloned().expect("instance bootstrapped for every task");
                if instance.state != InstanceState::Queued {
                    continue;
                }
                let task = self.graph.task(&task_id)?.clone();
                let submission = TaskSubmission { dag_id: self.run.dag_id.clone(), dag_run_id: self.run.id, instance, task };
                match self.backend.submit(submission).await {
                    Ok(()) => {
                        submitted.insert(task_id);
                    }
                    Err(err) => {
                        warn!(dag_run_id = %self.run.id, task_id = %task_id, error = %err.user_message(), "failed to submit task");
                    }
                }
            }

            // Step 3: re-read submitted tasks for a terminal state.
            let mut newly_done = Vec::new();
            for task_id in &submitted {
                let instance = by_task.get(task_id).expect("instance bootstrapped for every task");
                let current = self.instances.get(instance.id).await?;
                if current.state.is_terminal() {
                    newly_done.push(task_id.clone());
                }
                by_task.insert(task_id.clone(), current);
            }
            for task_id in newly_done {
                submitted.remove(&task_id);
                let instance = &by_task[&task_id];
                if instance.state.is_successful() {
                    completed.insert(task_id);
                } else {
                    failed.insert(task_id);
                }
            }
        }
    }

    async fn bootstrap_instances(&self) -> Result<std::collections::HashMap<TaskId, TaskInstance>> {
        let existing = self.instances.list(&ListFilter { parent_id: Some(self.run.id), ..Default::default() }).await?;
        let mut by_task: std::collections::HashMap<TaskId, TaskInstance> = existing.into_iter().map(|ti| (ti.task_id.clone(), ti)).collect();

        for task in self.graph.tasks() {
            if by_task.contains_key(&task.id) {
                continue;
            }
            let instance = TaskInstance::new(self.run.id, task.id.clone(), task.max_tries());
            let created = self.instances.create(instance).await?;
            by_task.insert(task.id.clone(), created);
        }
        Ok(by_task)
    }

    async fn mark_upstream_failed(&self, by_task: &mut std::collections::HashMap<TaskId, TaskInstance>, task_id: &TaskId) -> Result<()> {
        let instance = by_task.get(task_id).expect("instance bootstrapped for every task");
        if instance.state != InstanceState::Queued {
            return Ok(());
        }
        validate_transition(InstanceState::Queued, InstanceState::UpstreamFailed)?;
        let updated = self.instances.update_state(instance.id, InstanceState::Queued, InstanceState::UpstreamFailed).await?;
        self.state
            .transition_instance(updated.id, InstanceState::Queued, InstanceState::UpstreamFailed, serde_json::json!({"reason": "upstream_failed"}))
            .await
            .ok();
        by_task.insert(task_id.clone(), updated);
        Ok(())
    }

    async fn finish(&mut self, by_task: &std::collections::HashMap<TaskId, TaskInstance>) -> Result<()> {
        let instances: Vec<TaskInstance> = by_task.values().cloned().collect();
        let succeeded = self.config.propagation.can_dag_succeed(&instances, &self.config.critical_tasks);
        let final_state = if succeeded { RunState::Success } else { RunState::Failed };

        let updated = self.runs.update_state(self.run.id, RunState::Running, final_state).await?;
        self.state.transition_run(updated.id, RunState::Running, final_state, serde_json::Value::Null).await;
        info!(dag_run_id = %self.run.id, state = %final_state, "run finished");
        self.run = updated;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dag::task::{Task, TaskType};
    use crate::repository::memory::{InMemoryDagRunRepository, InMemoryTaskInstanceRepository};
    use crate::state::publisher::NoopPublisher;
    use chrono::Utc;
    use std::collections::HashMap;

    struct ScriptedBackend {
        instances: Arc<dyn TaskInstanceRepository>,
        outcomes: HashMap<String, InstanceState>,
    }

    #[async_trait]
    impl DispatchBackend for ScriptedBackend {
        async fn submit(&self, submission: TaskSubmission) -> Result<()> {
            let running = self.instances.update_state(submission.instance.id, InstanceState::Queued, InstanceState::Running).await?;
            let outcome = self.outcomes.get(&submission.task.id.0).copied().unwrap_or(InstanceState::Success);
            self.instances.update_state(running.id, InstanceState::Running, outcome).await?;
            Ok(())
        }
    }

    fn graph_a_then_b() -> Graph {
        let a = Task::new("a", "a", TaskType::Bash, "true");
        let b = Task::new("b", "b", TaskType::Bash, "true").with_dependencies([TaskId::new("a")]);
        Graph::build("d", vec![a, b]).unwrap()
    }

    async fn admitted_run(runs: &Arc<dyn DagRunRepository>) -> DagRun {
        let run = runs.create(DagRun::new("d", Utc::now(), false, 1)).await.unwrap();
        runs.update_state(run.id, RunState::Queued, RunState::Running).await.unwrap()
    }

    #[tokio::test]
    async fn run_completes_successfully_when_every_task_succeeds() {
        let graph = Arc::new(graph_a_then_b());
        let runs: Arc<dyn DagRunRepository> = Arc::new(InMemoryDagRunRepository::default());
        let instances: Arc<dyn TaskInstanceRepository> = Arc::new(InMemoryTaskInstanceRepository::default());
        let run = admitted_run(&runs).await;

        let backend = Arc::new(ScriptedBackend { instances: instances.clone(), outcomes: HashMap::new() });
        let state = Arc::new(StateManager::new(Arc::new(NoopPublisher)));
        let run_loop = RunLoop::new(
            run.clone(),
            graph,
            instances.clone(),
            runs.clone(),
            backend,
            state,
            RunLoopConfig { tick_interval: Duration::from_millis(5), ..Default::default() },
        );

        run_loop.run(CancellationToken::new()).await.unwrap();

        let final_run = runs.get(run.id).await.unwrap();
        assert_eq!(final_run.state, RunState::Success);
    }

    #[tokio::test]
    async fn a_failed_task_marks_downstream_upstream_failed_and_run_fails() {
        let graph = Arc::new(graph_a_then_b());
        let runs: Arc<dyn DagRunRepository> = Arc::new(InMemoryDagRunRepository::default());
        let instances: Arc<dyn TaskInstanceRepository> = Arc::new(InMemoryTaskInstanceRepository::default());
        let run = admitted_run(&runs).await;

        let mut outcomes = HashMap::new();
        outcomes.insert("a".to_string(), InstanceState::Failed);
        let backend = Arc::new(ScriptedBackend { instances: instances.clone(), outcomes });
        let state = Arc::new(StateManager::new(Arc::new(NoopPublisher)));
        let run_loop = RunLoop::new(
            run.clone(),
            graph,
            instances.clone(),
            runs.clone(),
            backend,
            state,
            RunLoopConfig { tick_interval: Duration::from_millis(5), ..Default::default() },
        );

        run_loop.run(CancellationToken::new()).await.unwrap();

        let final_run = runs.get(run.id).await.unwrap();
        assert_eq!(final_run.state, RunState::Failed);

        let all = instances.list(&ListFilter { parent_id: Some(run.id), ..Default::default() }).await.unwrap();
        let b = all.iter().find(|ti| ti.task_id == TaskId::new("b")).unwrap();
        assert_eq!(b.state, InstanceState::UpstreamFailed);
    }

    #[tokio::test]
    async fn cancellation_stops_the_loop_promptly() {
        let graph = Arc::new(graph_a_then_b());
        let runs: Arc<dyn DagRunRepository> = Arc::new(InMemoryDagRunRepository::default());
        let instances: Arc<dyn TaskInstanceRepository> = Arc::new(InMemoryTaskInstanceRepository::default());
        let run = admitted_run(&runs).await;

        struct StuckBackend;
        #[async_trait]
        impl DispatchBackend for StuckBackend {
            async fn submit(&self, _submission: TaskSubmission) -> Result<()> {
                std::future::pending::<()>().await;
                unreachable!()
            }
        }

        let state = Arc::new(StateManager::new(Arc::new(NoopPublisher)));
        let run_loop = RunLoop::new(
            run.clone(),
            graph,
            instances,
            runs.clone(),
            Arc::new(StuckBackend),
            state,
            RunLoopConfig { tick_interval: Duration::from_millis(5), ..Default::default() },
        );

        let cancel = CancellationToken::new();
        cancel.cancel();
        run_loop.run(cancel).await.unwrap();

        let final_run = runs.get(run.id).await.unwrap();
        assert_eq!(final_run.state, RunState::Running);
    }
}
