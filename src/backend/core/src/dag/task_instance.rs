//! [`TaskInstance`]: one attempt (or retry chain) of a [`Task`](super::task::Task)
//! within a particular [`DagRun`](super::run::DagRun).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::task::TaskId;

/// Run-time state of a task instance (spec.md §4.2 — the legal-transition
/// table lives in `dag::state_machine`, this enum is just the value set).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceState {
    Queued,
    Running,
    Retrying,
    Success,
    Failed,
    Skipped,
    UpstreamFailed,
}

impl InstanceState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Skipped | Self::Failed)
    }

    pub fn is_successful(&self) -> bool {
        matches!(self, Self::Success | Self::Skipped)
    }
}

impl std::fmt::Display for InstanceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Retrying => "retrying",
            Self::Success => "success",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
            Self::UpstreamFailed => "upstream_failed",
        };
        write!(f, "{s}")
    }
}

/// One row of execution state for a task within a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskInstance {
    pub id: Uuid,
    pub dag_run_id: Uuid,
    pub task_id: TaskId,
    pub state: InstanceState,
    pub try_number: u32,
    pub max_tries: u32,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub duration_ms: Option<i64>,
    pub worker_hostname: Option<String>,
    pub error_message: Option<String>,
    /// Optimistic-concurrency version, bumped on every `UpdateState` (C13).
    pub version: i64,
}

impl TaskInstance {
    pub fn new(dag_run_id: Uuid, task_id: TaskId, max_tries: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            dag_run_id,
            task_id,
            state: InstanceState::Queued,
            try_number: 0,
            max_tries,
            start_date: None,
            end_date: None,
            duration_ms: None,
            worker_hostname: None,
            error_message: None,
            version: 0,
        }
    }

    pub fn has_retries_remaining(&self) -> bool {
        self.try_number < self.max_tries
    }

    pub fn mark_started(&mut self, worker_hostname: impl Into<String>, at: DateTime<Utc>) {
        self.state = InstanceState::Running;
        self.try_number += 1;
        self.start_date = Some(at);
        self.worker_hostname = Some(worker_hostname.into());
    }

    pub fn mark_success(&mut self, at: DateTime<Utc>) {
        self.state = InstanceState::Success;
        self.finish(at);
    }

    pub fn mark_failed(&mut self, error_message: impl Into<String>, at: DateTime<Utc>) {
        self.state = InstanceState::Failed;
        self.error_message = Some(error_message.into());
        self.finish(at);
    }

    pub fn mark_retrying(&mut self, error_message: impl Into<String>) {
        self.state = InstanceState::Retrying;
        self.error_message = Some(error_message.into());
    }

    pub fn mark_skipped(&mut self, at: DateTime<Utc>) {
        self.state = InstanceState::Skipped;
        self.finish(at);
    }

    pub fn mark_upstream_failed(&mut self) {
        self.state = InstanceState::UpstreamFailed;
    }

    fn finish(&mut self, at: DateTime<Utc>) {
        self.end_date = Some(at);
        if let Some(start) = self.start_date {
            self.duration_ms = Some((at - start).num_milliseconds());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_instance_starts_queued_with_try_number_zero() {
        let ti = TaskInstance::new(Uuid::new_v4(), TaskId::new("t1"), 3);
        assert_eq!(ti.state, InstanceState::Queued);
        assert_eq!(ti.try_number, 0);
        assert!(ti.has_retries_remaining());
    }

    #[test]
    fn mark_started_increments_try_number() {
        let mut ti = TaskInstance::new(Uuid::new_v4(), TaskId::new("t1"), 3);
        ti.mark_started("worker-1", Utc::now());
        assert_eq!(ti.try_number, 1);
        assert_eq!(ti.state, InstanceState::Running);
    }

    #[test]
    fn mark_failed_computes_duration() {
        let mut ti = TaskInstance::new(Uuid::new_v4(), TaskId::new("t1"), 1);
        let start = Utc::now();
        ti.mark_started("worker-1", start);
        let end = start + chrono::Duration::milliseconds(250);
        ti.mark_failed("boom", end);
        assert_eq!(ti.duration_ms, Some(250));
        assert!(ti.state.is_terminal());
        assert!(!ti.state.is_successful());
    }

    #[test]
    fn retries_exhausted_after_max_tries() {
        let mut ti = TaskInstance::new(Uuid::new_v4(), TaskId::new("t1"), 2);
        ti.mark_started("w", Utc::now());
        ti.mark_started("w", Utc::now());
        assert!(!ti.has_retries_remaining());
    }
}
