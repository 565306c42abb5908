//! [`DAGRun`]: one scheduled or triggered execution of a DAG.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle state of a DAG run (spec.md §3). A run is created `queued` by
/// the scheduler, moves to `running` on admission, and is driven to a
/// terminal state (`success`, `failed`, or `skipped`) by the executor per
/// the propagation policy (spec.md §3, "A DAGRun terminates ... iff every
/// TaskInstance has a terminal state").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Queued,
    Running,
    Success,
    Failed,
    Skipped,
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Failed | Self::Skipped)
    }
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Success => "success",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        };
        write!(f, "{s}")
    }
}

/// A single execution of a DAG for a given logical `execution_date`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DagRun {
    pub id: Uuid,
    pub dag_id: String,
    pub execution_date: DateTime<Utc>,
    pub state: RunState,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    /// True if triggered manually or via API rather than by the cron schedule.
    pub external_trigger: bool,
    /// The DAG definition version this run was created against, so a
    /// mid-flight definition edit never mutates an in-progress run's shape.
    pub version: i64,
}

impl DagRun {
    pub fn new(dag_id: impl Into<String>, execution_date: DateTime<Utc>, external_trigger: bool, version: i64) -> Self {
        Self {
            id: Uuid::new_v4(),
            dag_id: dag_id.into(),
            execution_date,
            state: RunState::Queued,
            start_date: None,
            end_date: None,
            external_trigger,
            version,
        }
    }

    pub fn mark_started(&mut self, at: DateTime<Utc>) {
        self.state = RunState::Running;
        self.start_date = Some(at);
    }

    pub fn mark_terminal(&mut self, state: RunState, at: DateTime<Utc>) {
        debug_assert!(state.is_terminal());
        self.state = state;
        self.end_date = Some(at);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_run_starts_queued_with_no_start_date() {
        let run = DagRun::new("etl", Utc::now(), false, 1);
        assert_eq!(run.state, RunState::Queued);
        assert!(run.start_date.is_none());
        assert!(run.end_date.is_none());
    }

    #[test]
    fn mark_started_sets_running_and_start_date() {
        let mut run = DagRun::new("etl", Utc::now(), false, 1);
        let start = Utc::now();
        run.mark_started(start);
        assert_eq!(run.state, RunState::Running);
        assert_eq!(run.start_date, Some(start));
    }

    #[test]
    fn mark_terminal_sets_end_date() {
        let mut run = DagRun::new("etl", Utc::now(), false, 1);
        let end = Utc::now();
        run.mark_terminal(RunState::Success, end);
        assert_eq!(run.state, RunState::Success);
        assert_eq!(run.end_date, Some(end));
    }
}
