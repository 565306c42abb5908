//! BackfillEngine (C9): batch creation of historical runs over a date range,
//! bounded by a concurrency cap and governed by a reprocess policy.

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::dag::{DagRun, RunState};
use crate::error::{OrchestratorError, Result};
use crate::repository::DagRunRepository;

use super::cron::CronScheduler;

/// Whether an existing run in a reprocessable state should be replaced.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReprocessPolicy {
    pub reprocess_failed: bool,
    pub reprocess_successful: bool,
}

impl ReprocessPolicy {
    fn should_reprocess(&self, state: RunState) -> bool {
        match state {
            RunState::Failed => self.reprocess_failed,
            RunState::Success => self.reprocess_successful,
            RunState::Queued | RunState::Running | RunState::Skipped => false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BackfillRequest {
    pub dag_id: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub max_concurrency: usize,
    pub dry_run: bool,
    pub policy: ReprocessPolicy,
}

#[derive(Debug, Clone, Default)]
pub struct BackfillReport {
    pub total: usize,
    pub created: usize,
    pub skipped: usize,
    pub failed: usize,
    pub errors: Vec<String>,
    pub duration: Duration,
}

const MAX_INSTANTS: usize = 1000;

pub struct BackfillEngine {
    cron: Arc<CronScheduler>,
    runs: Arc<dyn DagRunRepository>,
}

impl BackfillEngine {
    pub fn new(cron: Arc<CronScheduler>, runs: Arc<dyn DagRunRepository>) -> Self {
        Self { cron, runs }
    }

    pub async fn run(&self, request: BackfillRequest) -> Result<BackfillReport> {
        let started = Instant::now();
        let instants = self.cron.get_missed_executions(&request.dag_id, request.start, request.end, MAX_INSTANTS)?;

        let max_concurrency = request.max_concurrency.max(1);
        let outcomes: Vec<Outcome> = stream::iter(instants.iter().copied())
            .map(|instant| self.process_one(&request, instant))
            .buffer_unordered(max_concurrency)
            .collect()
            .await;

        let mut report = BackfillReport { total: outcomes.len(), duration: started.elapsed(), ..Default::default() };
        for outcome in outcomes {
            match outcome {
                Outcome::Created => report.created += 1,
                Outcome::Skipped => report.skipped += 1,
                Outcome::Failed(message) => {
                    report.failed += 1;
                    report.errors.push(message);
                }
            }
        }
        Ok(report)
    }

    async fn process_one(&self, request: &BackfillRequest, instant: DateTime<Utc>) -> Outcome {
        match self.process_one_fallible(request, instant).await {
            Ok(outcome) => outcome,
            Err(err) => Outcome::Failed(format!("{instant}: {}", err.user_message())),
        }
    }

    async fn process_one_fallible(&self, request: &BackfillRequest, instant: DateTime<Utc>) -> Result<Outcome> {
        let existing = self.runs.get_by_execution_date(&request.dag_id, instant).await?;

        let should_create = match existing {
            None => true,
            Some(run) => {
                if !request.policy.should_reprocess(run.state) {
                    return Ok(Outcome::Skipped);
                }
                if request.dry_run {
                    return Ok(Outcome::Skipped);
                }
                self.runs.delete(run.id).await?;
                true
            }
        };

        if !should_create {
            return Ok(Outcome::Skipped);
        }
        if request.dry_run {
            return Ok(Outcome::Skipped);
        }

        let run = DagRun::new(request.dag_id.clone(), instant, false, 1);
        self.runs.create(run).await?;
        Ok(Outcome::Created)
    }
}

enum Outcome {
    Created,
    Skipped,
    Failed(String),
}

pub fn require_schedulable(schedule: Option<&str>, dag_id: &str) -> Result<()> {
    if schedule.is_none() {
        return Err(OrchestratorError::validation(format!("DAG {dag_id} has no schedule and cannot be backfilled")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::memory::InMemoryDagRunRepository;
    use crate::repository::ListFilter;
    use chrono::TimeZone;

    fn cron_with_daily(dag_id: &str) -> Arc<CronScheduler> {
        let cron = CronScheduler::new();
        cron.add_dag(dag_id, "0 0 0 * * *", "UTC").unwrap();
        Arc::new(cron)
    }

    #[tokio::test]
    async fn creates_a_run_for_each_missed_instant() {
        let cron = cron_with_daily("d");
        let runs: Arc<dyn DagRunRepository> = Arc::new(InMemoryDagRunRepository::default());
        let engine = BackfillEngine::new(cron, runs.clone());

        let start = Utc.with_ymd_and_hms(2026, 7, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2026, 7, 5, 0, 0, 0).unwrap();
        let report = engine
            .run(BackfillRequest { dag_id: "d".to_string(), start, end, max_concurrency: 4, dry_run: false, policy: ReprocessPolicy::default() })
            .await
            .unwrap();

        assert_eq!(report.total, 4);
        assert_eq!(report.created, 4);
        assert_eq!(report.failed, 0);
        assert_eq!(runs.list(&ListFilter::default()).await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn dry_run_creates_nothing() {
        let cron = cron_with_daily("d");
        let runs: Arc<dyn DagRunRepository> = Arc::new(InMemoryDagRunRepository::default());
        let engine = BackfillEngine::new(cron, runs.clone());

        let start = Utc.with_ymd_and_hms(2026, 7, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2026, 7, 3, 0, 0, 0).unwrap();
        let report = engine
            .run(BackfillRequest { dag_id: "d".to_string(), start, end, max_concurrency: 4, dry_run: true, policy: ReprocessPolicy::default() })
            .await
            .unwrap();

        assert_eq!(report.skipped, report.total);
        assert!(runs.list(&ListFilter::default()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn existing_run_is_skipped_unless_policy_allows_reprocessing() {
        let cron = cron_with_daily("d");
        let runs: Arc<dyn DagRunRepository> = Arc::new(InMemoryDagRunRepository::default());
        let instant = Utc.with_ymd_and_hms(2026, 7, 2, 0, 0, 0).unwrap();
        let mut run = DagRun::new("d", instant, false, 1);
        run.state = RunState::Failed;
        runs.create(run).await.unwrap();

        let engine = BackfillEngine::new(cron, runs.clone());
        let start = Utc.with_ymd_and_hms(2026, 7, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2026, 7, 3, 0, 0, 0).unwrap();

        let report = engine
            .run(BackfillRequest { dag_id: "d".to_string(), start, end, max_concurrency: 4, dry_run: false, policy: ReprocessPolicy::default() })
            .await
            .unwrap();
        assert_eq!(report.skipped, 1);
        assert_eq!(report.created, 1);

        let report = engine
            .run(BackfillRequest {
                dag_id: "d".to_string(),
                start,
                end,
                max_concurrency: 4,
                dry_run: false,
                policy: ReprocessPolicy { reprocess_failed: true, reprocess_successful: false },
            })
            .await
            .unwrap();
        // Only the previously-failed instant is eligible for reprocessing;
        // the other instant's run is now `running` and not reprocessable.
        assert_eq!(report.created, 1);
        assert_eq!(report.skipped, 1);
    }
}
