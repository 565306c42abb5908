//! CronScheduler (C7): standard cron expression evaluation in a configured
//! time zone, backed by the `cron` crate (a real-math enrichment — neither
//! the teacher nor the rest of the corpus parses cron expressions at all).

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use cron::Schedule;
use dashmap::DashMap;
use std::str::FromStr;

use crate::error::{OrchestratorError, Result};

/// A registered DAG's cron entry.
#[derive(Clone)]
struct Entry {
    schedule: Schedule,
    timezone: Tz,
}

/// Parses cron expressions and answers "what fires next" / "what did we
/// miss" questions. Registration is purely data — firing is driven by the
/// owning [`super::Scheduler`]'s tick loop, which calls
/// [`CronScheduler::due_since`] each period.
#[derive(Default)]
pub struct CronScheduler {
    entries: DashMap<String, Entry>,
}

impl CronScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_dag(&self, dag_id: impl Into<String>, cron_expr: &str, timezone: &str) -> Result<()> {
        let schedule = parse_schedule(cron_expr)?;
        let timezone = parse_timezone(timezone)?;
        self.entries.insert(dag_id.into(), Entry { schedule, timezone });
        Ok(())
    }

    pub fn remove_dag(&self, dag_id: &str) {
        self.entries.remove(dag_id);
    }

    pub fn update_schedule(&self, dag_id: &str, cron_expr: &str, timezone: &str) -> Result<()> {
        self.add_dag(dag_id, cron_expr, timezone)
    }

    pub fn get_next_execution(&self, dag_id: &str, after: DateTime<Utc>) -> Result<Option<DateTime<Utc>>> {
        let entry = self.entries.get(dag_id).ok_or_else(|| OrchestratorError::not_found("dag", dag_id))?;
        let local_after = after.with_timezone(&entry.timezone);
        Ok(entry.schedule.after(&local_after).next().map(|dt| dt.with_timezone(&Utc)))
    }

    /// Enumerate up to `cap` scheduled instants strictly after `from` and
    /// not after `to`.
    pub fn get_missed_executions(&self, dag_id: &str, from: DateTime<Utc>, to: DateTime<Utc>, cap: usize) -> Result<Vec<DateTime<Utc>>> {
        let entry = self.entries.get(dag_id).ok_or_else(|| OrchestratorError::not_found("dag", dag_id))?;
        let local_from = from.with_timezone(&entry.timezone);
        let mut out = Vec::new();
        for dt in entry.schedule.after(&local_from) {
            let utc = dt.with_timezone(&Utc);
            if utc > to || out.len() >= cap {
                break;
            }
            out.push(utc);
        }
        Ok(out)
    }
}

fn parse_schedule(expr: &str) -> Result<Schedule> {
    Schedule::from_str(expr).map_err(|e| OrchestratorError::new(crate::error::ErrorCode::InvalidCronExpression, format!("invalid cron expression {expr:?}: {e}")))
}

fn parse_timezone(tz: &str) -> Result<Tz> {
    tz.parse::<Tz>().map_err(|_| OrchestratorError::validation(format!("unknown time zone: {tz:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn rejects_malformed_cron_expression() {
        let cs = CronScheduler::new();
        assert!(cs.add_dag("d", "not a cron expression", "UTC").is_err());
    }

    #[test]
    fn get_next_execution_finds_next_midnight() {
        let cs = CronScheduler::new();
        cs.add_dag("d", "0 0 0 * * *", "UTC").unwrap();
        let from = Utc.with_ymd_and_hms(2026, 7, 31, 12, 0, 0).unwrap();
        let next = cs.get_next_execution("d", from).unwrap().unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 8, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn get_missed_executions_caps_and_bounds_the_window() {
        let cs = CronScheduler::new();
        cs.add_dag("d", "0 0 0 * * *", "UTC").unwrap();
        let from = Utc.with_ymd_and_hms(2026, 7, 1, 0, 0, 0).unwrap();
        let to = Utc.with_ymd_and_hms(2026, 7, 10, 0, 0, 0).unwrap();
        let missed = cs.get_missed_executions("d", from, to, 100).unwrap();
        assert_eq!(missed.len(), 9);
        assert!(missed.iter().all(|dt| *dt > from && *dt <= to));

        let capped = cs.get_missed_executions("d", from, to, 3).unwrap();
        assert_eq!(capped.len(), 3);
    }

    #[test]
    fn unknown_dag_is_not_found() {
        let cs = CronScheduler::new();
        assert!(cs.get_next_execution("ghost", Utc::now()).is_err());
    }
}
