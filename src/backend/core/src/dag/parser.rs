//! DAG definition interchange format (C-parser, spec.md §6): JSON or YAML,
//! validated into a [`Graph`](super::Graph) via the structural rules of §3.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::task::{Task, TaskId, TaskType};
use super::Graph;
use crate::error::{OrchestratorError, Result};

/// Wire representation of a [`Task`], with duration fields accepted as
/// human strings ("5m", "1h30m") rather than typed [`Duration`]s.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskDefinition {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub task_type: String,
    pub command: String,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub retries: u32,
    #[serde(default)]
    pub timeout: Option<String>,
    #[serde(default)]
    pub sla: Option<String>,
}

impl TaskDefinition {
    fn into_task(self) -> Result<Task> {
        let task_type = TaskType::parse(&self.task_type)?;
        let mut task = Task::new(self.id, self.name, task_type, self.command)
            .with_dependencies(self.dependencies.into_iter().map(TaskId::new))
            .with_retries(self.retries);

        if let Some(raw) = self.timeout {
            task = task.with_timeout(parse_duration(&raw)?);
        }
        if let Some(raw) = self.sla {
            task = task.with_sla(parse_duration(&raw)?);
        }
        Ok(task)
    }
}

fn parse_duration(raw: &str) -> Result<Duration> {
    humantime::parse_duration(raw).map_err(|e| OrchestratorError::validation(format!("invalid duration {raw:?}: {e}")))
}

/// Wire representation of a whole DAG submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DagDefinition {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub schedule: Option<String>,
    pub start_date: String,
    #[serde(default)]
    pub end_date: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub is_paused: bool,
    pub tasks: Vec<TaskDefinition>,
}

impl DagDefinition {
    pub fn from_json(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).map_err(OrchestratorError::from)
    }

    pub fn from_yaml(raw: &str) -> Result<Self> {
        serde_yaml::from_str(raw).map_err(OrchestratorError::from)
    }

    /// Validate and build the graph this definition describes, plus its
    /// parsed start/end instants.
    pub fn validate(&self) -> Result<ValidatedDag> {
        if self.name.trim().is_empty() {
            return Err(OrchestratorError::validation("DAG name must not be empty"));
        }
        if self.tasks.is_empty() {
            return Err(OrchestratorError::validation("DAG must declare at least one task"));
        }

        let start_date = parse_instant(&self.start_date)?;
        let end_date = self.end_date.as_deref().map(parse_instant).transpose()?;

        let tasks: Result<Vec<Task>> = self.tasks.iter().cloned().map(TaskDefinition::into_task).collect();
        let graph = Graph::build(self.id.clone(), tasks?)?;

        Ok(ValidatedDag {
            id: self.id.clone(),
            name: self.name.clone(),
            description: self.description.clone(),
            schedule: self.schedule.clone(),
            start_date,
            end_date,
            tags: self.tags.clone(),
            is_paused: self.is_paused,
            graph,
        })
    }
}

fn parse_instant(raw: &str) -> Result<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        let naive = date.and_hms_opt(0, 0, 0).expect("midnight is always valid");
        return Ok(Utc.from_utc_datetime(&naive));
    }
    Err(OrchestratorError::validation(format!("invalid start/end date: {raw:?}, expected RFC3339 or YYYY-MM-DD")))
}

/// A definition that has passed structural validation (§3), ready to be
/// persisted and registered with the scheduler.
#[derive(Debug, Clone)]
pub struct ValidatedDag {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub schedule: Option<String>,
    pub start_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
    pub tags: Vec<String>,
    pub is_paused: bool,
    pub graph: Graph,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_json() -> &'static str {
        r#"{
            "id": "etl",
            "name": "Nightly ETL",
            "schedule": "0 0 * * *",
            "start_date": "2026-01-01",
            "tags": ["nightly"],
            "tasks": [
                {"id": "extract", "name": "Extract", "type": "bash", "command": "extract.sh"},
                {"id": "load", "name": "Load", "type": "python", "command": "load.py",
                 "dependencies": ["extract"], "retries": 2, "timeout": "5m"}
            ]
        }"#
    }

    #[test]
    fn parses_and_validates_a_complete_definition() {
        let def = DagDefinition::from_json(sample_json()).unwrap();
        let validated = def.validate().unwrap();
        assert_eq!(validated.graph.len(), 2);
        assert_eq!(validated.tags, vec!["nightly"]);
    }

    #[test]
    fn rejects_empty_task_list() {
        let mut def = DagDefinition::from_json(sample_json()).unwrap();
        def.tasks.clear();
        assert!(def.validate().is_err());
    }

    #[test]
    fn accepts_yaml_duration_strings_and_type_aliases() {
        let yaml = "id: d\nname: D\nstart_date: \"2026-01-01\"\ntasks:\n  - id: a\n    name: A\n    type: shell\n    command: echo hi\n    timeout: 1h30m\n";
        let def = DagDefinition::from_yaml(yaml).unwrap();
        let validated = def.validate().unwrap();
        let task = validated.graph.task(&TaskId::new("a")).unwrap();
        assert_eq!(task.task_type, TaskType::Bash);
        assert_eq!(task.timeout, Duration::from_secs(90 * 60));
    }

    #[test]
    fn rejects_invalid_start_date() {
        let mut def = DagDefinition::from_json(sample_json()).unwrap();
        def.start_date = "not-a-date".to_string();
        assert!(def.validate().is_err());
    }
}
