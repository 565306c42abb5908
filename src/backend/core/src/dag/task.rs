//! Static task definitions (DAG-definition time).
//!
//! A [`Task`] describes *what* to run and how it relates to its siblings; it
//! carries no run-time state. Run-time state lives on [`TaskInstance`]
//! (`dag::task_instance`), one row per execution attempt.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{OrchestratorError, Result};

/// Identity of a task, unique within its parent DAG.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TaskId(pub String);

impl TaskId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for TaskId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for TaskId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// The fixed task-type set (spec.md §9 "closed variant" dynamic dispatch).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    Bash,
    Http,
    Python,
    Go,
}

impl TaskType {
    /// Parse a type tag, accepting the aliases spec.md §6 defines.
    pub fn parse(raw: &str) -> Result<Self> {
        match raw.to_ascii_lowercase().as_str() {
            "bash" | "shell" => Ok(Self::Bash),
            "http" | "rest" => Ok(Self::Http),
            "python" | "py" => Ok(Self::Python),
            "go" | "golang" => Ok(Self::Go),
            other => Err(OrchestratorError::validation(format!("unknown task type: {other}"))),
        }
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Bash => "bash",
            Self::Http => "http",
            Self::Python => "python",
            Self::Go => "go",
        }
    }
}

impl std::fmt::Display for TaskType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A statically-defined task inside a DAG: identity, type, command, the
/// dependency ids it waits on, and its retry/timing policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub name: String,
    #[serde(rename = "type")]
    pub task_type: TaskType,
    pub command: String,
    #[serde(default)]
    pub dependencies: Vec<TaskId>,
    #[serde(default)]
    pub retries: u32,
    #[serde(with = "humantime_serde", default = "default_timeout")]
    pub timeout: Duration,
    #[serde(with = "humantime_serde", default)]
    pub sla: Duration,
}

fn default_timeout() -> Duration {
    Duration::from_secs(30 * 60)
}

impl Task {
    pub fn new(id: impl Into<String>, name: impl Into<String>, task_type: TaskType, command: impl Into<String>) -> Self {
        Self {
            id: TaskId::new(id),
            name: name.into(),
            task_type,
            command: command.into(),
            dependencies: Vec::new(),
            retries: 0,
            timeout: default_timeout(),
            sla: Duration::ZERO,
        }
    }

    pub fn with_dependencies(mut self, deps: impl IntoIterator<Item = TaskId>) -> Self {
        self.dependencies = deps.into_iter().collect();
        self
    }

    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_sla(mut self, sla: Duration) -> Self {
        self.sla = sla;
        self
    }

    /// Weight used by critical-path analysis (spec.md §4.1): SLA if set,
    /// else timeout if set, else one minute.
    pub fn critical_path_weight(&self) -> Duration {
        if !self.sla.is_zero() {
            self.sla
        } else if !self.timeout.is_zero() {
            self.timeout
        } else {
            Duration::from_secs(60)
        }
    }

    /// Number of attempts this task gets, including the first (max_tries).
    pub fn max_tries(&self) -> u32 {
        self.retries + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_type_accepts_aliases() {
        assert_eq!(TaskType::parse("shell").unwrap(), TaskType::Bash);
        assert_eq!(TaskType::parse("REST").unwrap(), TaskType::Http);
        assert_eq!(TaskType::parse("py").unwrap(), TaskType::Python);
        assert_eq!(TaskType::parse("golang").unwrap(), TaskType::Go);
        assert!(TaskType::parse("rust").is_err());
    }

    #[test]
    fn critical_path_weight_prefers_sla_then_timeout_then_default() {
        let t = Task::new("a", "A", TaskType::Bash, "echo a");
        assert_eq!(t.critical_path_weight(), Duration::from_secs(60));

        let t = t.with_timeout(Duration::from_secs(120));
        assert_eq!(t.critical_path_weight(), Duration::from_secs(120));

        let t = t.with_sla(Duration::from_secs(300));
        assert_eq!(t.critical_path_weight(), Duration::from_secs(300));
    }

    #[test]
    fn max_tries_is_retries_plus_one() {
        let t = Task::new("a", "A", TaskType::Bash, "echo a").with_retries(2);
        assert_eq!(t.max_tries(), 3);
    }
}
