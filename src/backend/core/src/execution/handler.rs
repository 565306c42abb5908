//! Per-task-type handler resolution (spec.md §4.10.2 step 2, §9's "closed
//! variant" dynamic dispatch): one [`TaskHandler`] implementation per
//! [`TaskType`], looked up in a [`HandlerRegistry`] rather than matched
//! inline, so the executors stay agnostic to how a `bash` task differs from
//! an `http` one.

use async_trait::async_trait;
use std::collections::HashMap;
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::AsyncReadExt;
use tokio::process::Command;

use crate::dag::task::{Task, TaskType};
use crate::error::{OrchestratorError, Result};

/// Runs one task to completion and returns its captured output. Callers are
/// responsible for applying `task.timeout` around the call — a handler only
/// knows how to run a task, not how long it's allowed to take.
#[async_trait]
pub trait TaskHandler: Send + Sync {
    async fn execute(&self, task: &Task) -> Result<String>;
}

async fn run_command(program: &str, args: &[&str], task_id: &str) -> Result<String> {
    let mut child = Command::new(program)
        .args(args)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| OrchestratorError::internal(format!("failed to spawn {program} for task {task_id}: {e}")))?;

    let mut stdout = String::new();
    if let Some(mut out) = child.stdout.take() {
        let _ = out.read_to_string(&mut stdout).await;
    }
    let mut stderr = String::new();
    if let Some(mut err) = child.stderr.take() {
        let _ = err.read_to_string(&mut stderr).await;
    }

    let status = child
        .wait()
        .await
        .map_err(|e| OrchestratorError::internal(format!("failed to wait on {program} for task {task_id}: {e}")))?;

    if status.success() {
        Ok(stdout)
    } else {
        Err(OrchestratorError::internal(format!(
            "task {task_id} exited with {status}: {}",
            stderr.trim()
        )))
    }
}

/// Runs `task.command` as a shell command line.
pub struct BashHandler;

#[async_trait]
impl TaskHandler for BashHandler {
    async fn execute(&self, task: &Task) -> Result<String> {
        run_command("sh", &["-c", &task.command], &task.id.0).await
    }
}

/// Runs `task.command` as an inline Python script via `python3 -c`.
pub struct PythonHandler;

#[async_trait]
impl TaskHandler for PythonHandler {
    async fn execute(&self, task: &Task) -> Result<String> {
        run_command("python3", &["-c", &task.command], &task.id.0).await
    }
}

/// Runs `task.command` as a shell invocation of a prebuilt Go binary or
/// `go run` line; the orchestrator does not compile Go itself.
pub struct GoHandler;

#[async_trait]
impl TaskHandler for GoHandler {
    async fn execute(&self, task: &Task) -> Result<String> {
        run_command("sh", &["-c", &task.command], &task.id.0).await
    }
}

/// Issues `task.command` as a URL to GET; any non-2xx status is a failure.
pub struct HttpHandler {
    client: reqwest::Client,
}

impl Default for HttpHandler {
    fn default() -> Self {
        Self { client: reqwest::Client::new() }
    }
}

#[async_trait]
impl TaskHandler for HttpHandler {
    async fn execute(&self, task: &Task) -> Result<String> {
        let response = self
            .client
            .get(&task.command)
            .send()
            .await
            .map_err(|e| OrchestratorError::internal(format!("http task {} request failed: {e}", task.id)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| OrchestratorError::internal(format!("http task {} failed reading body: {e}", task.id)))?;

        if status.is_success() {
            Ok(body)
        } else {
            Err(OrchestratorError::internal(format!("http task {} received status {status}", task.id)))
        }
    }
}

/// Maps a [`TaskType`] to the handler that runs it. Absence of a handler for
/// a declared type is itself a failure mode (spec.md §4.10.2: "if absent,
/// transition to `failed`"), so lookups return `Option` rather than panicking.
pub struct HandlerRegistry {
    handlers: HashMap<TaskType, Arc<dyn TaskHandler>>,
}

impl HandlerRegistry {
    /// The default registry: one handler per declared [`TaskType`].
    pub fn with_defaults() -> Self {
        let mut handlers: HashMap<TaskType, Arc<dyn TaskHandler>> = HashMap::new();
        handlers.insert(TaskType::Bash, Arc::new(BashHandler));
        handlers.insert(TaskType::Http, Arc::new(HttpHandler::default()));
        handlers.insert(TaskType::Python, Arc::new(PythonHandler));
        handlers.insert(TaskType::Go, Arc::new(GoHandler));
        Self { handlers }
    }

    pub fn empty() -> Self {
        Self { handlers: HashMap::new() }
    }

    pub fn register(&mut self, task_type: TaskType, handler: Arc<dyn TaskHandler>) {
        self.handlers.insert(task_type, handler);
    }

    pub fn resolve(&self, task_type: TaskType) -> Option<Arc<dyn TaskHandler>> {
        self.handlers.get(&task_type).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_registry_covers_every_task_type() {
        let registry = HandlerRegistry::with_defaults();
        assert!(registry.resolve(TaskType::Bash).is_some());
        assert!(registry.resolve(TaskType::Http).is_some());
        assert!(registry.resolve(TaskType::Python).is_some());
        assert!(registry.resolve(TaskType::Go).is_some());
    }

    #[test]
    fn empty_registry_resolves_nothing() {
        let registry = HandlerRegistry::empty();
        assert!(registry.resolve(TaskType::Bash).is_none());
    }

    #[tokio::test]
    async fn bash_handler_captures_stdout() {
        let task = Task::new("t1", "t1", TaskType::Bash, "echo hello");
        let output = BashHandler.execute(&task).await.unwrap();
        assert_eq!(output.trim(), "hello");
    }

    #[tokio::test]
    async fn bash_handler_surfaces_nonzero_exit_as_error() {
        let task = Task::new("t1", "t1", TaskType::Bash, "exit 7");
        assert!(BashHandler.execute(&task).await.is_err());
    }
}
