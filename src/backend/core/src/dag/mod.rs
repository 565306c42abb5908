//! The DAG graph model (C1): structural queries over a validated snapshot of
//! tasks and their dependencies. No run-time state lives here — see
//! `task_instance` and `run` for that.

pub mod parser;
pub mod run;
pub mod state_machine;
pub mod task;
pub mod task_instance;

pub use run::{DagRun, RunState};
pub use task::{Task, TaskId, TaskType};
pub use task_instance::{InstanceState, TaskInstance};

use petgraph::algo::{is_cyclic_directed, toposort};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use std::collections::{HashMap, HashSet};
use std::time::Duration;

use crate::error::{OrchestratorError, Result};

/// The definition-time structure of a DAG: its metadata and its task graph.
#[derive(Debug, Clone)]
pub struct Graph {
    dag_id: String,
    graph: DiGraph<Task, ()>,
    index: HashMap<TaskId, NodeIndex>,
}

impl Graph {
    /// Build a graph from a flat task list, validating structural invariants
    /// (spec.md §3): every dependency must resolve, and the result must be
    /// acyclic with no unreachable-from-roots task.
    pub fn build(dag_id: impl Into<String>, tasks: Vec<Task>) -> Result<Self> {
        let mut graph = DiGraph::new();
        let mut index = HashMap::new();

        for task in &tasks {
            if index.contains_key(&task.id) {
                return Err(OrchestratorError::validation(format!("duplicate task id: {}", task.id)));
            }
            index.insert(task.id.clone(), graph.add_node(task.clone()));
        }

        for task in &tasks {
            let to_idx = index[&task.id];
            for dep in &task.dependencies {
                let from_idx = *index
                    .get(dep)
                    .ok_or_else(|| OrchestratorError::validation(format!("dependency not found: {dep} (required by {})", task.id)))?;
                graph.add_edge(from_idx, to_idx, ());
            }
        }

        if is_cyclic_directed(&graph) {
            return Err(OrchestratorError::cycle_detected());
        }

        let this = Self { dag_id: dag_id.into(), graph, index };
        this.validate_no_orphans()?;
        Ok(this)
    }

    /// A task with neither dependencies nor dependents is an orphan when the
    /// DAG has more than one task (spec.md §3's stricter validator, adopted
    /// per DESIGN.md over the source's permissive alternative).
    fn validate_no_orphans(&self) -> Result<()> {
        if self.graph.node_count() <= 1 {
            return Ok(());
        }
        for idx in self.graph.node_indices() {
            let has_incoming = self.graph.neighbors_directed(idx, Direction::Incoming).next().is_some();
            let has_outgoing = self.graph.neighbors_directed(idx, Direction::Outgoing).next().is_some();
            if !has_incoming && !has_outgoing {
                let task = &self.graph[idx];
                return Err(OrchestratorError::orphan_task(task.id.0.clone()));
            }
        }
        Ok(())
    }

    pub fn dag_id(&self) -> &str {
        &self.dag_id
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    pub fn task(&self, id: &TaskId) -> Result<&Task> {
        self.index
            .get(id)
            .map(|&idx| &self.graph[idx])
            .ok_or_else(|| OrchestratorError::not_found("task", id.0.clone()))
    }

    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.graph.node_weights()
    }

    /// Dependency ids of `id` (reverse adjacency).
    pub fn dependencies(&self, id: &TaskId) -> Result<Vec<TaskId>> {
        let idx = self.node_of(id)?;
        Ok(self
            .graph
            .neighbors_directed(idx, Direction::Incoming)
            .map(|pred| self.graph[pred].id.clone())
            .collect())
    }

    /// Dependent ids of `id` (forward adjacency).
    pub fn dependents(&self, id: &TaskId) -> Result<Vec<TaskId>> {
        let idx = self.node_of(id)?;
        Ok(self
            .graph
            .neighbors_directed(idx, Direction::Outgoing)
            .map(|succ| self.graph[succ].id.clone())
            .collect())
    }

    pub fn roots(&self) -> Vec<TaskId> {
        self.graph
            .node_indices()
            .filter(|&idx| self.graph.neighbors_directed(idx, Direction::Incoming).next().is_none())
            .map(|idx| self.graph[idx].id.clone())
            .collect()
    }

    pub fn leaves(&self) -> Vec<TaskId> {
        self.graph
            .node_indices()
            .filter(|&idx| self.graph.neighbors_directed(idx, Direction::Outgoing).next().is_none())
            .map(|idx| self.graph[idx].id.clone())
            .collect()
    }

    /// Kahn's algorithm with a lexicographic-by-id tie-break, for a
    /// deterministic order across runs.
    pub fn topological_order(&self) -> Result<Vec<TaskId>> {
        let mut in_degree: HashMap<NodeIndex, usize> = self
            .graph
            .node_indices()
            .map(|idx| (idx, self.graph.neighbors_directed(idx, Direction::Incoming).count()))
            .collect();

        let mut ready: std::collections::BTreeSet<(String, NodeIndex)> = in_degree
            .iter()
            .filter(|&(_, &deg)| deg == 0)
            .map(|(&idx, _)| (self.graph[idx].id.0.clone(), idx))
            .collect();

        let mut order = Vec::with_capacity(self.graph.node_count());
        while let Some((_, idx)) = ready.iter().next().cloned() {
            ready.remove(&(self.graph[idx].id.0.clone(), idx));
            order.push(self.graph[idx].id.clone());

            for succ in self.graph.neighbors_directed(idx, Direction::Outgoing) {
                let deg = in_degree.get_mut(&succ).expect("node present");
                *deg -= 1;
                if *deg == 0 {
                    ready.insert((self.graph[succ].id.0.clone(), succ));
                }
            }
        }

        if order.len() != self.graph.node_count() {
            // toposort() gives us a concrete cycle member for the error.
            if let Err(cycle) = toposort(&self.graph, None) {
                let task = &self.graph[cycle.node_id()];
                return Err(OrchestratorError::validation(format!("cycle detected at task {}", task.id)));
            }
            return Err(OrchestratorError::cycle_detected());
        }
        Ok(order)
    }

    /// All ancestors of `id`, transitively.
    pub fn upstream_closure(&self, id: &TaskId) -> Result<HashSet<TaskId>> {
        self.closure(id, Direction::Incoming)
    }

    /// All descendants of `id`, transitively.
    pub fn downstream_closure(&self, id: &TaskId) -> Result<HashSet<TaskId>> {
        self.closure(id, Direction::Outgoing)
    }

    fn closure(&self, id: &TaskId, dir: Direction) -> Result<HashSet<TaskId>> {
        let start = self.node_of(id)?;
        let mut seen = HashSet::new();
        let mut stack: Vec<NodeIndex> = self.graph.neighbors_directed(start, dir).collect();
        while let Some(idx) = stack.pop() {
            if seen.insert(self.graph[idx].id.clone()) {
                stack.extend(self.graph.neighbors_directed(idx, dir));
            }
        }
        Ok(seen)
    }

    /// Tasks not yet completed whose full set of dependencies is a subset of
    /// `completed`.
    pub fn ready_set(&self, completed: &HashSet<TaskId>) -> Vec<TaskId> {
        self.graph
            .node_indices()
            .filter(|&idx| {
                let task = &self.graph[idx];
                if completed.contains(&task.id) {
                    return false;
                }
                self.graph
                    .neighbors_directed(idx, Direction::Incoming)
                    .all(|pred| completed.contains(&self.graph[pred].id))
            })
            .map(|idx| self.graph[idx].id.clone())
            .collect()
    }

    fn node_of(&self, id: &TaskId) -> Result<NodeIndex> {
        self.index.get(id).copied().ok_or_else(|| OrchestratorError::not_found("task", id.0.clone()))
    }

    /// Critical-path analysis (spec.md §4.1): earliest-start/latest-start
    /// forward-backward pass, slack, and the set of zero-slack (critical)
    /// tasks.
    pub fn critical_path(&self) -> Result<CriticalPathReport> {
        let order = self.topological_order()?;
        let weight = |id: &TaskId| self.task(id).unwrap().critical_path_weight();

        let mut earliest_start: HashMap<TaskId, Duration> = HashMap::new();
        for id in &order {
            let es = self
                .dependencies(id)?
                .iter()
                .map(|dep| earliest_start[dep] + weight(dep))
                .max()
                .unwrap_or(Duration::ZERO);
            earliest_start.insert(id.clone(), es);
        }

        let project_duration = order
            .iter()
            .map(|id| earliest_start[id] + weight(id))
            .max()
            .unwrap_or(Duration::ZERO);

        let mut latest_start: HashMap<TaskId, Duration> = HashMap::new();
        for id in order.iter().rev() {
            let successors = self.dependents(id)?;
            let ls = if successors.is_empty() {
                project_duration.saturating_sub(weight(id))
            } else {
                successors
                    .iter()
                    .map(|succ| latest_start[succ].saturating_sub(weight(id)))
                    .min()
                    .expect("non-empty successors")
            };
            latest_start.insert(id.clone(), ls);
        }

        let mut slack = HashMap::new();
        let mut critical = Vec::new();
        for id in &order {
            let s = latest_start[id].saturating_sub(earliest_start[id]);
            if s == Duration::ZERO {
                critical.push(id.clone());
            }
            slack.insert(id.clone(), s);
        }

        Ok(CriticalPathReport { project_duration, earliest_start, latest_start, slack, critical })
    }
}

/// Output of [`Graph::critical_path`].
#[derive(Debug, Clone)]
pub struct CriticalPathReport {
    pub project_duration: Duration,
    pub earliest_start: HashMap<TaskId, Duration>,
    pub latest_start: HashMap<TaskId, Duration>,
    pub slack: HashMap<TaskId, Duration>,
    /// Zero-slack tasks, in topological order. A maximal chain of these from
    /// a critical root to a critical leaf is the critical path.
    pub critical: Vec<TaskId>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use task::TaskType;

    fn t(id: &str, deps: &[&str]) -> Task {
        Task::new(id, id, TaskType::Bash, "true").with_dependencies(deps.iter().map(|d| TaskId::new(*d)))
    }

    #[test]
    fn build_rejects_unknown_dependency() {
        let err = Graph::build("d", vec![t("a", &["missing"])]).unwrap_err();
        assert!(matches!(err.code(), crate::error::ErrorCode::DependencyNotFound));
    }

    #[test]
    fn build_rejects_cycles() {
        let err = Graph::build("d", vec![t("a", &["b"]), t("b", &["a"])]).unwrap_err();
        assert!(matches!(err.code(), crate::error::ErrorCode::CycleDetected));
    }

    #[test]
    fn topological_order_respects_edges_and_breaks_ties_lexicographically() {
        let g = Graph::build("d", vec![t("c", &[]), t("a", &[]), t("b", &["a"])]).unwrap();
        let order: Vec<String> = g.topological_order().unwrap().into_iter().map(|id| id.0).collect();
        assert_eq!(order, vec!["a", "c", "b"]);
    }

    #[test]
    fn ready_set_respects_all_dependencies() {
        let g = Graph::build("d", vec![t("a", &[]), t("b", &[]), t("c", &["a", "b"])]).unwrap();
        let mut completed = HashSet::new();
        assert_eq!(
            g.ready_set(&completed).into_iter().collect::<HashSet<_>>(),
            [TaskId::new("a"), TaskId::new("b")].into_iter().collect()
        );
        completed.insert(TaskId::new("a"));
        assert!(g.ready_set(&completed).contains(&TaskId::new("b")));
        assert!(!g.ready_set(&completed).contains(&TaskId::new("c")));
        completed.insert(TaskId::new("b"));
        assert_eq!(g.ready_set(&completed), vec![TaskId::new("c")]);
    }

    #[test]
    fn roots_and_leaves() {
        let g = Graph::build("d", vec![t("a", &[]), t("b", &["a"]), t("c", &["a"])]).unwrap();
        assert_eq!(g.roots(), vec![TaskId::new("a")]);
        let mut leaves = g.leaves();
        leaves.sort();
        assert_eq!(leaves, vec![TaskId::new("b"), TaskId::new("c")]);
    }

    #[test]
    fn critical_path_picks_longest_chain() {
        use std::time::Duration;
        let a = Task::new("a", "a", TaskType::Bash, "true").with_timeout(Duration::from_secs(60));
        let b = Task::new("b", "b", TaskType::Bash, "true")
            .with_timeout(Duration::from_secs(300))
            .with_dependencies([TaskId::new("a")]);
        let c = Task::new("c", "c", TaskType::Bash, "true")
            .with_timeout(Duration::from_secs(10))
            .with_dependencies([TaskId::new("a")]);
        let d = Task::new("d", "d", TaskType::Bash, "true")
            .with_timeout(Duration::from_secs(30))
            .with_dependencies([TaskId::new("b"), TaskId::new("c")]);

        let g = Graph::build("d", vec![a, b, c, d]).unwrap();
        let report = g.critical_path().unwrap();
        assert_eq!(report.project_duration, Duration::from_secs(60 + 300 + 30));
        assert_eq!(report.slack[&TaskId::new("b")], Duration::ZERO);
        assert!(report.slack[&TaskId::new("c")] > Duration::ZERO);
        assert!(report.critical.contains(&TaskId::new("b")));
        assert!(!report.critical.contains(&TaskId::new("c")));
    }

    #[test]
    fn orphan_task_with_no_deps_or_dependents_is_rejected_when_more_than_one_task() {
        let err = Graph::build("d", vec![t("a", &[]), t("b", &["a"]), t("c", &[])]).unwrap_err();
        assert!(matches!(err.code(), crate::error::ErrorCode::OrphanTask));
    }

    #[test]
    fn single_task_dag_is_never_an_orphan() {
        assert!(Graph::build("d", vec![t("a", &[])]).is_ok());
    }
}
