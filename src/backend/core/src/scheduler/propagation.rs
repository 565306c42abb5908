//! Propagation policy (C11): how an individual task failure affects the
//! run's final state and the fate of its downstream tasks.

use std::collections::HashSet;

use crate::dag::task::TaskId;
use crate::dag::task_instance::InstanceState;
use crate::dag::{Graph, TaskInstance};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PropagationPolicy {
    /// Any task failure ends the whole run as failed.
    Fail,
    /// A task failure marks its transitive downstream as `upstream_failed`;
    /// the run ends failed. Default per spec.
    #[default]
    SkipDownstream,
    /// Independent branches continue; the run succeeds unless a task named
    /// in `critical_tasks` failed.
    AllowPartial,
}

impl PropagationPolicy {
    /// Task ids that should transition to `upstream_failed` once `failed_task`
    /// has failed, under this policy.
    pub fn downstream_to_fail(&self, graph: &Graph, failed_task: &TaskId) -> HashSet<TaskId> {
        match self {
            PropagationPolicy::SkipDownstream => graph.downstream_closure(failed_task).unwrap_or_default(),
            PropagationPolicy::Fail | PropagationPolicy::AllowPartial => HashSet::new(),
        }
    }

    /// The predicate the per-run loop consults once every task instance has
    /// reached a terminal state, to decide the run's final state.
    pub fn can_dag_succeed(&self, instances: &[TaskInstance], critical_tasks: &HashSet<TaskId>) -> bool {
        match self {
            PropagationPolicy::Fail => instances.iter().all(|ti| ti.state.is_successful()),
            PropagationPolicy::SkipDownstream => instances.iter().all(|ti| ti.state.is_successful()),
            PropagationPolicy::AllowPartial => !instances
                .iter()
                .any(|ti| matches!(ti.state, InstanceState::Failed | InstanceState::UpstreamFailed) && critical_tasks.contains(&ti.task_id)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dag::task::{Task, TaskType};
    use std::time::Duration;
    use uuid::Uuid;

    fn task(id: &str, deps: &[&str]) -> Task {
        Task::new(id, id, TaskType::Bash, "true").with_dependencies(deps.iter().map(|d| TaskId::new(*d)).collect())
    }

    fn instance(task_id: &str, state: InstanceState) -> TaskInstance {
        let mut ti = TaskInstance::new(Uuid::new_v4(), TaskId::new(task_id), 1);
        ti.state = state;
        ti
    }

    fn sample_graph() -> Graph {
        Graph::build("d", vec![task("a", &[]), task("b", &["a"]), task("c", &["b"])]).unwrap()
    }

    #[test]
    fn skip_downstream_marks_transitive_successors() {
        let graph = sample_graph();
        let policy = PropagationPolicy::SkipDownstream;
        let downstream = policy.downstream_to_fail(&graph, &TaskId::new("a"));
        assert_eq!(downstream, HashSet::from([TaskId::new("b"), TaskId::new("c")]));
    }

    #[test]
    fn fail_policy_never_cascades_but_fails_on_any_failure() {
        let graph = sample_graph();
        let policy = PropagationPolicy::Fail;
        assert!(policy.downstream_to_fail(&graph, &TaskId::new("a")).is_empty());

        let instances = vec![instance("a", InstanceState::Failed), instance("b", InstanceState::Success)];
        assert!(!policy.can_dag_succeed(&instances, &HashSet::new()));
    }

    #[test]
    fn allow_partial_succeeds_unless_a_critical_task_failed() {
        let policy = PropagationPolicy::AllowPartial;
        let instances = vec![instance("a", InstanceState::Failed), instance("b", InstanceState::Success)];

        assert!(policy.can_dag_succeed(&instances, &HashSet::new()));

        let mut critical = HashSet::new();
        critical.insert(TaskId::new("a"));
        assert!(!policy.can_dag_succeed(&instances, &critical));
    }

    #[test]
    fn skip_downstream_requires_every_instance_successful() {
        let policy = PropagationPolicy::SkipDownstream;
        let instances = vec![instance("a", InstanceState::Success), instance("b", InstanceState::UpstreamFailed)];
        assert!(!policy.can_dag_succeed(&instances, &HashSet::new()));
    }
}
