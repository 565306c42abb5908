//! The task-instance state machine (C2): the single source of truth for
//! which transitions are legal, enforced both in-process and at the
//! repository's compare-and-swap boundary (C13).

use super::task_instance::InstanceState;
use crate::error::{OrchestratorError, Result};

/// Validate a transition against the fixed table in spec.md §4.2:
///
/// - `queued` -> `running`, `skipped`, `failed`, `upstream_failed`
/// - `running` -> `success`, `failed`, `retrying`, `upstream_failed`
/// - `retrying` -> `running`, `failed`, `success`
/// - `failed` -> `retrying`, `running` (manual re-run)
/// - `upstream_failed` -> `queued` (whole-run reset)
/// - `success`, `skipped` are terminal: no transitions out
///
/// `queued -> upstream_failed` is one transition wider than the published
/// table: the per-run loop (§4.10.1) marks a still-queued task
/// `upstream_failed` the moment a dependency fails, without ever routing it
/// through `running`, so the table is extended to allow it.
pub fn validate_transition(from: InstanceState, to: InstanceState) -> Result<()> {
    use InstanceState::*;

    let legal = match from {
        Queued => matches!(to, Running | Skipped | Failed | UpstreamFailed),
        Running => matches!(to, Success | Failed | Retrying | UpstreamFailed),
        Retrying => matches!(to, Running | Failed | Success),
        Failed => matches!(to, Retrying | Running),
        UpstreamFailed => matches!(to, Queued),
        Success | Skipped => false,
    };

    if legal {
        Ok(())
    } else {
        Err(OrchestratorError::invalid_transition(from, to))
    }
}

pub fn is_terminal(state: InstanceState) -> bool {
    state.is_terminal()
}

#[cfg(test)]
mod tests {
    use super::*;
    use InstanceState::*;

    #[test]
    fn queued_can_move_to_running_skipped_or_failed() {
        assert!(validate_transition(Queued, Running).is_ok());
        assert!(validate_transition(Queued, Skipped).is_ok());
        assert!(validate_transition(Queued, Failed).is_ok());
        assert!(validate_transition(Queued, Success).is_err());
        assert!(validate_transition(Queued, Retrying).is_err());
    }

    #[test]
    fn queued_can_move_directly_to_upstream_failed() {
        assert!(validate_transition(Queued, UpstreamFailed).is_ok());
    }

    #[test]
    fn running_can_fail_succeed_retry_or_upstream_fail() {
        assert!(validate_transition(Running, Success).is_ok());
        assert!(validate_transition(Running, Failed).is_ok());
        assert!(validate_transition(Running, Retrying).is_ok());
        assert!(validate_transition(Running, UpstreamFailed).is_ok());
        assert!(validate_transition(Running, Queued).is_err());
    }

    #[test]
    fn terminal_states_accept_no_transitions() {
        for to in [Queued, Running, Retrying, Success, Failed, Skipped, UpstreamFailed] {
            assert!(validate_transition(Success, to).is_err());
            assert!(validate_transition(Skipped, to).is_err());
        }
    }

    #[test]
    fn upstream_failed_only_resets_to_queued() {
        assert!(validate_transition(UpstreamFailed, Queued).is_ok());
        assert!(validate_transition(UpstreamFailed, Running).is_err());
    }

    #[test]
    fn failed_allows_manual_rerun_or_retry() {
        assert!(validate_transition(Failed, Retrying).is_ok());
        assert!(validate_transition(Failed, Running).is_ok());
        assert!(validate_transition(Failed, Success).is_err());
    }
}
