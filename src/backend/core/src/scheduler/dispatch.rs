//! The dispatch-layer seam (§4.10) between the scheduler and whichever
//! executor drives a run's tasks. Kept as a trait so the scheduler never
//! depends on `execution::local` or `execution::distributed` directly.

use async_trait::async_trait;

use crate::dag::DagRun;
use crate::error::Result;

/// Begins executing a run's tasks and returns immediately; the run's
/// per-run loop (§4.10.1) continues in the background.
#[async_trait]
pub trait Dispatcher: Send + Sync {
    async fn dispatch(&self, run: DagRun) -> Result<()>;
}
