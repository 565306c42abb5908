//! Execution (C14/C15): turns a scheduled [`crate::dag::DagRun`] into running
//! task attempts. [`run_loop::RunLoop`] drives the common per-run tick
//! described in spec.md §4.10.1; [`handler::HandlerRegistry`] resolves a
//! per-task-type [`handler::TaskHandler`]; [`local::LocalExecutor`] and
//! [`distributed::DistributedExecutor`] are the two [`run_loop::DispatchBackend`]
//! implementations named by spec.md §4.10.2/§4.10.3.

pub mod distributed;
pub mod handler;
pub mod local;
pub mod message_bus;
pub mod run_loop;

pub use distributed::{DistributedExecutor, DistributedExecutorConfig, Worker, WorkerConfig};
pub use handler::{BashHandler, GoHandler, HandlerRegistry, HttpHandler, PythonHandler, TaskHandler};
pub use local::{LocalExecutor, LocalExecutorConfig};
pub use message_bus::{Delivery, MessageBus, RedisMessageBus, TaskMessage, TaskResultMessage, WorkerHeartbeat};
pub use run_loop::{DispatchBackend, RunLoop, RunLoopConfig, TaskSubmission};
