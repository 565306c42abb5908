//! Failure-handling primitives shared by the scheduler and dispatch layers:
//! retry strategies (C3), the circuit breaker (C4), and the dead-letter
//! queue (C12).

pub mod circuit_breaker;
pub mod dlq;
pub mod retry;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitGuard, CircuitState};
pub use dlq::{Dlq, DlqCallbacks, DlqEntry, DlqFilter, DlqManager};
pub use retry::{apply_jitter, BackoffStrategy, RetryConfig};
