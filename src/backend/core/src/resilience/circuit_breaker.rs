//! CircuitBreaker (C4): admission gate that trips after consecutive
//! failures and self-heals through a half-open probe window.

use parking_lot::RwLock;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};

use crate::error::{OrchestratorError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

pub struct CircuitBreakerConfig {
    pub max_consecutive_failures: u32,
    pub open_timeout: Duration,
    pub half_open_max_requests: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            max_consecutive_failures: 5,
            open_timeout: Duration::from_secs(30),
            half_open_max_requests: 1,
        }
    }
}

/// A per-resource circuit breaker. One instance typically guards one worker
/// pool, one DAG, or one downstream handler class.
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    state: RwLock<CircuitState>,
    consecutive_failures: AtomicU32,
    opened_at: RwLock<Option<Instant>>,
    half_open_in_flight: AtomicU32,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            state: RwLock::new(CircuitState::Closed),
            consecutive_failures: AtomicU32::new(0),
            opened_at: RwLock::new(None),
            half_open_in_flight: AtomicU32::new(0),
        }
    }

    pub fn state(&self) -> CircuitState {
        *self.state.read()
    }

    /// Admission check. Transitions Open -> HalfOpen lazily on the call that
    /// observes `open_timeout` has elapsed.
    pub fn try_acquire(&self) -> Result<CircuitGuard<'_>> {
        let mut state = self.state.write();
        match *state {
            CircuitState::Closed => Ok(CircuitGuard::new(self, false)),
            CircuitState::Open => {
                let elapsed = self.opened_at.read().map(|at| at.elapsed()).unwrap_or_default();
                if elapsed >= self.config.open_timeout {
                    *state = CircuitState::HalfOpen;
                    self.half_open_in_flight.store(0, Ordering::SeqCst);
                    drop(state);
                    self.admit_half_open()
                } else {
                    Err(OrchestratorError::circuit_open())
                }
            }
            CircuitState::HalfOpen => {
                drop(state);
                self.admit_half_open()
            }
        }
    }

    fn admit_half_open(&self) -> Result<CircuitGuard<'_>> {
        let prev = self.half_open_in_flight.fetch_add(1, Ordering::SeqCst);
        if prev >= self.config.half_open_max_requests {
            self.half_open_in_flight.fetch_sub(1, Ordering::SeqCst);
            return Err(OrchestratorError::new(
                crate::error::ErrorCode::TooManyRequests,
                "circuit half-open request cap exceeded",
            ));
        }
        Ok(CircuitGuard::new(self, true))
    }

    fn record_success(&self, was_half_open: bool) {
        self.consecutive_failures.store(0, Ordering::SeqCst);
        if was_half_open {
            self.half_open_in_flight.fetch_sub(1, Ordering::SeqCst);
            *self.state.write() = CircuitState::Closed;
            *self.opened_at.write() = None;
        }
    }

    fn record_failure(&self, was_half_open: bool) {
        if was_half_open {
            self.half_open_in_flight.fetch_sub(1, Ordering::SeqCst);
            *self.state.write() = CircuitState::Open;
            *self.opened_at.write() = Some(Instant::now());
            return;
        }
        let failures = self.consecutive_failures.fetch_add(1, Ordering::SeqCst) + 1;
        if failures >= self.config.max_consecutive_failures {
            *self.state.write() = CircuitState::Open;
            *self.opened_at.write() = Some(Instant::now());
        }
    }

    /// Force the breaker back to Closed, clearing counters.
    pub fn reset(&self) {
        *self.state.write() = CircuitState::Closed;
        self.consecutive_failures.store(0, Ordering::SeqCst);
        self.half_open_in_flight.store(0, Ordering::SeqCst);
        *self.opened_at.write() = None;
    }
}

/// RAII admission ticket; report the outcome via [`CircuitGuard::success`]
/// or [`CircuitGuard::failure`] before dropping.
pub struct CircuitGuard<'a> {
    breaker: &'a CircuitBreaker,
    half_open: bool,
    reported: bool,
}

impl<'a> CircuitGuard<'a> {
    fn new(breaker: &'a CircuitBreaker, half_open: bool) -> Self {
        Self { breaker, half_open, reported: false }
    }

    pub fn success(mut self) {
        self.breaker.record_success(self.half_open);
        self.reported = true;
    }

    pub fn failure(mut self) {
        self.breaker.record_failure(self.half_open);
        self.reported = true;
    }
}

impl Drop for CircuitGuard<'_> {
    fn drop(&mut self) {
        if !self.reported {
            // An unreported guard (e.g. panic unwind) counts as a failure:
            // we never want a silently-dropped ticket to look like success.
            self.breaker.record_failure(self.half_open);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker(threshold: u32) -> CircuitBreaker {
        CircuitBreaker::new(CircuitBreakerConfig {
            max_consecutive_failures: threshold,
            open_timeout: Duration::from_millis(20),
            half_open_max_requests: 1,
        })
    }

    #[test]
    fn opens_after_consecutive_failures() {
        let cb = breaker(3);
        for _ in 0..3 {
            cb.try_acquire().unwrap().failure();
        }
        assert_eq!(cb.state(), CircuitState::Open);
        assert!(cb.try_acquire().is_err());
    }

    #[test]
    fn success_resets_failure_count() {
        let cb = breaker(3);
        cb.try_acquire().unwrap().failure();
        cb.try_acquire().unwrap().success();
        cb.try_acquire().unwrap().failure();
        cb.try_acquire().unwrap().failure();
        // only 2 consecutive failures since the reset, breaker stays closed
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[test]
    fn half_open_failure_reopens_the_circuit() {
        let cb = breaker(1);
        cb.try_acquire().unwrap().failure();
        assert_eq!(cb.state(), CircuitState::Open);
        std::thread::sleep(Duration::from_millis(30));
        let guard = cb.try_acquire().unwrap();
        assert_eq!(cb.state(), CircuitState::HalfOpen);
        guard.failure();
        assert_eq!(cb.state(), CircuitState::Open);
    }

    #[test]
    fn half_open_success_closes_the_circuit() {
        let cb = breaker(1);
        cb.try_acquire().unwrap().failure();
        std::thread::sleep(Duration::from_millis(30));
        cb.try_acquire().unwrap().success();
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[test]
    fn half_open_caps_concurrent_admissions() {
        let cb = breaker(1);
        cb.try_acquire().unwrap().failure();
        std::thread::sleep(Duration::from_millis(30));
        let first = cb.try_acquire().unwrap();
        assert!(cb.try_acquire().is_err());
        first.success();
    }
}
