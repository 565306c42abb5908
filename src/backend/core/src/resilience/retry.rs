//! Retry strategies (C3): backoff computation plus the cancellation-aware
//! executor loop that drives retryable operations.

use rand::Rng;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::error::{ErrorCode, OrchestratorError, Result};

/// A backoff strategy computes the delay before attempt `attempt` (1-based)
/// is retried, independent of whether it should be retried at all.
#[derive(Debug, Clone, Copy)]
pub enum BackoffStrategy {
    Exponential { base: Duration, multiplier: f64, max: Duration },
    Linear { base: Duration, increment: Duration, max: Duration },
    Fixed { delay: Duration },
    None,
}

impl Default for BackoffStrategy {
    fn default() -> Self {
        Self::Exponential {
            base: Duration::from_secs(1),
            multiplier: 2.0,
            max: Duration::from_secs(5 * 60),
        }
    }
}

impl BackoffStrategy {
    pub fn next_delay(&self, attempt: u32) -> Duration {
        match *self {
            Self::Exponential { base, multiplier, max } => {
                let exp = multiplier.powi((attempt.max(1) - 1) as i32);
                let secs = base.as_secs_f64() * exp;
                Duration::from_secs_f64(secs).min(max)
            }
            Self::Linear { base, increment, max } => {
                let delay = base + increment * attempt.max(1).saturating_sub(1);
                delay.min(max)
            }
            Self::Fixed { delay } => delay,
            Self::None => Duration::ZERO,
        }
    }

    pub fn should_retry(&self, attempt: u32, max_attempts: u32) -> bool {
        if matches!(self, Self::None) {
            return false;
        }
        attempt < max_attempts
    }
}

/// Multiply a delay by a uniform random factor in [0.75, 1.25].
pub fn apply_jitter(delay: Duration) -> Duration {
    let factor = rand::thread_rng().gen_range(0.75..=1.25);
    Duration::from_secs_f64(delay.as_secs_f64() * factor)
}

/// Wraps a [`BackoffStrategy`] with a max-attempts cap, an optional
/// retryable-error allow-list, and retry/giveup callbacks.
pub struct RetryConfig<F, G>
where
    F: Fn(u32, &OrchestratorError),
    G: Fn(&OrchestratorError),
{
    pub strategy: BackoffStrategy,
    pub max_attempts: u32,
    pub jitter: bool,
    pub retryable_codes: Option<Vec<ErrorCode>>,
    pub on_retry: F,
    pub on_giveup: G,
}

impl<F, G> RetryConfig<F, G>
where
    F: Fn(u32, &OrchestratorError),
    G: Fn(&OrchestratorError),
{
    fn is_retryable_error(&self, err: &OrchestratorError) -> bool {
        match &self.retryable_codes {
            Some(codes) => codes.contains(&err.code()),
            None => err.code().is_retryable(),
        }
    }

    /// Run `op`, retrying on failure per the configured strategy. Sleeping
    /// between attempts observes `cancel` so a shutdown can interrupt a long
    /// backoff immediately.
    pub async fn run<T, Fut>(&self, cancel: &CancellationToken, mut op: impl FnMut() -> Fut) -> Result<T>
    where
        Fut: std::future::Future<Output = Result<T>>,
    {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match op().await {
                Ok(v) => return Ok(v),
                Err(err) => {
                    let retryable = self.is_retryable_error(&err);
                    if !retryable || !self.strategy.should_retry(attempt, self.max_attempts) {
                        (self.on_giveup)(&err);
                        return Err(err);
                    }
                    (self.on_retry)(attempt, &err);
                    let mut delay = self.strategy.next_delay(attempt);
                    if self.jitter {
                        delay = apply_jitter(delay);
                    }
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = cancel.cancelled() => return Err(err),
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exponential_backoff_doubles_and_clamps() {
        let s = BackoffStrategy::Exponential {
            base: Duration::from_secs(1),
            multiplier: 2.0,
            max: Duration::from_secs(5),
        };
        assert_eq!(s.next_delay(1), Duration::from_secs(1));
        assert_eq!(s.next_delay(2), Duration::from_secs(2));
        assert_eq!(s.next_delay(3), Duration::from_secs(4));
        assert_eq!(s.next_delay(4), Duration::from_secs(5));
    }

    #[test]
    fn linear_backoff_adds_increment_per_attempt() {
        let s = BackoffStrategy::Linear {
            base: Duration::from_secs(1),
            increment: Duration::from_secs(2),
            max: Duration::from_secs(100),
        };
        assert_eq!(s.next_delay(1), Duration::from_secs(1));
        assert_eq!(s.next_delay(3), Duration::from_secs(5));
    }

    #[test]
    fn fixed_backoff_never_changes() {
        let s = BackoffStrategy::Fixed { delay: Duration::from_secs(3) };
        assert_eq!(s.next_delay(1), s.next_delay(10));
    }

    #[test]
    fn none_strategy_never_retries() {
        let s = BackoffStrategy::None;
        assert!(!s.should_retry(1, 5));
        assert_eq!(s.next_delay(1), Duration::ZERO);
    }

    #[test]
    fn should_retry_respects_max_attempts() {
        let s = BackoffStrategy::default();
        assert!(s.should_retry(1, 3));
        assert!(s.should_retry(2, 3));
        assert!(!s.should_retry(3, 3));
    }

    #[test]
    fn jitter_stays_within_bounds() {
        let base = Duration::from_secs(10);
        for _ in 0..200 {
            let jittered = apply_jitter(base);
            assert!(jittered >= Duration::from_millis(7500));
            assert!(jittered <= Duration::from_millis(12500));
        }
    }

    #[tokio::test]
    async fn run_retries_until_success() {
        let attempts = std::sync::atomic::AtomicU32::new(0);
        let cfg = RetryConfig {
            strategy: BackoffStrategy::Fixed { delay: Duration::from_millis(1) },
            max_attempts: 5,
            jitter: false,
            retryable_codes: None,
            on_retry: |_, _| {},
            on_giveup: |_| {},
        };
        let cancel = CancellationToken::new();
        let result: Result<u32> = cfg
            .run(&cancel, || async {
                let n = attempts.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                if n < 2 {
                    Err(OrchestratorError::task_timeout("ti-1"))
                } else {
                    Ok(42)
                }
            })
            .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(attempts.load(std::sync::atomic::Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn run_gives_up_after_max_attempts() {
        let cfg = RetryConfig {
            strategy: BackoffStrategy::Fixed { delay: Duration::from_millis(1) },
            max_attempts: 2,
            jitter: false,
            retryable_codes: None,
            on_retry: |_, _| {},
            on_giveup: |_| {},
        };
        let cancel = CancellationToken::new();
        let result: Result<u32> = cfg.run(&cancel, || async { Err(OrchestratorError::task_timeout("ti-1")) }).await;
        assert!(result.is_err());
    }
}
