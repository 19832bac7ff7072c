// Retry policy - exponential backoff with jitter, free of clocks and I/O
use crate::application::provider_adapter::AdapterError;
use rand::Rng;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub base_delay: Duration,
    pub backoff_factor: f64,
    /// Total attempts including the first one.
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(500),
            backoff_factor: 2.0,
            max_attempts: 3,
        }
    }
}

/// Source of randomness for backoff delays.
pub trait Jitter: Send + Sync {
    /// A duration in `[low, high]`.
    fn sample(&self, low: Duration, high: Duration) -> Duration;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RandomJitter;

impl Jitter for RandomJitter {
    fn sample(&self, low: Duration, high: Duration) -> Duration {
        if high <= low {
            return low;
        }
        let low_ns = u64::try_from(low.as_nanos()).unwrap_or(u64::MAX);
        let high_ns = u64::try_from(high.as_nanos()).unwrap_or(u64::MAX);
        Duration::from_nanos(rand::thread_rng().gen_range(low_ns..=high_ns))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    Retry { delay: Duration },
    Exhausted,
    NotRetryable,
}

impl RetryPolicy {
    /// `base * factor^(retry - 1)`; zero for retry 0.
    pub fn ceiling(&self, retry: u32) -> Duration {
        if retry == 0 {
            return Duration::ZERO;
        }
        let exponent = i32::try_from(retry - 1).unwrap_or(i32::MAX);
        let scale = self.backoff_factor.max(1.0).powi(exponent);
        Duration::try_from_secs_f64(self.base_delay.as_secs_f64() * scale).unwrap_or(Duration::MAX)
    }

    /// Jitter window for retry `retry` (1-based). Windows are adjacent, so a
    /// later retry never waits less than an earlier one.
    pub fn window(&self, retry: u32) -> (Duration, Duration) {
        (self.ceiling(retry.saturating_sub(1)), self.ceiling(retry))
    }

    /// What to do after `attempts_made` attempts, the last of which failed with `error`.
    /// Non-idempotent calls get a single attempt.
    pub fn decide(
        &self,
        attempts_made: u32,
        error: &AdapterError,
        idempotent: bool,
        jitter: &dyn Jitter,
    ) -> RetryDecision {
        if !error.is_retryable() {
            return RetryDecision::NotRetryable;
        }
        if !idempotent || attempts_made >= self.max_attempts {
            return RetryDecision::Exhausted;
        }
        let (low, high) = self.window(attempts_made);
        RetryDecision::Retry {
            delay: jitter.sample(low, high),
        }
    }
}
