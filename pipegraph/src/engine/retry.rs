//! Retry bookkeeping for activity attempts.
//!
//! Delays start from the policy's retry interval, grow by the backoff
//! strategy, are capped by `max_retry_interval_seconds` and finally jittered.

use crate::core::TaskError;
use crate::graph::{ActivityPolicy, BackoffStrategy, JitterStrategy};
use rand::Rng;
use std::time::Duration;

/// Outcome of a retry decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry after the specified delay.
    Retry(Duration),
    /// No more retries, give up.
    GiveUp,
    /// Don't retry, the error is not retryable.
    NotRetryable,
}

/// Retry state for one activity execution.
#[derive(Debug, Default)]
pub struct RetryState {
    /// Retries already scheduled.
    pub retries: u32,
}

impl RetryState {
    /// Creates a new retry state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if the policy allows no further retries.
    #[must_use]
    pub fn is_exhausted(&self, policy: &ActivityPolicy) -> bool {
        self.retries >= policy.max_retries
    }

    /// Calculates the delay before the next retry, without jitter applied.
    #[must_use]
    pub fn base_delay(&self, policy: &ActivityPolicy) -> Duration {
        let interval = policy.retry_interval();
        let delay = match policy.backoff {
            BackoffStrategy::Constant => interval,
            BackoffStrategy::Linear => interval.saturating_mul(self.retries.saturating_add(1)),
            BackoffStrategy::Exponential => {
                interval.saturating_mul(2u32.saturating_pow(self.retries))
            }
        };

        match policy.max_retry_interval() {
            Some(cap) => delay.min(cap),
            None => delay,
        }
    }

    /// Calculates the jittered delay before the next retry.
    #[must_use]
    pub fn next_delay(&self, policy: &ActivityPolicy) -> Duration {
        let delay = self.base_delay(policy);
        match policy.jitter {
            JitterStrategy::None => delay,
            JitterStrategy::Full => {
                if delay.is_zero() {
                    delay
                } else {
                    rand::thread_rng().gen_range(Duration::ZERO..=delay)
                }
            }
            JitterStrategy::Equal => {
                let half = delay / 2;
                if half.is_zero() {
                    delay
                } else {
                    half + rand::thread_rng().gen_range(Duration::ZERO..=half)
                }
            }
        }
    }

    /// Decides whether a failed attempt is retried, recording the retry if so.
    pub fn decide(&mut self, policy: &ActivityPolicy, error: &TaskError) -> RetryDecision {
        if !error.retryable {
            return RetryDecision::NotRetryable;
        }
        if self.is_exhausted(policy) {
            return RetryDecision::GiveUp;
        }

        let delay = self.next_delay(policy);
        self.retries += 1;
        RetryDecision::Retry(delay)
    }
}
