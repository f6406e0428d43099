//! Per-activity execution policy.

use crate::errors::ValidationError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Backoff strategy for retry delays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffStrategy {
    /// delay = interval
    #[default]
    Constant,
    /// delay = interval * (retry + 1)
    Linear,
    /// delay = interval * 2^retry
    Exponential,
}

/// Jitter strategy to prevent thundering herd.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JitterStrategy {
    /// No jitter
    #[default]
    None,
    /// Random from 0 to delay
    Full,
    /// Half fixed, half random
    Equal,
}

/// Timeout and retry policy of one activity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityPolicy {
    /// Budget for the whole activity, retries included.
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: f64,
    /// Retries after the first attempt.
    #[serde(default)]
    pub max_retries: u32,
    /// Base delay between attempts.
    #[serde(default = "default_retry_interval_seconds")]
    pub retry_interval_seconds: f64,
    /// How the delay grows between retries.
    #[serde(default)]
    pub backoff: BackoffStrategy,
    /// Randomisation applied to each delay.
    #[serde(default)]
    pub jitter: JitterStrategy,
    /// Upper bound for a single delay.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_retry_interval_seconds: Option<f64>,
}

fn default_timeout_seconds() -> f64 {
    12.0 * 60.0 * 60.0
}

fn default_retry_interval_seconds() -> f64 {
    30.0
}

impl Default for ActivityPolicy {
    fn default() -> Self {
        Self {
            timeout_seconds: default_timeout_seconds(),
            max_retries: 0,
            retry_interval_seconds: default_retry_interval_seconds(),
            backoff: BackoffStrategy::default(),
            jitter: JitterStrategy::default(),
            max_retry_interval_seconds: None,
        }
    }
}

impl ActivityPolicy {
    /// Creates a policy with the orchestrator defaults (12h timeout, no retries, 30s interval).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the timeout.
    #[must_use]
    pub fn with_timeout_seconds(mut self, seconds: f64) -> Self {
        self.timeout_seconds = seconds;
        self
    }

    /// Sets the retry count.
    #[must_use]
    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Sets the retry interval.
    #[must_use]
    pub fn with_retry_interval_seconds(mut self, seconds: f64) -> Self {
        self.retry_interval_seconds = seconds;
        self
    }

    /// Sets the backoff strategy.
    #[must_use]
    pub fn with_backoff(mut self, strategy: BackoffStrategy) -> Self {
        self.backoff = strategy;
        self
    }

    /// Sets the jitter strategy.
    #[must_use]
    pub fn with_jitter(mut self, strategy: JitterStrategy) -> Self {
        self.jitter = strategy;
        self
    }

    /// Caps a single retry delay.
    #[must_use]
    pub fn with_max_retry_interval_seconds(mut self, seconds: f64) -> Self {
        self.max_retry_interval_seconds = Some(seconds);
        self
    }

    /// Returns the timeout as a `Duration`.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::try_from_secs_f64(self.timeout_seconds).unwrap_or(Duration::MAX)
    }

    /// Returns the retry interval as a `Duration`.
    #[must_use]
    pub fn retry_interval(&self) -> Duration {
        Duration::try_from_secs_f64(self.retry_interval_seconds).unwrap_or(Duration::ZERO)
    }

    /// Returns the delay cap, if any.
    #[must_use]
    pub fn max_retry_interval(&self) -> Option<Duration> {
        self.max_retry_interval_seconds
            .and_then(|s| Duration::try_from_secs_f64(s).ok())
    }

    /// Total attempts allowed (initial attempt plus retries).
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Validates the policy values.
    ///
    /// # Errors
    ///
    /// Returns `InvalidPolicy` if the timeout is not a positive finite number
    /// or an interval is negative or non-finite.
    pub fn validate(&self, activity: &str) -> Result<(), ValidationError> {
        let invalid = |reason: String| ValidationError::InvalidPolicy {
            activity: activity.to_string(),
            reason,
        };

        if !self.timeout_seconds.is_finite() || self.timeout_seconds <= 0.0 {
            return Err(invalid(format!(
                "timeout must be positive, got {}",
                self.timeout_seconds
            )));
        }
        if !self.retry_interval_seconds.is_finite() || self.retry_interval_seconds < 0.0 {
            return Err(invalid(format!(
                "retry interval must be non-negative, got {}",
                self.retry_interval_seconds
            )));
        }
        if let Some(cap) = self.max_retry_interval_seconds {
            if !cap.is_finite() || cap < 0.0 {
                return Err(invalid(format!(
                    "max retry interval must be non-negative, got {cap}"
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_defaults() {
        let policy = ActivityPolicy::default();
        assert_eq!(policy.timeout(), Duration::from_secs(43_200));
        assert_eq!(policy.max_retries, 0);
        assert_eq!(policy.retry_interval(), Duration::from_secs(30));
        assert_eq!(policy.backoff, BackoffStrategy::Constant);
        assert_eq!(policy.jitter, JitterStrategy::None);
        assert_eq!(policy.max_attempts(), 1);
    }

    #[test]
    fn test_policy_builder() {
        let policy = ActivityPolicy::new()
            .with_timeout_seconds(60.0)
            .with_max_retries(2)
            .with_retry_interval_seconds(0.5)
            .with_backoff(BackoffStrategy::Exponential)
            .with_max_retry_interval_seconds(4.0);

        assert_eq!(policy.max_attempts(), 3);
        assert_eq!(policy.retry_interval(), Duration::from_millis(500));
        assert_eq!(policy.max_retry_interval(), Some(Duration::from_secs(4)));
    }

    #[test]
    fn test_policy_validation() {
        assert!(ActivityPolicy::default().validate("a").is_ok());
        assert!(ActivityPolicy::new().with_timeout_seconds(0.0).validate("a").is_err());
        assert!(ActivityPolicy::new().with_timeout_seconds(f64::NAN).validate("a").is_err());
        assert!(ActivityPolicy::new()
            .with_retry_interval_seconds(-1.0)
            .validate("a")
            .is_err());

        let err = ActivityPolicy::new()
            .with_max_retry_interval_seconds(f64::INFINITY)
            .validate("load")
            .unwrap_err();
        assert_eq!(err.code(), "GRAPH-005-POLICY");
    }

    #[test]
    fn test_policy_deserialize_partial() {
        let policy: ActivityPolicy =
            serde_json::from_str(r#"{"max_retries": 3, "jitter": "full"}"#).unwrap();
        assert_eq!(policy.max_retries, 3);
        assert_eq!(policy.jitter, JitterStrategy::Full);
        assert_eq!(policy.timeout_seconds, 43_200.0);
    }
}
