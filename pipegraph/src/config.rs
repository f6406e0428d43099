//! Configuration for graph runs.
//!
//! A [`PipegraphConfig`] is an explicit record handed to the engine; nothing is
//! read from process-global state. Every field has a serde default, so an empty
//! JSON object is a valid configuration.

use crate::engine::FailureMode;
use crate::errors::PipegraphError;
use crate::graph::ActivityPolicy;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Deployment scope a pipeline is published to and run in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetConfig {
    /// Cloud subscription id.
    pub subscription_id: String,
    /// Resource group holding the factory.
    pub resource_group: String,
    /// Orchestration service (data factory) name.
    pub factory_name: String,
}

impl TargetConfig {
    /// Creates a new target scope.
    #[must_use]
    pub fn new(
        subscription_id: impl Into<String>,
        resource_group: impl Into<String>,
        factory_name: impl Into<String>,
    ) -> Self {
        Self {
            subscription_id: subscription_id.into(),
            resource_group: resource_group.into(),
            factory_name: factory_name.into(),
        }
    }
}

/// Engine tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Upper bound on concurrently running activities (unbounded when absent).
    #[serde(default)]
    pub max_parallelism: Option<usize>,
    /// How a failed activity affects the rest of the run.
    #[serde(default)]
    pub failure_mode: FailureMode,
    /// Seconds an abort waits for running activities before aborting their tasks.
    #[serde(default = "default_cancel_grace")]
    pub cancel_grace_seconds: f64,
}

fn default_cancel_grace() -> f64 {
    30.0
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_parallelism: None,
            failure_mode: FailureMode::default(),
            cancel_grace_seconds: default_cancel_grace(),
        }
    }
}

impl EngineConfig {
    /// Gets the cancel grace period as a Duration.
    #[must_use]
    pub fn cancel_grace(&self) -> Duration {
        Duration::try_from_secs_f64(self.cancel_grace_seconds).unwrap_or(Duration::ZERO)
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Pretty,
    /// One JSON object per line.
    Json,
}

/// Logging setup consumed by [`crate::observability::init_tracing`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive, overridden by `RUST_LOG` when set.
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Output format.
    #[serde(default)]
    pub format: LogFormat,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PipegraphConfig {
    /// Deployment scope, carried into run reports.
    #[serde(default)]
    pub target: Option<TargetConfig>,
    /// Engine tuning.
    #[serde(default)]
    pub engine: EngineConfig,
    /// Logging setup.
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Policy given to activities added through [`GraphBuilder::activity`] on a
    /// builder created with [`GraphBuilder::from_config`].
    ///
    /// [`GraphBuilder::activity`]: crate::graph::GraphBuilder::activity
    /// [`GraphBuilder::from_config`]: crate::graph::GraphBuilder::from_config
    #[serde(default)]
    pub default_policy: ActivityPolicy,
}

impl PipegraphConfig {
    /// Parses a configuration from JSON text.
    pub fn from_json_str(text: &str) -> Result<Self, PipegraphError> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads a configuration from a JSON file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, PipegraphError> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&text)
    }

    /// Checks values serde cannot reject on its own.
    pub fn validate(&self) -> Result<(), PipegraphError> {
        if self.engine.max_parallelism == Some(0) {
            return Err(PipegraphError::Config(
                "engine.max_parallelism must be at least 1".to_string(),
            ));
        }
        let grace = self.engine.cancel_grace_seconds;
        if !grace.is_finite() || grace < 0.0 {
            return Err(PipegraphError::Config(format!(
                "engine.cancel_grace_seconds must be a non-negative number, got {grace}"
            )));
        }
        self.default_policy
            .validate("default_policy")
            .map_err(|e| PipegraphError::Config(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn test_empty_object_uses_defaults() {
        let config = PipegraphConfig::from_json_str("{}").unwrap();
        assert_eq!(config, PipegraphConfig::default());
        assert_eq!(config.engine.cancel_grace(), Duration::from_secs(30));
        assert_eq!(config.logging.level, "info");
        assert!(config.target.is_none());
    }

    #[test]
    fn test_full_document() {
        let config = PipegraphConfig::from_json_str(
            r#"{
                "target": {
                    "subscription_id": "00000000-0000-0000-0000-000000000000",
                    "resource_group": "rg-payroll",
                    "factory_name": "adf-nycpayroll"
                },
                "engine": {"max_parallelism": 2, "failure_mode": "fail_fast"},
                "logging": {"level": "pipegraph=debug", "format": "json"},
                "default_policy": {"max_retries": 1, "retry_interval_seconds": 5.0}
            }"#,
        )
        .unwrap();

        assert_eq!(
            config.target,
            Some(TargetConfig::new(
                "00000000-0000-0000-0000-000000000000",
                "rg-payroll",
                "adf-nycpayroll"
            ))
        );
        assert_eq!(config.engine.max_parallelism, Some(2));
        assert_eq!(config.engine.failure_mode, FailureMode::FailFast);
        assert_eq!(config.engine.cancel_grace_seconds, 30.0);
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.default_policy.max_retries, 1);
        assert_eq!(config.default_policy.timeout_seconds, 43_200.0);
    }

    #[test]
    fn test_rejects_zero_parallelism() {
        let err = PipegraphConfig::from_json_str(r#"{"engine": {"max_parallelism": 0}}"#)
            .unwrap_err();
        assert!(matches!(err, PipegraphError::Config(_)));
    }

    #[test]
    fn test_rejects_bad_default_policy() {
        let err =
            PipegraphConfig::from_json_str(r#"{"default_policy": {"timeout_seconds": 0.0}}"#)
                .unwrap_err();
        assert!(err.to_string().contains("default_policy"));
    }

    #[test]
    fn test_malformed_json() {
        let err = PipegraphConfig::from_json_str("{engine").unwrap_err();
        assert!(matches!(err, PipegraphError::Serialization(_)));
    }

    #[test]
    fn test_from_path() -> anyhow::Result<()> {
        let mut file = tempfile::NamedTempFile::new()?;
        write!(file, r#"{{"engine": {{"cancel_grace_seconds": 1.5}}}}"#)?;

        let config = PipegraphConfig::from_path(file.path())?;
        assert_eq!(config.engine.cancel_grace(), Duration::from_millis(1500));
        Ok(())
    }

    #[test]
    fn test_missing_file() {
        let err = PipegraphConfig::from_path("/nonexistent/pipegraph.json").unwrap_err();
        assert!(matches!(err, PipegraphError::Io(_)));
    }
}
