//! Logging setup and spans.

use crate::config::{LogFormat, LoggingConfig};
use crate::errors::PipegraphError;
use tracing::Span;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

/// Builds the log filter: `RUST_LOG` when set, the configured level otherwise.
pub fn env_filter(config: &LoggingConfig) -> Result<EnvFilter, PipegraphError> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(&config.level).map_err(|e| {
            PipegraphError::Config(format!("invalid log level '{}': {e}", config.level))
        }),
    }
}

/// Installs the global tracing subscriber.
///
/// Fails if the filter is invalid or a subscriber is already installed.
pub fn init_tracing(config: &LoggingConfig) -> Result<(), PipegraphError> {
    let filter = env_filter(config)?;
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_level(true);

    let installed = match config.format {
        LogFormat::Json => builder.json().with_current_span(true).try_init(),
        LogFormat::Pretty => builder.try_init(),
    };
    installed.map_err(|e| PipegraphError::Config(format!("failed to install tracing subscriber: {e}")))
}

/// Span wrapping every attempt of one activity.
#[must_use]
pub fn activity_span(run_id: Uuid, activity: &str, task: &str) -> Span {
    tracing::info_span!("activity", run_id = %run_id, activity = %activity, task = %task)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_level_rejected() {
        let config = LoggingConfig {
            level: "pipegraph=notalevel".into(),
            format: LogFormat::Pretty,
        };
        // RUST_LOG takes precedence when set, so only assert when it is not.
        if std::env::var_os("RUST_LOG").is_none() {
            assert!(matches!(env_filter(&config), Err(PipegraphError::Config(_))));
        }
    }

    #[test]
    fn test_second_init_fails() {
        let config = LoggingConfig {
            level: "warn".into(),
            format: LogFormat::Json,
        };
        // The first call may lose to another test; the second can never win.
        let _ = init_tracing(&config);
        assert!(matches!(init_tracing(&config), Err(PipegraphError::Config(_))));
    }

    #[test]
    fn test_activity_span_builds() {
        let span = activity_span(Uuid::new_v4(), "Load_EmpMaster", "DataFlowReference:df_Load_EmpMaster");
        let _entered = span.enter();
    }
}
