//! Task references, compute hints and executor results.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque reference to externally-executed work.
///
/// The engine never interprets a task reference; it only hands it to the
/// executor and records the outcome.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskRef {
    /// Name of the unit of work (e.g. `df_Load_AgencyMaster`).
    pub name: String,
    /// Kind of reference (e.g. `DataFlowReference`).
    #[serde(default = "default_kind")]
    pub kind: String,
}

fn default_kind() -> String {
    "TaskReference".to_string()
}

impl TaskRef {
    /// Creates a task reference of the default kind.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: default_kind(),
        }
    }

    /// Creates a reference to a mapping data flow.
    #[must_use]
    pub fn data_flow(name: impl Into<String>) -> Self {
        Self::new(name).with_kind("DataFlowReference")
    }

    /// Sets the reference kind.
    #[must_use]
    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = kind.into();
        self
    }
}

impl fmt::Display for TaskRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.name)
    }
}

/// Compute class requested for an activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ComputeType {
    /// Balanced compute.
    #[default]
    General,
    /// Memory-heavy workloads.
    MemoryOptimized,
    /// CPU-heavy workloads.
    ComputeOptimized,
}

/// Compute sizing hint forwarded to the executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ComputeSpec {
    /// Number of cores.
    pub core_count: u32,
    /// Compute class.
    #[serde(default)]
    pub compute_type: ComputeType,
}

impl Default for ComputeSpec {
    fn default() -> Self {
        Self {
            core_count: 8,
            compute_type: ComputeType::General,
        }
    }
}

/// Successful result of one task attempt.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskOutput {
    /// Optional structured output (row counts, run ids, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl TaskOutput {
    /// Creates an empty output.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Creates an output carrying data.
    #[must_use]
    pub fn with_data(data: serde_json::Value) -> Self {
        Self { data: Some(data) }
    }
}

/// Failure reported by an executor for one task attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
#[error("{message}")]
pub struct TaskError {
    /// Human-readable failure message.
    pub message: String,
    /// Optional structured error payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
    /// Whether another attempt may succeed.
    #[serde(default = "default_retryable")]
    pub retryable: bool,
}

fn default_retryable() -> bool {
    true
}

impl TaskError {
    /// Creates a retryable task error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            details: None,
            retryable: true,
        }
    }

    /// Creates an error that must not be retried.
    #[must_use]
    pub fn fatal(message: impl Into<String>) -> Self {
        Self {
            retryable: false,
            ..Self::new(message)
        }
    }

    /// Attaches a structured payload.
    #[must_use]
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_ref_display() {
        let task = TaskRef::data_flow("df_Load_EmpMaster");
        assert_eq!(task.to_string(), "DataFlowReference:df_Load_EmpMaster");
    }

    #[test]
    fn test_task_ref_default_kind_on_deserialize() {
        let task: TaskRef = serde_json::from_str(r#"{"name": "copy"}"#).unwrap();
        assert_eq!(task.kind, "TaskReference");
    }

    #[test]
    fn test_compute_default_matches_general_eight_cores() {
        let compute = ComputeSpec::default();
        assert_eq!(compute.core_count, 8);
        assert_eq!(compute.compute_type, ComputeType::General);
    }

    #[test]
    fn test_task_error_builders() {
        let err = TaskError::new("sink unavailable").with_details(serde_json::json!({"code": 503}));
        assert!(err.retryable);
        assert_eq!(err.details.unwrap()["code"], 503);

        let fatal = TaskError::fatal("schema mismatch");
        assert!(!fatal.retryable);
        assert_eq!(fatal.to_string(), "schema mismatch");
    }
}
