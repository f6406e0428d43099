//! Error types for the pipegraph framework.
//!
//! Construction-time problems are reported as [`ValidationError`], run-time
//! problems of a single activity as [`ActivityError`], and malformed pipeline
//! documents as [`DefinitionError`]. [`PipegraphError`] wraps them all.

use crate::core::{ActivityState, DependencyCondition};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// The main error type for pipegraph operations.
#[derive(Debug, Error)]
pub enum PipegraphError {
    /// The graph failed validation.
    #[error("{0}")]
    Validation(#[from] ValidationError),

    /// A pipeline definition document could not be interpreted.
    #[error("{0}")]
    Definition(#[from] DefinitionError),

    /// Invalid or unloadable configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised while building an activity graph.
///
/// These are fatal and never retried: no activity executes when the graph
/// cannot be built.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Two activity specs share a name.
    #[error("Duplicate activity name '{name}'")]
    DuplicateActivityName {
        /// The repeated name.
        name: String,
    },

    /// A dependency references a name not present in the graph.
    #[error("Activity '{activity}' depends on unknown activity '{dependency}'")]
    UnknownDependency {
        /// The activity declaring the dependency.
        activity: String,
        /// The missing upstream name.
        dependency: String,
    },

    /// The dependency relation contains a cycle.
    #[error("Cyclic dependency detected: {}", .cycle.join(" -> "))]
    CyclicDependency {
        /// Cycle path; the first name is repeated at the end.
        cycle: Vec<String>,
    },

    /// The graph has no activities.
    #[error("Graph '{graph}' has no activities")]
    EmptyGraph {
        /// The graph name.
        graph: String,
    },

    /// A policy value is out of range.
    #[error("Invalid policy for activity '{activity}': {reason}")]
    InvalidPolicy {
        /// The offending activity.
        activity: String,
        /// What is wrong with it.
        reason: String,
    },

    /// An activity name is empty or uses unsupported characters.
    #[error("Invalid activity name '{name}'")]
    InvalidName {
        /// The rejected name.
        name: String,
    },
}

impl ValidationError {
    /// Returns a stable error code for diagnostics.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::DuplicateActivityName { .. } => "GRAPH-001-DUPLICATE",
            Self::UnknownDependency { .. } => "GRAPH-002-UNKNOWN_DEP",
            Self::CyclicDependency { .. } => "GRAPH-003-CYCLE",
            Self::EmptyGraph { .. } => "GRAPH-004-EMPTY",
            Self::InvalidPolicy { .. } => "GRAPH-005-POLICY",
            Self::InvalidName { .. } => "GRAPH-006-NAME",
        }
    }

    /// Returns a hint for fixing the error.
    #[must_use]
    pub fn fix_hint(&self) -> &'static str {
        match self {
            Self::DuplicateActivityName { .. } => {
                "Rename one of the activities; names must be unique within a graph."
            }
            Self::UnknownDependency { .. } => {
                "Check the dependency for typos or add the missing activity to the graph."
            }
            Self::CyclicDependency { .. } => {
                "Break the cycle by removing one of the listed dependencies."
            }
            Self::EmptyGraph { .. } => "Add at least one activity before building.",
            Self::InvalidPolicy { .. } => {
                "Timeouts must be positive; retry intervals must be finite and non-negative."
            }
            Self::InvalidName { .. } => {
                "Use letters, digits, spaces, '.', '_' or '-' in activity names."
            }
        }
    }

    /// Returns the activity names involved in the error.
    #[must_use]
    pub fn activities(&self) -> Vec<String> {
        match self {
            Self::DuplicateActivityName { name } | Self::InvalidName { name } => vec![name.clone()],
            Self::UnknownDependency {
                activity,
                dependency,
            } => vec![activity.clone(), dependency.clone()],
            Self::CyclicDependency { cycle } => {
                let mut members = cycle.clone();
                if members.len() > 1 && members.first() == members.last() {
                    members.pop();
                }
                members
            }
            Self::EmptyGraph { .. } => Vec::new(),
            Self::InvalidPolicy { activity, .. } => vec![activity.clone()],
        }
    }

    /// Converts to a dictionary representation.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();
        map.insert("code".to_string(), serde_json::json!(self.code()));
        map.insert("message".to_string(), serde_json::json!(self.to_string()));
        map.insert("fix_hint".to_string(), serde_json::json!(self.fix_hint()));
        map.insert("activities".to_string(), serde_json::json!(self.activities()));
        map
    }
}

/// Run-time error recorded against a single activity.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ActivityError {
    /// The activity did not resolve within its timeout (retries included).
    #[error("Timed out after {timeout_seconds}s ({attempts} attempt(s))")]
    TimeoutExceeded {
        /// The configured timeout.
        timeout_seconds: f64,
        /// Attempts started before the timeout fired.
        attempts: u32,
    },

    /// The executor reported a failure on the final attempt.
    #[error("Task execution failed: {message}")]
    TaskExecution {
        /// Failure message from the executor.
        message: String,
        /// Optional structured payload from the executor.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        details: Option<serde_json::Value>,
    },

    /// The run was aborted while the activity was in flight.
    #[error("Cancelled: {reason}")]
    Cancelled {
        /// The abort reason.
        reason: String,
    },

    /// An upstream dependency ended in a state that cannot satisfy the requirement.
    #[error("Dependency '{dependency}' ended {state}, required one of {required:?}")]
    UnsatisfiedDependency {
        /// The upstream activity.
        dependency: String,
        /// Its terminal state.
        state: ActivityState,
        /// The accepted conditions.
        required: Vec<DependencyCondition>,
    },
}

impl ActivityError {
    /// Returns the short kind name used in reports and events.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::TimeoutExceeded { .. } => "timeout_exceeded",
            Self::TaskExecution { .. } => "task_execution",
            Self::Cancelled { .. } => "cancelled",
            Self::UnsatisfiedDependency { .. } => "unsatisfied_dependency",
        }
    }
}

/// Errors raised while interpreting a pipeline definition document.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DefinitionError {
    /// A timespan string is not in `D.HH:MM:SS` / `HH:MM:SS` form.
    #[error("Invalid timespan '{0}': expected D.HH:MM:SS")]
    InvalidTimespan(String),

    /// A dependency condition is not recognised.
    #[error("Unknown dependency condition '{0}'")]
    UnknownCondition(String),

    /// An activity lacks the field naming its unit of work.
    #[error("Activity '{activity}' has no task reference")]
    MissingTaskReference {
        /// The activity name.
        activity: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_error_message() {
        let err = ValidationError::CyclicDependency {
            cycle: vec!["a".into(), "b".into(), "c".into(), "a".into()],
        };

        assert!(err.to_string().contains("a -> b -> c -> a"));
        assert_eq!(err.code(), "GRAPH-003-CYCLE");
        assert_eq!(err.activities(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_self_cycle_members() {
        let err = ValidationError::CyclicDependency {
            cycle: vec!["a".into(), "a".into()],
        };
        assert_eq!(err.activities(), vec!["a"]);
    }

    #[test]
    fn test_validation_error_to_dict() {
        let err = ValidationError::UnknownDependency {
            activity: "load".into(),
            dependency: "missing".into(),
        };

        let dict = err.to_dict();
        assert_eq!(dict.get("code").unwrap(), "GRAPH-002-UNKNOWN_DEP");
        assert_eq!(dict.get("activities").unwrap(), &serde_json::json!(["load", "missing"]));
    }

    #[test]
    fn test_activity_error_serializes_with_kind() {
        let err = ActivityError::TimeoutExceeded {
            timeout_seconds: 5.0,
            attempts: 1,
        };
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["kind"], "timeout_exceeded");
        assert_eq!(err.kind(), "timeout_exceeded");
    }

    #[test]
    fn test_pipegraph_error_from_validation() {
        let err: PipegraphError = ValidationError::EmptyGraph {
            graph: "empty".into(),
        }
        .into();
        assert!(matches!(err, PipegraphError::Validation(_)));
        assert_eq!(err.to_string(), "Graph 'empty' has no activities");
    }
}
