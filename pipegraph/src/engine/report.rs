//! Run reports.

use crate::config::TargetConfig;
use crate::core::{ActivityState, TaskRef};
use crate::errors::{ActivityError, PipegraphError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Final record of one activity in a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityReport {
    /// Activity name.
    pub name: String,
    /// The task the activity referenced.
    pub task: TaskRef,
    /// Terminal state.
    pub state: ActivityState,
    /// Attempts started (0 for skipped activities).
    pub attempts: u32,
    /// When the first attempt started.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    /// When the activity resolved.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
    /// Wall-clock duration in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<f64>,
    /// Why the activity failed or was skipped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ActivityError>,
    /// Output of the successful attempt.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<serde_json::Value>,
}

/// Outcome of one graph execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    /// Unique run id.
    pub run_id: Uuid,
    /// Pipeline name.
    pub pipeline: String,
    /// Deployment scope the run targeted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<TargetConfig>,
    /// True iff every activity not allowed to skip ended `Succeeded`.
    pub success: bool,
    /// Run start.
    pub started_at: DateTime<Utc>,
    /// Run end.
    pub ended_at: DateTime<Utc>,
    /// Wall-clock duration in milliseconds.
    pub duration_ms: f64,
    /// Per-activity records in topological order.
    pub activities: Vec<ActivityReport>,
    /// Names of activities that ended `Failed`.
    pub failed: Vec<String>,
    /// Names of activities that ended `Skipped`.
    pub skipped: Vec<String>,
    /// Abort reason, if the run was cancelled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancel_reason: Option<String>,
}

impl RunReport {
    /// Looks up an activity record by name.
    #[must_use]
    pub fn activity(&self, name: &str) -> Option<&ActivityReport> {
        self.activities.iter().find(|a| a.name == name)
    }

    /// Returns the terminal state of an activity.
    #[must_use]
    pub fn state_of(&self, name: &str) -> Option<ActivityState> {
        self.activity(name).map(|a| a.state)
    }

    /// Returns true if the run was aborted.
    #[must_use]
    pub fn was_cancelled(&self) -> bool {
        self.cancel_reason.is_some()
    }

    /// Renders the report as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns a serialization error if rendering fails.
    pub fn to_json_pretty(&self) -> Result<String, PipegraphError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report() -> RunReport {
        let now = Utc::now();
        RunReport {
            run_id: Uuid::new_v4(),
            pipeline: "pl".into(),
            target: None,
            success: false,
            started_at: now,
            ended_at: now,
            duration_ms: 1.0,
            activities: vec![
                ActivityReport {
                    name: "a".into(),
                    task: TaskRef::new("a"),
                    state: ActivityState::Failed,
                    attempts: 2,
                    started_at: Some(now),
                    ended_at: Some(now),
                    duration_ms: Some(0.5),
                    error: Some(ActivityError::TaskExecution {
                        message: "boom".into(),
                        details: None,
                    }),
                    output: None,
                },
                ActivityReport {
                    name: "b".into(),
                    task: TaskRef::new("b"),
                    state: ActivityState::Skipped,
                    attempts: 0,
                    started_at: None,
                    ended_at: None,
                    duration_ms: None,
                    error: None,
                    output: None,
                },
            ],
            failed: vec!["a".into()],
            skipped: vec!["b".into()],
            cancel_reason: None,
        }
    }

    #[test]
    fn test_lookup() {
        let report = report();
        assert_eq!(report.state_of("a"), Some(ActivityState::Failed));
        assert_eq!(report.activity("b").unwrap().attempts, 0);
        assert!(report.state_of("zzz").is_none());
        assert!(!report.was_cancelled());
    }

    #[test]
    fn test_serialized_shape() {
        let json: serde_json::Value =
            serde_json::from_str(&report().to_json_pretty().unwrap()).unwrap();

        assert_eq!(json["success"], false);
        assert_eq!(json["failed"], serde_json::json!(["a"]));
        assert_eq!(json["activities"][0]["state"], "failed");
        assert_eq!(json["activities"][0]["error"]["kind"], "task_execution");
        assert!(json["activities"][1].get("started_at").is_none());
        assert!(json.get("cancel_reason").is_none());
    }

    #[test]
    fn test_deserialize_back() {
        let original = report();
        let parsed: RunReport = serde_json::from_str(&original.to_json_pretty().unwrap()).unwrap();
        assert_eq!(parsed.run_id, original.run_id);
        assert_eq!(parsed.activities.len(), 2);
    }
}
