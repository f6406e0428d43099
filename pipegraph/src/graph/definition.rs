//! Pipeline definition documents.
//!
//! Reads and writes the orchestrator's JSON pipeline format:
//!
//! ```json
//! {
//!   "name": "pl_NYC_Payroll_Pipeline",
//!   "properties": {
//!     "activities": [{
//!       "name": "Load_2021_Payroll",
//!       "type": "ExecuteDataFlow",
//!       "dependsOn": [{"activity": "Load_2020_Payroll", "dependencyConditions": ["Succeeded"]}],
//!       "policy": {"timeout": "0.12:00:00", "retry": 0, "retryIntervalInSeconds": 30},
//!       "typeProperties": {
//!         "dataFlow": {"referenceName": "df_Load_2021_Payroll", "type": "DataFlowReference"},
//!         "compute": {"coreCount": 8, "computeType": "General"}
//!       }
//!     }]
//!   }
//! }
//! ```
//!
//! Backoff and jitter have no representation in this format; imported
//! activities get the defaults and exports drop them.

use super::{ActivityGraph, ActivityPolicy, ActivitySpec, Dependency};
use crate::core::{ComputeSpec, ComputeType, DependencyCondition, TaskRef};
use crate::errors::{DefinitionError, PipegraphError};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

const EXECUTE_DATA_FLOW: &str = "ExecuteDataFlow";
const EXECUTE_PIPELINE: &str = "ExecutePipeline";

/// A complete pipeline document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineDefinition {
    /// Pipeline name.
    #[serde(default)]
    pub name: String,
    /// Pipeline body.
    pub properties: PipelineProperties,
}

/// The `properties` object of a pipeline document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineProperties {
    /// Optional description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Activities in document order.
    #[serde(default)]
    pub activities: Vec<ActivityDefinition>,
    /// Free-form annotations.
    #[serde(default)]
    pub annotations: Vec<serde_json::Value>,
}

/// One activity in a pipeline document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityDefinition {
    /// Activity name.
    pub name: String,
    /// Activity type, e.g. `ExecuteDataFlow`.
    #[serde(rename = "type")]
    pub activity_type: String,
    /// Optional description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Upstream dependencies.
    #[serde(default)]
    pub depends_on: Vec<DependsOn>,
    /// Execution policy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy: Option<PolicyDefinition>,
    /// Type-specific settings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub type_properties: Option<TypeProperties>,
}

/// A `dependsOn` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DependsOn {
    /// Upstream activity name.
    pub activity: String,
    /// Accepted upstream outcomes (`Succeeded`, `Failed`, `Completed`, `Skipped`).
    #[serde(default)]
    pub dependency_conditions: Vec<String>,
}

/// An activity `policy` object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyDefinition {
    /// Timeout as `D.HH:MM:SS`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<String>,
    /// Retry count.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry: Option<u32>,
    /// Seconds between retries.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_interval_in_seconds: Option<f64>,
    /// Whether outputs are hidden from monitoring.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secure_output: Option<bool>,
    /// Whether inputs are hidden from monitoring.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secure_input: Option<bool>,
}

/// The `typeProperties` object of an activity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeProperties {
    /// Data flow executed by `ExecuteDataFlow` activities.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_flow: Option<Reference>,
    /// Child pipeline executed by `ExecutePipeline` activities.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pipeline: Option<Reference>,
    /// Compute sizing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compute: Option<ComputeDefinition>,
    /// Trace verbosity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace_level: Option<String>,
}

/// A named reference to another resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reference {
    /// Referenced resource name.
    pub reference_name: String,
    /// Reference kind.
    #[serde(rename = "type")]
    pub reference_type: String,
}

/// The `compute` object of an activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComputeDefinition {
    /// Number of cores.
    pub core_count: u32,
    /// Compute class.
    #[serde(default)]
    pub compute_type: ComputeType,
}

impl PipelineDefinition {
    /// Parses a pipeline document.
    ///
    /// # Errors
    ///
    /// Returns a serialization error if the JSON does not match the format.
    pub fn from_json(json: &str) -> Result<Self, PipegraphError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Renders the document as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns a serialization error if rendering fails.
    pub fn to_json_pretty(&self) -> Result<String, PipegraphError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Converts the document's activities into specs, in document order.
    ///
    /// # Errors
    ///
    /// Returns a [`DefinitionError`] for malformed timespans, unknown
    /// conditions or activities without a task reference.
    pub fn to_specs(&self) -> Result<Vec<ActivitySpec>, DefinitionError> {
        self.properties
            .activities
            .iter()
            .map(ActivityDefinition::to_spec)
            .collect()
    }

    /// Converts and validates the document into a graph.
    ///
    /// # Errors
    ///
    /// Returns a definition or validation error.
    pub fn to_graph(&self) -> Result<ActivityGraph, PipegraphError> {
        let specs = self.to_specs()?;
        Ok(ActivityGraph::build(self.name.clone(), specs)?)
    }

    /// Renders a graph as a pipeline document, activities in input order.
    #[must_use]
    pub fn from_graph(graph: &ActivityGraph) -> Self {
        Self {
            name: graph.name().to_string(),
            properties: PipelineProperties {
                description: None,
                activities: graph.activities().iter().map(ActivityDefinition::from_spec).collect(),
                annotations: Vec::new(),
            },
        }
    }
}

impl ActivityDefinition {
    /// Converts the activity into a spec.
    ///
    /// # Errors
    ///
    /// Returns a [`DefinitionError`] if a field cannot be interpreted.
    pub fn to_spec(&self) -> Result<ActivitySpec, DefinitionError> {
        let type_props = self.type_properties.clone().unwrap_or_default();
        let reference = type_props
            .data_flow
            .as_ref()
            .or(type_props.pipeline.as_ref())
            .ok_or_else(|| DefinitionError::MissingTaskReference {
                activity: self.name.clone(),
            })?;

        let mut spec = ActivitySpec::new(
            self.name.clone(),
            TaskRef::new(reference.reference_name.clone()).with_kind(reference.reference_type.clone()),
        );

        for entry in &self.depends_on {
            let conditions = entry
                .dependency_conditions
                .iter()
                .map(|c| c.parse::<DependencyCondition>())
                .collect::<Result<Vec<_>, _>>()?;
            spec = spec.with_dependency(Dependency {
                activity: entry.activity.clone(),
                conditions,
            });
        }

        if let Some(policy) = &self.policy {
            spec = spec.with_policy(policy.to_policy()?);
        }
        if let Some(compute) = type_props.compute {
            spec = spec.with_compute(ComputeSpec {
                core_count: compute.core_count,
                compute_type: compute.compute_type,
            });
        }
        if let Some(description) = &self.description {
            spec = spec.with_description(description.clone());
        }
        Ok(spec)
    }

    /// Renders a spec as a document activity.
    #[must_use]
    pub fn from_spec(spec: &ActivitySpec) -> Self {
        let reference = Some(Reference {
            reference_name: spec.task.name.clone(),
            reference_type: spec.task.kind.clone(),
        });
        let is_pipeline = spec.task.kind == "PipelineReference";

        Self {
            name: spec.name.clone(),
            activity_type: if is_pipeline { EXECUTE_PIPELINE } else { EXECUTE_DATA_FLOW }.to_string(),
            description: spec.description.clone(),
            depends_on: spec
                .dependencies
                .iter()
                .map(|d| DependsOn {
                    activity: d.activity.clone(),
                    dependency_conditions: d
                        .conditions
                        .iter()
                        .map(|c| c.as_definition_str().to_string())
                        .collect(),
                })
                .collect(),
            policy: Some(PolicyDefinition::from_policy(&spec.policy)),
            type_properties: Some(TypeProperties {
                data_flow: if is_pipeline { None } else { reference.clone() },
                pipeline: if is_pipeline { reference } else { None },
                compute: spec.compute.map(|c| ComputeDefinition {
                    core_count: c.core_count,
                    compute_type: c.compute_type,
                }),
                trace_level: None,
            }),
        }
    }
}

impl PolicyDefinition {
    /// Converts to an activity policy; missing fields take the defaults.
    ///
    /// # Errors
    ///
    /// Returns `InvalidTimespan` if the timeout is malformed.
    pub fn to_policy(&self) -> Result<ActivityPolicy, DefinitionError> {
        let mut policy = ActivityPolicy::default();
        if let Some(timeout) = &self.timeout {
            policy.timeout_seconds = parse_timespan(timeout)?;
        }
        if let Some(retry) = self.retry {
            policy.max_retries = retry;
        }
        if let Some(interval) = self.retry_interval_in_seconds {
            policy.retry_interval_seconds = interval;
        }
        Ok(policy)
    }

    /// Renders an activity policy.
    #[must_use]
    pub fn from_policy(policy: &ActivityPolicy) -> Self {
        Self {
            timeout: Some(format_timespan(policy.timeout_seconds)),
            retry: Some(policy.max_retries),
            retry_interval_in_seconds: Some(policy.retry_interval_seconds),
            secure_output: Some(false),
            secure_input: Some(false),
        }
    }
}

#[allow(clippy::expect_used)]
fn timespan_regex() -> &'static Regex {
    static TIMESPAN: OnceLock<Regex> = OnceLock::new();
    TIMESPAN.get_or_init(|| {
        Regex::new(r"^(?:(\d+)\.)?(\d{1,2}):(\d{2}):(\d{2})(?:\.(\d{1,7}))?$")
            .expect("timespan pattern is valid")
    })
}

/// Parses a `D.HH:MM:SS[.fffffff]` timespan into seconds.
///
/// # Errors
///
/// Returns `InvalidTimespan` if the string does not match or a field is out of range.
#[allow(clippy::cast_precision_loss)]
pub fn parse_timespan(value: &str) -> Result<f64, DefinitionError> {
    let invalid = || DefinitionError::InvalidTimespan(value.to_string());
    let caps = timespan_regex().captures(value.trim()).ok_or_else(invalid)?;

    let field = |i: usize| -> Result<u64, DefinitionError> {
        caps.get(i)
            .map_or(Ok(0), |m| m.as_str().parse::<u64>().map_err(|_| invalid()))
    };
    let (days, hours, minutes, seconds) = (field(1)?, field(2)?, field(3)?, field(4)?);
    if hours > 23 || minutes > 59 || seconds > 59 {
        return Err(invalid());
    }

    let fraction = caps
        .get(5)
        .map_or(Ok(0.0), |m| format!("0.{}", m.as_str()).parse::<f64>().map_err(|_| invalid()))?;

    let whole = days
        .checked_mul(86_400)
        .and_then(|d| d.checked_add(hours * 3_600 + minutes * 60 + seconds))
        .ok_or_else(invalid)?;
    Ok(whole as f64 + fraction)
}

/// Formats seconds as a `D.HH:MM:SS` timespan; fractions are truncated.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn format_timespan(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds.trunc() as u64
    } else {
        0
    };
    let days = total / 86_400;
    let hours = (total % 86_400) / 3_600;
    let minutes = (total % 3_600) / 60;
    let secs = total % 60;
    format!("{days}.{hours:02}:{minutes:02}:{secs:02}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::payroll_pipeline_definition;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_timespan() {
        assert_eq!(parse_timespan("0.12:00:00").unwrap(), 43_200.0);
        assert_eq!(parse_timespan("1.00:00:30").unwrap(), 86_430.0);
        assert_eq!(parse_timespan("00:05:00").unwrap(), 300.0);
        assert_eq!(parse_timespan("0.00:00:01.5").unwrap(), 1.5);
    }

    #[test]
    fn test_parse_timespan_rejects_garbage() {
        for bad in ["", "12h", "0.24:00:00", "0.00:60:00", "1:2:3", "-1.00:00:00"] {
            assert!(parse_timespan(bad).is_err(), "{bad:?} should be rejected");
        }
    }

    #[test]
    fn test_parse_timespan_rejects_overflowing_days() {
        let err = parse_timespan("300000000000000.00:00:00").unwrap_err();
        assert!(matches!(err, DefinitionError::InvalidTimespan(_)));
        assert!(parse_timespan("99999999999999999999.00:00:00").is_err());
    }

    #[test]
    fn test_format_timespan() {
        assert_eq!(format_timespan(43_200.0), "0.12:00:00");
        assert_eq!(format_timespan(86_430.9), "1.00:00:30");
        assert_eq!(format_timespan(-5.0), "0.00:00:00");
    }

    #[test]
    fn test_payroll_definition_to_graph() {
        let definition = PipelineDefinition::from_json(&payroll_pipeline_definition().to_string()).unwrap();
        let graph = definition.to_graph().unwrap();

        assert_eq!(graph.name(), "pl_NYC_Payroll_Pipeline");
        assert_eq!(
            graph.topological_order(),
            &[
                "Load_AgencyMaster",
                "Load_EmpMaster",
                "Load_TitleMaster",
                "Load_2020_Payroll",
                "Load_2021_Payroll",
                "Aggregate_Payroll_Summary",
            ]
        );
        assert_eq!(
            graph.roots(),
            vec!["Load_AgencyMaster", "Load_EmpMaster", "Load_TitleMaster"]
        );

        let agg = graph.get("Aggregate_Payroll_Summary").unwrap();
        assert_eq!(agg.task, TaskRef::data_flow("Dataflow_Summary_Aggregate"));
        assert_eq!(agg.policy.timeout_seconds, 43_200.0);
        assert_eq!(agg.policy.max_retries, 0);
        assert_eq!(agg.policy.retry_interval_seconds, 30.0);
        assert_eq!(agg.compute, Some(ComputeSpec::default()));
    }

    #[test]
    fn test_missing_task_reference() {
        let json = r#"{"name": "p", "properties": {"activities": [{"name": "wait", "type": "Wait"}]}}"#;
        let definition = PipelineDefinition::from_json(json).unwrap();

        assert_eq!(
            definition.to_specs().unwrap_err(),
            DefinitionError::MissingTaskReference { activity: "wait".into() }
        );
    }

    #[test]
    fn test_unknown_condition() {
        let json = r#"{"name": "p", "properties": {"activities": [
            {"name": "a", "type": "ExecuteDataFlow",
             "typeProperties": {"dataFlow": {"referenceName": "df_a", "type": "DataFlowReference"}}},
            {"name": "b", "type": "ExecuteDataFlow",
             "dependsOn": [{"activity": "a", "dependencyConditions": ["Eventually"]}],
             "typeProperties": {"dataFlow": {"referenceName": "df_b", "type": "DataFlowReference"}}}
        ]}}"#;
        let err = PipelineDefinition::from_json(json).unwrap().to_graph().unwrap_err();

        assert!(matches!(
            err,
            PipegraphError::Definition(DefinitionError::UnknownCondition(ref c)) if c == "Eventually"
        ));
    }

    #[test]
    fn test_definition_validation_errors_surface() {
        let json = r#"{"name": "p", "properties": {"activities": [
            {"name": "a", "type": "ExecuteDataFlow",
             "dependsOn": [{"activity": "ghost", "dependencyConditions": ["Succeeded"]}],
             "typeProperties": {"dataFlow": {"referenceName": "df_a", "type": "DataFlowReference"}}}
        ]}}"#;
        let err = PipelineDefinition::from_json(json).unwrap().to_graph().unwrap_err();

        assert!(matches!(err, PipegraphError::Validation(_)));
    }

    #[test]
    fn test_export_preserves_graph() {
        let original = PipelineDefinition::from_json(&payroll_pipeline_definition().to_string())
            .unwrap()
            .to_graph()
            .unwrap();

        let exported = PipelineDefinition::from_graph(&original);
        let rebuilt = exported.to_graph().unwrap();

        assert_eq!(rebuilt.fingerprint(), original.fingerprint());

        let json: serde_json::Value = serde_json::from_str(&exported.to_json_pretty().unwrap()).unwrap();
        let load_2021 = &json["properties"]["activities"][4];
        assert_eq!(load_2021["dependsOn"][0]["activity"], "Load_2020_Payroll");
        assert_eq!(load_2021["policy"]["timeout"], "0.12:00:00");
    }
}
