//! Canned graphs for tests and benches.

use crate::core::TaskRef;
use crate::graph::{ActivitySpec, GraphBuilder};
use serde_json::{json, Value};

/// Name of the NYC payroll pipeline.
pub const PAYROLL_PIPELINE: &str = "pl_NYC_Payroll_Pipeline";

/// The three master-data loads, which run in parallel.
pub const PAYROLL_MASTER_LOADS: [&str; 3] =
    ["Load_AgencyMaster", "Load_EmpMaster", "Load_TitleMaster"];

fn payroll_activity(name: &str, data_flow: &str, depends_on: &[&str]) -> Value {
    let depends_on: Vec<Value> = depends_on
        .iter()
        .map(|dep| json!({"activity": dep, "dependencyConditions": ["Succeeded"]}))
        .collect();
    json!({
        "name": name,
        "type": "ExecuteDataFlow",
        "dependsOn": depends_on,
        "policy": {
            "timeout": "0.12:00:00",
            "retry": 0,
            "retryIntervalInSeconds": 30,
            "secureOutput": false,
            "secureInput": false
        },
        "typeProperties": {
            "dataFlow": {"referenceName": data_flow, "type": "DataFlowReference"},
            "compute": {"coreCount": 8, "computeType": "General"},
            "traceLevel": "Fine"
        }
    })
}

/// The NYC payroll pipeline in the orchestrator's document format.
///
/// Master loads run first, then the 2020 and 2021 payroll loads in sequence,
/// then the summary aggregation.
#[must_use]
pub fn payroll_pipeline_definition() -> Value {
    let [agency, emp, title] = PAYROLL_MASTER_LOADS;
    json!({
        "name": PAYROLL_PIPELINE,
        "properties": {
            "description": "Loads NYC payroll master and transaction data, then aggregates a summary",
            "activities": [
                payroll_activity(agency, "df_Load_AgencyMaster", &[]),
                payroll_activity(emp, "df_Load_EmpMaster", &[]),
                payroll_activity(title, "df_Load_TitleMaster", &[]),
                payroll_activity("Load_2020_Payroll", "df_Load_2020_Payroll", &PAYROLL_MASTER_LOADS),
                payroll_activity("Load_2021_Payroll", "df_Load_2021_Payroll", &["Load_2020_Payroll"]),
                payroll_activity("Aggregate_Payroll_Summary", "Dataflow_Summary_Aggregate", &["Load_2021_Payroll"]),
            ],
            "annotations": []
        }
    })
}

/// The NYC payroll pipeline as a builder, with default policies.
#[must_use]
pub fn payroll_builder() -> GraphBuilder {
    let mut builder = GraphBuilder::new(PAYROLL_PIPELINE);
    for name in PAYROLL_MASTER_LOADS {
        builder = builder.activity(name, TaskRef::data_flow(format!("df_{name}")), &[]);
    }
    builder
        .activity(
            "Load_2020_Payroll",
            TaskRef::data_flow("df_Load_2020_Payroll"),
            &PAYROLL_MASTER_LOADS,
        )
        .activity(
            "Load_2021_Payroll",
            TaskRef::data_flow("df_Load_2021_Payroll"),
            &["Load_2020_Payroll"],
        )
        .activity(
            "Aggregate_Payroll_Summary",
            TaskRef::data_flow("Dataflow_Summary_Aggregate"),
            &["Load_2021_Payroll"],
        )
}

/// A linear chain `step_0 -> step_1 -> ...` of `len` activities.
#[must_use]
pub fn chain(len: usize) -> Vec<ActivitySpec> {
    (0..len)
        .map(|i| {
            let name = format!("step_{i}");
            let spec = ActivitySpec::new(&name, TaskRef::new(&name));
            if i == 0 {
                spec
            } else {
                spec.depends_on(format!("step_{}", i - 1))
            }
        })
        .collect()
}

/// `width` independent activities that all feed one final activity.
#[must_use]
pub fn fan_in(width: usize) -> Vec<ActivitySpec> {
    let mut specs: Vec<ActivitySpec> = (0..width)
        .map(|i| {
            let name = format!("branch_{i}");
            ActivitySpec::new(&name, TaskRef::new(&name))
        })
        .collect();
    let mut sink = ActivitySpec::new("join", TaskRef::new("join"));
    for i in 0..width {
        sink = sink.depends_on(format!("branch_{i}"));
    }
    specs.push(sink);
    specs
}
