//! # Pipegraph
//!
//! A dependency-ordered execution model for data pipelines.
//!
//! A pipeline is a graph of named activities. Each activity references a unit
//! of work, depends on upstream activities reaching a given terminal state, and
//! carries a timeout and retry policy. Pipegraph provides:
//!
//! - **Graph construction**: validated, immutable graphs with a deterministic
//!   topological order
//! - **Pipeline documents**: import and export of the orchestrator's JSON format
//! - **Execution**: a concurrent engine with retries, timeouts, skip
//!   propagation and cooperative cancellation
//! - **Observability**: `tracing` logs plus a pluggable event sink
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use pipegraph::prelude::*;
//!
//! let graph = GraphBuilder::new("pl_NYC_Payroll_Pipeline")
//!     .activity("Load_EmpMaster", TaskRef::data_flow("df_Load_EmpMaster"), &[])
//!     .activity("Load_2020_Payroll", TaskRef::data_flow("df_Load_2020_Payroll"), &["Load_EmpMaster"])
//!     .build()?;
//!
//! let report = pipegraph::engine::run(&graph, std::sync::Arc::new(my_executor)).await;
//! assert!(report.success);
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod config;
pub mod core;
pub mod engine;
pub mod errors;
pub mod events;
pub mod graph;
pub mod observability;
pub mod testing;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::{EngineConfig, LogFormat, LoggingConfig, PipegraphConfig, TargetConfig};
    pub use crate::core::{
        ActivityState, ComputeSpec, ComputeType, DependencyCondition, TaskError, TaskOutput,
        TaskRef,
    };
    pub use crate::engine::{
        CancellationToken, Engine, FailureMode, FnExecutor, RunOptions, RunReport, TaskContext,
        TaskExecutor, TaskResult,
    };
    pub use crate::errors::{ActivityError, DefinitionError, PipegraphError, ValidationError};
    pub use crate::events::{EventSink, LoggingEventSink, NoOpEventSink};
    pub use crate::graph::{
        ActivityGraph, ActivityPolicy, ActivitySpec, Dependency, GraphBuilder, PipelineDefinition,
    };
}
