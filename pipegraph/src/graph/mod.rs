//! Activity graph definition and validation.
//!
//! This module provides:
//! - Activity specifications and execution policies
//! - A builder that validates names, policies, references and acyclicity
//! - The immutable activity graph with its topological order
//! - Import/export of orchestrator pipeline documents

mod builder;
mod dag;
pub mod definition;
mod policy;
mod spec;

pub use builder::GraphBuilder;
pub use dag::ActivityGraph;
pub use definition::{format_timespan, parse_timespan, PipelineDefinition};
pub use policy::{ActivityPolicy, BackoffStrategy, JitterStrategy};
pub use spec::{ActivitySpec, Dependency};
