//! Core domain model types for pipegraph.
//!
//! This module contains the fundamental types used throughout the framework:
//! - Activity state and dependency condition enums
//! - Opaque task references and compute hints
//! - Task outputs and executor-reported errors

mod status;
mod task;

pub use status::{ActivityState, DependencyCondition};
pub use task::{ComputeSpec, ComputeType, TaskError, TaskOutput, TaskRef};
