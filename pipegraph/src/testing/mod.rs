//! Testing utilities for activity graphs.
//!
//! This module provides:
//! - A scripted mock executor
//! - Assertions over run reports
//! - Canned graphs, including the NYC payroll pipeline

mod assertions;
mod fixtures;
mod mocks;

pub use assertions::{
    assert_activity_state, assert_attempts, assert_finished_before, assert_run_failed,
    assert_run_succeeded,
};
pub use fixtures::{
    chain, fan_in, payroll_builder, payroll_pipeline_definition, PAYROLL_MASTER_LOADS,
    PAYROLL_PIPELINE,
};
pub use mocks::{ScriptedExecutor, ScriptedOutcome};
