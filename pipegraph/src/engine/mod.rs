//! Graph execution.
//!
//! [`Engine::run`] drives an [`crate::graph::ActivityGraph`] to completion
//! against a [`TaskExecutor`], applying each activity's retry and timeout
//! policy and propagating `Skipped` through unsatisfiable dependencies.

mod cancellation;
mod executor;
mod report;
mod retry;
mod run;
mod state;


pub use cancellation::CancellationToken;
pub use executor::{FnExecutor, TaskContext, TaskExecutor, TaskResult};
pub use report::{ActivityReport, RunReport};
pub use retry::{RetryDecision, RetryState};
pub use run::{run, Engine, FailureMode, RunOptions};
