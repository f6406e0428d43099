//! Run and activity events.
//!
//! The engine reports every state transition to an [`EventSink`] handed to it
//! through `RunOptions`. Event payloads are JSON objects that always carry the
//! `run_id`; activity events also carry the `activity` name.

mod sink;

pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};

/// Event type names emitted by the engine.
pub mod types {
    /// A run has started.
    pub const RUN_STARTED: &str = "run.started";
    /// A graph-level abort was requested.
    pub const RUN_CANCELLING: &str = "run.cancelling";
    /// A run has finished and its report is final.
    pub const RUN_COMPLETED: &str = "run.completed";
    /// All dependencies of an activity are satisfied.
    pub const ACTIVITY_READY: &str = "activity.ready";
    /// An activity was handed to the executor.
    pub const ACTIVITY_STARTED: &str = "activity.started";
    /// An attempt failed and another will follow.
    pub const ACTIVITY_RETRYING: &str = "activity.retrying";
    /// An activity ended `Succeeded`.
    pub const ACTIVITY_SUCCEEDED: &str = "activity.succeeded";
    /// An activity ended `Failed`.
    pub const ACTIVITY_FAILED: &str = "activity.failed";
    /// An activity ended `Skipped`.
    pub const ACTIVITY_SKIPPED: &str = "activity.skipped";
}
