//! Test assertions for run reports.

use crate::core::ActivityState;
use crate::engine::RunReport;

/// Asserts that the run succeeded.
pub fn assert_run_succeeded(report: &RunReport) {
    assert!(
        report.success,
        "Expected run to succeed, failed: {:?}, skipped: {:?}",
        report.failed, report.skipped
    );
}

/// Asserts that the run did not succeed.
pub fn assert_run_failed(report: &RunReport) {
    assert!(!report.success, "Expected run to fail, but it succeeded");
}

/// Asserts the terminal state of one activity.
pub fn assert_activity_state(report: &RunReport, activity: &str, expected: ActivityState) {
    let actual = report.state_of(activity);
    assert_eq!(
        actual,
        Some(expected),
        "Expected '{}' to end {:?}, got {:?}",
        activity,
        expected,
        actual
    );
}

/// Asserts the number of attempts one activity made.
pub fn assert_attempts(report: &RunReport, activity: &str, expected: u32) {
    let actual = report.activity(activity).map(|a| a.attempts);
    assert_eq!(
        actual,
        Some(expected),
        "Expected '{}' to make {} attempt(s), got {:?}",
        activity,
        expected,
        actual
    );
}

/// Asserts that `first` ended before `second` started.
pub fn assert_finished_before(report: &RunReport, first: &str, second: &str) {
    let ended = report.activity(first).and_then(|a| a.ended_at);
    let started = report.activity(second).and_then(|a| a.started_at);
    match (ended, started) {
        (Some(ended), Some(started)) => assert!(
            ended <= started,
            "Expected '{first}' (ended {ended}) to finish before '{second}' (started {started})"
        ),
        _ => panic!("Expected both '{first}' and '{second}' to have run"),
    }
}
