//! Per-run activity state owned by the engine.

use super::report::{ActivityReport, RunReport};
use crate::core::{ActivityState, TaskOutput};
use crate::errors::ActivityError;
use crate::graph::ActivityGraph;
use chrono::{DateTime, Utc};
use tracing::warn;

/// What one spawned activity reported back.
#[derive(Debug, Clone)]
pub(crate) struct ActivityExecution {
    pub attempts: u32,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub duration_ms: f64,
    pub result: Result<TaskOutput, ActivityError>,
}

/// Readiness of a pending activity.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Readiness {
    /// Every dependency is satisfied.
    Ready,
    /// Some dependency has not resolved yet.
    Blocked,
    /// A resolved dependency can no longer be satisfied.
    Unsatisfiable(ActivityError),
}

/// Activities whose state changed while propagating an outcome.
#[derive(Debug, Default)]
pub(crate) struct Propagation {
    pub ready: Vec<usize>,
    pub skipped: Vec<usize>,
}

#[derive(Debug, Default, Clone)]
struct ActivityRun {
    state: ActivityState,
    attempts: u32,
    started_at: Option<DateTime<Utc>>,
    ended_at: Option<DateTime<Utc>>,
    duration_ms: Option<f64>,
    error: Option<ActivityError>,
    output: Option<serde_json::Value>,
}

/// Run-time trace of every activity, indexed by input position.
///
/// The graph itself is never mutated.
#[derive(Debug)]
pub(crate) struct RunState<'g> {
    graph: &'g ActivityGraph,
    runs: Vec<ActivityRun>,
}

impl<'g> RunState<'g> {
    pub fn new(graph: &'g ActivityGraph) -> Self {
        Self {
            graph,
            runs: vec![ActivityRun::default(); graph.len()],
        }
    }

    pub fn state(&self, position: usize) -> ActivityState {
        self.runs[position].state
    }

    pub fn name(&self, position: usize) -> &'g str {
        &self.graph.spec_at(position).name
    }

    pub fn error(&self, position: usize) -> Option<&ActivityError> {
        self.runs[position].error.as_ref()
    }

    fn transition(&mut self, position: usize, next: ActivityState) -> bool {
        let current = self.runs[position].state;
        if current.can_transition_to(next) {
            self.runs[position].state = next;
            true
        } else {
            warn!(
                activity = %self.name(position),
                from = %current,
                to = %next,
                "Ignoring illegal state transition"
            );
            false
        }
    }

    /// Evaluates the dependencies of a pending activity.
    pub fn evaluate(&self, position: usize) -> Readiness {
        let spec = self.graph.spec_at(position);
        let mut blocked = false;

        for dep in &spec.dependencies {
            let Some(upstream) = self.graph.position(&dep.activity) else {
                continue;
            };
            let state = self.runs[upstream].state;
            if !state.is_terminal() {
                blocked = true;
            } else if !dep.is_satisfied_by(state) {
                return Readiness::Unsatisfiable(ActivityError::UnsatisfiedDependency {
                    dependency: dep.activity.clone(),
                    state,
                    required: dep.conditions.clone(),
                });
            }
        }

        if blocked {
            Readiness::Blocked
        } else {
            Readiness::Ready
        }
    }

    /// Promotes every activity with no unresolved dependency, in topological order.
    pub fn initial_ready(&mut self) -> Vec<usize> {
        let mut ready = Vec::new();
        for &position in self.graph.order_positions() {
            if self.runs[position].state == ActivityState::Pending
                && self.evaluate(position) == Readiness::Ready
                && self.transition(position, ActivityState::Ready)
            {
                ready.push(position);
            }
        }
        ready
    }

    pub fn mark_running(&mut self, position: usize) -> bool {
        self.transition(position, ActivityState::Running)
    }

    /// Records the outcome of a running activity and re-evaluates everything downstream.
    pub fn resolve(&mut self, position: usize, execution: ActivityExecution) -> Propagation {
        let next = if execution.result.is_ok() {
            ActivityState::Succeeded
        } else {
            ActivityState::Failed
        };
        if !self.transition(position, next) {
            return Propagation::default();
        }

        let run = &mut self.runs[position];
        run.attempts = execution.attempts;
        run.started_at = Some(execution.started_at);
        run.ended_at = Some(execution.ended_at);
        run.duration_ms = Some(execution.duration_ms);
        match execution.result {
            Ok(output) => run.output = output.data,
            Err(error) => run.error = Some(error),
        }

        self.propagate(position)
    }

    /// Walks downstream of a newly terminal activity, promoting or skipping dependents.
    fn propagate(&mut self, position: usize) -> Propagation {
        let mut result = Propagation::default();
        let mut worklist = vec![position];

        while let Some(node) = worklist.pop() {
            for &child in self.graph.downstream_of(node) {
                if self.runs[child].state != ActivityState::Pending {
                    continue;
                }
                match self.evaluate(child) {
                    Readiness::Blocked => {}
                    Readiness::Ready => {
                        if self.transition(child, ActivityState::Ready) {
                            result.ready.push(child);
                        }
                    }
                    Readiness::Unsatisfiable(error) => {
                        if self.transition(child, ActivityState::Skipped) {
                            self.runs[child].error = Some(error);
                            result.skipped.push(child);
                            worklist.push(child);
                        }
                    }
                }
            }
        }

        result
    }

    /// Skips every activity that has not started, returning their positions.
    pub fn skip_unstarted(&mut self, reason: &str) -> Vec<usize> {
        let mut skipped = Vec::new();
        for &position in self.graph.order_positions() {
            let state = self.runs[position].state;
            if matches!(state, ActivityState::Pending | ActivityState::Ready)
                && self.transition(position, ActivityState::Skipped)
            {
                self.runs[position].error = Some(ActivityError::Cancelled {
                    reason: reason.to_string(),
                });
                skipped.push(position);
            }
        }
        skipped
    }

    /// Returns true iff every activity not allowed to skip ended `Succeeded`.
    pub fn is_success(&self) -> bool {
        self.graph.activities().iter().zip(&self.runs).all(|(spec, run)| {
            run.state == ActivityState::Succeeded
                || (spec.allow_skip && run.state == ActivityState::Skipped)
        })
    }

    /// Builds the per-activity part of the report, in topological order.
    pub fn into_report(self, mut report: RunReport) -> RunReport {
        report.success = self.is_success();
        for &position in self.graph.order_positions() {
            let spec = self.graph.spec_at(position);
            let run = &self.runs[position];
            match run.state {
                ActivityState::Failed => report.failed.push(spec.name.clone()),
                ActivityState::Skipped => report.skipped.push(spec.name.clone()),
                _ => {}
            }
            report.activities.push(ActivityReport {
                name: spec.name.clone(),
                task: spec.task.clone(),
                state: run.state,
                attempts: run.attempts,
                started_at: run.started_at,
                ended_at: run.ended_at,
                duration_ms: run.duration_ms,
                error: run.error.clone(),
                output: run.output.clone(),
            });
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{DependencyCondition, TaskRef};
    use crate::graph::{ActivitySpec, Dependency};

    fn activity(name: &str) -> ActivitySpec {
        ActivitySpec::new(name, TaskRef::new(name))
    }

    fn execution(result: Result<TaskOutput, ActivityError>) -> ActivityExecution {
        let now = Utc::now();
        ActivityExecution {
            attempts: 1,
            started_at: now,
            ended_at: now,
            duration_ms: 0.0,
            result,
        }
    }

    fn failure() -> Result<TaskOutput, ActivityError> {
        Err(ActivityError::TaskExecution {
            message: "boom".into(),
            details: None,
        })
    }

    fn run_to_running(state: &mut RunState<'_>, position: usize) {
        assert!(state.mark_running(position));
    }

    #[test]
    fn test_initial_ready_are_roots() {
        let graph = ActivityGraph::build(
            "g",
            vec![activity("a"), activity("b").depends_on("a"), activity("c")],
        )
        .unwrap();
        let mut state = RunState::new(&graph);

        assert_eq!(state.initial_ready(), vec![0, 2]);
        assert_eq!(state.state(1), ActivityState::Pending);
    }

    #[test]
    fn test_failure_skips_transitively() {
        let graph = ActivityGraph::build(
            "g",
            vec![
                activity("a"),
                activity("b").depends_on("a"),
                activity("c").depends_on("b"),
            ],
        )
        .unwrap();
        let mut state = RunState::new(&graph);
        state.initial_ready();
        run_to_running(&mut state, 0);

        let propagation = state.resolve(0, execution(failure()));

        assert!(propagation.ready.is_empty());
        assert_eq!(propagation.skipped, vec![1, 2]);
        assert_eq!(state.state(2), ActivityState::Skipped);
        assert!(!state.is_success());
    }

    #[test]
    fn test_failure_handler_becomes_ready() {
        let graph = ActivityGraph::build(
            "g",
            vec![
                activity("load"),
                activity("on_error")
                    .depends_on_with("load", DependencyCondition::Failed)
                    .allow_skip(),
                activity("on_skip").depends_on_with("on_error", DependencyCondition::Skipped),
            ],
        )
        .unwrap();
        let mut state = RunState::new(&graph);
        state.initial_ready();
        run_to_running(&mut state, 0);

        let propagation = state.resolve(0, execution(Ok(TaskOutput::empty())));

        assert_eq!(propagation.skipped, vec![1]);
        assert_eq!(propagation.ready, vec![2]);
    }

    #[test]
    fn test_blocked_until_all_dependencies_resolve() {
        let graph = ActivityGraph::build(
            "g",
            vec![
                activity("a"),
                activity("b"),
                activity("c").with_dependency(Dependency::succeeded("a")).depends_on("b"),
            ],
        )
        .unwrap();
        let mut state = RunState::new(&graph);
        state.initial_ready();
        run_to_running(&mut state, 0);
        run_to_running(&mut state, 1);

        assert!(state.resolve(0, execution(Ok(TaskOutput::empty()))).ready.is_empty());
        assert_eq!(state.evaluate(2), Readiness::Blocked);
        assert_eq!(state.resolve(1, execution(Ok(TaskOutput::empty()))).ready, vec![2]);
    }

    #[test]
    fn test_terminal_state_is_final() {
        let graph = ActivityGraph::build("g", vec![activity("a")]).unwrap();
        let mut state = RunState::new(&graph);
        state.initial_ready();
        run_to_running(&mut state, 0);
        state.resolve(0, execution(Ok(TaskOutput::empty())));

        // A second outcome for the same activity is ignored.
        state.resolve(0, execution(failure()));
        assert_eq!(state.state(0), ActivityState::Succeeded);
        assert!(state.skip_unstarted("late").is_empty());
    }

    #[test]
    fn test_skip_unstarted() {
        let graph = ActivityGraph::build(
            "g",
            vec![activity("a"), activity("b").depends_on("a"), activity("c")],
        )
        .unwrap();
        let mut state = RunState::new(&graph);
        state.initial_ready();
        run_to_running(&mut state, 0);

        assert_eq!(state.skip_unstarted("abort"), vec![1, 2]);
        assert_eq!(state.state(0), ActivityState::Running);
    }
}
