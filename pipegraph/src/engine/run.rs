//! The execution engine.
//!
//! Activities are spawned as soon as their dependencies are satisfied and
//! their completions are collected from a `FuturesUnordered`. The scheduling
//! loop owns all per-activity state; spawned tasks only share the run's
//! cancellation token and the event sink.

use super::cancellation::CancellationToken;
use super::executor::{TaskContext, TaskExecutor};
use super::report::RunReport;
use super::retry::{RetryDecision, RetryState};
use super::state::{ActivityExecution, Propagation, RunState};
use crate::config::{PipegraphConfig, TargetConfig};
use crate::core::TaskOutput;
use crate::errors::ActivityError;
use crate::events::{types, EventSink, NoOpEventSink};
use crate::graph::{ActivityGraph, ActivitySpec};
use crate::observability::activity_span;
use chrono::{DateTime, Utc};
use futures::stream::{FuturesUnordered, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::{AbortHandle, JoinError};
use tokio::time::Instant;
use tracing::{debug, info, warn, Instrument};
use uuid::Uuid;

const DEFAULT_CANCEL_REASON: &str = "run cancelled";

/// How a failed activity affects the rest of the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureMode {
    /// Failures only affect the failed activity's dependents.
    #[default]
    ContinueOnFailure,
    /// The first failure aborts the whole run.
    FailFast,
}

/// Options for one engine.
#[derive(Clone)]
pub struct RunOptions {
    /// Upper bound on concurrently running activities.
    pub max_parallelism: Option<usize>,
    /// How a failed activity affects the rest of the run.
    pub failure_mode: FailureMode,
    /// How long an abort waits for running activities before aborting their tasks.
    pub cancel_grace: Duration,
    /// External abort signal. Cancelling it aborts any run in progress.
    pub cancellation: Arc<CancellationToken>,
    /// Receives run and activity events.
    pub event_sink: Arc<dyn EventSink>,
    /// Deployment scope recorded in the report.
    pub target: Option<TargetConfig>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            max_parallelism: None,
            failure_mode: FailureMode::default(),
            cancel_grace: Duration::from_secs(30),
            cancellation: Arc::new(CancellationToken::new()),
            event_sink: Arc::new(NoOpEventSink),
            target: None,
        }
    }
}

impl std::fmt::Debug for RunOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunOptions")
            .field("max_parallelism", &self.max_parallelism)
            .field("failure_mode", &self.failure_mode)
            .field("cancel_grace", &self.cancel_grace)
            .field("cancellation", &self.cancellation)
            .field("target", &self.target)
            .finish_non_exhaustive()
    }
}

impl RunOptions {
    /// Creates default options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds options from a loaded configuration.
    #[must_use]
    pub fn from_config(config: &PipegraphConfig) -> Self {
        Self {
            max_parallelism: config.engine.max_parallelism,
            failure_mode: config.engine.failure_mode,
            cancel_grace: config.engine.cancel_grace(),
            target: config.target.clone(),
            ..Self::default()
        }
    }

    /// Limits how many activities run at once.
    #[must_use]
    pub fn with_max_parallelism(mut self, limit: usize) -> Self {
        self.max_parallelism = Some(limit);
        self
    }

    /// Sets the failure mode.
    #[must_use]
    pub fn with_failure_mode(mut self, mode: FailureMode) -> Self {
        self.failure_mode = mode;
        self
    }

    /// Sets the cancel grace period.
    #[must_use]
    pub fn with_cancel_grace(mut self, grace: Duration) -> Self {
        self.cancel_grace = grace;
        self
    }

    /// Uses an external cancellation token.
    #[must_use]
    pub fn with_cancellation(mut self, token: Arc<CancellationToken>) -> Self {
        self.cancellation = token;
        self
    }

    /// Sets the event sink.
    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.event_sink = sink;
        self
    }

    /// Sets the deployment scope.
    #[must_use]
    pub fn with_target(mut self, target: TargetConfig) -> Self {
        self.target = Some(target);
        self
    }
}

/// Runs activity graphs against an executor.
#[derive(Debug, Default, Clone)]
pub struct Engine {
    options: RunOptions,
}

/// A spawned activity as seen by the scheduling loop.
struct Launched {
    abort: AbortHandle,
    attempts: Arc<AtomicU32>,
    started_at: DateTime<Utc>,
    clock: Instant,
}

impl Launched {
    /// Builds the outcome of a task that panicked or was aborted.
    fn interrupted(self, err: &JoinError, token: &CancellationToken) -> ActivityExecution {
        let error = if err.is_cancelled() {
            cancelled(token)
        } else {
            ActivityError::TaskExecution {
                message: format!("task panicked: {err}"),
                details: None,
            }
        };
        ActivityExecution {
            attempts: self.attempts.load(Ordering::SeqCst),
            started_at: self.started_at,
            ended_at: Utc::now(),
            duration_ms: elapsed_ms(self.clock),
            result: Err(error),
        }
    }
}

impl Engine {
    /// Creates an engine with the given options.
    #[must_use]
    pub fn new(options: RunOptions) -> Self {
        Self { options }
    }

    /// Returns the engine options.
    #[must_use]
    pub fn options(&self) -> &RunOptions {
        &self.options
    }

    /// Executes every activity of `graph` and returns the final report.
    ///
    /// Never fails: activity failures, timeouts and aborts are recorded in
    /// the report.
    pub async fn run<E>(&self, graph: &ActivityGraph, executor: Arc<E>) -> RunReport
    where
        E: TaskExecutor + ?Sized + 'static,
    {
        let options = &self.options;
        let sink = options.event_sink.clone();
        let token = Arc::new(CancellationToken::new());
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let clock = Instant::now();
        let limit = options.max_parallelism.unwrap_or(usize::MAX).max(1);

        info!(
            run_id = %run_id,
            pipeline = %graph.name(),
            activities = graph.len(),
            "Starting pipeline run"
        );
        sink.try_emit(
            types::RUN_STARTED,
            Some(json!({
                "run_id": run_id,
                "pipeline": graph.name(),
                "order": graph.topological_order(),
            })),
        );

        let order = graph.order_positions();
        let mut rank = vec![0; graph.len()];
        for (r, &position) in order.iter().enumerate() {
            rank[position] = r;
        }

        let mut state = RunState::new(graph);
        let mut ready = BTreeSet::new();
        for position in state.initial_ready() {
            emit_ready(sink.as_ref(), run_id, state.name(position));
            ready.insert(rank[position]);
        }

        let mut active = FuturesUnordered::new();
        let mut running: HashMap<usize, Launched> = HashMap::new();
        let mut grace_deadline: Option<Instant> = None;
        let mut aborted = false;

        loop {
            if options.cancellation.is_cancelled() {
                token.cancel(cancel_reason(&options.cancellation));
            }
            if token.is_cancelled() {
                let reason = cancel_reason(&token);
                if grace_deadline.is_none() {
                    warn!(
                        run_id = %run_id,
                        reason = %reason,
                        running = running.len(),
                        "Cancelling pipeline run"
                    );
                    sink.try_emit(
                        types::RUN_CANCELLING,
                        Some(json!({"run_id": run_id, "reason": reason})),
                    );
                    grace_deadline = Some(Instant::now() + options.cancel_grace);
                }
                for position in state.skip_unstarted(&reason) {
                    emit_skipped(&state, sink.as_ref(), run_id, position);
                }
                ready.clear();
            }

            while running.len() < limit {
                let Some(r) = ready.pop_first() else {
                    break;
                };
                let position = order[r];
                if !state.mark_running(position) {
                    continue;
                }

                let spec = graph.spec_at(position).clone();
                debug!(run_id = %run_id, activity = %spec.name, task = %spec.task, "Launching activity");
                sink.try_emit(
                    types::ACTIVITY_STARTED,
                    Some(json!({"run_id": run_id, "activity": spec.name, "task": spec.task})),
                );

                let span = activity_span(run_id, &spec.name, &spec.task.to_string());
                let attempts = Arc::new(AtomicU32::new(0));
                let handle = tokio::spawn(
                    execute_activity(
                        spec,
                        executor.clone(),
                        token.clone(),
                        sink.clone(),
                        attempts.clone(),
                        run_id,
                    )
                    .instrument(span),
                );
                running.insert(
                    position,
                    Launched {
                        abort: handle.abort_handle(),
                        attempts,
                        started_at: Utc::now(),
                        clock: Instant::now(),
                    },
                );
                active.push(async move { (position, handle.await) });
            }

            if active.is_empty() {
                break;
            }

            let deadline = grace_deadline.unwrap_or_else(Instant::now);
            tokio::select! {
                Some((position, joined)) = active.next() => {
                    let Some(launched) = running.remove(&position) else {
                        continue;
                    };
                    let execution = match joined {
                        Ok(execution) => execution,
                        Err(err) => launched.interrupted(&err, &token),
                    };
                    let failed = execution.result.is_err();
                    emit_finished(sink.as_ref(), run_id, state.name(position), &execution);

                    let Propagation { ready: newly_ready, skipped } = state.resolve(position, execution);
                    for child in skipped {
                        emit_skipped(&state, sink.as_ref(), run_id, child);
                    }
                    for child in newly_ready {
                        emit_ready(sink.as_ref(), run_id, state.name(child));
                        ready.insert(rank[child]);
                    }

                    if failed && options.failure_mode == FailureMode::FailFast {
                        token.cancel(format!("activity '{}' failed", state.name(position)));
                    }
                }
                () = options.cancellation.cancelled(), if !token.is_cancelled() => {
                    token.cancel(cancel_reason(&options.cancellation));
                }
                () = tokio::time::sleep_until(deadline), if grace_deadline.is_some() && !aborted => {
                    warn!(
                        run_id = %run_id,
                        running = running.len(),
                        "Cancel grace elapsed, aborting running activities"
                    );
                    for launched in running.values() {
                        launched.abort.abort();
                    }
                    aborted = true;
                }
                else => break,
            }
        }

        let report = state.into_report(RunReport {
            run_id,
            pipeline: graph.name().to_string(),
            target: options.target.clone(),
            success: false,
            started_at,
            ended_at: Utc::now(),
            duration_ms: elapsed_ms(clock),
            activities: Vec::with_capacity(graph.len()),
            failed: Vec::new(),
            skipped: Vec::new(),
            cancel_reason: token.reason(),
        });

        if report.success {
            info!(
                run_id = %run_id,
                pipeline = %report.pipeline,
                duration_ms = report.duration_ms,
                "Pipeline run succeeded"
            );
        } else {
            warn!(
                run_id = %run_id,
                pipeline = %report.pipeline,
                failed = ?report.failed,
                skipped = ?report.skipped,
                duration_ms = report.duration_ms,
                "Pipeline run did not succeed"
            );
        }
        sink.try_emit(
            types::RUN_COMPLETED,
            Some(json!({
                "run_id": run_id,
                "success": report.success,
                "failed": report.failed,
                "skipped": report.skipped,
                "duration_ms": report.duration_ms,
            })),
        );

        report
    }
}

/// Runs a graph with default options.
pub async fn run<E>(graph: &ActivityGraph, executor: Arc<E>) -> RunReport
where
    E: TaskExecutor + ?Sized + 'static,
{
    Engine::default().run(graph, executor).await
}

/// Runs one activity: attempts and retries under a single overall timeout.
async fn execute_activity<E>(
    spec: ActivitySpec,
    executor: Arc<E>,
    token: Arc<CancellationToken>,
    sink: Arc<dyn EventSink>,
    attempts: Arc<AtomicU32>,
    run_id: Uuid,
) -> ActivityExecution
where
    E: TaskExecutor + ?Sized,
{
    let started_at = Utc::now();
    let clock = Instant::now();

    let attempt_loop = run_attempts(
        &spec,
        executor.as_ref(),
        &token,
        sink.as_ref(),
        &attempts,
        run_id,
    );
    let result = match tokio::time::timeout(spec.policy.timeout(), attempt_loop).await {
        Ok(result) => result,
        Err(_) => Err(ActivityError::TimeoutExceeded {
            timeout_seconds: spec.policy.timeout_seconds,
            attempts: attempts.load(Ordering::SeqCst),
        }),
    };

    ActivityExecution {
        attempts: attempts.load(Ordering::SeqCst),
        started_at,
        ended_at: Utc::now(),
        duration_ms: elapsed_ms(clock),
        result,
    }
}

async fn run_attempts<E>(
    spec: &ActivitySpec,
    executor: &E,
    token: &Arc<CancellationToken>,
    sink: &dyn EventSink,
    attempts: &AtomicU32,
    run_id: Uuid,
) -> Result<TaskOutput, ActivityError>
where
    E: TaskExecutor + ?Sized,
{
    let mut retry = RetryState::new();

    loop {
        if token.is_cancelled() {
            return Err(cancelled(token));
        }

        let attempt = attempts.fetch_add(1, Ordering::SeqCst) + 1;
        let ctx = TaskContext {
            activity: spec.name.clone(),
            task: spec.task.clone(),
            attempt,
            compute: spec.compute,
            cancellation: token.clone(),
        };

        let error = match executor.execute(ctx).await {
            Ok(output) => return Ok(output),
            Err(error) => error,
        };
        if token.is_cancelled() {
            return Err(cancelled(token));
        }

        match retry.decide(&spec.policy, &error) {
            RetryDecision::Retry(delay) => {
                let delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
                warn!(
                    run_id = %run_id,
                    activity = %spec.name,
                    attempt,
                    delay_ms,
                    error = %error,
                    "Attempt failed, retrying"
                );
                sink.try_emit(
                    types::ACTIVITY_RETRYING,
                    Some(json!({
                        "run_id": run_id,
                        "activity": spec.name,
                        "attempt": attempt,
                        "delay_ms": delay_ms,
                        "error": error.message,
                    })),
                );
                tokio::select! {
                    () = tokio::time::sleep(delay) => {}
                    () = token.cancelled() => return Err(cancelled(token)),
                }
            }
            RetryDecision::GiveUp | RetryDecision::NotRetryable => {
                return Err(ActivityError::TaskExecution {
                    message: error.message,
                    details: error.details,
                });
            }
        }
    }
}

fn cancelled(token: &CancellationToken) -> ActivityError {
    ActivityError::Cancelled {
        reason: cancel_reason(token),
    }
}

fn cancel_reason(token: &CancellationToken) -> String {
    token
        .reason()
        .unwrap_or_else(|| DEFAULT_CANCEL_REASON.to_string())
}

fn elapsed_ms(clock: Instant) -> f64 {
    clock.elapsed().as_secs_f64() * 1000.0
}

fn emit_ready(sink: &dyn EventSink, run_id: Uuid, activity: &str) {
    debug!(run_id = %run_id, activity = %activity, "Activity ready");
    sink.try_emit(
        types::ACTIVITY_READY,
        Some(json!({"run_id": run_id, "activity": activity})),
    );
}

fn emit_skipped(state: &RunState<'_>, sink: &dyn EventSink, run_id: Uuid, position: usize) {
    let activity = state.name(position);
    let error = state.error(position);
    info!(
        run_id = %run_id,
        activity = %activity,
        reason = %error.map(ToString::to_string).unwrap_or_default(),
        "Activity skipped"
    );
    sink.try_emit(
        types::ACTIVITY_SKIPPED,
        Some(json!({"run_id": run_id, "activity": activity, "error": error})),
    );
}

fn emit_finished(sink: &dyn EventSink, run_id: Uuid, activity: &str, execution: &ActivityExecution) {
    match &execution.result {
        Ok(_) => {
            info!(
                run_id = %run_id,
                activity = %activity,
                attempts = execution.attempts,
                duration_ms = execution.duration_ms,
                "Activity succeeded"
            );
            sink.try_emit(
                types::ACTIVITY_SUCCEEDED,
                Some(json!({
                    "run_id": run_id,
                    "activity": activity,
                    "attempts": execution.attempts,
                    "duration_ms": execution.duration_ms,
                })),
            );
        }
        Err(error) => {
            warn!(
                run_id = %run_id,
                activity = %activity,
                attempts = execution.attempts,
                error = %error,
                "Activity failed"
            );
            sink.try_emit(
                types::ACTIVITY_FAILED,
                Some(json!({
                    "run_id": run_id,
                    "activity": activity,
                    "attempts": execution.attempts,
                    "duration_ms": execution.duration_ms,
                    "error": error,
                })),
            );
        }
    }
}
