//! Mock executors for testing.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::core::{TaskError, TaskOutput};
use crate::engine::{TaskContext, TaskExecutor, TaskResult};

/// What a scripted attempt does.
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptedOutcome {
    /// Succeed with no output.
    Succeed,
    /// Succeed with the given output.
    SucceedWith(Value),
    /// Fail with a retryable error.
    Fail(String),
    /// Fail with an error the engine must not retry.
    FailFatal(String),
    /// Sleep, then succeed.
    Sleep(Duration),
    /// Never complete, ignoring cancellation.
    Hang,
    /// Complete with an error once the run is cancelled.
    WaitForCancel,
    /// Panic inside the task.
    Panic(String),
}

/// Decrements the in-flight counter when an attempt ends or is dropped.
struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// An executor that plays back per-activity outcome scripts and records every call.
///
/// Each attempt pops the next outcome scripted for its activity; once the
/// script is exhausted the fallback outcome is used.
#[derive(Debug)]
pub struct ScriptedExecutor {
    scripts: Mutex<HashMap<String, VecDeque<ScriptedOutcome>>>,
    fallback: ScriptedOutcome,
    calls: Mutex<Vec<(String, u32)>>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl Default for ScriptedExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedExecutor {
    /// Creates an executor where every attempt succeeds.
    #[must_use]
    pub fn new() -> Self {
        Self::with_fallback(ScriptedOutcome::Succeed)
    }

    /// Creates an executor that uses `fallback` for unscripted attempts.
    #[must_use]
    pub fn with_fallback(fallback: ScriptedOutcome) -> Self {
        Self {
            scripts: Mutex::new(HashMap::new()),
            fallback,
            calls: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    /// Scripts the outcomes of an activity's attempts, in order.
    #[must_use]
    pub fn script(
        self,
        activity: impl Into<String>,
        outcomes: impl IntoIterator<Item = ScriptedOutcome>,
    ) -> Self {
        self.scripts
            .lock()
            .entry(activity.into())
            .or_default()
            .extend(outcomes);
        self
    }

    /// Makes every attempt of an activity fail.
    #[must_use]
    pub fn failing(self, activity: impl Into<String>) -> Self {
        let activity = activity.into();
        let message = format!("{activity} failed");
        self.script(activity, std::iter::repeat(ScriptedOutcome::Fail(message)).take(64))
    }

    /// Returns every `(activity, attempt)` call in the order attempts started.
    #[must_use]
    pub fn calls(&self) -> Vec<(String, u32)> {
        self.calls.lock().clone()
    }

    /// Returns the number of attempts made for an activity.
    #[must_use]
    pub fn attempts(&self, activity: &str) -> usize {
        self.calls.lock().iter().filter(|(a, _)| a == activity).count()
    }

    /// Returns the activities in the order their first attempt started.
    #[must_use]
    pub fn start_order(&self) -> Vec<String> {
        let mut order: Vec<String> = Vec::new();
        for (activity, attempt) in self.calls.lock().iter() {
            if *attempt == 1 {
                order.push(activity.clone());
            }
        }
        order
    }

    /// Returns the largest number of attempts that were running at once.
    #[must_use]
    pub fn max_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    fn next_outcome(&self, activity: &str) -> ScriptedOutcome {
        self.scripts
            .lock()
            .get_mut(activity)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| self.fallback.clone())
    }
}

#[async_trait]
impl TaskExecutor for ScriptedExecutor {
    async fn execute(&self, ctx: TaskContext) -> TaskResult {
        self.calls.lock().push((ctx.activity.clone(), ctx.attempt));
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        let _guard = InFlight(&self.in_flight);

        match self.next_outcome(&ctx.activity) {
            ScriptedOutcome::Succeed => Ok(TaskOutput::empty()),
            ScriptedOutcome::SucceedWith(data) => Ok(TaskOutput::with_data(data)),
            ScriptedOutcome::Fail(message) => Err(TaskError::new(message)),
            ScriptedOutcome::FailFatal(message) => Err(TaskError::fatal(message)),
            ScriptedOutcome::Sleep(duration) => {
                tokio::time::sleep(duration).await;
                Ok(TaskOutput::empty())
            }
            ScriptedOutcome::Hang => std::future::pending().await,
            ScriptedOutcome::WaitForCancel => {
                ctx.cancellation.cancelled().await;
                Err(TaskError::new("stopped on cancellation"))
            }
            ScriptedOutcome::Panic(message) => panic!("{message}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::TaskRef;
    use crate::engine::CancellationToken;
    use std::sync::Arc;

    fn ctx(activity: &str, attempt: u32) -> TaskContext {
        TaskContext {
            activity: activity.into(),
            task: TaskRef::new(activity),
            attempt,
            compute: None,
            cancellation: Arc::new(CancellationToken::new()),
        }
    }

    #[tokio::test]
    async fn test_script_then_fallback() {
        let executor = ScriptedExecutor::new().script(
            "a",
            [ScriptedOutcome::Fail("first".into()), ScriptedOutcome::FailFatal("second".into())],
        );

        assert!(executor.execute(ctx("a", 1)).await.unwrap_err().retryable);
        assert!(!executor.execute(ctx("a", 2)).await.unwrap_err().retryable);
        assert!(executor.execute(ctx("a", 3)).await.is_ok());
        assert_eq!(executor.attempts("a"), 3);
        assert_eq!(executor.start_order(), vec!["a"]);
    }

    #[tokio::test]
    async fn test_output_passthrough() {
        let executor = ScriptedExecutor::new()
            .script("a", [ScriptedOutcome::SucceedWith(serde_json::json!({"rows": 10}))]);
        let output = executor.execute(ctx("a", 1)).await.unwrap();
        assert_eq!(output.data, Some(serde_json::json!({"rows": 10})));
    }

    #[tokio::test]
    async fn test_wait_for_cancel() {
        let executor = ScriptedExecutor::with_fallback(ScriptedOutcome::WaitForCancel);
        let context = ctx("a", 1);
        let token = context.cancellation.clone();

        let (result, ()) = tokio::join!(executor.execute(context), async {
            tokio::task::yield_now().await;
            token.cancel("stop");
        });
        assert!(result.is_err());
        assert_eq!(executor.max_concurrency(), 1);
    }
}
