//! The executor seam: how activities hand work to the outside world.

use super::CancellationToken;
use crate::core::{ComputeSpec, TaskError, TaskOutput, TaskRef};
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;

/// Result of a single task attempt.
pub type TaskResult = Result<TaskOutput, TaskError>;

/// Everything an executor learns about one attempt.
#[derive(Debug, Clone)]
pub struct TaskContext {
    /// Name of the activity being executed.
    pub activity: String,
    /// The unit of work to run.
    pub task: TaskRef,
    /// 1-based attempt number.
    pub attempt: u32,
    /// Compute sizing hint from the activity spec.
    pub compute: Option<ComputeSpec>,
    /// The run's cancellation token.
    pub cancellation: Arc<CancellationToken>,
}

impl TaskContext {
    /// Returns true if the run has been aborted.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }
}

/// Trait for collaborators that perform the work an activity references.
///
/// Each call is one attempt; retries and timeouts are applied by the engine.
#[async_trait]
pub trait TaskExecutor: Send + Sync {
    /// Executes one attempt of a task.
    async fn execute(&self, ctx: TaskContext) -> TaskResult;
}

#[async_trait]
impl<T: TaskExecutor + ?Sized> TaskExecutor for Arc<T> {
    async fn execute(&self, ctx: TaskContext) -> TaskResult {
        (**self).execute(ctx).await
    }
}

/// An executor backed by an async closure.
pub struct FnExecutor<F> {
    func: F,
}

impl<F, Fut> FnExecutor<F>
where
    F: Fn(TaskContext) -> Fut + Send + Sync,
    Fut: Future<Output = TaskResult> + Send,
{
    /// Creates a new closure-backed executor.
    pub fn new(func: F) -> Self {
        Self { func }
    }
}

impl<F> std::fmt::Debug for FnExecutor<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnExecutor").finish_non_exhaustive()
    }
}

#[async_trait]
impl<F, Fut> TaskExecutor for FnExecutor<F>
where
    F: Fn(TaskContext) -> Fut + Send + Sync,
    Fut: Future<Output = TaskResult> + Send,
{
    async fn execute(&self, ctx: TaskContext) -> TaskResult {
        (self.func)(ctx).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context(attempt: u32) -> TaskContext {
        TaskContext {
            activity: "Load_EmpMaster".into(),
            task: TaskRef::data_flow("df_Load_EmpMaster"),
            attempt,
            compute: None,
            cancellation: Arc::new(CancellationToken::new()),
        }
    }

    #[tokio::test]
    async fn test_fn_executor() {
        let executor = FnExecutor::new(|ctx: TaskContext| async move {
            if ctx.attempt == 1 {
                Err(TaskError::new("cold start"))
            } else {
                Ok(TaskOutput::with_data(serde_json::json!({"task": ctx.task.name})))
            }
        });

        assert!(executor.execute(context(1)).await.is_err());
        let output = executor.execute(context(2)).await.unwrap();
        assert_eq!(output.data.unwrap()["task"], "df_Load_EmpMaster");
    }

    #[tokio::test]
    async fn test_arc_dyn_executor() {
        let executor: Arc<dyn TaskExecutor> =
            Arc::new(FnExecutor::new(|_ctx: TaskContext| async { Ok(TaskOutput::empty()) }));
        assert!(executor.execute(context(1)).await.is_ok());
    }

    #[test]
    fn test_context_sees_cancellation() {
        let ctx = context(1);
        assert!(!ctx.is_cancelled());
        ctx.cancellation.cancel("stop");
        assert!(ctx.is_cancelled());
    }
}
