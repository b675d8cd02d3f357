//! Scheduler error types

/// Errors surfaced by the scheduler, either synchronously from `submit`
/// or through a task's [`TaskFuture`](crate::TaskFuture).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchedError {
    /// The pool is shutting down or terminated. Returned by `submit`, and
    /// used to resolve queued tasks discarded by a non-graceful shutdown.
    #[error("worker pool is closed")]
    PoolClosed,

    /// The task's callable returned an error
    #[error("task '{task}' failed: {message}")]
    TaskFailure {
        /// Diagnostic name of the task
        task: String,
        /// Rendered error returned by the callable
        message: String,
    },

    /// The task's callable panicked; the worker survived
    #[error("task '{task}' panicked: {message}")]
    TaskPanicked {
        /// Diagnostic name of the task
        task: String,
        /// Panic payload, if it was a string
        message: String,
    },

    /// The pool could not start its workers
    #[error("failed to initialize worker pool: {0}")]
    FatalInit(String),
}

impl SchedError {
    /// True for failures produced by the task itself (error or panic).
    pub fn is_task_failure(&self) -> bool {
        matches!(
            self,
            SchedError::TaskFailure { .. } | SchedError::TaskPanicked { .. }
        )
    }
}

/// Scheduler result
pub type SchedResult<T> = Result<T, SchedError>;
