//! Task structure and execution boundary

use crate::error::SchedError;
use crate::future::{self, Promise, TaskFuture};
use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};

/// Unique identifier for a Task (diagnostics only, never used for lookup)
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(u64);

static NEXT_TASK_ID: AtomicU64 = AtomicU64::new(1);

impl TaskId {
    /// Generate a new unique TaskId
    pub fn new() -> Self {
        TaskId(NEXT_TASK_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the numeric ID value
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// How a task's execution ended
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    /// Callable returned Ok
    Completed,
    /// Callable returned Err
    Failed,
    /// Callable panicked
    Panicked,
}

/// Type-erased body of a task: the callable, its params and the promise.
trait Job: Send {
    fn run(self: Box<Self>, name: &str) -> TaskOutcome;
    fn abort(self: Box<Self>, error: SchedError);
}

struct CallJob<P, F, R> {
    params: P,
    callable: F,
    promise: Promise<R>,
}

impl<P, F, R, E> Job for CallJob<P, F, R>
where
    P: Send,
    R: Send,
    F: FnOnce(P) -> Result<R, E> + Send,
    E: fmt::Display,
{
    fn run(self: Box<Self>, name: &str) -> TaskOutcome {
        let CallJob {
            params,
            callable,
            promise,
        } = *self;

        match panic::catch_unwind(AssertUnwindSafe(move || callable(params))) {
            Ok(Ok(value)) => {
                promise.resolve(Ok(value));
                TaskOutcome::Completed
            }
            Ok(Err(e)) => {
                promise.resolve(Err(SchedError::TaskFailure {
                    task: name.to_string(),
                    message: e.to_string(),
                }));
                TaskOutcome::Failed
            }
            Err(payload) => {
                promise.resolve(Err(SchedError::TaskPanicked {
                    task: name.to_string(),
                    message: panic_message(payload.as_ref()),
                }));
                TaskOutcome::Panicked
            }
        }
    }

    fn abort(self: Box<Self>, error: SchedError) {
        self.promise.resolve(Err(error));
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// A unit of deferred work.
///
/// A task owns its parameters outright: whatever the submitter hands over
/// is moved into the task and from there into the callable. It is run at
/// most once, and its future is resolved exactly once, either by [`run`]
/// or by [`abort`] (or, failing both, when the task is dropped).
///
/// [`run`]: Task::run
/// [`abort`]: Task::abort
pub struct Task {
    id: TaskId,
    name: String,
    job: Box<dyn Job>,
}

impl Task {
    /// Create a task and the future its result will be delivered to.
    ///
    /// The callable must report bad input through its `Err` value; a panic is
    /// caught and reported as [`SchedError::TaskPanicked`], but is still a bug.
    pub fn new<P, R, E, F>(name: impl Into<String>, callable: F, params: P) -> (Task, TaskFuture<R>)
    where
        P: Send + 'static,
        R: Send + 'static,
        E: fmt::Display + 'static,
        F: FnOnce(P) -> Result<R, E> + Send + 'static,
    {
        let name = name.into();
        let (promise, future) = future::channel(&name);
        let task = Task {
            id: TaskId::new(),
            name,
            job: Box::new(CallJob {
                params,
                callable,
                promise,
            }),
        };
        (task, future)
    }

    /// Get the Task's unique ID
    pub fn id(&self) -> TaskId {
        self.id
    }

    /// Diagnostic name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Execute the callable and resolve the future with its result
    pub fn run(self) -> TaskOutcome {
        self.job.run(&self.name)
    }

    /// Resolve the future with `error` without running the callable
    pub fn abort(self, error: SchedError) {
        self.job.abort(error)
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id)
            .field("name", &self.name)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_ids_are_unique() {
        let a = TaskId::new();
        let b = TaskId::new();
        assert_ne!(a, b);
        assert!(b > a);
    }

    #[test]
    fn test_run_success() {
        let (task, future) = Task::new("double", |x: i32| Ok::<_, String>(x * 2), 21);
        assert_eq!(task.name(), "double");
        assert_eq!(task.run(), TaskOutcome::Completed);
        assert_eq!(future.wait(), Ok(42));
    }

    #[test]
    fn test_run_failure() {
        let (task, future) = Task::new(
            "divide",
            |(a, b): (i32, i32)| a.checked_div(b).ok_or("division by zero"),
            (1, 0),
        );
        assert_eq!(task.run(), TaskOutcome::Failed);
        assert_eq!(
            future.wait(),
            Err(SchedError::TaskFailure {
                task: "divide".to_string(),
                message: "division by zero".to_string(),
            })
        );
    }

    #[test]
    fn test_run_panic_is_contained() {
        let (task, future) = Task::new(
            "explode",
            |_: ()| -> Result<(), String> { panic!("kaboom") },
            (),
        );
        assert_eq!(task.run(), TaskOutcome::Panicked);
        match future.wait() {
            Err(SchedError::TaskPanicked { task, message }) => {
                assert_eq!(task, "explode");
                assert_eq!(message, "kaboom");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_abort_skips_callable() {
        let (task, future) = Task::new(
            "never",
            |_: ()| -> Result<(), String> { panic!("must not run") },
            (),
        );
        task.abort(SchedError::PoolClosed);
        assert_eq!(future.wait(), Err(SchedError::PoolClosed));
    }

    #[test]
    fn test_params_are_moved_into_callable() {
        let buffer = vec![1u8, 2, 3];
        let (task, future) = Task::new(
            "sum",
            |buf: Vec<u8>| Ok::<_, String>(buf.into_iter().map(u32::from).sum::<u32>()),
            buffer,
        );
        task.run();
        assert_eq!(future.wait(), Ok(6));
    }
}
