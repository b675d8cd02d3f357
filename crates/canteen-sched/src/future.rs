//! One-shot result channel between a task and whoever submitted it
//!
//! A [`Promise`] is moved into the task and written exactly once by the worker
//! that runs it. The matching [`TaskFuture`] stays with the submitter, who may
//! block on it, poll it, or wait with a deadline.

use crate::error::{SchedError, SchedResult};
use parking_lot::{Condvar, Mutex};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

struct SlotState<R> {
    resolved: bool,
    result: Option<SchedResult<R>>,
}

struct Slot<R> {
    state: Mutex<SlotState<R>>,
    ready: Condvar,
}

impl<R> Slot<R> {
    fn fill(&self, result: SchedResult<R>) {
        let mut state = self.state.lock();
        debug_assert!(!state.resolved, "task result written twice");
        state.result = Some(result);
        state.resolved = true;
        self.ready.notify_all();
    }
}

/// Create a connected promise/future pair
pub fn channel<R>(task: &str) -> (Promise<R>, TaskFuture<R>) {
    let slot = Arc::new(Slot {
        state: Mutex::new(SlotState {
            resolved: false,
            result: None,
        }),
        ready: Condvar::new(),
    });
    (
        Promise {
            slot: Some(slot.clone()),
        },
        TaskFuture {
            task: task.to_string(),
            slot,
        },
    )
}

/// Write side of the result channel.
///
/// Dropping a promise that was never resolved resolves its future with
/// [`SchedError::PoolClosed`], so a future cannot be left pending by a task
/// that was discarded or lost.
pub struct Promise<R> {
    slot: Option<Arc<Slot<R>>>,
}

impl<R> Promise<R> {
    /// Resolve the future. Consumes the promise, so this happens at most once.
    pub fn resolve(mut self, result: SchedResult<R>) {
        if let Some(slot) = self.slot.take() {
            slot.fill(result);
        }
    }
}

impl<R> Drop for Promise<R> {
    fn drop(&mut self) {
        if let Some(slot) = self.slot.take() {
            slot.fill(Err(SchedError::PoolClosed));
        }
    }
}

/// Read side of the result channel, returned by `submit`.
pub struct TaskFuture<R> {
    task: String,
    slot: Arc<Slot<R>>,
}

impl<R> TaskFuture<R> {
    /// Name of the task this future belongs to
    pub fn task_name(&self) -> &str {
        &self.task
    }

    /// Whether the task has been resolved (success or failure)
    pub fn is_ready(&self) -> bool {
        self.slot.state.lock().resolved
    }

    /// Block until the task is resolved and take its result.
    ///
    /// If [`try_take`](Self::try_take) already took the result this returns
    /// `PoolClosed`, as does [`get`](Self::get).
    pub fn wait(self) -> SchedResult<R> {
        let mut state = self.slot.state.lock();
        while !state.resolved {
            self.slot.ready.wait(&mut state);
        }
        state.result.take().unwrap_or(Err(SchedError::PoolClosed))
    }

    /// Block until the task is resolved or `timeout` elapses.
    ///
    /// Returns true if the task is resolved. The task itself is not
    /// cancelled on timeout; it keeps its place in the queue or keeps running.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.slot.state.lock();
        while !state.resolved {
            if self.slot.ready.wait_until(&mut state, deadline).timed_out() {
                return state.resolved;
            }
        }
        true
    }

    /// Take the result without blocking.
    ///
    /// Returns `None` while the task is unresolved or after the result has
    /// already been taken. Once taken, `wait` and `get` report `PoolClosed`.
    pub fn try_take(&mut self) -> Option<SchedResult<R>> {
        let mut state = self.slot.state.lock();
        if state.resolved {
            state.result.take()
        } else {
            None
        }
    }
}

impl<R: Clone> TaskFuture<R> {
    /// Block until resolved and return a copy of the result.
    ///
    /// Unlike [`wait`](Self::wait) this can be called any number of times.
    pub fn get(&self) -> SchedResult<R> {
        let mut state = self.slot.state.lock();
        while !state.resolved {
            self.slot.ready.wait(&mut state);
        }
        state.result.clone().unwrap_or(Err(SchedError::PoolClosed))
    }
}

impl<R> fmt::Debug for TaskFuture<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskFuture")
            .field("task", &self.task)
            .field("ready", &self.is_ready())
            .finish()
    }
}
