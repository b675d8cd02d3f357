//! Closable FIFO task queue shared by all workers
//!
//! One mutex guards the task list and the closed flag; one condvar wakes idle
//! workers. Workers block on the condvar while the queue is empty and open,
//! they never spin.

use crate::error::SchedError;
use crate::task::Task;
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;

struct QueueState {
    tasks: VecDeque<Task>,
    closed: bool,
}

/// Thread-safe FIFO of pending tasks
pub struct TaskQueue {
    state: Mutex<QueueState>,
    not_empty_or_closed: Condvar,
}

impl TaskQueue {
    /// Create an open, empty queue
    pub fn new() -> Self {
        Self {
            state: Mutex::new(QueueState {
                tasks: VecDeque::new(),
                closed: false,
            }),
            not_empty_or_closed: Condvar::new(),
        }
    }

    /// Append a task to the tail and wake one idle worker.
    ///
    /// On a closed queue the task is handed back inside the error, its
    /// future untouched, so the caller decides how to report the rejection.
    pub fn enqueue(&self, task: Task) -> Result<(), (SchedError, Task)> {
        {
            let mut state = self.state.lock();
            if state.closed {
                return Err((SchedError::PoolClosed, task));
            }
            state.tasks.push_back(task);
        }
        self.not_empty_or_closed.notify_one();
        Ok(())
    }

    /// Remove the task at the head, blocking while the queue is empty and open.
    ///
    /// Returns None once the queue is closed and empty; a worker that gets
    /// None terminates.
    pub fn dequeue(&self) -> Option<Task> {
        let mut state = self.state.lock();
        loop {
            if let Some(task) = state.tasks.pop_front() {
                return Some(task);
            }
            if state.closed {
                return None;
            }
            self.not_empty_or_closed.wait(&mut state);
        }
    }

    /// Non-blocking variant of [`dequeue`](Self::dequeue)
    pub fn try_dequeue(&self) -> Option<Task> {
        self.state.lock().tasks.pop_front()
    }

    /// Reject further enqueues and wake every waiting worker.
    ///
    /// Tasks already queued stay queued; workers keep draining them.
    /// Returns false if the queue was already closed.
    pub fn close(&self) -> bool {
        let newly_closed = {
            let mut state = self.state.lock();
            !std::mem::replace(&mut state.closed, true)
        };
        self.not_empty_or_closed.notify_all();
        newly_closed
    }

    /// Close the queue and remove every queued task in one step.
    ///
    /// No worker can start a task between the close and the removal.
    pub fn close_and_drain(&self) -> Vec<Task> {
        let drained = {
            let mut state = self.state.lock();
            state.closed = true;
            state.tasks.drain(..).collect()
        };
        self.not_empty_or_closed.notify_all();
        drained
    }

    /// Remove every task that has not been started yet, in FIFO order
    pub fn drain(&self) -> Vec<Task> {
        self.state.lock().tasks.drain(..).collect()
    }

    /// Number of queued tasks (tasks running on a worker are not counted)
    pub fn len(&self) -> usize {
        self.state.lock().tasks.len()
    }

    /// Whether no tasks are queued
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the queue rejects new tasks
    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }
}

impl Default for TaskQueue {
    fn default() -> Self {
        Self::new()
    }
}
