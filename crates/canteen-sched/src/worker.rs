//! Worker thread that executes Tasks
//!
//! A worker blocks on the shared queue, runs one task at a time, and exits
//! when the queue reports closed-and-empty.

use crate::queue::TaskQueue;
use crate::stats::PoolCounters;
use crate::task::TaskOutcome;
use parking_lot::Mutex;
use std::io;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::thread;

/// State of a worker
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum WorkerState {
    /// Waiting on the queue
    Idle,
    /// Executing a task
    Active,
    /// Loop exited; the thread is finished or about to be
    Terminated,
}

impl WorkerState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => WorkerState::Idle,
            1 => WorkerState::Active,
            _ => WorkerState::Terminated,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            WorkerState::Idle => 0,
            WorkerState::Active => 1,
            WorkerState::Terminated => 2,
        }
    }
}

/// Worker thread handle
pub struct Worker {
    /// Worker ID
    id: usize,

    /// Current state, written by the worker thread
    state: Arc<AtomicU8>,

    /// Taken by the first joiner, so the lock is never held across a join
    handle: Mutex<Option<thread::JoinHandle<()>>>,
}

impl Worker {
    /// Spawn a worker thread named `<prefix>-<id>` serving `queue`
    pub(crate) fn spawn(
        id: usize,
        prefix: &str,
        queue: Arc<TaskQueue>,
        counters: Arc<PoolCounters>,
    ) -> io::Result<Self> {
        let state = Arc::new(AtomicU8::new(WorkerState::Idle.as_u8()));
        let thread_state = state.clone();

        let handle = thread::Builder::new()
            .name(format!("{}-{}", prefix, id))
            .spawn(move || {
                Worker::run_loop(id, &queue, &counters, &thread_state);
            })?;

        Ok(Self {
            id,
            state,
            handle: Mutex::new(Some(handle)),
        })
    }

    /// Worker ID
    pub fn id(&self) -> usize {
        self.id
    }

    /// Current state
    pub fn state(&self) -> WorkerState {
        WorkerState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Wait for the worker thread to exit.
    ///
    /// Only returns once the queue has been closed and drained (or emptied).
    /// Calling it twice is a no-op.
    pub(crate) fn join(&self) {
        let handle = self.handle.lock().take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                tracing::error!(worker = self.id, "worker thread panicked outside a task");
            }
        }
    }

    /// Worker thread main loop
    fn run_loop(id: usize, queue: &TaskQueue, counters: &PoolCounters, state: &AtomicU8) {
        tracing::debug!(worker = id, "worker started");

        while let Some(task) = queue.dequeue() {
            state.store(WorkerState::Active.as_u8(), Ordering::Release);

            let task_id = task.id();
            let name = task.name().to_string();
            tracing::debug!(worker = id, task = %name, id = %task_id, "task started");

            let outcome = task.run();
            counters.record_outcome(outcome);

            match outcome {
                TaskOutcome::Completed => {
                    tracing::info!(worker = id, task = %name, id = %task_id, "task completed");
                }
                TaskOutcome::Failed => {
                    tracing::warn!(worker = id, task = %name, id = %task_id, "task failed");
                }
                TaskOutcome::Panicked => {
                    tracing::error!(worker = id, task = %name, id = %task_id, "task panicked");
                }
            }

            state.store(WorkerState::Idle.as_u8(), Ordering::Release);
        }

        state.store(WorkerState::Terminated.as_u8(), Ordering::Release);
        tracing::debug!(worker = id, "worker terminated");
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        self.join();
    }
}
