//! Fixed-size worker pool over one shared FIFO queue

use crate::config::SchedulerConfig;
use crate::error::{SchedError, SchedResult};
use crate::future::TaskFuture;
use crate::queue::TaskQueue;
use crate::stats::{PoolCounters, SchedulerStats};
use crate::task::Task;
use crate::worker::{Worker, WorkerState};
use std::fmt;
use std::sync::Arc;

/// How queued tasks are treated by `shutdown`
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ShutdownMode {
    /// Run every queued task to completion, then join the workers
    Graceful,
    /// Resolve every queued task with `PoolClosed`; only tasks already
    /// running on a worker finish
    Discard,
}

impl ShutdownMode {
    /// `true` maps to [`Graceful`](Self::Graceful)
    pub fn from_graceful(graceful: bool) -> Self {
        if graceful {
            ShutdownMode::Graceful
        } else {
            ShutdownMode::Discard
        }
    }
}

/// A fixed set of workers sharing one queue.
///
/// The number of workers is decided in [`WorkerPool::new`] and never changes.
pub struct WorkerPool {
    queue: Arc<TaskQueue>,
    workers: Vec<Worker>,
    counters: Arc<PoolCounters>,
    worker_count: usize,
}

impl WorkerPool {
    /// Start the workers.
    ///
    /// Fails with `FatalInit` if the worker count resolves to zero or a
    /// worker thread cannot be spawned; workers already spawned are stopped.
    pub fn new(config: &SchedulerConfig) -> SchedResult<Self> {
        let worker_count = config.resolve_worker_count()?;
        let queue = Arc::new(TaskQueue::new());
        let counters = Arc::new(PoolCounters::default());

        let mut workers = Vec::with_capacity(worker_count);
        for id in 0..worker_count {
            match Worker::spawn(
                id,
                &config.thread_name_prefix,
                queue.clone(),
                counters.clone(),
            ) {
                Ok(worker) => workers.push(worker),
                Err(e) => {
                    queue.close();
                    for worker in &workers {
                        worker.join();
                    }
                    return Err(SchedError::FatalInit(format!(
                        "failed to spawn worker {}: {}",
                        id, e
                    )));
                }
            }
        }

        tracing::debug!(workers = worker_count, "worker pool started");

        Ok(Self {
            queue,
            workers,
            counters,
            worker_count,
        })
    }

    /// Queue `callable(params)` and return the future of its result.
    ///
    /// Never blocks beyond the queue's critical section. Once the pool is
    /// closed this returns `PoolClosed` and nothing is queued.
    pub fn submit<P, R, E, F>(
        &self,
        name: impl Into<String>,
        callable: F,
        params: P,
    ) -> SchedResult<TaskFuture<R>>
    where
        P: Send + 'static,
        R: Send + 'static,
        E: fmt::Display + 'static,
        F: FnOnce(P) -> Result<R, E> + Send + 'static,
    {
        let (task, future) = Task::new(name, callable, params);
        self.submit_task(task)?;
        Ok(future)
    }

    /// Queue an already built task
    pub fn submit_task(&self, task: Task) -> SchedResult<()> {
        let task_id = task.id();
        match self.queue.enqueue(task) {
            Ok(()) => {
                self.counters.record_submitted();
                Ok(())
            }
            Err((err, task)) => {
                self.counters.record_rejected();
                tracing::debug!(task = %task.name(), id = %task_id, "submission rejected");
                task.abort(err.clone());
                Err(err)
            }
        }
    }

    /// Count a submission refused before it reached the queue
    pub(crate) fn record_rejected(&self) {
        self.counters.record_rejected();
    }

    /// Close the queue and join every worker.
    ///
    /// Returns the number of queued tasks that were resolved with `PoolClosed`
    /// (always zero for a graceful shutdown). Safe to call more than once.
    pub fn shutdown(&self, mode: ShutdownMode) -> usize {
        let aborted = match mode {
            ShutdownMode::Graceful => {
                if self.queue.close() {
                    tracing::info!(pending = self.queue.len(), "draining queued tasks");
                }
                0
            }
            ShutdownMode::Discard => {
                let discarded = self.queue.close_and_drain();
                let count = discarded.len();
                for task in discarded {
                    task.abort(SchedError::PoolClosed);
                }
                self.counters.record_aborted(count as u64);
                if count > 0 {
                    tracing::info!(discarded = count, "discarded queued tasks");
                }
                count
            }
        };

        for worker in &self.workers {
            worker.join();
        }

        aborted
    }

    /// Number of tasks waiting in the queue
    pub fn pending_count(&self) -> usize {
        self.queue.len()
    }

    /// Number of workers
    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    /// Whether submissions are rejected
    pub fn is_closed(&self) -> bool {
        self.queue.is_closed()
    }

    /// State of each worker, indexed by worker ID
    pub fn worker_states(&self) -> Vec<WorkerState> {
        self.workers.iter().map(Worker::state).collect()
    }

    /// Get pool statistics
    pub fn stats(&self) -> SchedulerStats {
        let active = self
            .worker_states()
            .into_iter()
            .filter(|s| *s == WorkerState::Active)
            .count();
        self.counters.snapshot(active, self.queue.len())
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown(ShutdownMode::Graceful);
    }
}
