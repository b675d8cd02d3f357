//! Scheduler facade and process-wide instance
//!
//! The scheduler wraps one [`WorkerPool`] and adds the lifecycle:
//! `Uninitialized -> Running -> ShuttingDown -> Terminated`. Shutdown is
//! irreversible; a terminated scheduler rejects every submission.

use crate::config::SchedulerConfig;
use crate::error::{SchedError, SchedResult};
use crate::future::TaskFuture;
use crate::pool::{ShutdownMode, WorkerPool};
use crate::stats::SchedulerStats;
use crate::worker::WorkerState;
use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

/// Lifecycle of a scheduler
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Lifecycle {
    /// The process-wide instance has not been constructed yet
    Uninitialized,
    /// Accepting submissions
    Running,
    /// Queue closed, workers finishing
    ShuttingDown,
    /// All workers joined
    Terminated,
}

impl Lifecycle {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Lifecycle::Uninitialized,
            1 => Lifecycle::Running,
            2 => Lifecycle::ShuttingDown,
            _ => Lifecycle::Terminated,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            Lifecycle::Uninitialized => 0,
            Lifecycle::Running => 1,
            Lifecycle::ShuttingDown => 2,
            Lifecycle::Terminated => 3,
        }
    }
}

static GLOBAL: OnceCell<Scheduler> = OnceCell::new();
static GLOBAL_CONFIG: OnceCell<SchedulerConfig> = OnceCell::new();

/// Entry point for offloading work onto the worker pool.
///
/// Most code uses the process-wide instance from [`Scheduler::global`] and
/// passes `&Scheduler` to collaborators. Tests and embedders that need an
/// isolated pool build one with [`Scheduler::new`].
pub struct Scheduler {
    pool: WorkerPool,
    lifecycle: AtomicU8,
    /// Serializes shutdown callers
    shutdown_lock: Mutex<()>,
}

impl Scheduler {
    /// Create a running scheduler with its own worker pool
    pub fn new(config: SchedulerConfig) -> SchedResult<Self> {
        let pool = WorkerPool::new(&config)?;
        tracing::info!(workers = pool.worker_count(), "scheduler running");
        Ok(Self {
            pool,
            lifecycle: AtomicU8::new(Lifecycle::Running.as_u8()),
            shutdown_lock: Mutex::new(()),
        })
    }

    /// Set the configuration of the process-wide scheduler.
    ///
    /// Must happen before the first call to [`global`](Self::global); the
    /// config is handed back if the instance already exists or a config was
    /// already set.
    pub fn configure(config: SchedulerConfig) -> Result<(), SchedulerConfig> {
        if GLOBAL.get().is_some() {
            return Err(config);
        }
        GLOBAL_CONFIG.set(config)
    }

    /// The process-wide scheduler, constructed on first access.
    ///
    /// Concurrent first callers block until one of them has built the
    /// instance and all receive the same reference. If construction fails,
    /// every racing caller gets the `FatalInit` error and the instance stays
    /// uninitialized.
    pub fn global() -> SchedResult<&'static Scheduler> {
        GLOBAL.get_or_try_init(|| {
            let config = GLOBAL_CONFIG.get().cloned().unwrap_or_default();
            Scheduler::new(config)
        })
    }

    /// The process-wide scheduler if it has been constructed
    pub fn try_global() -> Option<&'static Scheduler> {
        GLOBAL.get()
    }

    /// Lifecycle of the process-wide scheduler
    pub fn global_lifecycle() -> Lifecycle {
        GLOBAL
            .get()
            .map_or(Lifecycle::Uninitialized, Scheduler::lifecycle)
    }

    /// Queue `callable(params)` under the diagnostic label `name`.
    ///
    /// Returns immediately. Fails with `PoolClosed`, creating no task, once
    /// shutdown has begun. The callable must not submit another task and
    /// block on it: with every worker doing that the pool deadlocks.
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
        if self.lifecycle() != Lifecycle::Running {
            self.pool.record_rejected();
            return Err(SchedError::PoolClosed);
        }
        self.pool.submit(name, callable, params)
    }

    /// Stop the scheduler.
    ///
    /// `Graceful` runs every queued task before joining the workers;
    /// `Discard` resolves queued tasks with `PoolClosed` and only waits for
    /// tasks already running. Returns once every worker has exited. Calling
    /// it again, in any mode, is a no-op.
    pub fn shutdown(&self, mode: ShutdownMode) {
        let _guard = self.shutdown_lock.lock();

        if self.lifecycle() != Lifecycle::Running {
            return;
        }

        self.set_lifecycle(Lifecycle::ShuttingDown);
        tracing::info!(
            mode = ?mode,
            pending = self.pool.pending_count(),
            "scheduler shutting down"
        );

        let discarded = self.pool.shutdown(mode);

        self.set_lifecycle(Lifecycle::Terminated);
        let stats = self.pool.stats();
        tracing::info!(
            completed = stats.tasks_completed,
            failed = stats.tasks_failed,
            discarded,
            "scheduler terminated"
        );
    }

    /// Number of queued tasks, not counting tasks running on a worker
    pub fn pending_count(&self) -> usize {
        self.pool.pending_count()
    }

    /// Number of workers
    pub fn worker_count(&self) -> usize {
        self.pool.worker_count()
    }

    /// State of each worker
    pub fn worker_states(&self) -> Vec<WorkerState> {
        self.pool.worker_states()
    }

    /// Current lifecycle state
    pub fn lifecycle(&self) -> Lifecycle {
        Lifecycle::from_u8(self.lifecycle.load(Ordering::Acquire))
    }

    /// Whether submissions are accepted
    pub fn is_running(&self) -> bool {
        self.lifecycle() == Lifecycle::Running
    }

    /// Get scheduler statistics
    pub fn stats(&self) -> SchedulerStats {
        self.pool.stats()
    }

    fn set_lifecycle(&self, next: Lifecycle) {
        self.lifecycle.store(next.as_u8(), Ordering::Release);
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.shutdown(ShutdownMode::Graceful);
    }
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("lifecycle", &self.lifecycle())
            .field("workers", &self.worker_count())
            .field("pending", &self.pending_count())
            .finish()
    }
}
