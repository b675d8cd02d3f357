//! Pool counters

use crate::task::TaskOutcome;
use std::sync::atomic::{AtomicU64, Ordering};

/// Scheduler statistics snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    /// Tasks accepted into the queue
    pub tasks_submitted: u64,

    /// Tasks whose callable returned Ok
    pub tasks_completed: u64,

    /// Tasks whose callable returned Err or panicked
    pub tasks_failed: u64,

    /// Submissions refused because the pool was closed
    pub tasks_rejected: u64,

    /// Queued tasks resolved with PoolClosed by a non-graceful shutdown
    pub tasks_aborted: u64,

    /// Workers currently executing a task
    pub active_workers: usize,

    /// Tasks waiting in the queue
    pub pending: usize,
}

impl SchedulerStats {
    /// Tasks that were accepted and have since been resolved
    pub fn tasks_resolved(&self) -> u64 {
        self.tasks_completed + self.tasks_failed + self.tasks_aborted
    }
}

/// Live counters shared between the pool and its workers
#[derive(Debug, Default)]
pub(crate) struct PoolCounters {
    submitted: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
    rejected: AtomicU64,
    aborted: AtomicU64,
}

impl PoolCounters {
    pub(crate) fn record_submitted(&self) {
        self.submitted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_aborted(&self, count: u64) {
        self.aborted.fetch_add(count, Ordering::Relaxed);
    }

    pub(crate) fn record_outcome(&self, outcome: TaskOutcome) {
        match outcome {
            TaskOutcome::Completed => self.completed.fetch_add(1, Ordering::Relaxed),
            TaskOutcome::Failed | TaskOutcome::Panicked => {
                self.failed.fetch_add(1, Ordering::Relaxed)
            }
        };
    }

    pub(crate) fn snapshot(&self, active_workers: usize, pending: usize) -> SchedulerStats {
        SchedulerStats {
            tasks_submitted: self.submitted.load(Ordering::Relaxed),
            tasks_completed: self.completed.load(Ordering::Relaxed),
            tasks_failed: self.failed.load(Ordering::Relaxed),
            tasks_rejected: self.rejected.load(Ordering::Relaxed),
            tasks_aborted: self.aborted.load(Ordering::Relaxed),
            active_workers,
            pending,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_snapshot() {
        let counters = PoolCounters::default();
        for _ in 0..4 {
            counters.record_submitted();
        }
        counters.record_outcome(TaskOutcome::Completed);
        counters.record_outcome(TaskOutcome::Failed);
        counters.record_outcome(TaskOutcome::Panicked);
        counters.record_aborted(1);
        counters.record_rejected();

        let stats = counters.snapshot(2, 0);
        assert_eq!(stats.tasks_submitted, 4);
        assert_eq!(stats.tasks_completed, 1);
        assert_eq!(stats.tasks_failed, 2);
        assert_eq!(stats.tasks_rejected, 1);
        assert_eq!(stats.tasks_resolved(), 4);
        assert_eq!(stats.active_workers, 2);
    }
}
