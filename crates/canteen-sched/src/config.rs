//! Worker pool configuration

use crate::error::{SchedError, SchedResult};
use serde::Deserialize;

/// Upper bound on the number of workers when none is configured
pub const DEFAULT_MAX_WORKERS: usize = 8;

/// Configuration for a [`WorkerPool`](crate::WorkerPool).
///
/// The worker count is decided once, when the pool is built, and never
/// changes afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Explicit number of workers (None = detect from hardware parallelism)
    pub worker_count: Option<usize>,

    /// Cap applied to both detected and explicit counts
    pub max_workers: usize,

    /// Worker threads are named `<prefix>-<id>`
    pub thread_name_prefix: String,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            worker_count: None,
            max_workers: DEFAULT_MAX_WORKERS,
            thread_name_prefix: "canteen-worker".to_string(),
        }
    }
}

impl SchedulerConfig {
    /// Config with a fixed number of workers
    pub fn with_workers(worker_count: usize) -> Self {
        Self {
            worker_count: Some(worker_count),
            ..Self::default()
        }
    }

    /// Number of workers the pool will start.
    ///
    /// `min(available parallelism, max_workers)` unless an explicit count is
    /// set. A result of zero is a `FatalInit`: a pool without workers would
    /// accept tasks and never run them.
    pub fn resolve_worker_count(&self) -> SchedResult<usize> {
        let requested = match self.worker_count {
            Some(count) => count,
            None => std::thread::available_parallelism()
                .map(|n| n.get())
                .map_err(|e| {
                    SchedError::FatalInit(format!("cannot detect hardware parallelism: {}", e))
                })?,
        };

        let count = requested.min(self.max_workers);
        if count == 0 {
            return Err(SchedError::FatalInit(format!(
                "worker count resolved to zero (requested {}, max {})",
                requested, self.max_workers
            )));
        }
        Ok(count)
    }
}
