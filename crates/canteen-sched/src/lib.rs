//! Canteen task scheduler
//!
//! A fixed pool of worker threads behind one FIFO queue:
//! - Tasks carry a name, owned params and a callable, and hand their result
//!   back through a one-shot [`TaskFuture`]
//! - Workers block on the queue while idle and run one task at a time
//! - Failures and panics inside a callable resolve only that task's future
//! - The [`Scheduler`] facade owns the lifecycle and the process-wide instance

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod config;
pub mod error;
pub mod future;
pub mod pool;
pub mod queue;
pub mod scheduler;
pub mod stats;
pub mod task;
pub mod worker;

pub use config::SchedulerConfig;
pub use error::{SchedError, SchedResult};
pub use future::{Promise, TaskFuture};
pub use pool::{ShutdownMode, WorkerPool};
pub use queue::TaskQueue;
pub use scheduler::{Lifecycle, Scheduler};
pub use stats::SchedulerStats;
pub use task::{Task, TaskId, TaskOutcome};
pub use worker::{Worker, WorkerState};
