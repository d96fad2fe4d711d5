//! Scheduler core module
//!
//! - `scheduler`: scheduler state, dispatch and thread lifecycle
//! - `ready_queue`: per-priority FIFO levels
//! - `donation`: lock table and priority donation
//! - `mlfqs`: BSD load / recent-CPU accounting
//! - `handle`: interrupt-masked, locked access for the kernel

pub mod error;
pub mod statistics;
pub mod ready_queue;
pub mod scheduler;
pub mod donation;
pub mod mlfqs;
pub mod handle;

pub use donation::{LockAcquire, LockId, MAX_DONATION_DEPTH};
pub use error::{SchedulerError, SchedulerResult};
pub use handle::SchedulerHandle;
pub use ready_queue::ReadyQueue;
pub use scheduler::{Scheduler, MAIN_THREAD_NAME};
pub use statistics::{SchedulerStats, StatsSnapshot};
