//! Scheduler subsystem
//!
//! Single-core priority scheduler with two boot-selected policies:
//! - round-robin by priority, with priority donation through locks
//! - BSD multilevel feedback queue (MLFQS) driven by 17.14 fixed-point
//!   recent-CPU and load-average accounting

pub mod config;
pub mod core;
pub mod fixed_point;
pub mod idle;
pub mod switch;
pub mod thread;

// Re-exports
pub use self::config::{SchedConfig, SchedPolicy};
pub use self::core::{
    LockAcquire, LockId, Scheduler, SchedulerError, SchedulerHandle, SchedulerResult,
    StatsSnapshot, MAIN_THREAD_NAME, MAX_DONATION_DEPTH,
};
pub use fixed_point::FixedPoint;
pub use idle::IDLE_THREAD_NAME;
pub use switch::{ContextSwitch, InterruptControl, InterruptGuard, RecordingSwitch};
pub use thread::{
    PageStackAllocator, QueueLocation, StackAllocator, Thread, ThreadEntry, ThreadId,
    ThreadStack, ThreadState, NICE_DEFAULT, NICE_MAX, NICE_MIN, PRI_DEFAULT, PRI_MAX, PRI_MIN,
};
