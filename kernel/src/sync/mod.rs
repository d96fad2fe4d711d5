//! Synchronisation primitives built on the scheduler
//!
//! - `Lock`: mutual exclusion with priority donation
//! - `WaitQueue`: park threads until an event, highest priority woken first
//! - `Semaphore`: counting semaphore over a `WaitQueue`
//!
//! None of these own the scheduler: every operation borrows it, normally
//! from inside `SchedulerHandle::with`.

pub mod lock;
pub mod semaphore;
pub mod wait_queue;

pub use lock::Lock;
pub use semaphore::Semaphore;
pub use wait_queue::WaitQueue;
