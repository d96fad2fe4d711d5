// src/lib.rs
// Cœur d'ordonnancement des threads Exo-OS
#![cfg_attr(not(test), no_std)] // Pas de bibliothèque standard (std seulement pour les tests)
#![deny(unsafe_op_in_unsafe_fn)]

// Import de alloc pour les allocations dynamiques
extern crate alloc;

// Modules
pub mod logger;
pub mod scheduler;
pub mod sync;

pub use scheduler::{
    FixedPoint, LockAcquire, LockId, SchedConfig, SchedPolicy, Scheduler, SchedulerError,
    SchedulerHandle, SchedulerResult, Thread, ThreadId, ThreadState,
};
pub use sync::{Lock, Semaphore, WaitQueue};
