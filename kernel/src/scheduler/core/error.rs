//! Scheduler Error Handling
//!
//! Typed errors for all scheduler operations. Only resource exhaustion and
//! bad arguments are returned to callers; corruption and broken invariants
//! halt the kernel through `sched_fatal!` / `sched_assert!`.

use crate::scheduler::core::LockId;
use crate::scheduler::thread::{ThreadId, ThreadState};
use core::fmt;

/// Scheduler error types with detailed context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerError {
    // ═══════════════════════════════════════════════════════════════
    // Resource Errors
    // ═══════════════════════════════════════════════════════════════
    /// No stack page (or thread slot) left for a new thread
    ResourceExhausted { live_threads: usize },

    // ═══════════════════════════════════════════════════════════════
    // Thread Errors
    // ═══════════════════════════════════════════════════════════════
    /// Thread not found in the registry
    ThreadNotFound { thread_id: ThreadId },

    /// Invalid thread state transition
    InvalidStateTransition {
        thread_id: ThreadId,
        from: ThreadState,
        to: ThreadState,
    },

    // ═══════════════════════════════════════════════════════════════
    // Priority Errors
    // ═══════════════════════════════════════════════════════════════
    /// Invalid priority value
    InvalidPriority { value: i32, min: i32, max: i32 },

    /// Invalid nice value
    InvalidNice { value: i32, min: i32, max: i32 },

    // ═══════════════════════════════════════════════════════════════
    // Lock Errors
    // ═══════════════════════════════════════════════════════════════
    /// Lock not found in the lock table
    LockNotFound { lock_id: LockId },

    /// Lock still held or waited on
    LockBusy { lock_id: LockId },

    // ═══════════════════════════════════════════════════════════════
    // Fatal Errors (never returned, reported through sched_fatal!)
    // ═══════════════════════════════════════════════════════════════
    /// Stack-overflow sentinel overwritten
    CorruptionDetected { thread_id: ThreadId, magic: u32 },

    /// Internal scheduler invariant violated
    InternalError { reason: &'static str },
}

impl fmt::Display for SchedulerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ResourceExhausted { live_threads } => {
                write!(f, "No memory for a new thread ({} live)", live_threads)
            }
            Self::ThreadNotFound { thread_id } => {
                write!(f, "Thread {} not found", thread_id)
            }
            Self::InvalidStateTransition { thread_id, from, to } => {
                write!(f, "Thread {}: invalid transition {} -> {}", thread_id, from, to)
            }
            Self::InvalidPriority { value, min, max } => {
                write!(f, "Priority {} outside [{}, {}]", value, min, max)
            }
            Self::InvalidNice { value, min, max } => {
                write!(f, "Nice {} outside [{}, {}]", value, min, max)
            }
            Self::LockNotFound { lock_id } => {
                write!(f, "Lock {} not found", lock_id)
            }
            Self::LockBusy { lock_id } => {
                write!(f, "Lock {} is busy", lock_id)
            }
            Self::CorruptionDetected { thread_id, magic } => {
                write!(f, "Thread {} corrupted (magic {:#010x})", thread_id, magic)
            }
            Self::InternalError { reason } => {
                write!(f, "Internal error: {}", reason)
            }
        }
    }
}

impl SchedulerError {
    /// Get recovery hint for this error
    pub fn recovery_hint(&self) -> &'static str {
        match self {
            Self::ResourceExhausted { .. } => "Wait for threads to exit or free memory",
            Self::ThreadNotFound { .. } => "Thread may have already terminated",
            Self::InvalidStateTransition { .. } => "Check thread lifecycle management",
            Self::InvalidPriority { .. } | Self::InvalidNice { .. } => "Clamp the value to the valid range",
            Self::LockBusy { .. } => "Release the lock and wake its waiters first",
            Self::CorruptionDetected { .. } => "Kernel stack overflow, reduce stack usage",
            _ => "Check scheduler usage",
        }
    }

    /// Is this a recoverable error?
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            Self::CorruptionDetected { .. } | Self::InternalError { .. }
        )
    }

    /// Get error severity (0-3)
    pub fn severity(&self) -> u8 {
        match self {
            Self::CorruptionDetected { .. } => 3, // Critical
            Self::InternalError { .. } => 3,
            Self::ResourceExhausted { .. } => 2, // Severe
            Self::InvalidStateTransition { .. } => 1, // Warning
            Self::LockBusy { .. } => 1,
            _ => 0, // Info
        }
    }
}

/// Result type for scheduler operations
pub type SchedulerResult<T> = Result<T, SchedulerError>;

/// Halt on an unrecoverable scheduler error
#[macro_export]
macro_rules! sched_fatal {
    ($err:expr) => {{
        let err: $crate::scheduler::SchedulerError = $err;
        log::error!("[SCHED] Fatal: {} (hint: {})", err, err.recovery_hint());
        panic!("[SCHED FATAL] {}", err)
    }};
}

/// Macro for critical scheduler assertions
#[macro_export]
macro_rules! sched_assert {
    ($cond:expr, $reason:expr) => {
        if !$cond {
            panic!("[SCHED CRITICAL] Invariant violated: {}", $reason);
        }
    };
}
